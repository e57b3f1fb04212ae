//! Blog post use-case service.
//!
//! # Responsibility
//! - Expose list/get/create/update/delete over posts for an authenticated caller.
//!
//! # Invariants
//! - Every operation takes a [`Caller`]; there is no anonymous entry point.
//! - Update and delete are a single owner-scoped store write; an update with
//!   nothing to apply writes nothing.

use crate::auth::Caller;
use crate::model::blog_post::{BlogPost, BlogPostId, BlogPostPatch, NewBlogPost};
use crate::model::user::UserId;
use crate::repo::post_repo::BlogPostRepository;
use crate::repo::RepoError;
use crate::service::error::{FieldError, ServiceError, ServiceResult};
use log::info;

/// Raw `createBlogPost` arguments. Every field is optional at the schema
/// level but required by storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateBlogPostRequest {
    pub title: Option<String>,
    pub sub_title: Option<String>,
    pub body: Option<String>,
}

impl CreateBlogPostRequest {
    fn into_new_post(self) -> ServiceResult<NewBlogPost> {
        let mut errors = Vec::new();
        let mut require = |value: Option<String>, field: &str| {
            value.unwrap_or_else(|| {
                errors.push(FieldError::new(field, "required", "This field is required."));
                String::new()
            })
        };
        let title = require(self.title, "title");
        let sub_title = require(self.sub_title, "subTitle");
        let body = require(self.body, "body");

        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }
        Ok(NewBlogPost {
            title,
            sub_title,
            body,
        })
    }
}

pub struct BlogPostService<R: BlogPostRepository> {
    repo: R,
}

impl<R: BlogPostRepository> BlogPostService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// All posts in ascending id order.
    pub fn list_posts(&self, _caller: &Caller) -> ServiceResult<Vec<BlogPost>> {
        Ok(self.repo.list_posts()?)
    }

    pub fn list_posts_by_owner(
        &self,
        _caller: &Caller,
        owner: UserId,
    ) -> ServiceResult<Vec<BlogPost>> {
        Ok(self.repo.list_posts_by_owner(owner)?)
    }

    pub fn get_post(&self, _caller: &Caller, id: BlogPostId) -> ServiceResult<BlogPost> {
        self.repo.get_post(id)?.ok_or(ServiceError::NotFound {
            entity: "BlogPost",
            id,
        })
    }

    /// Persists a post owned by `caller`.
    pub fn create_post(
        &self,
        caller: &Caller,
        request: CreateBlogPostRequest,
    ) -> ServiceResult<BlogPost> {
        let post = request.into_new_post()?;
        let created = self.repo.create_post(caller.user_id, &post)?;
        info!(
            "event=post_create module=service status=ok post_id={} user_id={}",
            created.id, caller.user_id
        );
        Ok(created)
    }

    /// Applies the non-empty fields of `patch` to a post `caller` owns.
    ///
    /// A patch with nothing to apply still checks existence and ownership.
    pub fn update_post(
        &mut self,
        caller: &Caller,
        id: BlogPostId,
        patch: BlogPostPatch,
    ) -> ServiceResult<BlogPost> {
        if patch.is_noop() {
            let post = self.get_post(caller, id)?;
            if !caller.owns(post.user_id) {
                return Err(ServiceError::Unauthorized(
                    "You are not authorized to update this post.",
                ));
            }
            return Ok(post);
        }
        let updated = self
            .repo
            .update_owned_post(id, caller.user_id, &patch)
            .map_err(|err| ownership_error(err, "You are not authorized to update this post."))?;
        info!(
            "event=post_update module=service status=ok post_id={id} user_id={}",
            caller.user_id
        );
        Ok(updated)
    }

    pub fn delete_post(&mut self, caller: &Caller, id: BlogPostId) -> ServiceResult<()> {
        self.repo
            .delete_owned_post(id, caller.user_id)
            .map_err(|err| ownership_error(err, "You are not authorized to delete this post."))?;
        info!(
            "event=post_delete module=service status=ok post_id={id} user_id={}",
            caller.user_id
        );
        Ok(())
    }
}

fn ownership_error(err: RepoError, message: &'static str) -> ServiceError {
    match err {
        RepoError::NotOwner(_) => ServiceError::Unauthorized(message),
        RepoError::NotFound { id, .. } => ServiceError::NotFound {
            entity: "BlogPost",
            id,
        },
        other => ServiceError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::CreateBlogPostRequest;
    use crate::service::error::ServiceError;

    #[test]
    fn missing_fields_are_reported_together() {
        let request = CreateBlogPostRequest {
            title: Some(String::new()),
            sub_title: None,
            body: None,
        };
        let Err(ServiceError::Validation(errors)) = request.into_new_post() else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["subTitle", "body"]);
    }

    #[test]
    fn empty_strings_are_accepted_on_create() {
        let request = CreateBlogPostRequest {
            title: Some(String::new()),
            sub_title: Some(String::new()),
            body: Some(String::new()),
        };
        let post = request.into_new_post().expect("valid request");
        assert_eq!(post.title, "");
    }
}
