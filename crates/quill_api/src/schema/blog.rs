//! Blog post type, queries, CRUD mutations and `login`.

use crate::context::{app_state, require_caller};
use crate::error::GraphqlResultExt;
use crate::schema::user::UserType;
use crate::state::{HashOwner, PasswordWork};
use async_graphql::{Context, Object, SimpleObject, ID};
use quill_core::service::post_service::CreateBlogPostRequest;
use quill_core::{BlogPost, BlogPostPatch, FieldError, ServiceError};

pub struct BlogPostType(pub(crate) BlogPost);

#[Object]
impl BlogPostType {
    async fn id(&self) -> ID {
        ID::from(self.0.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn sub_title(&self) -> &str {
        &self.0.sub_title
    }

    async fn body(&self) -> &str {
        &self.0.body
    }

    /// The owner.
    async fn user(&self, ctx: &Context<'_>) -> async_graphql::Result<UserType> {
        let caller = require_caller(ctx)?;
        app_state(ctx)?
            .with_users(|users| users.get_user(caller, self.0.user_id))
            .map(UserType)
            .into_graphql()
    }
}

#[derive(Default)]
pub struct BlogQuery;

#[Object]
impl BlogQuery {
    async fn all_blog_posts(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<BlogPostType>> {
        let caller = require_caller(ctx)?;
        let posts = app_state(ctx)?
            .with_posts(|posts| posts.list_posts(caller))
            .into_graphql()?;
        Ok(posts.into_iter().map(BlogPostType).collect())
    }

    async fn blog_post(
        &self,
        ctx: &Context<'_>,
        id: Option<i32>,
    ) -> async_graphql::Result<BlogPostType> {
        let caller = require_caller(ctx)?;
        let id = required_id(id).into_graphql()?;
        app_state(ctx)?
            .with_posts(|posts| posts.get_post(caller, id))
            .map(BlogPostType)
            .into_graphql()
    }
}

#[derive(SimpleObject)]
#[graphql(name = "CreateBlogPost")]
pub struct CreateBlogPostPayload {
    blog_post: BlogPostType,
}

#[derive(SimpleObject)]
#[graphql(name = "UpdateBlogPost")]
pub struct UpdateBlogPostPayload {
    blog_post: BlogPostType,
}

#[derive(SimpleObject)]
#[graphql(name = "DeleteBlogPost")]
pub struct DeleteBlogPostPayload {
    success: bool,
}

#[derive(SimpleObject)]
#[graphql(name = "Login")]
pub struct LoginPayload {
    token: String,
}

#[derive(Default)]
pub struct BlogMutation;

#[Object]
impl BlogMutation {
    async fn create_blog_post(
        &self,
        ctx: &Context<'_>,
        title: Option<String>,
        sub_title: Option<String>,
        body: Option<String>,
    ) -> async_graphql::Result<CreateBlogPostPayload> {
        let caller = require_caller(ctx)?;
        let request = CreateBlogPostRequest {
            title,
            sub_title,
            body,
        };
        let post = app_state(ctx)?
            .with_posts(|posts| posts.create_post(caller, request))
            .into_graphql()?;
        Ok(CreateBlogPostPayload {
            blog_post: BlogPostType(post),
        })
    }

    /// Omitted and empty arguments leave the stored value unchanged.
    async fn update_blog_post(
        &self,
        ctx: &Context<'_>,
        id: i32,
        title: Option<String>,
        sub_title: Option<String>,
        body: Option<String>,
    ) -> async_graphql::Result<UpdateBlogPostPayload> {
        let caller = require_caller(ctx)?;
        let patch = BlogPostPatch::new(title, sub_title, body);
        let post = app_state(ctx)?
            .with_posts(|posts| posts.update_post(caller, i64::from(id), patch))
            .into_graphql()?;
        Ok(UpdateBlogPostPayload {
            blog_post: BlogPostType(post),
        })
    }

    async fn delete_blog_post(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<DeleteBlogPostPayload> {
        let caller = require_caller(ctx)?;
        app_state(ctx)?
            .with_posts(|posts| posts.delete_post(caller, i64::from(id)))
            .into_graphql()?;
        Ok(DeleteBlogPostPayload { success: true })
    }

    async fn login(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> async_graphql::Result<LoginPayload> {
        let state = app_state(ctx)?;
        let token = state
            .prepare_passwords(PasswordWork::check(HashOwner::Username(&username), &password))
            .await
            .and_then(|passwords| {
                state.with_auth_using(passwords, |auth| auth.login(&username, &password))
            })
            .into_graphql()?;
        Ok(LoginPayload { token })
    }
}

pub(crate) fn required_id(id: Option<i32>) -> Result<i64, ServiceError> {
    id.map(i64::from).ok_or_else(|| {
        ServiceError::validation(FieldError::new("id", "required", "This field is required."))
    })
}
