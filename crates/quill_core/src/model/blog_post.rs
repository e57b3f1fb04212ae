//! Blog post model.
//!
//! # Invariants
//! - `user_id` is set on creation and never changes.
//! - A patch only ever carries non-empty values; see [`BlogPostPatch::new`].

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// Server-assigned blog post identifier.
pub type BlogPostId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: BlogPostId,
    pub title: String,
    pub sub_title: String,
    pub body: String,
    /// Owning user. Only this user may update or delete the post.
    pub user_id: UserId,
}

/// Fields of a post about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlogPost {
    pub title: String,
    pub sub_title: String,
    pub body: String,
}

/// Partial update of a post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogPostPatch {
    pub title: Option<String>,
    pub sub_title: Option<String>,
    pub body: Option<String>,
}

impl BlogPostPatch {
    /// Builds a patch from raw mutation arguments.
    ///
    /// An empty string means "no change", the same as an omitted argument.
    pub fn new(title: Option<String>, sub_title: Option<String>, body: Option<String>) -> Self {
        Self {
            title: non_empty(title),
            sub_title: non_empty(sub_title),
            body: non_empty(body),
        }
    }

    /// True when applying this patch leaves the post untouched.
    pub fn is_noop(&self) -> bool {
        self.title.is_none() && self.sub_title.is_none() && self.body.is_none()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}
