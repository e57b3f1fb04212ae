use crate::context::{app_state, current_caller, require_caller};
use crate::error::GraphqlResultExt;
use crate::schema::blog::{required_id, BlogPostType};
use async_graphql::{Context, Object, ID};
use quill_core::User;

pub struct UserType(pub(crate) User);

/// Account projection. The password hash is not part of [`User`], so it can
/// never be selected.
#[Object]
impl UserType {
    async fn id(&self) -> ID {
        ID::from(self.0.id.to_string())
    }

    async fn username(&self) -> &str {
        &self.0.username
    }

    async fn email(&self) -> &str {
        &self.0.email
    }

    async fn first_name(&self) -> &str {
        &self.0.first_name
    }

    async fn last_name(&self) -> &str {
        &self.0.last_name
    }

    async fn is_active(&self) -> bool {
        self.0.is_active
    }

    async fn verified(&self) -> bool {
        self.0.verified
    }

    async fn archived(&self) -> bool {
        self.0.archived
    }

    async fn secondary_email(&self) -> Option<&str> {
        self.0.secondary_email.as_deref()
    }

    /// Epoch milliseconds.
    async fn date_joined(&self) -> i64 {
        self.0.date_joined
    }

    /// Epoch milliseconds.
    async fn last_login(&self) -> Option<i64> {
        self.0.last_login
    }

    async fn blog_posts(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<BlogPostType>> {
        let caller = require_caller(ctx)?;
        let posts = app_state(ctx)?
            .with_posts(|posts| posts.list_posts_by_owner(caller, self.0.id))
            .into_graphql()?;
        Ok(posts.into_iter().map(BlogPostType).collect())
    }
}

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    async fn all_users(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<UserType>> {
        let caller = require_caller(ctx)?;
        let users = app_state(ctx)?
            .with_users(|users| users.list_users(caller))
            .into_graphql()?;
        Ok(users.into_iter().map(UserType).collect())
    }

    async fn user(&self, ctx: &Context<'_>, id: Option<i32>) -> async_graphql::Result<UserType> {
        let caller = require_caller(ctx)?;
        let id = required_id(id).into_graphql()?;
        app_state(ctx)?
            .with_users(|users| users.get_user(caller, id))
            .map(UserType)
            .into_graphql()
    }

    /// The authenticated user, or `null`.
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<UserType>> {
        let caller = current_caller(ctx);
        app_state(ctx)?
            .with_users(|users| users.me(caller))
            .map(|user| user.map(UserType))
            .into_graphql()
    }
}
