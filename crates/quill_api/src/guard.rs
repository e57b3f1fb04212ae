//! Login guard applied uniformly to protected root fields.
//!
//! # Invariants
//! - A guarded field never reaches its resolver without a caller in the
//!   [`RequestContext`].
//! - Only root fields are checked; nested fields inherit the decision.

use crate::context::RequestContext;
use crate::error::UNAUTHENTICATED;
use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextResolve, ResolveInfo,
};
use async_graphql::{ErrorExtensionValues, PathSegment, ServerError, ServerResult, Value};
use log::info;
use quill_core::ServiceError;
use std::sync::Arc;

/// Root query and mutation fields that require an authenticated caller.
pub const GUARDED_FIELDS: &[&str] = &[
    "allBlogPosts",
    "blogPost",
    "allUsers",
    "user",
    "createBlogPost",
    "updateBlogPost",
    "deleteBlogPost",
];

/// Schema extension rejecting guarded root fields for anonymous requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoginRequired;

impl ExtensionFactory for LoginRequired {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(LoginRequiredExtension)
    }
}

struct LoginRequiredExtension;

#[async_trait::async_trait]
impl Extension for LoginRequiredExtension {
    async fn resolve(
        &self,
        ctx: &ExtensionContext<'_>,
        info: ResolveInfo<'_>,
        next: NextResolve<'_>,
    ) -> ServerResult<Option<Value>> {
        if info.path_node.parent.is_none() && GUARDED_FIELDS.contains(&info.name) {
            let authenticated = ctx
                .data_opt::<RequestContext>()
                .is_some_and(|request| request.caller.is_some());
            if !authenticated {
                info!(
                    "event=guard_reject module=api status=error error_code=unauthenticated field={}",
                    info.name
                );
                return Err(unauthenticated(&info));
            }
        }
        next.run(ctx, info).await
    }
}

fn unauthenticated(info: &ResolveInfo<'_>) -> ServerError {
    let mut error = ServerError::new(ServiceError::Unauthenticated.to_string(), None);
    error.path = vec![PathSegment::Field(info.name.to_string())];
    let mut extensions = ErrorExtensionValues::default();
    extensions.set("code", UNAUTHENTICATED);
    error.extensions = Some(extensions);
    error
}
