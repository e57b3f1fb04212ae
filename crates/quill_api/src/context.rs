//! Per-request caller identity.
//!
//! The HTTP handler resolves the `Authorization` header once and attaches a
//! [`RequestContext`] to the GraphQL request; resolvers read the caller from
//! there instead of re-parsing headers.

use crate::error::IntoGraphqlError;
use crate::state::AppState;
use async_graphql::Context;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use log::warn;
use quill_core::{Caller, ServiceError};

/// Accepted `Authorization` schemes.
const AUTH_SCHEMES: [&str; 2] = ["JWT", "Bearer"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub caller: Option<Caller>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Resolves `token` into a context. Unknown, expired or revoked tokens
    /// yield an anonymous context; guarded fields then reject the request.
    pub fn from_token(state: &AppState, token: Option<&str>) -> Self {
        let Some(token) = token else {
            return Self::anonymous();
        };
        match state.resolve_caller(token) {
            Ok(caller) => Self { caller },
            Err(err) => {
                warn!("event=auth_resolve module=api status=error error={err}");
                Self::anonymous()
            }
        }
    }
}

/// Extracts the token from `Authorization: JWT <token>` or `Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !AUTH_SCHEMES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(scheme))
    {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Caller of the current request, if any.
pub fn current_caller<'ctx>(ctx: &Context<'ctx>) -> Option<&'ctx Caller> {
    ctx.data_opt::<RequestContext>()
        .and_then(|request| request.caller.as_ref())
}

/// Caller of the current request, or an `UNAUTHENTICATED` error.
pub fn require_caller<'ctx>(ctx: &Context<'ctx>) -> async_graphql::Result<&'ctx Caller> {
    current_caller(ctx).ok_or_else(|| ServiceError::Unauthenticated.into_graphql())
}

pub fn app_state<'ctx>(ctx: &Context<'ctx>) -> async_graphql::Result<&'ctx AppState> {
    ctx.data::<AppState>()
}
