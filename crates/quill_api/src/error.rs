//! Mapping of service errors onto GraphQL errors.
//!
//! Every error carries a machine-readable `extensions.code`. Storage and
//! hashing failures are logged here and surface only as `INTERNAL`.

use async_graphql::{ErrorExtensions, Value};
use log::error;
use quill_core::{ServiceError, ServiceResult};

pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
pub const FORBIDDEN: &str = "FORBIDDEN";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
pub const BAD_USER_INPUT: &str = "BAD_USER_INPUT";
pub const INTERNAL: &str = "INTERNAL";

pub trait IntoGraphqlError {
    fn into_graphql(self) -> async_graphql::Error;
}

impl IntoGraphqlError for ServiceError {
    fn into_graphql(self) -> async_graphql::Error {
        let (code, message) = match &self {
            ServiceError::Unauthenticated => (UNAUTHENTICATED, self.to_string()),
            ServiceError::Unauthorized(message) => (FORBIDDEN, (*message).to_string()),
            ServiceError::NotFound { entity, .. } => {
                (NOT_FOUND, format!("{entity} matching query does not exist."))
            }
            ServiceError::InvalidCredentials => (INVALID_CREDENTIALS, self.to_string()),
            ServiceError::Validation(_) => (BAD_USER_INPUT, self.to_string()),
            ServiceError::Hash(_) | ServiceError::Mail(_) | ServiceError::Repo(_) => {
                error!("event=graphql_error module=api status=error error_code=internal error={self}");
                (INTERNAL, "Internal server error".to_string())
            }
        };

        let fields = match &self {
            ServiceError::Validation(errors) => errors
                .iter()
                .map(|error| Value::from(error.field.clone()))
                .collect(),
            _ => Vec::new(),
        };

        async_graphql::Error::new(message).extend_with(|_, extensions| {
            extensions.set("code", code);
            if !fields.is_empty() {
                extensions.set("fields", Value::List(fields.clone()));
            }
        })
    }
}

/// `?`-friendly conversion for resolver bodies.
pub trait GraphqlResultExt<T> {
    fn into_graphql(self) -> async_graphql::Result<T>;
}

impl<T> GraphqlResultExt<T> for ServiceResult<T> {
    fn into_graphql(self) -> async_graphql::Result<T> {
        self.map_err(IntoGraphqlError::into_graphql)
    }
}

#[cfg(test)]
mod tests {
    use super::{IntoGraphqlError, FORBIDDEN, INVALID_CREDENTIALS, NOT_FOUND};
    use async_graphql::Value;
    use quill_core::ServiceError;

    fn code(err: &async_graphql::Error) -> Option<Value> {
        err.extensions.as_ref().and_then(|ext| ext.get("code").cloned())
    }

    #[test]
    fn maps_kinds_to_codes() {
        let err = ServiceError::Unauthorized("You are not authorized to delete this post.")
            .into_graphql();
        assert_eq!(err.message, "You are not authorized to delete this post.");
        assert_eq!(code(&err), Some(Value::from(FORBIDDEN)));

        let err = ServiceError::NotFound {
            entity: "BlogPost",
            id: 7,
        }
        .into_graphql();
        assert_eq!(err.message, "BlogPost matching query does not exist.");
        assert_eq!(code(&err), Some(Value::from(NOT_FOUND)));

        let err = ServiceError::InvalidCredentials.into_graphql();
        assert_eq!(err.message, "Invalid credentials");
        assert_eq!(code(&err), Some(Value::from(INVALID_CREDENTIALS)));
    }
}
