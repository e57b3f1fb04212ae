//! Typed service errors and field-level validation errors.
//!
//! # Invariants
//! - Every business failure is a distinct [`ServiceError`] variant; only
//!   storage and hashing failures are opaque.
//! - Messages never echo passwords or tokens.

use crate::auth::password::PasswordHashError;
use crate::repo::RepoError;
use crate::service::mail::MailError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field name used for errors not tied to one input.
pub const NON_FIELD_ERRORS: &str = "nonFieldErrors";

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One validation failure, addressed to an input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }

    pub fn non_field(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(NON_FIELD_ERRORS, code, message)
    }

    pub fn invalid_token() -> Self {
        Self::non_field("invalid_token", "Invalid token.")
    }

    pub fn expired_token() -> Self {
        Self::non_field("expired_token", "Expired token.")
    }

    pub fn not_verified() -> Self {
        Self::non_field("not_verified", "Please verify your account.")
    }
}

#[derive(Debug)]
pub enum ServiceError {
    /// No valid caller identity.
    Unauthenticated,
    /// Caller authenticated but does not own the resource.
    Unauthorized(&'static str),
    NotFound { entity: &'static str, id: i64 },
    /// Login with unknown user, wrong password or a deactivated account.
    InvalidCredentials,
    Validation(Vec<FieldError>),
    Hash(PasswordHashError),
    Mail(MailError),
    Repo(RepoError),
}

impl ServiceError {
    pub fn validation(error: FieldError) -> Self {
        Self::Validation(vec![error])
    }

    /// Field-level view of business failures, for operations that report
    /// errors in their payload instead of failing the whole field.
    ///
    /// Returns `None` for transport failures, which are never user errors.
    pub fn field_errors(&self) -> Option<Vec<FieldError>> {
        match self {
            Self::Unauthenticated => Some(vec![FieldError::non_field(
                "unauthenticated",
                self.to_string(),
            )]),
            Self::InvalidCredentials => Some(vec![FieldError::non_field(
                "invalid_credentials",
                "Please, enter valid credentials.",
            )]),
            Self::Validation(errors) => Some(errors.clone()),
            Self::Mail(_) => Some(vec![FieldError::non_field(
                "email_fail",
                "Failed to send email.",
            )]),
            Self::Unauthorized(_) | Self::NotFound { .. } | Self::Hash(_) | Self::Repo(_) => None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => {
                write!(f, "You do not have permission to perform this action")
            }
            Self::Unauthorized(message) => write!(f, "{message}"),
            Self::NotFound { entity, id } => {
                write!(f, "{entity} matching query does not exist (id {id})")
            }
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::Validation(errors) => {
                let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                write!(f, "{}", messages.join(" "))
            }
            Self::Hash(err) => write!(f, "{err}"),
            Self::Mail(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Hash(err) => Some(err),
            Self::Mail(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::NotOwner(_) => {
                Self::Unauthorized("You are not authorized to modify this post.")
            }
            RepoError::Conflict { field } => {
                let input = snake_to_camel(&field);
                Self::validation(FieldError::new(
                    input,
                    "unique",
                    format!("A user with that {} already exists.", field.replace('_', " ")),
                ))
            }
            other => Self::Repo(other),
        }
    }
}

impl From<PasswordHashError> for ServiceError {
    fn from(value: PasswordHashError) -> Self {
        Self::Hash(value)
    }
}

impl From<MailError> for ServiceError {
    fn from(value: MailError) -> Self {
        Self::Mail(value)
    }
}

fn snake_to_camel(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut upper = false;
    for c in value.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{ServiceError, NON_FIELD_ERRORS};
    use crate::repo::RepoError;

    #[test]
    fn conflicts_become_unique_field_errors() {
        let err = ServiceError::from(RepoError::Conflict {
            field: "secondary_email".into(),
        });
        let errors = err.field_errors().expect("business error");
        assert_eq!(errors[0].field, "secondaryEmail");
        assert_eq!(errors[0].code, "unique");
    }

    #[test]
    fn not_owner_maps_to_unauthorized() {
        let err = ServiceError::from(RepoError::NotOwner(3));
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert!(err.field_errors().is_none());
    }

    #[test]
    fn unauthenticated_is_a_non_field_error() {
        let errors = ServiceError::Unauthenticated.field_errors().unwrap();
        assert_eq!(errors[0].field, NON_FIELD_ERRORS);
        assert_eq!(errors[0].code, "unauthenticated");
    }

    #[test]
    fn field_error_serializes_flat() {
        let error = super::FieldError::new("email", "invalid_email", "Enter a valid email address.");
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({
                "field": "email",
                "code": "invalid_email",
                "message": "Enter a valid email address."
            })
        );
    }
}
