//! Issued credential records: session tokens and single-use action tokens.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// Role of an [`AuthToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTokenKind {
    /// Short-lived bearer token sent with every request.
    Access,
    /// Long-lived token exchanged for a new access/refresh pair.
    Refresh,
}

impl AuthTokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(Self::Access),
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }
}

/// Server-side record of an issued access or refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub kind: AuthTokenKind,
    pub user_id: UserId,
    pub created_at: i64,
    pub expires_at: i64,
    pub revoked_at: Option<i64>,
}

impl AuthToken {
    /// Live means not revoked and not yet expired at `now`.
    pub fn is_live(&self, now: i64) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

/// Account action an [`ActionToken`] authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountAction {
    Activation,
    PasswordReset,
    SecondaryEmail,
}

impl AccountAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::PasswordReset => "password_reset",
            Self::SecondaryEmail => "secondary_email",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "activation" => Some(Self::Activation),
            "password_reset" => Some(Self::PasswordReset),
            "secondary_email" => Some(Self::SecondaryEmail),
            _ => None,
        }
    }
}

/// Single-use token mailed to a user to confirm an account action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionToken {
    pub token: String,
    pub action: AccountAction,
    pub user_id: UserId,
    /// Action-specific data, e.g. the pending secondary email.
    pub payload: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
    pub consumed_at: Option<i64>,
}
