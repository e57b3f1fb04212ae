//! User account model.

use serde::{Deserialize, Serialize};

/// Server-assigned user identifier.
pub type UserId = i64;

/// Public projection of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Deactivated accounts cannot log in.
    pub is_active: bool,
    /// Set once the activation token mailed at registration is consumed.
    pub verified: bool,
    /// Archived accounts are unarchived by their next successful `tokenAuth`.
    pub archived: bool,
    pub secondary_email: Option<String>,
    /// Unix epoch milliseconds.
    pub date_joined: i64,
    /// Unix epoch milliseconds of the last successful login.
    pub last_login: Option<i64>,
}

impl User {
    /// Whether the account may currently hold working credentials.
    pub fn can_authenticate(&self) -> bool {
        self.is_active && !self.archived
    }
}

/// Input for inserting a new account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Profile fields editable by `updateAccount`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
