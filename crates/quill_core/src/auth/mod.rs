//! Credential primitives: caller identity, password hashing and token minting.
//!
//! # Invariants
//! - Raw passwords and tokens are never logged above `debug`.

pub mod password;
pub mod token;

use crate::model::user::{User, UserId};

/// Authenticated identity attached to one request.
///
/// Produced only by resolving a live access token; services that need an
/// authenticated user take `&Caller`, so they cannot be reached without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub username: String,
}

impl Caller {
    /// True when `owner` is this caller.
    pub fn owns(&self, owner: UserId) -> bool {
        self.user_id == owner
    }
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}
