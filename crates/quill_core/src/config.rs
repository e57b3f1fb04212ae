//! Authentication policy knobs shared by the auth and account services.
//!
//! # Invariants
//! - `AuthConfig::default()` matches the documented production defaults.

use std::time::Duration;

pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_ACTIVATION_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_PASSWORD_RESET_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_SECONDARY_EMAIL_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub activation_token_ttl: Duration,
    pub password_reset_token_ttl: Duration,
    pub secondary_email_token_ttl: Duration,
    /// Unverified accounts may obtain tokens when set.
    pub allow_login_not_verified: bool,
    pub min_password_length: usize,
    /// bcrypt work factor; `bcrypt::DEFAULT_COST` in production.
    pub password_hash_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            activation_token_ttl: DEFAULT_ACTIVATION_TOKEN_TTL,
            password_reset_token_ttl: DEFAULT_PASSWORD_RESET_TOKEN_TTL,
            secondary_email_token_ttl: DEFAULT_SECONDARY_EMAIL_TOKEN_TTL,
            allow_login_not_verified: true,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            password_hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}
