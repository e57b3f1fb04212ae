//! Core domain logic for Quill.
//! This crate is the single source of truth for storage, authentication
//! and account invariants; the GraphQL layer only maps its results.

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use auth::Caller;
pub use config::AuthConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbLocation};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::blog_post::{BlogPost, BlogPostId, BlogPostPatch};
pub use model::user::{User, UserId};
pub use repo::{RepoError, RepoResult};
pub use service::error::{FieldError, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
