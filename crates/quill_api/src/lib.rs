//! GraphQL and HTTP boundary over `quill_core`.
//!
//! # Responsibility
//! - Expose the blog and account use-cases as a GraphQL schema.
//! - Resolve bearer tokens into a per-request caller and guard protected fields.
//! - Map typed service errors onto GraphQL errors with stable codes.

pub mod context;
pub mod error;
pub mod guard;
pub mod schema;
pub mod service;
pub mod state;

pub use context::RequestContext;
pub use schema::{build_schema, QuillSchema};
pub use service::{router, serve, ServerConfig};
pub use state::{AppState, HashOwner, PasswordWork, SharedHasher, SharedMailer};
