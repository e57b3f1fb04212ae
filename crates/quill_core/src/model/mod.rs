//! Domain model for blog posts, users and issued credentials.
//!
//! # Responsibility
//! - Define canonical data structures shared by repositories and services.
//!
//! # Invariants
//! - Every entity is identified by a server-assigned integer id.
//! - Password hashes never appear on [`user::User`]; they stay in storage.

pub mod blog_post;
pub mod token;
pub mod user;
