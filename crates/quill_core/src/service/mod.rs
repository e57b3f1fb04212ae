//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the GraphQL layer decoupled from storage details.

pub mod account_service;
pub mod auth_service;
pub mod error;
pub mod mail;
pub mod post_service;
pub mod user_service;
