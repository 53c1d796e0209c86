//! Common utilities and shared types for vibecheck.
//!
//! This crate provides foundational components used across all vibecheck
//! crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`generate_id`]

pub mod config;
pub mod error;
pub mod id;

pub use config::{Config, CronConfig, DatabaseConfig, PushConfig, ServerConfig};
pub use error::{AppError, AppResult};
pub use id::generate_id;
