//! HTTP API layer for vibecheck.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: cron trigger, push subscription management, settings
//! - **Extractors**: Authentication
//! - **Middleware**: Token auth
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
