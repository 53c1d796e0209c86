//! Core business logic for vibecheck.
//!
//! Houses the scheduling engine (quiet hours, ping intervals), Web Push
//! delivery, and the cron orchestration that ties them together.

pub mod retry;
pub mod services;

pub use vibecheck_common::generate_id;
