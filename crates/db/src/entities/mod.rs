//! Database entities.

#![allow(missing_docs)]

pub mod group;
pub mod group_member;
pub mod push_subscription;
pub mod user;
