//! Database repositories.

#![allow(missing_docs)]

mod group;
mod group_member;
mod push_subscription;
mod user;

pub use group::GroupRepository;
pub use group_member::GroupMemberRepository;
pub use push_subscription::PushSubscriptionRepository;
pub use user::UserRepository;
