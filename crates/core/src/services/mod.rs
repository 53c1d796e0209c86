//! Business logic services.

pub mod group;
pub mod ping;
pub mod push;
pub mod quiet_hours;
pub mod schedule;
pub mod subscription;
pub mod user;

pub use group::GroupService;
pub use ping::{GroupPingResult, PingService, PingSummary};
pub use push::{GroupSendOutcome, PushPayload, PushService, PushTransport, SendStats};
pub use quiet_hours::is_quiet_hours;
pub use subscription::{RegisterSubscriptionInput, SubscriptionService};
pub use user::{UpdateNotificationSettingsInput, UserService};
