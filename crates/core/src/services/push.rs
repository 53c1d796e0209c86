//! Web Push delivery.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, URL_SAFE_NO_PAD,
    VapidSignatureBuilder, WebPushClient, WebPushError, WebPushMessageBuilder,
};

use vibecheck_common::{AppError, AppResult, PushConfig};
use vibecheck_db::entities::push_subscription;
use vibecheck_db::repositories::{GroupMemberRepository, PushSubscriptionRepository};

use super::{quiet_hours, schedule};

/// Default notification title.
const DEFAULT_TITLE: &str = "Vibe Check! \u{1f3af}";
/// Default notification body.
const DEFAULT_BODY: &str = "How are you feeling right now?";
/// In-app path opened when the notification is tapped.
const DEFAULT_URL: &str = "/check-in";
/// PWA icon used for both icon and badge.
const DEFAULT_ICON: &str = "/icons/icon-192x192.png";

/// Push notification payload, consumed by the service worker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    /// Notification title
    pub title: String,
    /// Notification body
    pub body: String,
    /// URL to open when clicked
    pub url: String,
    /// Icon URL
    pub icon: String,
    /// Badge URL
    pub badge: String,
}

impl PushPayload {
    /// Build a check-in prompt, using the group's custom title/body when
    /// set.
    #[must_use]
    pub fn check_in(title: Option<&str>, body: Option<&str>) -> Self {
        Self {
            title: title.unwrap_or(DEFAULT_TITLE).to_string(),
            body: body.unwrap_or(DEFAULT_BODY).to_string(),
            url: DEFAULT_URL.to_string(),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_ICON.to_string(),
        }
    }
}

impl Default for PushPayload {
    fn default() -> Self {
        Self::check_in(None, None)
    }
}

/// Minimum hours between notifications for a group member.
///
/// Half the group's expected ping interval, floored at 8 hours so a
/// high-frequency group cannot spam its members.
#[must_use]
pub fn group_min_gap_hours(frequency: i32) -> f64 {
    (schedule::expected_interval_hours(frequency) * 0.5).max(8.0)
}

/// Minimum hours between notifications for a solo user, from their
/// personal frequency setting (1 = daily .. 7 = weekly).
///
/// Daily gets an 8-hour gap rather than 24 so a late-morning cron run
/// does not push the next day's notification ever later.
#[must_use]
pub fn solo_min_gap_hours(frequency: i32) -> f64 {
    match frequency {
        2 => 48.0,
        3 => 72.0,
        7 => 168.0,
        _ => 8.0,
    }
}

/// Check whether enough time has passed since the last notification.
#[must_use]
pub fn can_notify(last_notified_at: Option<DateTime<Utc>>, min_gap_hours: f64, now: DateTime<Utc>) -> bool {
    let Some(last) = last_notified_at else {
        return true;
    };
    let hours_since = (now - last).num_milliseconds() as f64 / 3_600_000.0;
    hours_since >= min_gap_hours
}

/// Failure of a single transport attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The push service no longer knows the subscription (410/404); the
    /// stored row is stale and must be removed.
    #[error("subscription expired: {0}")]
    Expired(String),
    /// Any other delivery failure. The subscription row is kept.
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Delivery of one payload to one subscription endpoint.
///
/// Trait seam so orchestration can be exercised without a live push
/// service; production uses [`WebPushTransport`].
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver `payload` to `subscription`.
    async fn deliver(
        &self,
        subscription: &push_subscription::Model,
        payload: &PushPayload,
    ) -> Result<(), TransportError>;
}

/// Web Push transport: VAPID-signed aes128gcm messages over isahc.
pub struct WebPushTransport {
    client: IsahcWebPushClient,
    vapid_private_key: String,
    subject: String,
}

impl WebPushTransport {
    /// Create a transport from VAPID configuration.
    pub fn new(config: &PushConfig) -> AppResult<Self> {
        let client = IsahcWebPushClient::new()
            .map_err(|e| AppError::Config(format!("Failed to build push client: {e}")))?;

        Ok(Self {
            client,
            vapid_private_key: config.vapid_private_key.clone(),
            subject: config.subject.clone(),
        })
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn deliver(
        &self,
        subscription: &push_subscription::Model,
        payload: &PushPayload,
    ) -> Result<(), TransportError> {
        let info = SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );

        let body = serde_json::to_vec(payload)
            .map_err(|e| TransportError::Failed(format!("Failed to serialize payload: {e}")))?;

        let mut sig_builder =
            VapidSignatureBuilder::from_base64(&self.vapid_private_key, URL_SAFE_NO_PAD, &info)
                .map_err(|e| TransportError::Failed(format!("Invalid VAPID private key: {e}")))?;
        sig_builder.add_claim("sub", self.subject.clone());
        let signature = sig_builder
            .build()
            .map_err(|e| TransportError::Failed(format!("Failed to sign push request: {e}")))?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, &body);
        builder.set_vapid_signature(signature);
        let message = builder
            .build()
            .map_err(|e| TransportError::Failed(format!("Failed to build push message: {e}")))?;

        match self.client.send(message).await {
            Ok(()) => Ok(()),
            Err(e @ (WebPushError::EndpointNotValid | WebPushError::EndpointNotFound)) => {
                Err(TransportError::Expired(e.to_string()))
            }
            Err(e) => Err(TransportError::Failed(e.to_string())),
        }
    }
}

/// Per-user delivery stats.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendStats {
    /// Subscriptions that accepted the push.
    pub sent: usize,
    /// Subscriptions that rejected or timed out.
    pub failed: usize,
}

/// Outcome of a group-wide send.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSendOutcome {
    /// Successful deliveries.
    pub sent: usize,
    /// Failed deliveries.
    pub failed: usize,
    /// Members skipped because they are inside the quiet window.
    pub skipped_quiet_hours: usize,
}

/// Web Push delivery service.
#[derive(Clone)]
pub struct PushService {
    subscriptions: PushSubscriptionRepository,
    members: GroupMemberRepository,
    vapid_public_key: String,
    transport: Arc<dyn PushTransport>,
}

impl PushService {
    /// Create a push service with the production Web Push transport.
    pub fn new(
        subscriptions: PushSubscriptionRepository,
        members: GroupMemberRepository,
        config: PushConfig,
    ) -> AppResult<Self> {
        let transport = Arc::new(WebPushTransport::new(&config)?);
        Ok(Self::with_transport(
            subscriptions,
            members,
            config.vapid_public_key,
            transport,
        ))
    }

    /// Create a push service with a custom transport.
    #[must_use]
    pub fn with_transport(
        subscriptions: PushSubscriptionRepository,
        members: GroupMemberRepository,
        vapid_public_key: String,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            subscriptions,
            members,
            vapid_public_key,
            transport,
        }
    }

    /// VAPID public key, handed to browsers at subscription time.
    #[must_use]
    pub fn vapid_public_key(&self) -> &str {
        &self.vapid_public_key
    }

    /// Send a payload to a single subscription.
    ///
    /// A 404/410 from the push service means the browser discarded the
    /// subscription; the stale row is deleted so it is never tried again.
    pub async fn send_to_subscription(
        &self,
        subscription: &push_subscription::Model,
        payload: &PushPayload,
    ) -> AppResult<()> {
        match self.transport.deliver(subscription, payload).await {
            Ok(()) => Ok(()),
            Err(e @ TransportError::Expired(_)) => {
                tracing::info!(
                    subscription_id = %subscription.id,
                    "Subscription expired at push service, removing"
                );
                self.subscriptions
                    .delete_by_endpoint(&subscription.endpoint)
                    .await?;
                Err(AppError::Delivery(e.to_string()))
            }
            Err(e) => Err(AppError::Delivery(e.to_string())),
        }
    }

    /// Send a payload to every subscription a user holds.
    ///
    /// Individual delivery failures are logged and counted, never
    /// propagated, so one dead endpoint cannot block a user's other
    /// devices.
    pub async fn send_to_user(&self, user_id: &str, payload: &PushPayload) -> AppResult<SendStats> {
        let subscriptions = self.subscriptions.find_by_user_id(user_id).await?;

        let mut stats = SendStats::default();
        for subscription in subscriptions {
            match self.send_to_subscription(&subscription, payload).await {
                Ok(()) => stats.sent += 1,
                Err(e) => {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        user_id = %user_id,
                        error = %e,
                        "Failed to send push notification"
                    );
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Send a payload to every member of a group, honoring the group's
    /// quiet window against each member's own timezone.
    ///
    /// Used for owner-triggered manual pings; the cron path adds
    /// frequency gating and cross-group consolidation on top.
    pub async fn send_to_group(
        &self,
        group_id: &str,
        payload: &PushPayload,
        quiet_hours_start: Option<i32>,
        quiet_hours_end: Option<i32>,
        now: DateTime<Utc>,
    ) -> AppResult<GroupSendOutcome> {
        let members = self.members.find_members_with_users(group_id).await?;

        let mut outcome = GroupSendOutcome::default();

        for (_, user) in members {
            match quiet_hours::is_quiet_hours(quiet_hours_start, quiet_hours_end, &user.timezone, now) {
                Ok(true) => {
                    outcome.skipped_quiet_hours += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "Skipping user with broken timezone");
                    continue;
                }
            }

            let stats = self.send_to_user(&user.id, payload).await?;
            outcome.sent += stats.sent;
            outcome.failed += stats.failed;
        }

        tracing::debug!(
            group_id = %group_id,
            sent = outcome.sent,
            failed = outcome.failed,
            skipped_quiet_hours = outcome.skipped_quiet_hours,
            "Group push complete"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_payload_defaults() {
        let payload = PushPayload::check_in(None, None);
        assert_eq!(payload.title, "Vibe Check! \u{1f3af}");
        assert_eq!(payload.body, "How are you feeling right now?");
        assert_eq!(payload.url, "/check-in");
        assert_eq!(payload.icon, "/icons/icon-192x192.png");
        assert_eq!(payload.badge, payload.icon);
    }

    #[test]
    fn test_payload_custom_overrides() {
        let payload = PushPayload::check_in(Some("Standup time"), None);
        assert_eq!(payload.title, "Standup time");
        assert_eq!(payload.body, "How are you feeling right now?");
    }

    #[test]
    fn test_group_min_gap() {
        // Half the expected interval, floored at 8h
        assert_eq!(group_min_gap_hours(7), 12.0);
        assert_eq!(group_min_gap_hours(2), 42.0);
        assert_eq!(group_min_gap_hours(1), 84.0);
        // 168/14 * 0.5 = 6 -> floor kicks in
        assert_eq!(group_min_gap_hours(14), 8.0);
    }

    #[test]
    fn test_solo_min_gap_table() {
        assert_eq!(solo_min_gap_hours(1), 8.0);
        assert_eq!(solo_min_gap_hours(2), 48.0);
        assert_eq!(solo_min_gap_hours(3), 72.0);
        assert_eq!(solo_min_gap_hours(7), 168.0);
        // Unknown values fall back to the daily cap
        assert_eq!(solo_min_gap_hours(0), 8.0);
        assert_eq!(solo_min_gap_hours(5), 8.0);
    }

    #[test]
    fn test_can_notify() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();

        // Never notified
        assert!(can_notify(None, 8.0, now));
        // 9 hours ago, 8 hour gap
        assert!(can_notify(Some(now - Duration::hours(9)), 8.0, now));
        // Exactly at the boundary counts as allowed
        assert!(can_notify(Some(now - Duration::hours(8)), 8.0, now));
        // Too recent
        assert!(!can_notify(Some(now - Duration::hours(7)), 8.0, now));
        // Fractional gaps
        assert!(!can_notify(Some(now - Duration::minutes(30)), 1.0, now));
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let json = serde_json::to_value(PushPayload::default()).unwrap();
        assert!(json.get("title").is_some());
        assert!(json.get("badge").is_some());
        assert_eq!(json["url"], "/check-in");
    }
}
