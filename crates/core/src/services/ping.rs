//! Cron ping orchestration.
//!
//! One `run` corresponds to one cron tick: initialize never-scheduled
//! groups, prompt every group whose due time has arrived, then sweep
//! solo users. A user is notified at most once per run no matter how
//! many due groups they belong to.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use vibecheck_common::AppResult;
use vibecheck_db::entities::{group, user};
use vibecheck_db::repositories::{
    GroupMemberRepository, GroupRepository, PushSubscriptionRepository, UserRepository,
};

use super::push::{self, PushPayload, PushService};
use super::{quiet_hours, schedule};
use crate::retry::{RetryConfig, retry_with_backoff};

/// Per-group outcome of a cron run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPingResult {
    /// Group ID
    pub group_id: String,
    /// Group name
    pub group_name: String,
    /// Members considered.
    pub users_eligible: usize,
    /// Members who received at least one push.
    pub users_notified: usize,
    /// Members skipped by the frequency gate.
    pub users_skipped_recent_notification: usize,
    /// Members skipped by quiet hours.
    pub users_skipped_quiet_hours: usize,
    /// When the group is next due.
    pub next_ping_time: DateTime<Utc>,
}

/// Outcome of a full cron run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingSummary {
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Due groups processed.
    pub groups_processed: usize,
    /// Groups that received their first schedule.
    pub groups_initialized: usize,
    /// Distinct users notified across groups and the solo sweep.
    pub total_users_notified: usize,
    /// Solo users considered.
    pub solo_users_eligible: usize,
    /// Solo users notified.
    pub solo_users_notified: usize,
    /// Solo users skipped by their personal frequency gate.
    pub solo_users_skipped_recent_notification: usize,
    /// Per-group details.
    pub results: Vec<GroupPingResult>,
}

/// How a single solo user fared during the sweep.
enum SoloOutcome {
    /// No push subscriptions; not counted as eligible.
    NoSubscriptions,
    /// Already prompted by a group earlier in this run.
    AlreadyNotified,
    /// Inside their personal frequency gate.
    SkippedRecent,
    /// At least one device accepted the push.
    Notified,
    /// Every device rejected the push.
    NotDelivered,
}

/// Orchestrates a cron ping pass over groups and solo users.
#[derive(Clone)]
pub struct PingService {
    groups: GroupRepository,
    members: GroupMemberRepository,
    users: UserRepository,
    subscriptions: PushSubscriptionRepository,
    push: PushService,
    retry: RetryConfig,
}

impl PingService {
    /// Create a new ping service.
    #[must_use]
    pub fn new(
        groups: GroupRepository,
        members: GroupMemberRepository,
        users: UserRepository,
        subscriptions: PushSubscriptionRepository,
        push: PushService,
    ) -> Self {
        Self {
            groups,
            members,
            users,
            subscriptions,
            push,
            retry: RetryConfig::default(),
        }
    }

    /// Execute one cron tick at the current instant.
    pub async fn run(&self) -> AppResult<PingSummary> {
        self.run_at(Utc::now()).await
    }

    /// Execute one cron tick, evaluating every gate against `now`.
    ///
    /// The initial group queries are retried on transient database
    /// failure; after that, each group and each solo user is processed
    /// independently so one broken record cannot starve the rest of the
    /// run.
    pub async fn run_at(&self, now: DateTime<Utc>) -> AppResult<PingSummary> {
        tracing::info!(%now, "Starting cron ping run");

        let due_groups = retry_with_backoff(&self.retry, "find_due_groups", || {
            self.groups.find_due(now)
        })
        .await?;

        let unscheduled = retry_with_backoff(&self.retry, "find_unscheduled_groups", || {
            self.groups.find_unscheduled()
        })
        .await?;

        tracing::info!(
            due = due_groups.len(),
            unscheduled = unscheduled.len(),
            "Cron ping workload"
        );

        let groups_initialized = self.initialize_groups(&unscheduled, now).await;

        let mut notified_user_ids: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(due_groups.len());

        for group in &due_groups {
            match self.process_group(group, now, &mut notified_user_ids).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(group_id = %group.id, error = %e, "Failed to process group");
                }
            }
        }

        let (solo_eligible, solo_notified, solo_skipped) =
            self.process_solo_users(now, &mut notified_user_ids).await?;

        let summary = PingSummary {
            timestamp: now,
            groups_processed: due_groups.len(),
            groups_initialized,
            total_users_notified: notified_user_ids.len(),
            solo_users_eligible: solo_eligible,
            solo_users_notified: solo_notified,
            solo_users_skipped_recent_notification: solo_skipped,
            results,
        };

        tracing::info!(
            groups_processed = summary.groups_processed,
            groups_initialized = summary.groups_initialized,
            total_users_notified = summary.total_users_notified,
            "Cron ping run complete"
        );

        Ok(summary)
    }

    /// Give never-scheduled groups a first due time, persisted
    /// immediately so a crash mid-run loses nothing.
    async fn initialize_groups(&self, unscheduled: &[group::Model], now: DateTime<Utc>) -> usize {
        let mut initialized = 0;

        for group in unscheduled {
            let next = schedule::initialize_ping_for_group(group, now, &mut rand::thread_rng());

            match self.groups.set_next_ping_time(&group.id, next).await {
                Ok(_) => {
                    tracing::info!(group_id = %group.id, %next, "Initialized group schedule");
                    initialized += 1;
                }
                Err(e) => {
                    tracing::error!(group_id = %group.id, error = %e, "Failed to initialize group");
                }
            }
        }

        initialized
    }

    /// Prompt one due group and reschedule it.
    ///
    /// The next due time is computed from `now`, not from the stored due
    /// time, so a stalled cron does not cause a burst of catch-up pings.
    async fn process_group(
        &self,
        group: &group::Model,
        now: DateTime<Utc>,
        notified_user_ids: &mut HashSet<String>,
    ) -> AppResult<GroupPingResult> {
        let payload = PushPayload::check_in(
            group.notification_title.as_deref(),
            group.notification_body.as_deref(),
        );
        let min_gap_hours = push::group_min_gap_hours(group.frequency);

        let members = self.members.find_members_with_users(&group.id).await?;

        let mut users_eligible = 0;
        let mut users_notified = 0;
        let mut users_skipped_recent = 0;
        let mut users_skipped_quiet = 0;

        for (_, user) in &members {
            users_eligible += 1;

            // Consolidation: at most one prompt per user per run
            if notified_user_ids.contains(&user.id) {
                continue;
            }

            if !push::can_notify(user.last_notified_at.map(Into::into), min_gap_hours, now) {
                users_skipped_recent += 1;
                continue;
            }

            match quiet_hours::is_quiet_hours(
                group.quiet_hours_start,
                group.quiet_hours_end,
                &user.timezone,
                now,
            ) {
                Ok(true) => {
                    users_skipped_quiet += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "Skipping user with broken timezone");
                    continue;
                }
            }

            let stats = self.push.send_to_user(&user.id, &payload).await?;
            if stats.sent > 0 {
                users_notified += 1;
                notified_user_ids.insert(user.id.clone());
                self.users.set_last_notified(&user.id, now).await?;
            }
        }

        let next_ping_time = schedule::next_ping_for_group(group, now, &mut rand::thread_rng());
        self.groups.set_ping_times(&group.id, now, next_ping_time).await?;

        tracing::info!(
            group_id = %group.id,
            group_name = %group.name,
            users_eligible,
            users_notified,
            users_skipped_recent,
            users_skipped_quiet,
            %next_ping_time,
            "Pinged group"
        );

        Ok(GroupPingResult {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            users_eligible,
            users_notified,
            users_skipped_recent_notification: users_skipped_recent,
            users_skipped_quiet_hours: users_skipped_quiet,
            next_ping_time,
        })
    }

    /// Sweep users who have push subscriptions but no active group,
    /// gated by their personal notification frequency.
    ///
    /// Mirrors the per-group isolation: a database failure while handling
    /// one solo user is logged and the sweep moves on to the next.
    async fn process_solo_users(
        &self,
        now: DateTime<Utc>,
        notified_user_ids: &mut HashSet<String>,
    ) -> AppResult<(usize, usize, usize)> {
        let solo_users = retry_with_backoff(&self.retry, "find_solo_users", || {
            self.users.find_solo()
        })
        .await?;

        let payload = PushPayload::default();

        let mut eligible = 0;
        let mut notified = 0;
        let mut skipped_recent = 0;

        for user in &solo_users {
            match self
                .process_solo_user(user, now, notified_user_ids, &payload)
                .await
            {
                Ok(SoloOutcome::NoSubscriptions) => {}
                Ok(SoloOutcome::AlreadyNotified | SoloOutcome::NotDelivered) => eligible += 1,
                Ok(SoloOutcome::SkippedRecent) => {
                    eligible += 1;
                    skipped_recent += 1;
                }
                Ok(SoloOutcome::Notified) => {
                    eligible += 1;
                    notified += 1;
                }
                Err(e) => {
                    tracing::error!(user_id = %user.id, error = %e, "Failed to process solo user");
                }
            }
        }

        tracing::info!(eligible, notified, skipped_recent, "Solo user sweep complete");

        Ok((eligible, notified, skipped_recent))
    }

    /// Sweep one solo user through the consolidation, recency, and
    /// delivery gates.
    async fn process_solo_user(
        &self,
        user: &user::Model,
        now: DateTime<Utc>,
        notified_user_ids: &mut HashSet<String>,
        payload: &PushPayload,
    ) -> AppResult<SoloOutcome> {
        let subscriptions = self.subscriptions.find_by_user_id(&user.id).await?;
        if subscriptions.is_empty() {
            return Ok(SoloOutcome::NoSubscriptions);
        }

        if notified_user_ids.contains(&user.id) {
            return Ok(SoloOutcome::AlreadyNotified);
        }

        let min_gap = push::solo_min_gap_hours(user.notification_frequency);
        if !push::can_notify(user.last_notified_at.map(Into::into), min_gap, now) {
            return Ok(SoloOutcome::SkippedRecent);
        }

        if !self.notify_solo_user(user, &subscriptions, payload).await {
            return Ok(SoloOutcome::NotDelivered);
        }

        notified_user_ids.insert(user.id.clone());
        self.users.set_last_notified(&user.id, now).await?;
        Ok(SoloOutcome::Notified)
    }

    async fn notify_solo_user(
        &self,
        user: &user::Model,
        subscriptions: &[vibecheck_db::entities::push_subscription::Model],
        payload: &PushPayload,
    ) -> bool {
        let mut sent_any = false;

        for subscription in subscriptions {
            match self.push.send_to_subscription(subscription, payload).await {
                Ok(()) => sent_any = true,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user.id,
                        subscription_id = %subscription.id,
                        error = %e,
                        "Failed to notify solo user"
                    );
                }
            }
        }

        sent_any
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase};

    use vibecheck_db::entities::group::IntervalMode;
    use vibecheck_db::entities::{group_member, push_subscription};

    use crate::services::push::{PushTransport, TransportError};

    /// Transport that records every delivery and always succeeds.
    #[derive(Default)]
    struct RecordingTransport {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushTransport for RecordingTransport {
        async fn deliver(
            &self,
            subscription: &push_subscription::Model,
            _payload: &PushPayload,
        ) -> Result<(), TransportError> {
            self.delivered
                .lock()
                .unwrap()
                .push(subscription.endpoint.clone());
            Ok(())
        }
    }

    fn ts(hour: u32) -> chrono::DateTime<chrono::FixedOffset> {
        Utc.with_ymd_and_hms(2024, 6, 11, hour, 0, 0).unwrap().into()
    }

    fn test_user(id: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            name: None,
            token: None,
            timezone: "UTC".to_string(),
            last_notified_at: None,
            notification_frequency: 1,
            active_group_id: None,
            created_at: ts(0),
            updated_at: None,
        }
    }

    fn test_group(id: &str, owner_id: &str) -> group::Model {
        group::Model {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            name: format!("Group {id}"),
            frequency: 3,
            interval_mode: IntervalMode::Fixed,
            schedule_days: None,
            schedule_times: None,
            quiet_hours_start: None,
            quiet_hours_end: None,
            notification_title: None,
            notification_body: None,
            owner_timezone: "UTC".to_string(),
            last_ping_time: None,
            next_ping_time: Some(ts(9)),
            created_at: ts(0),
            updated_at: None,
        }
    }

    fn membership(id: &str, user_id: &str, group_id: &str) -> group_member::Model {
        group_member::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
            created_at: ts(0),
        }
    }

    fn test_subscription(id: &str, user_id: &str) -> push_subscription::Model {
        push_subscription::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            session_id: None,
            endpoint: format!("https://push.example/{id}"),
            auth: "auth".to_string(),
            p256dh: "p256dh".to_string(),
            created_at: ts(0),
            updated_at: None,
        }
    }

    fn service_over(
        db: sea_orm::DatabaseConnection,
        transport: Arc<RecordingTransport>,
    ) -> PingService {
        let db = Arc::new(db);
        let subscriptions = PushSubscriptionRepository::new(Arc::clone(&db));
        let members = GroupMemberRepository::new(Arc::clone(&db));
        let push = PushService::with_transport(
            subscriptions.clone(),
            members.clone(),
            "vapid-public".to_string(),
            transport,
        );
        PingService::new(
            GroupRepository::new(Arc::clone(&db)),
            members,
            UserRepository::new(Arc::clone(&db)),
            subscriptions,
            push,
        )
    }

    #[tokio::test]
    async fn test_user_in_two_due_groups_is_notified_once() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let alice = test_user("u_alice");
        let group_one = test_group("g_one", "u_alice");
        let group_two = test_group("g_two", "u_alice");
        let sub = test_subscription("s_alice", "u_alice");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // Due groups, then unscheduled groups
            .append_query_results([vec![group_one.clone(), group_two.clone()], Vec::new()])
            // First group: members, subscriptions, last-notified
            // read + update, reschedule read + update
            .append_query_results([vec![(
                membership("m_one", "u_alice", "g_one"),
                alice.clone(),
            )]])
            .append_query_results([vec![sub.clone()]])
            .append_query_results([vec![alice.clone()], vec![alice.clone()]])
            .append_query_results([vec![group_one.clone()], vec![group_one.clone()]])
            // Second group: members, then straight to reschedule
            .append_query_results([vec![(
                membership("m_two", "u_alice", "g_two"),
                alice.clone(),
            )]])
            .append_query_results([vec![group_two.clone()], vec![group_two.clone()]])
            // Solo sweep finds nobody
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let transport = Arc::new(RecordingTransport::default());
        let service = service_over(db, Arc::clone(&transport));

        let summary = service.run_at(now).await.unwrap();

        assert_eq!(summary.groups_processed, 2);
        assert_eq!(summary.total_users_notified, 1);
        assert_eq!(summary.results[0].users_notified, 1);
        // The second group still counts the member as eligible, but the
        // earlier push suppresses a second one; the recency counter stays
        // at zero, so the suppression came first
        assert_eq!(summary.results[1].users_eligible, 1);
        assert_eq!(summary.results[1].users_notified, 0);
        assert_eq!(summary.results[1].users_skipped_recent_notification, 0);

        // Fixed mode, frequency 3: Tue 10:00 rolls to Wed 09:00
        let expected_next = Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap();
        assert_eq!(summary.results[0].next_ping_time, expected_next);

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(*delivered, [sub.endpoint.clone()]);
    }

    #[tokio::test]
    async fn test_solo_sweep_survives_per_user_database_failure() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let gone = test_user("u_gone");
        let healthy = test_user("u_healthy");
        let sub_gone = test_subscription("s_gone", "u_gone");
        let sub_healthy = test_subscription("s_healthy", "u_healthy");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // No due groups, none unscheduled
            .append_query_results([Vec::<group::Model>::new(), Vec::new()])
            .append_query_results([vec![gone.clone(), healthy.clone()]])
            // First user is pushed, but their row vanishes before the
            // last-notified write lands
            .append_query_results([vec![sub_gone.clone()]])
            .append_query_results([Vec::<user::Model>::new()])
            // Second user proceeds normally
            .append_query_results([vec![sub_healthy.clone()]])
            .append_query_results([vec![healthy.clone()], vec![healthy.clone()]])
            .into_connection();

        let transport = Arc::new(RecordingTransport::default());
        let service = service_over(db, Arc::clone(&transport));

        let summary = service.run_at(now).await.unwrap();

        // The failed user is dropped from the tallies, the rest of the
        // sweep still runs
        assert_eq!(summary.solo_users_eligible, 1);
        assert_eq!(summary.solo_users_notified, 1);

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(
            *delivered,
            [sub_gone.endpoint.clone(), sub_healthy.endpoint.clone()]
        );
    }

    #[tokio::test]
    async fn test_solo_user_inside_frequency_gate_is_skipped() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let mut recent = test_user("u_recent");
        recent.notification_frequency = 2;
        recent.last_notified_at = Some(ts(4)); // 6h ago, gate is 48h
        let sub = test_subscription("s_recent", "u_recent");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<group::Model>::new(), Vec::new()])
            .append_query_results([vec![recent.clone()]])
            .append_query_results([vec![sub]])
            .into_connection();

        let transport = Arc::new(RecordingTransport::default());
        let service = service_over(db, Arc::clone(&transport));

        let summary = service.run_at(now).await.unwrap();

        assert_eq!(summary.solo_users_eligible, 1);
        assert_eq!(summary.solo_users_notified, 0);
        assert_eq!(summary.solo_users_skipped_recent_notification, 1);
        assert!(transport.delivered.lock().unwrap().is_empty());
    }
}
