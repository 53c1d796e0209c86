//! Group operations.

use chrono::Utc;

use vibecheck_common::{AppError, AppResult};
use vibecheck_db::entities::group;
use vibecheck_db::repositories::{GroupMemberRepository, GroupRepository};

use super::push::{GroupSendOutcome, PushPayload, PushService};

/// Group operations exposed to the API layer.
#[derive(Clone)]
pub struct GroupService {
    groups: GroupRepository,
    members: GroupMemberRepository,
    push: PushService,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub fn new(
        groups: GroupRepository,
        members: GroupMemberRepository,
        push: PushService,
    ) -> Self {
        Self {
            groups,
            members,
            push,
        }
    }

    /// Get a group, verifying the requester is a member.
    pub async fn get_for_member(&self, user_id: &str, group_id: &str) -> AppResult<group::Model> {
        let group = self.groups.get_by_id(group_id).await?;

        if group.owner_id != user_id && !self.members.is_member(group_id, user_id).await? {
            return Err(AppError::Forbidden(
                "You are not a member of this group".to_string(),
            ));
        }

        Ok(group)
    }

    /// Immediately prompt every member of a group, bypassing the
    /// schedule but not quiet hours. Owner only.
    ///
    /// The stored schedule is left untouched; a manual ping is extra,
    /// not a replacement for the next automatic one.
    pub async fn ping_now(&self, user_id: &str, group_id: &str) -> AppResult<GroupSendOutcome> {
        let group = self.groups.get_by_id(group_id).await?;

        if group.owner_id != user_id {
            return Err(AppError::Forbidden(
                "Only the group owner can trigger a ping".to_string(),
            ));
        }

        let payload = PushPayload::check_in(
            group.notification_title.as_deref(),
            group.notification_body.as_deref(),
        );

        let outcome = self
            .push
            .send_to_group(
                &group.id,
                &payload,
                group.quiet_hours_start,
                group.quiet_hours_end,
                Utc::now(),
            )
            .await?;

        tracing::info!(
            group_id = %group.id,
            sent = outcome.sent,
            failed = outcome.failed,
            "Manual group ping"
        );

        Ok(outcome)
    }
}
