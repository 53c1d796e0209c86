//! Group member repository.

use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::{group_member, user};
use vibecheck_common::{AppError, AppResult};

/// Repository for group membership operations.
#[derive(Clone)]
pub struct GroupMemberRepository {
    db: Arc<DatabaseConnection>,
}

impl GroupMemberRepository {
    /// Create a new group member repository.
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find all memberships of a group.
    pub async fn find_by_group(&self, group_id: &str) -> AppResult<Vec<group_member::Model>> {
        group_member::Entity::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all members of a group together with their user records.
    ///
    /// Membership rows whose user has been deleted are dropped.
    pub async fn find_members_with_users(
        &self,
        group_id: &str,
    ) -> AppResult<Vec<(group_member::Model, user::Model)>> {
        let rows = group_member::Entity::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .find_also_related(user::Entity)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(member, user)| user.map(|u| (member, u)))
            .collect())
    }

    /// Check whether a user is a member of a group.
    pub async fn is_member(&self, group_id: &str, user_id: &str) -> AppResult<bool> {
        let membership = group_member::Entity::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .filter(group_member::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(membership.is_some())
    }
}
