//! Group repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::group::{ActiveModel, Column, Entity, Model};
use vibecheck_common::{AppError, AppResult};

/// Repository for group operations.
#[derive(Clone)]
pub struct GroupRepository {
    db: Arc<DatabaseConnection>,
}

impl GroupRepository {
    /// Create a new group repository.
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a group by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Model>> {
        Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a group by ID or return an error.
    pub async fn get_by_id(&self, id: &str) -> AppResult<Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {id} not found")))
    }

    /// Find all groups whose next ping time has arrived.
    pub async fn find_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Model>> {
        Entity::find()
            .filter(Column::NextPingTime.lte(now))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all groups that have never been scheduled.
    pub async fn find_unscheduled(&self) -> AppResult<Vec<Model>> {
        Entity::find()
            .filter(Column::NextPingTime.is_null())
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set the next ping time without touching the last ping time.
    ///
    /// Used for first-time initialization, which is persisted immediately
    /// so re-running the cron pass is idempotent.
    pub async fn set_next_ping_time(
        &self,
        id: &str,
        next: DateTime<Utc>,
    ) -> AppResult<Model> {
        let group = self.get_by_id(id).await?;
        let mut active: ActiveModel = group.into();

        active.next_ping_time = Set(Some(next.into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a completed ping and the freshly computed due time.
    pub async fn set_ping_times(
        &self,
        id: &str,
        last: DateTime<Utc>,
        next: DateTime<Utc>,
    ) -> AppResult<Model> {
        let group = self.get_by_id(id).await?;
        let mut active: ActiveModel = group.into();

        active.last_ping_time = Set(Some(last.into()));
        active.next_ping_time = Set(Some(next.into()));
        active.updated_at = Set(Some(Utc::now().into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new group.
    pub async fn create(&self, group: ActiveModel) -> AppResult<Model> {
        group
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
