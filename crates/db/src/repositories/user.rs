//! User repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::user::{ActiveModel, Column, Entity, Model};
use vibecheck_common::{AppError, AppResult};

/// Repository for user operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Model>> {
        Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a user by ID or return an error.
    pub async fn get_by_id(&self, id: &str) -> AppResult<Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }

    /// Find a user by API token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<Model>> {
        Entity::find()
            .filter(Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all users without an active group.
    ///
    /// These are the "solo" users, scheduled by their personal
    /// `notification_frequency` instead of a group cadence.
    pub async fn find_solo(&self) -> AppResult<Vec<Model>> {
        Entity::find()
            .filter(Column::ActiveGroupId.is_null())
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record when a check-in prompt was last pushed to a user.
    pub async fn set_last_notified(&self, id: &str, when: DateTime<Utc>) -> AppResult<Model> {
        let user = self.get_by_id(id).await?;
        let mut active: ActiveModel = user.into();

        active.last_notified_at = Set(Some(when.into()));
        active.updated_at = Set(Some(Utc::now().into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update the user's timezone and personal prompt cadence.
    pub async fn update_notification_settings(
        &self,
        id: &str,
        timezone: Option<String>,
        notification_frequency: Option<i32>,
    ) -> AppResult<Model> {
        let user = self.get_by_id(id).await?;
        let mut active: ActiveModel = user.into();

        if let Some(timezone) = timezone {
            active.timezone = Set(timezone);
        }
        if let Some(frequency) = notification_frequency {
            active.notification_frequency = Set(frequency);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user.
    pub async fn create(&self, user: ActiveModel) -> AppResult<Model> {
        user.insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
