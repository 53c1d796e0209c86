//! Push subscription repository.

use std::sync::Arc;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

use crate::entities::push_subscription::{ActiveModel, Column, Entity, Model};
use vibecheck_common::{AppError, AppResult};

/// Repository for push subscription operations.
#[derive(Clone)]
pub struct PushSubscriptionRepository {
    db: Arc<DatabaseConnection>,
}

impl PushSubscriptionRepository {
    /// Create a new push subscription repository.
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a push subscription by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Model>> {
        Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a push subscription by endpoint URL.
    pub async fn find_by_endpoint(&self, endpoint: &str) -> AppResult<Option<Model>> {
        Entity::find()
            .filter(Column::Endpoint.eq(endpoint))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all subscriptions for a user.
    pub async fn find_by_user_id(&self, user_id: &str) -> AppResult<Vec<Model>> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a subscription, or replace an existing row with the same
    /// endpoint.
    ///
    /// The endpoint is the unique key, so concurrent re-registrations of
    /// the same browser subscription collapse into a single row holding
    /// the latest key material and owner.
    pub async fn upsert_by_endpoint(&self, subscription: ActiveModel) -> AppResult<Model> {
        Entity::insert(subscription)
            .on_conflict(
                OnConflict::column(Column::Endpoint)
                    .update_columns([
                        Column::UserId,
                        Column::SessionId,
                        Column::Auth,
                        Column::P256dh,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a push subscription by ID.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a push subscription by endpoint URL.
    pub async fn delete_by_endpoint(&self, endpoint: &str) -> AppResult<u64> {
        let result = Entity::delete_many()
            .filter(Column::Endpoint.eq(endpoint))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Delete all subscriptions registered by a session.
    pub async fn delete_by_session(&self, session_id: &str) -> AppResult<u64> {
        let result = Entity::delete_many()
            .filter(Column::SessionId.eq(session_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Delete all subscriptions for a user.
    pub async fn delete_by_user(&self, user_id: &str) -> AppResult<u64> {
        let result = Entity::delete_many()
            .filter(Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, Set};

    fn stored_row() -> Model {
        Model {
            id: "sub_one".to_string(),
            user_id: "user_two".to_string(),
            session_id: None,
            endpoint: "https://push.example/endpoint-1".to_string(),
            auth: "auth-new".to_string(),
            p256dh: "p256dh-new".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap().into(),
            updated_at: Some(Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap().into()),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_row_on_endpoint_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_row()]])
            .into_connection();
        let db = Arc::new(db);
        let repo = PushSubscriptionRepository::new(Arc::clone(&db));

        // Re-registration of an endpoint that already has a row: new
        // owner and fresh key material
        let incoming = ActiveModel {
            id: Set("sub_two".to_string()),
            user_id: Set("user_two".to_string()),
            session_id: Set(None),
            endpoint: Set("https://push.example/endpoint-1".to_string()),
            auth: Set("auth-new".to_string()),
            p256dh: Set("p256dh-new".to_string()),
            created_at: Set(Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap().into()),
            updated_at: Set(Some(Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap().into())),
        };

        let returned = repo.upsert_by_endpoint(incoming).await.unwrap();
        // The surviving row keeps its original primary key: the conflict
        // handler updated in place instead of inserting
        assert_eq!(returned.id, "sub_one");
        assert_eq!(returned.auth, "auth-new");
        assert_eq!(returned.p256dh, "p256dh-new");

        drop(repo);
        let db = Arc::try_unwrap(db).unwrap();
        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);

        let statement = format!("{:?}", log[0]);
        assert!(statement.contains("ON CONFLICT"), "{statement}");
        assert!(statement.contains("DO UPDATE SET"), "{statement}");
        // Ownership and key material follow the incoming registration
        for column in ["user_id", "session_id", "auth", "p256dh", "updated_at"] {
            assert!(
                statement.contains(&format!("{column}\\\" = \\\"excluded")),
                "{column} not updated on conflict: {statement}"
            );
        }
        // The original registration time is kept
        assert!(
            !statement.contains("created_at\\\" = \\\"excluded"),
            "{statement}"
        );
    }
}
