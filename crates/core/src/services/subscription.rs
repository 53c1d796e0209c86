//! Push subscription management.

use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use vibecheck_common::{AppError, AppResult, generate_id};
use vibecheck_db::entities::push_subscription;
use vibecheck_db::repositories::PushSubscriptionRepository;

/// Key material from the browser's `PushSubscription.toJSON()`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionKeys {
    /// P256DH public key (base64 URL-safe encoded)
    pub p256dh: String,
    /// Auth secret (base64 URL-safe encoded)
    pub auth: String,
}

/// Input for registering a push subscription.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSubscriptionInput {
    /// Push service endpoint URL
    #[validate(url(message = "endpoint must be a valid URL"))]
    pub endpoint: String,
    /// Encryption keys
    pub keys: SubscriptionKeys,
    /// Browser session that registered the subscription, used to clean
    /// up on sign-out
    pub session_id: Option<String>,
}

/// Push subscription response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscriptionResponse {
    /// Subscription ID
    pub id: String,
    /// Endpoint URL (masked down to its host)
    pub endpoint: String,
    /// Session that registered it
    pub session_id: Option<String>,
    /// Created timestamp
    pub created_at: String,
}

/// Manages push subscription lifecycle.
#[derive(Clone)]
pub struct SubscriptionService {
    subscriptions: PushSubscriptionRepository,
}

impl SubscriptionService {
    /// Create a new subscription service.
    #[must_use]
    pub fn new(subscriptions: PushSubscriptionRepository) -> Self {
        Self { subscriptions }
    }

    /// Register a subscription for a user.
    ///
    /// The endpoint is the identity: re-registering an endpoint (same
    /// browser, new keys, or a device handed to another account) replaces
    /// the existing row instead of accumulating duplicates.
    pub async fn register(
        &self,
        user_id: &str,
        input: RegisterSubscriptionInput,
    ) -> AppResult<PushSubscriptionResponse> {
        input.validate()?;

        let now = Utc::now();
        let subscription = push_subscription::ActiveModel {
            id: Set(generate_id()),
            user_id: Set(user_id.to_string()),
            session_id: Set(input.session_id),
            endpoint: Set(input.endpoint),
            auth: Set(input.keys.auth),
            p256dh: Set(input.keys.p256dh),
            created_at: Set(now.into()),
            updated_at: Set(Some(now.into())),
        };

        let stored = self.subscriptions.upsert_by_endpoint(subscription).await?;
        Ok(to_response(stored))
    }

    /// Remove a subscription by endpoint. Only the owner may remove it.
    pub async fn unregister(&self, user_id: &str, endpoint: &str) -> AppResult<()> {
        let Some(subscription) = self.subscriptions.find_by_endpoint(endpoint).await? else {
            return Err(AppError::NotFound("Subscription not found".to_string()));
        };

        if subscription.user_id != user_id {
            return Err(AppError::Forbidden(
                "You don't own this subscription".to_string(),
            ));
        }

        self.subscriptions.delete(&subscription.id).await
    }

    /// Remove every subscription a session registered. Called on
    /// sign-out.
    pub async fn remove_session(&self, session_id: &str) -> AppResult<u64> {
        self.subscriptions.delete_by_session(session_id).await
    }

    /// List a user's subscriptions.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<PushSubscriptionResponse>> {
        let subscriptions = self.subscriptions.find_by_user_id(user_id).await?;
        Ok(subscriptions.into_iter().map(to_response).collect())
    }
}

/// Convert a model to a response, masking the endpoint down to its host
/// so the capability URL never leaves the server.
fn to_response(model: push_subscription::Model) -> PushSubscriptionResponse {
    let masked_endpoint = url::Url::parse(&model.endpoint)
        .ok()
        .and_then(|u| u.host_str().map(|h| format!("https://{h}/***/")))
        .unwrap_or_else(|| "***".to_string());

    PushSubscriptionResponse {
        id: model.id,
        endpoint: masked_endpoint,
        session_id: model.session_id,
        created_at: model.created_at.to_rfc3339(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_input_rejects_bad_endpoint() {
        let input = RegisterSubscriptionInput {
            endpoint: "not a url".to_string(),
            keys: SubscriptionKeys {
                p256dh: "key".to_string(),
                auth: "secret".to_string(),
            },
            session_id: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_register_input_deserializes_browser_shape() {
        let json = serde_json::json!({
            "endpoint": "https://fcm.googleapis.com/fcm/send/abc123",
            "keys": { "p256dh": "BPk...", "auth": "16bytes" },
            "sessionId": "sess_1"
        });
        let input: RegisterSubscriptionInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.session_id.as_deref(), Some("sess_1"));
        assert!(input.validate().is_ok());
    }
}
