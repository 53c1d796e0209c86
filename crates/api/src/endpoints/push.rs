//! Push subscription endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use vibecheck_common::{AppError, AppResult};
use vibecheck_core::services::RegisterSubscriptionInput;
use vibecheck_core::services::subscription::PushSubscriptionResponse;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create the push router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/key", get(vapid_key))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/subscriptions", get(list_subscriptions))
}

/// VAPID public key response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeyResponse {
    /// VAPID public key (base64 URL-safe encoded)
    pub public_key: String,
}

/// Request to unregister a push subscription.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    /// Endpoint URL to remove
    pub endpoint: Option<String>,
    /// Session whose subscriptions to remove (sign-out cleanup)
    pub session_id: Option<String>,
}

/// Hand out the VAPID public key browsers need to subscribe.
async fn vapid_key(State(state): State<AppState>) -> ApiResponse<VapidKeyResponse> {
    ApiResponse::ok(VapidKeyResponse {
        public_key: state.push_service.vapid_public_key().to_string(),
    })
}

/// Register the calling user's browser subscription.
async fn subscribe(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<RegisterSubscriptionInput>,
) -> AppResult<ApiResponse<PushSubscriptionResponse>> {
    let subscription = state.subscription_service.register(&user.id, input).await?;
    Ok(ApiResponse::ok(subscription))
}

/// Remove a subscription by endpoint, or everything a session registered.
async fn unsubscribe(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UnsubscribeRequest>,
) -> AppResult<ApiResponse<()>> {
    if let Some(endpoint) = req.endpoint {
        state.subscription_service.unregister(&user.id, &endpoint).await?;
    } else if let Some(session_id) = req.session_id {
        state.subscription_service.remove_session(&session_id).await?;
    } else {
        return Err(AppError::Validation(
            "Either endpoint or sessionId must be provided".to_string(),
        ));
    }

    Ok(ApiResponse::ok(()))
}

/// List the calling user's subscriptions.
async fn list_subscriptions(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PushSubscriptionResponse>>> {
    let subscriptions = state.subscription_service.list(&user.id).await?;
    Ok(ApiResponse::ok(subscriptions))
}
