//! User settings endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use vibecheck_common::AppResult;
use vibecheck_core::services::UpdateNotificationSettingsInput;
use vibecheck_core::services::user::NotificationSettingsResponse;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create the user settings router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/notification-settings",
        get(get_settings).post(update_settings),
    )
}

/// Get the calling user's notification settings.
async fn get_settings(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<NotificationSettingsResponse>> {
    let settings = state.user_service.notification_settings(&user.id).await?;
    Ok(ApiResponse::ok(settings))
}

/// Update the calling user's timezone and prompt cadence.
async fn update_settings(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpdateNotificationSettingsInput>,
) -> AppResult<ApiResponse<NotificationSettingsResponse>> {
    let settings = state
        .user_service
        .update_notification_settings(&user.id, input)
        .await?;
    Ok(ApiResponse::ok(settings))
}
