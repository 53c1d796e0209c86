//! Group endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};
use vibecheck_common::AppResult;
use vibecheck_core::services::GroupSendOutcome;
use vibecheck_db::entities::group;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create the groups router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_group))
        .route("/{id}/ping", post(ping_group))
}

/// Get a group the caller belongs to.
async fn get_group(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<group::Model>> {
    let group = state.group_service.get_for_member(&user.id, &id).await?;
    Ok(ApiResponse::ok(group))
}

/// Prompt every member of the group right now. Owner only.
async fn ping_group(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<GroupSendOutcome>> {
    let outcome = state.group_service.ping_now(&user.id, &id).await?;
    Ok(ApiResponse::ok(outcome))
}
