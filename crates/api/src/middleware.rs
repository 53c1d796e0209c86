//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use vibecheck_core::services::{
    GroupService, PingService, PushService, SubscriptionService, UserService,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub group_service: GroupService,
    pub subscription_service: SubscriptionService,
    pub push_service: PushService,
    pub ping_service: PingService,
    /// Shared secret for the cron trigger endpoint.
    pub cron_secret: String,
}

/// Authentication middleware.
///
/// Resolves a `Bearer` token to its user and stashes the user model in
/// request extensions for the [`crate::extractors::AuthUser`] extractor.
/// Requests without a valid token pass through unauthenticated; each
/// handler decides whether auth is required.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Ok(user) = state.user_service.authenticate_by_token(token).await
    {
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}
