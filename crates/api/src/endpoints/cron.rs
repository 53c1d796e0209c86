//! Cron trigger endpoint.

use axum::{
    Router,
    extract::State,
    http::HeaderMap,
    routing::get,
};
use vibecheck_common::{AppError, AppResult};
use vibecheck_core::services::PingSummary;

use crate::{middleware::AppState, response::ApiResponse};

/// Create the cron router.
pub fn router() -> Router<AppState> {
    // POST is accepted as well so the endpoint can be triggered manually
    Router::new().route("/ping", get(ping).post(ping))
}

/// Check the shared cron secret.
///
/// Hosted cron schedulers send `Authorization: Bearer <secret>`; the
/// `x-cron-auth-token` form is kept for older setups.
fn verify_cron_secret(headers: &HeaderMap, secret: &str) -> bool {
    if secret.is_empty() {
        tracing::error!("Cron secret not configured, rejecting trigger");
        return false;
    }

    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok())
        && auth == format!("Bearer {secret}")
    {
        return true;
    }

    if let Some(token) = headers
        .get("x-cron-auth-token")
        .and_then(|v| v.to_str().ok())
        && token == secret
    {
        return true;
    }

    false
}

/// Run one ping pass over due groups and solo users.
async fn ping(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<ApiResponse<PingSummary>> {
    if !verify_cron_secret(&headers, &state.cron_secret) {
        return Err(AppError::Unauthorized);
    }

    let summary = state.ping_service.run().await?;
    Ok(ApiResponse::ok(summary))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_accepts_bearer_header() {
        let headers = headers_with("authorization", "Bearer s3cret");
        assert!(verify_cron_secret(&headers, "s3cret"));
    }

    #[test]
    fn test_accepts_plain_token_header() {
        let headers = headers_with("x-cron-auth-token", "s3cret");
        assert!(verify_cron_secret(&headers, "s3cret"));
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let headers = headers_with("authorization", "Bearer nope");
        assert!(!verify_cron_secret(&headers, "s3cret"));

        let headers = headers_with("x-cron-auth-token", "nope");
        assert!(!verify_cron_secret(&headers, "s3cret"));
    }

    #[test]
    fn test_rejects_missing_headers() {
        assert!(!verify_cron_secret(&HeaderMap::new(), "s3cret"));
    }

    #[test]
    fn test_rejects_unconfigured_secret() {
        let headers = headers_with("authorization", "Bearer ");
        assert!(!verify_cron_secret(&headers, ""));
    }
}
