//! API endpoints.

mod cron;
mod groups;
mod push;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/cron", cron::router())
        .nest("/push", push::router())
        .nest("/groups", groups::router())
        .nest("/i", users::router())
}
