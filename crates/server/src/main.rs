//! Vibecheck server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vibecheck_api::{middleware::AppState, router as api_router};
use vibecheck_common::Config;
use vibecheck_core::services::{
    GroupService, PingService, PushService, SubscriptionService, UserService,
};
use vibecheck_db::repositories::{
    GroupMemberRepository, GroupRepository, PushSubscriptionRepository, UserRepository,
};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Run the ping pass on an in-process timer, for deployments without an
/// external cron scheduler.
fn spawn_internal_ticker(ping_service: PingService, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // The first tick completes immediately; skip it so startup does
        // not double-fire alongside an external cron.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match ping_service.run().await {
                Ok(summary) => {
                    tracing::debug!(
                        groups_processed = summary.groups_processed,
                        total_users_notified = summary.total_users_notified,
                        "Internal ping tick complete"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Internal ping tick failed");
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vibecheck=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting vibecheck server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database and run migrations
    let db = vibecheck_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    vibecheck_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let group_repo = GroupRepository::new(Arc::clone(&db));
    let member_repo = GroupMemberRepository::new(Arc::clone(&db));
    let subscription_repo = PushSubscriptionRepository::new(Arc::clone(&db));

    // Initialize services
    let push_service = PushService::new(
        subscription_repo.clone(),
        member_repo.clone(),
        config.push.clone(),
    )?;
    let user_service = UserService::new(user_repo.clone());
    let group_service = GroupService::new(
        group_repo.clone(),
        member_repo.clone(),
        push_service.clone(),
    );
    let subscription_service = SubscriptionService::new(subscription_repo.clone());
    let ping_service = PingService::new(
        group_repo,
        member_repo,
        user_repo,
        subscription_repo,
        push_service.clone(),
    );

    // Optional in-process cron
    if let Some(interval_secs) = config.cron.internal_interval_secs {
        info!(interval_secs, "Starting internal ping ticker");
        spawn_internal_ticker(ping_service.clone(), interval_secs);
    }

    let state = AppState {
        user_service,
        group_service,
        subscription_service,
        push_service,
        ping_service,
        cron_secret: config.cron.secret.clone(),
    };

    // Build the application
    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            vibecheck_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}
