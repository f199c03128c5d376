//! Worklane webhook delivery service.
//!
//! Hosts the webhook management API and the background delivery worker:
//! event fan-out, signed dispatch, exponential-backoff retries, and
//! delivery history.

mod config;
mod logging;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use config::Config;
use worklane_db::{run_migrations, DbPool};
use worklane_webhooks::{webhooks_router, DeliveryService, DispatchQueue, WebhookWorker, WebhooksState};

#[tokio::main]
async fn main() {
    // Load configuration (fail-fast on missing required values)
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.log_filter, config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_addr = %config.bind_addr,
        worker_concurrency = config.worker_concurrency,
        "Starting webhook delivery service"
    );

    // Create database connection pool
    let db = match DbPool::connect_with(&config.database_url, 10, Duration::from_secs(5)).await {
        Ok(db) => {
            info!("Database connection established");
            db
        }
        Err(e) => {
            eprintln!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_migrations(&db).await {
        eprintln!("Failed to run database migrations: {e}");
        std::process::exit(1);
    }
    info!("Database migrations applied");

    // Dispatch queue connects the API (producer) to the worker (consumer)
    let (queue, receiver) = DispatchQueue::new(config.queue_capacity);

    let delivery_service = match DeliveryService::new(db.inner().clone()) {
        Ok(service) => service
            .with_retry_policy(config.initial_retry_delay_secs, config.backoff_factor),
        Err(e) => {
            eprintln!("Failed to create delivery service: {e}");
            std::process::exit(1);
        }
    };

    // Start the background delivery worker
    let shutdown_token = CancellationToken::new();
    let worker = WebhookWorker::new(delivery_service, receiver, shutdown_token.clone())
        .with_config(config.worker_config());
    let worker_handle = tokio::spawn(worker.run());

    let state = WebhooksState::new(db.inner().clone(), queue, config.allow_http);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(db.clone())
        .merge(webhooks_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}: {e}", config.bind_addr);
            std::process::exit(1);
        }
    };

    info!(addr = %config.bind_addr, "Listening for requests");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }

    // Stop the worker and let in-flight deliveries finish
    info!("Shutting down delivery worker");
    shutdown_token.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Worker task panicked during shutdown");
    }

    info!("Shutdown complete");
}

/// Liveness/readiness probe: verifies the database is reachable.
async fn health_handler(
    State(db): State<DbPool>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    match db.ping().await {
        Ok(()) => Ok(Json(serde_json::json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            ))
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
