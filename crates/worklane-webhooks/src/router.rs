//! Axum router setup for webhook endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::handlers::{deliveries, events, subscriptions, webhooks};
use crate::services::dispatch_queue::DispatchQueue;
use crate::services::trigger_service::TriggerService;
use crate::services::webhook_service::WebhookService;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct WebhooksState {
    pub webhook_service: WebhookService,
    pub trigger_service: TriggerService,
    pool: PgPool,
}

impl WebhooksState {
    /// Create a new webhooks state.
    ///
    /// `allow_http` permits plain-HTTP destination URLs and should stay off
    /// outside development.
    #[must_use]
    pub fn new(pool: PgPool, queue: DispatchQueue, allow_http: bool) -> Self {
        Self {
            webhook_service: WebhookService::new(pool.clone(), queue.clone())
                .with_allow_http(allow_http),
            trigger_service: TriggerService::new(pool.clone(), queue),
            pool,
        }
    }

    /// Get a reference to the database pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Creates the webhook router with all routes.
pub fn webhooks_router(state: WebhooksState) -> Router {
    Router::new()
        // Webhook CRUD
        .route(
            "/webhooks",
            post(webhooks::create_webhook_handler).get(webhooks::list_webhooks_handler),
        )
        .route(
            "/webhooks/:id",
            get(webhooks::get_webhook_handler)
                .patch(webhooks::update_webhook_handler)
                .delete(webhooks::delete_webhook_handler),
        )
        .route(
            "/webhooks/:id/rotate-secret",
            post(webhooks::rotate_secret_handler),
        )
        // Event subscriptions
        .route(
            "/webhooks/:id/subscriptions",
            get(subscriptions::list_subscriptions_handler)
                .post(subscriptions::add_subscription_handler),
        )
        .route(
            "/webhooks/:id/subscriptions/:event_type",
            axum::routing::patch(subscriptions::update_subscription_handler)
                .delete(subscriptions::remove_subscription_handler),
        )
        // Statistics
        .route("/webhooks/:id/stats", get(webhooks::get_stats_handler))
        // Event types
        .route(
            "/webhook-event-types",
            get(subscriptions::list_event_types_handler),
        )
        // Delivery history
        .route(
            "/webhook-deliveries",
            get(deliveries::list_deliveries_handler),
        )
        .route(
            "/webhook-deliveries/:id",
            get(deliveries::get_delivery_handler),
        )
        .route(
            "/webhook-deliveries/:id/retry",
            post(deliveries::retry_delivery_handler),
        )
        // Event trigger
        .route("/events/trigger", post(events::trigger_event_handler))
        .with_state(state)
}
