//! Event trigger service: fan an event out to its active subscribers.
//!
//! For each webhook that is active and holds an active subscription to the
//! event type, a delivery record is created and its id handed to the
//! dispatch queue. The HTTP work happens on the worker; triggering returns
//! as soon as the records exist.

use sqlx::PgPool;
use uuid::Uuid;

use crate::services::dispatch_queue::DispatchQueue;
use worklane_db::models::{CreateWebhookDelivery, Webhook, WebhookDelivery, DEFAULT_MAX_ATTEMPTS};

/// Deliveries created for one event occurrence.
#[derive(Debug, Clone)]
pub struct TriggerResult {
    pub event_type: String,
    pub event_id: String,
    pub delivery_ids: Vec<Uuid>,
}

/// Service for firing events at subscribed webhooks.
#[derive(Clone)]
pub struct TriggerService {
    pool: PgPool,
    queue: DispatchQueue,
}

impl TriggerService {
    /// Create a new trigger service.
    #[must_use]
    pub fn new(pool: PgPool, queue: DispatchQueue) -> Self {
        Self { pool, queue }
    }

    /// Create and enqueue deliveries for every active subscriber.
    ///
    /// An event with no subscribers is a no-op that creates no records.
    /// A failure to create one subscriber's delivery is logged and skipped
    /// so the remaining subscribers still get theirs; only the subscriber
    /// query itself propagates an error.
    pub async fn trigger(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        event_id: Option<String>,
    ) -> Result<TriggerResult, sqlx::Error> {
        let event_id = event_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let subscribers = Webhook::list_active_subscribers(&self.pool, event_type).await?;

        if subscribers.is_empty() {
            tracing::debug!(
                target: "webhook_trigger",
                event_type,
                event_id = %event_id,
                "No active subscriptions match event type"
            );
            return Ok(TriggerResult {
                event_type: event_type.to_string(),
                event_id,
                delivery_ids: Vec::new(),
            });
        }

        let mut delivery_ids = Vec::with_capacity(subscribers.len());
        for webhook in &subscribers {
            let created = WebhookDelivery::create(
                &self.pool,
                CreateWebhookDelivery {
                    webhook_id: webhook.id,
                    event_type: event_type.to_string(),
                    event_id: Some(event_id.clone()),
                    payload: payload.clone(),
                    max_attempts: DEFAULT_MAX_ATTEMPTS,
                },
            )
            .await;

            match created {
                Ok(delivery) => {
                    self.queue.enqueue(delivery.id);
                    delivery_ids.push(delivery.id);
                }
                Err(e) => {
                    tracing::error!(
                        target: "webhook_trigger",
                        webhook_id = %webhook.id,
                        event_type,
                        event_id = %event_id,
                        error = %e,
                        "Failed to create delivery record; skipping this subscriber"
                    );
                }
            }
        }

        tracing::info!(
            target: "webhook_trigger",
            event_type,
            event_id = %event_id,
            subscriber_count = subscribers.len(),
            delivery_count = delivery_ids.len(),
            "Event fanned out to subscribers"
        );

        Ok(TriggerResult {
            event_type: event_type.to_string(),
            event_id,
            delivery_ids,
        })
    }
}
