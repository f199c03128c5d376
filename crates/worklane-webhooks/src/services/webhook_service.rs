//! Webhook management service.
//!
//! Business logic behind the management API: webhook CRUD with URL
//! validation and SSRF protection, server-side secret generation and
//! rotation, event subscription management, delivery history queries,
//! statistics, and manual retries.

use rand::RngCore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::WebhookError;
use crate::models::{
    CreateWebhookRequest, DeliveryStatsResponse, ListDeliveriesQuery, ListWebhooksQuery,
    SubscriptionListResponse, SubscriptionResponse, UpdateWebhookRequest, WebhookDeliveryDetailResponse,
    WebhookDeliveryListResponse, WebhookDeliveryResponse, WebhookDetailResponse, WebhookListResponse,
    WebhookResponse, WebhookWithSecretResponse,
};
use crate::services::dispatch_queue::DispatchQueue;
use crate::validation;
use worklane_db::models::{
    CreateWebhook, DeliveryFilter, DeliveryStatus, UpdateWebhook, Webhook, WebhookDelivery,
    WebhookEventSubscription,
};

/// Default per-delivery timeout for new webhooks.
pub const DEFAULT_TIMEOUT_SECONDS: i32 = 30;

/// Largest accepted statistics window.
pub const MAX_STATS_WINDOW_DAYS: i32 = 90;

/// Service for webhook management operations.
#[derive(Clone)]
pub struct WebhookService {
    pool: PgPool,
    queue: DispatchQueue,
    allow_http: bool,
}

impl WebhookService {
    /// Create a new webhook management service.
    #[must_use]
    pub fn new(pool: PgPool, queue: DispatchQueue) -> Self {
        Self {
            pool,
            queue,
            allow_http: false,
        }
    }

    /// Allow HTTP URLs (for development/testing).
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    // -----------------------------------------------------------------------
    // Webhook CRUD
    // -----------------------------------------------------------------------

    /// Register a webhook and subscribe it to the requested event types.
    ///
    /// The generated signing secret is part of the response; it is never
    /// returned again.
    pub async fn create_webhook(
        &self,
        request: CreateWebhookRequest,
    ) -> Result<WebhookWithSecretResponse, WebhookError> {
        validation::validate_webhook_name(&request.name)?;
        validation::validate_webhook_url(&request.url, self.allow_http)?;
        validation::validate_event_types(&request.event_types)?;

        let timeout_seconds = request.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        validation::validate_timeout_seconds(timeout_seconds)?;

        let webhook = Webhook::create(
            &self.pool,
            CreateWebhook {
                name: request.name,
                url: request.url,
                secret: generate_secret(),
                is_active: request.is_active.unwrap_or(true),
                headers: request.headers.unwrap_or_else(|| serde_json::json!({})),
                timeout_seconds,
            },
        )
        .await?;

        let mut subscriptions = Vec::with_capacity(request.event_types.len());
        for event_type in &request.event_types {
            let sub =
                WebhookEventSubscription::subscribe(&self.pool, webhook.id, event_type).await?;
            subscriptions.push(subscription_to_response(sub));
        }

        tracing::info!(
            target: "webhook_management",
            webhook_id = %webhook.id,
            name = %webhook.name,
            event_types = subscriptions.len(),
            "Webhook registered"
        );

        Ok(webhook_to_secret_response(webhook, subscriptions))
    }

    /// List webhooks with pagination.
    pub async fn list_webhooks(
        &self,
        query: ListWebhooksQuery,
    ) -> Result<WebhookListResponse, WebhookError> {
        let limit = query.limit.clamp(1, 100);
        let offset = query.offset.max(0);

        let webhooks = Webhook::list(&self.pool, limit, offset).await?;
        let total = Webhook::count(&self.pool).await?;

        Ok(WebhookListResponse {
            items: webhooks.into_iter().map(webhook_to_response).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Get a webhook with its subscriptions.
    pub async fn get_webhook(&self, id: Uuid) -> Result<WebhookDetailResponse, WebhookError> {
        let webhook = Webhook::find_by_id(&self.pool, id)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        let subscriptions = WebhookEventSubscription::list_for_webhook(&self.pool, id).await?;

        Ok(webhook_to_detail_response(
            webhook,
            subscriptions
                .into_iter()
                .map(subscription_to_response)
                .collect(),
        ))
    }

    /// Apply a partial update to a webhook.
    pub async fn update_webhook(
        &self,
        id: Uuid,
        request: UpdateWebhookRequest,
    ) -> Result<WebhookDetailResponse, WebhookError> {
        if let Some(ref name) = request.name {
            validation::validate_webhook_name(name)?;
        }
        if let Some(ref url) = request.url {
            validation::validate_webhook_url(url, self.allow_http)?;
        }
        if let Some(timeout_seconds) = request.timeout_seconds {
            validation::validate_timeout_seconds(timeout_seconds)?;
        }

        let webhook = Webhook::update(
            &self.pool,
            id,
            UpdateWebhook {
                name: request.name,
                url: request.url,
                is_active: request.is_active,
                headers: request.headers,
                timeout_seconds: request.timeout_seconds,
            },
        )
        .await?
        .ok_or(WebhookError::WebhookNotFound)?;

        let subscriptions = WebhookEventSubscription::list_for_webhook(&self.pool, id).await?;

        Ok(webhook_to_detail_response(
            webhook,
            subscriptions
                .into_iter()
                .map(subscription_to_response)
                .collect(),
        ))
    }

    /// Delete a webhook. Its subscriptions and delivery history go with it.
    pub async fn delete_webhook(&self, id: Uuid) -> Result<(), WebhookError> {
        let deleted = Webhook::delete(&self.pool, id).await?;
        if !deleted {
            return Err(WebhookError::WebhookNotFound);
        }

        tracing::info!(
            target: "webhook_management",
            webhook_id = %id,
            "Webhook deleted"
        );
        Ok(())
    }

    /// Replace the signing secret. The new secret is returned once.
    pub async fn rotate_secret(
        &self,
        id: Uuid,
    ) -> Result<WebhookWithSecretResponse, WebhookError> {
        let webhook = Webhook::rotate_secret(&self.pool, id, &generate_secret())
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        let subscriptions = WebhookEventSubscription::list_for_webhook(&self.pool, id).await?;

        tracing::info!(
            target: "webhook_management",
            webhook_id = %id,
            "Webhook secret rotated"
        );

        Ok(webhook_to_secret_response(
            webhook,
            subscriptions
                .into_iter()
                .map(subscription_to_response)
                .collect(),
        ))
    }

    // -----------------------------------------------------------------------
    // Event subscriptions
    // -----------------------------------------------------------------------

    /// Subscribe a webhook to an event type. Idempotent: re-subscribing
    /// reactivates an existing row instead of duplicating it.
    pub async fn add_subscription(
        &self,
        webhook_id: Uuid,
        event_type: &str,
    ) -> Result<SubscriptionResponse, WebhookError> {
        validation::validate_event_type(event_type)?;

        Webhook::find_by_id(&self.pool, webhook_id)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        let sub = WebhookEventSubscription::subscribe(&self.pool, webhook_id, event_type).await?;
        Ok(subscription_to_response(sub))
    }

    /// Remove a subscription outright.
    pub async fn remove_subscription(
        &self,
        webhook_id: Uuid,
        event_type: &str,
    ) -> Result<(), WebhookError> {
        Webhook::find_by_id(&self.pool, webhook_id)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        let removed = WebhookEventSubscription::remove(&self.pool, webhook_id, event_type).await?;
        if !removed {
            return Err(WebhookError::SubscriptionNotFound);
        }
        Ok(())
    }

    /// Pause or resume a subscription without removing it.
    pub async fn set_subscription_active(
        &self,
        webhook_id: Uuid,
        event_type: &str,
        is_active: bool,
    ) -> Result<SubscriptionResponse, WebhookError> {
        Webhook::find_by_id(&self.pool, webhook_id)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        let sub =
            WebhookEventSubscription::set_active(&self.pool, webhook_id, event_type, is_active)
                .await?
                .ok_or(WebhookError::SubscriptionNotFound)?;

        Ok(subscription_to_response(sub))
    }

    /// List a webhook's subscriptions.
    pub async fn list_subscriptions(
        &self,
        webhook_id: Uuid,
    ) -> Result<SubscriptionListResponse, WebhookError> {
        Webhook::find_by_id(&self.pool, webhook_id)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        let subs = WebhookEventSubscription::list_for_webhook(&self.pool, webhook_id).await?;

        Ok(SubscriptionListResponse {
            items: subs.into_iter().map(subscription_to_response).collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Deliveries
    // -----------------------------------------------------------------------

    /// List deliveries with optional webhook/status filters.
    pub async fn list_deliveries(
        &self,
        query: ListDeliveriesQuery,
    ) -> Result<WebhookDeliveryListResponse, WebhookError> {
        let status = match query.status.as_deref() {
            Some(s) => Some(
                s.parse::<DeliveryStatus>()
                    .map_err(WebhookError::Validation)?,
            ),
            None => None,
        };

        let filter = DeliveryFilter {
            webhook_id: query.webhook_id,
            status,
        };
        let limit = query.limit.clamp(1, 100);
        let offset = query.offset.max(0);

        let deliveries = WebhookDelivery::list(&self.pool, &filter, limit, offset).await?;
        let total = WebhookDelivery::count(&self.pool, &filter).await?;

        Ok(WebhookDeliveryListResponse {
            items: deliveries.into_iter().map(delivery_to_response).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Get one delivery with its full audit trail.
    pub async fn get_delivery(
        &self,
        id: Uuid,
    ) -> Result<WebhookDeliveryDetailResponse, WebhookError> {
        let delivery = WebhookDelivery::find_by_id(&self.pool, id)
            .await?
            .ok_or(WebhookError::DeliveryNotFound)?;

        Ok(delivery_to_detail_response(delivery))
    }

    /// Manually re-run a delivery.
    ///
    /// Permitted only while the delivery is not `success` and has attempt
    /// budget left; the record resets to `pending` with zero attempts and
    /// re-enters the dispatch queue.
    pub async fn retry_delivery(
        &self,
        id: Uuid,
    ) -> Result<WebhookDeliveryResponse, WebhookError> {
        let delivery = WebhookDelivery::find_by_id(&self.pool, id)
            .await?
            .ok_or(WebhookError::DeliveryNotFound)?;

        if delivery.status() == DeliveryStatus::Success {
            return Err(WebhookError::RetryNotAllowed(
                "delivery already succeeded".to_string(),
            ));
        }
        if delivery.attempt_count >= delivery.max_attempts {
            return Err(WebhookError::RetryNotAllowed(
                "attempt budget exhausted".to_string(),
            ));
        }

        let reset = WebhookDelivery::reset_for_retry(&self.pool, id)
            .await?
            .ok_or_else(|| {
                // The row changed between the load and the guarded reset
                WebhookError::RetryNotAllowed("delivery is no longer retryable".to_string())
            })?;

        self.queue.enqueue(reset.id);

        tracing::info!(
            target: "webhook_management",
            delivery_id = %reset.id,
            webhook_id = %reset.webhook_id,
            "Manual retry enqueued"
        );

        Ok(delivery_to_response(reset))
    }

    /// Delivery statistics for one webhook over a trailing day window.
    pub async fn get_stats(
        &self,
        webhook_id: Uuid,
        window_days: i32,
    ) -> Result<DeliveryStatsResponse, WebhookError> {
        Webhook::find_by_id(&self.pool, webhook_id)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        let window_days = window_days.clamp(1, MAX_STATS_WINDOW_DAYS);
        let stats = WebhookDelivery::stats(&self.pool, webhook_id, window_days).await?;

        Ok(DeliveryStatsResponse {
            webhook_id,
            window_days,
            total: stats.total,
            successful: stats.successful,
            failed: stats.failed,
            pending: stats.pending,
            success_rate: stats.success_rate,
        })
    }
}

/// Generate a fresh signing secret: 32 random bytes, hex-encoded, with a
/// recognizable prefix.
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("whsec_{}", hex::encode(bytes))
}

// ---------------------------------------------------------------------------
// Response converters
// ---------------------------------------------------------------------------

fn webhook_to_response(webhook: Webhook) -> WebhookResponse {
    WebhookResponse {
        id: webhook.id,
        name: webhook.name,
        url: webhook.url,
        is_active: webhook.is_active,
        headers: webhook.headers,
        timeout_seconds: webhook.timeout_seconds,
        created_at: webhook.created_at,
        updated_at: webhook.updated_at,
    }
}

fn webhook_to_detail_response(
    webhook: Webhook,
    subscriptions: Vec<SubscriptionResponse>,
) -> WebhookDetailResponse {
    WebhookDetailResponse {
        id: webhook.id,
        name: webhook.name,
        url: webhook.url,
        is_active: webhook.is_active,
        headers: webhook.headers,
        timeout_seconds: webhook.timeout_seconds,
        subscriptions,
        created_at: webhook.created_at,
        updated_at: webhook.updated_at,
    }
}

fn webhook_to_secret_response(
    webhook: Webhook,
    subscriptions: Vec<SubscriptionResponse>,
) -> WebhookWithSecretResponse {
    WebhookWithSecretResponse {
        id: webhook.id,
        name: webhook.name,
        url: webhook.url,
        secret: webhook.secret,
        is_active: webhook.is_active,
        headers: webhook.headers,
        timeout_seconds: webhook.timeout_seconds,
        subscriptions,
        created_at: webhook.created_at,
        updated_at: webhook.updated_at,
    }
}

fn subscription_to_response(sub: WebhookEventSubscription) -> SubscriptionResponse {
    SubscriptionResponse {
        id: sub.id,
        webhook_id: sub.webhook_id,
        event_type: sub.event_type,
        is_active: sub.is_active,
        created_at: sub.created_at,
    }
}

/// Convert a DB delivery model to a summary response.
pub(crate) fn delivery_to_response(d: WebhookDelivery) -> WebhookDeliveryResponse {
    WebhookDeliveryResponse {
        id: d.id,
        webhook_id: d.webhook_id,
        event_type: d.event_type,
        event_id: d.event_id,
        status: d.status,
        attempt_count: d.attempt_count,
        max_attempts: d.max_attempts,
        response_status_code: d.response_status_code,
        error_message: d.error_message,
        next_retry_at: d.next_retry_at,
        created_at: d.created_at,
        completed_at: d.completed_at,
    }
}

/// Convert a DB delivery model to a full detail response.
fn delivery_to_detail_response(d: WebhookDelivery) -> WebhookDeliveryDetailResponse {
    WebhookDeliveryDetailResponse {
        id: d.id,
        webhook_id: d.webhook_id,
        event_type: d.event_type,
        event_id: d.event_id,
        status: d.status,
        attempt_count: d.attempt_count,
        max_attempts: d.max_attempts,
        payload: d.payload,
        request_url: d.request_url,
        request_headers: d.request_headers,
        response_status_code: d.response_status_code,
        response_body: d.response_body,
        response_headers: d.response_headers,
        error_message: d.error_message,
        created_at: d.created_at,
        sent_at: d.sent_at,
        next_retry_at: d.next_retry_at,
        completed_at: d.completed_at,
    }
}
