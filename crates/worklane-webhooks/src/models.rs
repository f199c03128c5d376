//! Request/response models for the webhook management API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Register a new webhook endpoint.
///
/// The signing secret is generated server-side and returned once in the
/// creation response.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateWebhookRequest {
    /// Human-readable name.
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Destination URL (HTTPS unless the server allows HTTP for dev).
    pub url: String,
    /// Event types to subscribe to at creation time.
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Custom headers sent with every delivery.
    #[schema(value_type = Option<Object>)]
    pub headers: Option<serde_json::Value>,
    /// Per-delivery timeout in seconds (default 30).
    pub timeout_seconds: Option<i32>,
    /// Whether the webhook receives events (default true).
    pub is_active: Option<bool>,
}

/// Update an existing webhook. Omitted fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWebhookRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub url: Option<String>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub headers: Option<serde_json::Value>,
    pub timeout_seconds: Option<i32>,
}

/// Subscribe a webhook to an event type.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SubscribeRequest {
    #[validate(length(min = 1, max = 255))]
    pub event_type: String,
}

/// Enable or pause a single event subscription.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequest {
    pub is_active: bool,
}

/// Fire an event at every active subscriber.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TriggerEventRequest {
    #[validate(length(min = 1, max = 255))]
    pub event_type: String,
    /// Raw event payload, delivered as the request body after canonicalization.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Caller-supplied correlation id; generated when omitted.
    pub event_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

fn default_limit() -> i64 {
    50
}

fn default_offset() -> i64 {
    0
}

fn default_stats_window_days() -> i32 {
    7
}

/// Pagination for webhook listings.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListWebhooksQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_offset")]
    pub offset: i64,
}

/// Filters and pagination for delivery listings.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListDeliveriesQuery {
    /// Restrict to one webhook.
    pub webhook_id: Option<Uuid>,
    /// Restrict to one lifecycle status (pending, sending, success, failed, retrying).
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_offset")]
    pub offset: i64,
}

/// Day window for delivery statistics.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// Window size in days (default 7, max 90).
    #[serde(default = "default_stats_window_days")]
    pub window_days: i32,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Webhook summary. Never carries the signing secret.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookResponse {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub is_active: bool,
    #[schema(value_type = Object)]
    pub headers: serde_json::Value,
    pub timeout_seconds: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Webhook with its event subscriptions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDetailResponse {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub is_active: bool,
    #[schema(value_type = Object)]
    pub headers: serde_json::Value,
    pub timeout_seconds: i32,
    pub subscriptions: Vec<SubscriptionResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Webhook including its signing secret.
///
/// Returned only from creation and secret rotation; all other reads omit
/// the secret.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookWithSecretResponse {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub secret: String,
    pub is_active: bool,
    #[schema(value_type = Object)]
    pub headers: serde_json::Value,
    pub timeout_seconds: i32,
    pub subscriptions: Vec<SubscriptionResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Paginated webhook list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookListResponse {
    pub items: Vec<WebhookResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// One event subscription on a webhook.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Subscriptions of one webhook.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionListResponse {
    pub items: Vec<SubscriptionResponse>,
}

/// Delivery summary.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryResponse {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: String,
    pub event_id: Option<String>,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub response_status_code: Option<i32>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Delivery with full request/response audit fields.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryDetailResponse {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: String,
    pub event_id: Option<String>,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub request_url: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub request_headers: Option<serde_json::Value>,
    pub response_status_code: Option<i32>,
    pub response_body: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub response_headers: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Paginated delivery list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryListResponse {
    pub items: Vec<WebhookDeliveryResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Aggregate delivery outcomes for one webhook over a day window.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryStatsResponse {
    pub webhook_id: Uuid,
    pub window_days: i32,
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub pending: i64,
    pub success_rate: f64,
}

/// Outcome of an event trigger.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TriggerEventResponse {
    pub event_type: String,
    pub event_id: String,
    pub webhooks_notified: usize,
    pub delivery_ids: Vec<Uuid>,
    pub message: String,
}

/// A known event type and its description.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeInfo {
    pub event_type: String,
    pub description: String,
}

/// The advisory event type catalog.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeListResponse {
    pub event_types: Vec<EventTypeInfo>,
}
