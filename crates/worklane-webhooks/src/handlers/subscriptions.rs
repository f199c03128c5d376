//! Handlers for event subscriptions and the event type catalog.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiResult, WebhookError};
use crate::event_types::AVAILABLE_EVENT_TYPES;
use crate::models::{
    EventTypeInfo, EventTypeListResponse, SubscribeRequest, SubscriptionListResponse,
    SubscriptionResponse, UpdateSubscriptionRequest,
};
use crate::router::WebhooksState;

// ---------------------------------------------------------------------------
// Subscription handlers
// ---------------------------------------------------------------------------

/// List a webhook's event subscriptions.
#[utoipa::path(
    get,
    path = "/webhooks/{id}/subscriptions",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook ID")
    ),
    responses(
        (status = 200, description = "Subscription list", body = SubscriptionListResponse),
        (status = 404, description = "Webhook not found"),
    )
)]
pub async fn list_subscriptions_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionListResponse>> {
    let response = state.webhook_service.list_subscriptions(id).await?;

    Ok(Json(response))
}

/// Subscribe a webhook to an event type.
#[utoipa::path(
    post,
    path = "/webhooks/{id}/subscriptions",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook ID")
    ),
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscription created or reactivated", body = SubscriptionResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Webhook not found"),
    )
)]
pub async fn add_subscription_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<SubscriptionResponse>)> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state
        .webhook_service
        .add_subscription(id, &request.event_type)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Pause or resume a single subscription.
#[utoipa::path(
    patch,
    path = "/webhooks/{id}/subscriptions/{event_type}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook ID"),
        ("event_type" = String, Path, description = "Subscribed event type")
    ),
    request_body = UpdateSubscriptionRequest,
    responses(
        (status = 200, description = "Subscription updated", body = SubscriptionResponse),
        (status = 404, description = "Webhook or subscription not found"),
    )
)]
pub async fn update_subscription_handler(
    State(state): State<WebhooksState>,
    Path((id, event_type)): Path<(Uuid, String)>,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let response = state
        .webhook_service
        .set_subscription_active(id, &event_type, request.is_active)
        .await?;

    Ok(Json(response))
}

/// Remove a subscription.
#[utoipa::path(
    delete,
    path = "/webhooks/{id}/subscriptions/{event_type}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook ID"),
        ("event_type" = String, Path, description = "Subscribed event type")
    ),
    responses(
        (status = 204, description = "Subscription removed"),
        (status = 404, description = "Webhook or subscription not found"),
    )
)]
pub async fn remove_subscription_handler(
    State(state): State<WebhooksState>,
    Path((id, event_type)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    state
        .webhook_service
        .remove_subscription(id, &event_type)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Event types handler
// ---------------------------------------------------------------------------

/// List the event types the platform currently emits.
///
/// The catalog is advisory; subscriptions accept any event type string.
#[utoipa::path(
    get,
    path = "/webhook-event-types",
    tag = "Webhooks",
    responses(
        (status = 200, description = "List of event types", body = EventTypeListResponse),
    )
)]
pub async fn list_event_types_handler() -> Json<EventTypeListResponse> {
    let event_types = AVAILABLE_EVENT_TYPES
        .iter()
        .map(|et| EventTypeInfo {
            event_type: et.event_type.to_string(),
            description: et.description.to_string(),
        })
        .collect();

    Json(EventTypeListResponse { event_types })
}
