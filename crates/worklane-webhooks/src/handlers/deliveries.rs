//! Handlers for delivery history and manual retries.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{
    ListDeliveriesQuery, WebhookDeliveryDetailResponse, WebhookDeliveryListResponse,
    WebhookDeliveryResponse,
};
use crate::router::WebhooksState;

/// List webhook deliveries.
#[utoipa::path(
    get,
    path = "/webhook-deliveries",
    tag = "Webhooks",
    params(ListDeliveriesQuery),
    responses(
        (status = 200, description = "Paginated delivery list", body = WebhookDeliveryListResponse),
        (status = 400, description = "Unknown status filter"),
    )
)]
pub async fn list_deliveries_handler(
    State(state): State<WebhooksState>,
    Query(query): Query<ListDeliveriesQuery>,
) -> ApiResult<Json<WebhookDeliveryListResponse>> {
    let response = state.webhook_service.list_deliveries(query).await?;

    Ok(Json(response))
}

/// Get one delivery with its full request/response audit trail.
#[utoipa::path(
    get,
    path = "/webhook-deliveries/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Delivery ID")
    ),
    responses(
        (status = 200, description = "Delivery details", body = WebhookDeliveryDetailResponse),
        (status = 404, description = "Delivery not found"),
    )
)]
pub async fn get_delivery_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookDeliveryDetailResponse>> {
    let response = state.webhook_service.get_delivery(id).await?;

    Ok(Json(response))
}

/// Manually retry a delivery.
///
/// Resets the attempt counter and queues the delivery for immediate
/// dispatch. Succeeded deliveries and deliveries with no attempt budget
/// left are rejected.
#[utoipa::path(
    post,
    path = "/webhook-deliveries/{id}/retry",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Delivery ID")
    ),
    responses(
        (status = 200, description = "Delivery queued for retry", body = WebhookDeliveryResponse),
        (status = 404, description = "Delivery not found"),
        (status = 409, description = "Delivery is not retryable"),
    )
)]
pub async fn retry_delivery_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookDeliveryResponse>> {
    let response = state.webhook_service.retry_delivery(id).await?;

    Ok(Json(response))
}
