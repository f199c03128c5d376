//! CRUD handlers for webhook endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiResult, WebhookError};
use crate::models::{
    CreateWebhookRequest, DeliveryStatsResponse, ListWebhooksQuery, StatsQuery,
    UpdateWebhookRequest, WebhookDetailResponse, WebhookListResponse, WebhookWithSecretResponse,
};
use crate::router::WebhooksState;

/// Register a new webhook.
#[utoipa::path(
    post,
    path = "/webhooks",
    tag = "Webhooks",
    request_body = CreateWebhookRequest,
    responses(
        (status = 201, description = "Webhook created; the secret appears only here", body = WebhookWithSecretResponse),
        (status = 400, description = "Validation error"),
    )
)]
pub async fn create_webhook_handler(
    State(state): State<WebhooksState>,
    Json(request): Json<CreateWebhookRequest>,
) -> ApiResult<(StatusCode, Json<WebhookWithSecretResponse>)> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state.webhook_service.create_webhook(request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List registered webhooks.
#[utoipa::path(
    get,
    path = "/webhooks",
    tag = "Webhooks",
    params(ListWebhooksQuery),
    responses(
        (status = 200, description = "Paginated webhook list", body = WebhookListResponse),
    )
)]
pub async fn list_webhooks_handler(
    State(state): State<WebhooksState>,
    Query(query): Query<ListWebhooksQuery>,
) -> ApiResult<Json<WebhookListResponse>> {
    let response = state.webhook_service.list_webhooks(query).await?;

    Ok(Json(response))
}

/// Get a single webhook with its subscriptions.
#[utoipa::path(
    get,
    path = "/webhooks/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook ID")
    ),
    responses(
        (status = 200, description = "Webhook details", body = WebhookDetailResponse),
        (status = 404, description = "Webhook not found"),
    )
)]
pub async fn get_webhook_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookDetailResponse>> {
    let response = state.webhook_service.get_webhook(id).await?;

    Ok(Json(response))
}

/// Update a webhook. Omitted fields keep their current value.
#[utoipa::path(
    patch,
    path = "/webhooks/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook ID")
    ),
    request_body = UpdateWebhookRequest,
    responses(
        (status = 200, description = "Webhook updated", body = WebhookDetailResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Webhook not found"),
    )
)]
pub async fn update_webhook_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateWebhookRequest>,
) -> ApiResult<Json<WebhookDetailResponse>> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state.webhook_service.update_webhook(id, request).await?;

    Ok(Json(response))
}

/// Delete a webhook and its delivery history.
#[utoipa::path(
    delete,
    path = "/webhooks/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook ID")
    ),
    responses(
        (status = 204, description = "Webhook deleted"),
        (status = 404, description = "Webhook not found"),
    )
)]
pub async fn delete_webhook_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.webhook_service.delete_webhook(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Rotate a webhook's signing secret.
#[utoipa::path(
    post,
    path = "/webhooks/{id}/rotate-secret",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook ID")
    ),
    responses(
        (status = 200, description = "Secret rotated; the new secret appears only here", body = WebhookWithSecretResponse),
        (status = 404, description = "Webhook not found"),
    )
)]
pub async fn rotate_secret_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookWithSecretResponse>> {
    let response = state.webhook_service.rotate_secret(id).await?;

    Ok(Json(response))
}

/// Delivery statistics for one webhook.
#[utoipa::path(
    get,
    path = "/webhooks/{id}/stats",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook ID"),
        StatsQuery
    ),
    responses(
        (status = 200, description = "Delivery statistics", body = DeliveryStatsResponse),
        (status = 404, description = "Webhook not found"),
    )
)]
pub async fn get_stats_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<DeliveryStatsResponse>> {
    let response = state
        .webhook_service
        .get_stats(id, query.window_days)
        .await?;

    Ok(Json(response))
}
