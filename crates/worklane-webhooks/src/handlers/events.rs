//! Handler for firing events into the delivery pipeline.

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::error::{ApiResult, WebhookError};
use crate::models::{TriggerEventRequest, TriggerEventResponse};
use crate::router::WebhooksState;

/// Trigger an event.
///
/// Creates a delivery record per active subscriber and queues each for
/// dispatch. Returns as soon as the records exist; the HTTP attempts run
/// on the background worker.
#[utoipa::path(
    post,
    path = "/events/trigger",
    tag = "Webhooks",
    request_body = TriggerEventRequest,
    responses(
        (status = 202, description = "Deliveries queued", body = TriggerEventResponse),
        (status = 400, description = "Validation error"),
    )
)]
pub async fn trigger_event_handler(
    State(state): State<WebhooksState>,
    Json(request): Json<TriggerEventRequest>,
) -> ApiResult<(StatusCode, Json<TriggerEventResponse>)> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let result = state
        .trigger_service
        .trigger(&request.event_type, request.payload, request.event_id)
        .await?;

    let webhooks_notified = result.delivery_ids.len();
    let message = if webhooks_notified == 0 {
        "No active subscriptions match this event type".to_string()
    } else {
        format!("Queued {webhooks_notified} deliveries")
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerEventResponse {
            event_type: result.event_type,
            event_id: result.event_id,
            webhooks_notified,
            delivery_ids: result.delivery_ids,
            message,
        }),
    ))
}
