//! Webhook delivery execution service.
//!
//! Executes one dispatch attempt for a delivery record: load and guard the
//! record, sign the canonical payload, POST it to the webhook URL, interpret
//! the response, and transition the record. Transient failures schedule an
//! exponential-backoff retry until the attempt budget runs out; config
//! faults (missing or inactive webhook) fail terminally without retrying.
//!
//! Every exit path moves the delivery out of `sending`. Only store errors
//! propagate to the caller.

use std::time::Instant;

use chrono::Utc;
use reqwest::Client;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::WebhookError;
use crate::signature;
use worklane_db::models::{DeliveryStatus, DeliveryUpdate, Webhook, WebhookDelivery};

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_RETRY_DELAY_SECS: i64 = 60;

/// Default multiplier applied to the retry delay after each failed attempt.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Client-level request timeout; each webhook overrides it per request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// User-Agent sent with every delivery.
pub const USER_AGENT: &str = "Worklane-Webhooks/1.0";

/// Headers owned by the dispatcher. Custom webhook headers cannot override
/// them.
const RESERVED_HEADERS: [&str; 3] = ["content-type", "user-agent", "x-webhook-signature"];

/// What one dispatch attempt did to the delivery record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 2xx response; the delivery completed successfully.
    Succeeded { attempt_count: i32, status_code: u16 },
    /// Transient failure with attempt budget left; a retry is scheduled.
    RetryScheduled {
        attempt_count: i32,
        delay_seconds: i64,
    },
    /// Terminal failure: config fault, exhausted budget, or final transient
    /// failure.
    Failed { reason: String },
    /// Nothing to do: record missing, already terminal, in flight, or not
    /// yet due.
    Skipped { reason: &'static str },
}

/// Service for webhook delivery execution.
#[derive(Clone)]
pub struct DeliveryService {
    pool: PgPool,
    http_client: Client,
    initial_retry_delay_secs: i64,
    backoff_factor: f64,
}

impl DeliveryService {
    /// Create a new delivery service with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(pool: PgPool) -> Result<Self, WebhookError> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            pool,
            http_client,
            initial_retry_delay_secs: DEFAULT_INITIAL_RETRY_DELAY_SECS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        })
    }

    /// Override the retry backoff policy.
    #[must_use]
    pub fn with_retry_policy(mut self, initial_delay_secs: i64, backoff_factor: f64) -> Self {
        self.initial_retry_delay_secs = initial_delay_secs;
        self.backoff_factor = backoff_factor;
        self
    }

    /// Get a reference to the connection pool (for the worker).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Execute one dispatch attempt for a delivery id.
    ///
    /// Loads fresh state, so re-submitting an id that was already handled
    /// (duplicate queue entry, concurrent sweep) is a safe no-op.
    pub async fn dispatch_delivery(
        &self,
        delivery_id: Uuid,
    ) -> Result<DispatchOutcome, sqlx::Error> {
        let Some(delivery) = WebhookDelivery::find_by_id(&self.pool, delivery_id).await? else {
            tracing::warn!(
                target: "webhook_delivery",
                delivery_id = %delivery_id,
                "Delivery record not found; dropping dispatch"
            );
            return Ok(DispatchOutcome::Skipped {
                reason: "delivery not found",
            });
        };

        let status = delivery.status();
        if status.is_terminal() {
            tracing::debug!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                status = %status,
                "Delivery already terminal; nothing to do"
            );
            return Ok(DispatchOutcome::Skipped {
                reason: "already terminal",
            });
        }
        if status == DeliveryStatus::Sending {
            tracing::debug!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                "Delivery already in flight; nothing to do"
            );
            return Ok(DispatchOutcome::Skipped {
                reason: "already in flight",
            });
        }
        if status == DeliveryStatus::Retrying {
            if let Some(next_retry_at) = delivery.next_retry_at {
                if next_retry_at > Utc::now() {
                    return Ok(DispatchOutcome::Skipped {
                        reason: "retry not due",
                    });
                }
            }
        }

        if delivery.attempt_count >= delivery.max_attempts {
            tracing::warn!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                attempt_count = delivery.attempt_count,
                max_attempts = delivery.max_attempts,
                "Delivery has no attempt budget left"
            );
            WebhookDelivery::update_status(
                &self.pool,
                delivery.id,
                DeliveryStatus::Failed,
                DeliveryUpdate {
                    error_message: Some("max retry attempts exceeded".to_string()),
                    ..Default::default()
                },
            )
            .await?;
            return Ok(DispatchOutcome::Failed {
                reason: "max retry attempts exceeded".to_string(),
            });
        }

        let webhook = match Webhook::find_by_id(&self.pool, delivery.webhook_id).await? {
            Some(webhook) if webhook.is_active => webhook,
            Some(_) => return self.fail_fast(&delivery, "Webhook is inactive").await,
            None => return self.fail_fast(&delivery, "Webhook not found").await,
        };

        // The signed bytes are exactly the bytes that go on the wire
        let payload_bytes = match signature::canonical_bytes(&delivery.payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                return self
                    .handle_transient_failure(
                        &delivery,
                        DeliveryUpdate::default(),
                        format!("Failed to serialize payload: {e}"),
                    )
                    .await;
            }
        };
        let signature_value = format!(
            "{}{}",
            signature::SIGNATURE_PREFIX,
            signature::compute_signature(&payload_bytes, &webhook.secret)
        );

        let headers = build_request_headers(&webhook, &signature_value);
        let request_headers_json = serde_json::Value::Object(headers_to_map(&headers));

        // Persist the exact URL and headers before the attempt
        let Some(delivery) = WebhookDelivery::update_status(
            &self.pool,
            delivery.id,
            DeliveryStatus::Sending,
            DeliveryUpdate {
                request_url: Some(webhook.url.clone()),
                request_headers: Some(request_headers_json),
                ..Default::default()
            },
        )
        .await?
        else {
            // A concurrent execution finished this delivery between the
            // load and the transition
            return Ok(DispatchOutcome::Skipped {
                reason: "completed concurrently",
            });
        };

        let timeout = std::time::Duration::from_secs(webhook.timeout_seconds.max(1) as u64);

        let start = Instant::now();
        let result = self
            .http_client
            .post(&webhook.url)
            .headers(headers)
            .timeout(timeout)
            .body(payload_bytes)
            .send()
            .await;
        let latency_ms = start.elapsed().as_millis() as i64;

        match result {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let response_headers = serde_json::Value::Object(headers_to_map(response.headers()));
                let body = response.text().await.unwrap_or_default();

                let details = DeliveryUpdate {
                    response_status_code: Some(i32::from(status_code)),
                    response_body: Some(body),
                    response_headers: Some(response_headers),
                    ..Default::default()
                };

                if (200..300).contains(&status_code) {
                    self.complete_success(&delivery, status_code, latency_ms, details)
                        .await
                } else {
                    self.handle_transient_failure(&delivery, details, format!("HTTP {status_code}"))
                        .await
                }
            }
            Err(e) => {
                let error_message = if e.is_timeout() {
                    format!("Request timeout ({}s)", webhook.timeout_seconds)
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };

                self.handle_transient_failure(&delivery, DeliveryUpdate::default(), error_message)
                    .await
            }
        }
    }

    /// Terminally fail a delivery that cannot be sent at all.
    ///
    /// Config faults are not retried.
    async fn fail_fast(
        &self,
        delivery: &WebhookDelivery,
        reason: &str,
    ) -> Result<DispatchOutcome, sqlx::Error> {
        tracing::warn!(
            target: "webhook_delivery",
            delivery_id = %delivery.id,
            webhook_id = %delivery.webhook_id,
            event_type = %delivery.event_type,
            reason,
            "Webhook delivery failed fast"
        );

        WebhookDelivery::update_status(
            &self.pool,
            delivery.id,
            DeliveryStatus::Failed,
            DeliveryUpdate {
                error_message: Some(reason.to_string()),
                ..Default::default()
            },
        )
        .await?;

        Ok(DispatchOutcome::Failed {
            reason: reason.to_string(),
        })
    }

    /// Record a successful attempt.
    async fn complete_success(
        &self,
        delivery: &WebhookDelivery,
        status_code: u16,
        latency_ms: i64,
        details: DeliveryUpdate,
    ) -> Result<DispatchOutcome, sqlx::Error> {
        let updated =
            WebhookDelivery::update_status(&self.pool, delivery.id, DeliveryStatus::Success, details)
                .await?;
        let attempt_count = updated.map_or(delivery.attempt_count + 1, |d| d.attempt_count);

        tracing::info!(
            target: "webhook_delivery",
            delivery_id = %delivery.id,
            webhook_id = %delivery.webhook_id,
            event_type = %delivery.event_type,
            response_code = status_code,
            latency_ms,
            attempt_count,
            "Webhook delivery succeeded"
        );

        Ok(DispatchOutcome::Succeeded {
            attempt_count,
            status_code,
        })
    }

    /// Retry-or-fail branch for a transient failure.
    ///
    /// All transient faults (non-2xx, timeout, connection error, anything
    /// unexpected) take the same path: terminal `failed` once the budget is
    /// spent, otherwise an exponential-backoff retry with the failure
    /// details persisted as context.
    async fn handle_transient_failure(
        &self,
        delivery: &WebhookDelivery,
        mut details: DeliveryUpdate,
        error_message: String,
    ) -> Result<DispatchOutcome, sqlx::Error> {
        details.error_message = Some(error_message.clone());

        let next_attempt = delivery.attempt_count + 1;
        if next_attempt >= delivery.max_attempts {
            tracing::warn!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                webhook_id = %delivery.webhook_id,
                event_type = %delivery.event_type,
                error = %error_message,
                attempt_count = next_attempt,
                "Webhook delivery failed; attempt budget exhausted"
            );
            WebhookDelivery::update_status(&self.pool, delivery.id, DeliveryStatus::Failed, details)
                .await?;
            return Ok(DispatchOutcome::Failed {
                reason: error_message,
            });
        }

        let delay_seconds = retry_delay_seconds(
            self.initial_retry_delay_secs,
            self.backoff_factor,
            delivery.attempt_count,
        );

        // Increment first: the row leaves `sending` atomically and its
        // future next_retry_at keeps the sweep away until it is due
        let updated =
            match WebhookDelivery::increment_attempt(&self.pool, delivery.id, delay_seconds).await? {
                Some(updated) => updated,
                None => {
                    // Lost a race to the attempt bound or a terminal
                    // transition; close the row out instead of leaving it
                    // dangling
                    WebhookDelivery::update_status(
                        &self.pool,
                        delivery.id,
                        DeliveryStatus::Failed,
                        details,
                    )
                    .await?;
                    return Ok(DispatchOutcome::Failed {
                        reason: error_message,
                    });
                }
            };
        WebhookDelivery::update_status(&self.pool, delivery.id, DeliveryStatus::Retrying, details)
            .await?;

        tracing::warn!(
            target: "webhook_delivery",
            delivery_id = %delivery.id,
            webhook_id = %delivery.webhook_id,
            event_type = %delivery.event_type,
            error = %error_message,
            attempt_count = updated.attempt_count,
            retry_in_secs = delay_seconds,
            "Webhook delivery failed; retry scheduled"
        );

        Ok(DispatchOutcome::RetryScheduled {
            attempt_count: updated.attempt_count,
            delay_seconds,
        })
    }
}

/// Exponential backoff delay before the next attempt, in whole seconds.
///
/// `initial * factor^attempt_count`, rounded to whole seconds, where
/// `attempt_count` is the number of attempts already made. Defaults yield
/// 60s, 120s, 240s, 480s.
#[must_use]
pub fn retry_delay_seconds(initial_delay_secs: i64, backoff_factor: f64, attempt_count: i32) -> i64 {
    let delay = initial_delay_secs as f64 * backoff_factor.powi(attempt_count);
    delay.round() as i64
}

/// Build the outgoing header set for a delivery.
///
/// Custom webhook headers come first; the dispatcher-owned Content-Type and
/// signature headers are inserted last so they always win.
fn build_request_headers(webhook: &Webhook, signature_value: &str) -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();

    if let Some(custom) = webhook.headers.as_object() {
        for (name, value) in custom {
            if is_reserved_header(name) {
                tracing::warn!(
                    target: "webhook_delivery",
                    webhook_id = %webhook.id,
                    header = %name,
                    "Ignoring custom header that shadows a reserved header"
                );
                continue;
            }
            let Some(value) = value.as_str() else {
                tracing::warn!(
                    target: "webhook_delivery",
                    webhook_id = %webhook.id,
                    header = %name,
                    "Skipping non-string custom header value"
                );
                continue;
            };
            match (
                name.parse::<reqwest::header::HeaderName>(),
                value.parse::<reqwest::header::HeaderValue>(),
            ) {
                (Ok(parsed_name), Ok(parsed_value)) => {
                    headers.insert(parsed_name, parsed_value);
                }
                _ => {
                    tracing::warn!(
                        target: "webhook_delivery",
                        webhook_id = %webhook.id,
                        header = %name,
                        "Skipping invalid custom header"
                    );
                }
            }
        }
    }

    if let Ok(v) = "application/json".parse() {
        headers.insert("Content-Type", v);
    }
    if let Ok(v) = signature_value.parse() {
        headers.insert(signature::SIGNATURE_HEADER, v);
    }

    headers
}

/// Whether a header name is owned by the dispatcher.
fn is_reserved_header(name: &str) -> bool {
    RESERVED_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Convert a reqwest HeaderMap to a JSON-serializable map.
fn headers_to_map(
    headers: &reqwest::header::HeaderMap,
) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            map.insert(name.to_string(), serde_json::Value::String(v.to_string()));
        }
    }
    map
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
