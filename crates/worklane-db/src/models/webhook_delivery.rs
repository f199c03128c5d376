//! `WebhookDelivery` model: one attempted transmission of one event to one webhook.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

/// Default attempt bound for new deliveries.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Response bodies are truncated to this many characters before storage
/// to bound row size.
pub const RESPONSE_BODY_MAX_CHARS: usize = 10_000;

/// Delivery lifecycle state.
///
/// `pending → sending → {success | failed | retrying}`; `retrying` re-enters
/// `sending` on the next attempt. `success` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created, waiting for a first dispatch.
    Pending,
    /// An HTTP attempt is in flight.
    Sending,
    /// Delivered with a 2xx response.
    Success,
    /// Exhausted or abandoned; no further attempts.
    Failed,
    /// Waiting for `next_retry_at` to elapse.
    Retrying,
}

impl DeliveryStatus {
    /// Whether this state permits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Failed)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sending => write!(f, "sending"),
            DeliveryStatus::Success => write!(f, "success"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Retrying => write!(f, "retrying"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "sending" => Ok(DeliveryStatus::Sending),
            "success" => Ok(DeliveryStatus::Success),
            "failed" => Ok(DeliveryStatus::Failed),
            "retrying" => Ok(DeliveryStatus::Retrying),
            _ => Err(format!("Unknown delivery status: {s}")),
        }
    }
}

/// One delivery attempt lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WebhookDelivery {
    pub id: Uuid,
    /// Owning webhook (read reference; the webhook owns this row).
    pub webhook_id: Uuid,
    pub event_type: String,
    /// Optional external event identifier supplied by the trigger caller.
    pub event_id: Option<String>,
    /// Event payload as delivered (raw JSON object, not enveloped).
    pub payload: serde_json::Value,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    /// HTTP status of the most recent attempt, if any response arrived.
    pub response_status_code: Option<i32>,
    pub response_body: Option<String>,
    pub response_headers: Option<serde_json::Value>,
    pub error_message: Option<String>,
    /// Exact URL the last attempt was sent to.
    pub request_url: Option<String>,
    /// Exact headers the last attempt was sent with.
    pub request_headers: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    /// Get the status enum.
    #[must_use]
    pub fn status(&self) -> DeliveryStatus {
        self.status.parse().unwrap_or(DeliveryStatus::Pending)
    }
}

/// Data needed to create a new delivery record.
#[derive(Debug, Clone)]
pub struct CreateWebhookDelivery {
    pub webhook_id: Uuid,
    pub event_type: String,
    pub event_id: Option<String>,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
}

/// Attempt details recorded alongside a status transition.
///
/// `None` fields keep whatever the row already holds.
#[derive(Debug, Clone, Default)]
pub struct DeliveryUpdate {
    pub response_status_code: Option<i32>,
    pub response_body: Option<String>,
    pub response_headers: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub request_url: Option<String>,
    pub request_headers: Option<serde_json::Value>,
}

/// Optional filters for delivery listings.
#[derive(Debug, Clone, Default)]
pub struct DeliveryFilter {
    pub webhook_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
}

/// Aggregate delivery counts for one webhook over a day window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    /// Non-terminal rows: pending, sending, or retrying.
    pub pending: i64,
    /// `successful / total * 100`, 0 when the window is empty.
    pub success_rate: f64,
}

impl WebhookDelivery {
    /// Create a delivery in `pending` with zero attempts.
    pub async fn create(
        pool: &PgPool,
        data: CreateWebhookDelivery,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO webhook_deliveries (webhook_id, event_type, event_id, payload, max_attempts)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(data.webhook_id)
        .bind(&data.event_type)
        .bind(data.event_id.as_deref())
        .bind(&data.payload)
        .bind(data.max_attempts)
        .fetch_one(pool)
        .await
    }

    /// Find a delivery by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_deliveries WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// List deliveries, newest first, with optional webhook/status filters.
    pub async fn list(
        pool: &PgPool,
        filter: &DeliveryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_deliveries
            WHERE ($1::uuid IS NULL OR webhook_id = $1)
              AND ($2::varchar IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(filter.webhook_id)
        .bind(filter.status.map(|s| s.to_string()))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Count deliveries matching the filter.
    pub async fn count(pool: &PgPool, filter: &DeliveryFilter) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM webhook_deliveries
            WHERE ($1::uuid IS NULL OR webhook_id = $1)
              AND ($2::varchar IS NULL OR status = $2)
            ",
        )
        .bind(filter.webhook_id)
        .bind(filter.status.map(|s| s.to_string()))
        .fetch_one(pool)
        .await?;

        Ok(row.0)
    }

    /// Transition a delivery and record attempt details in one UPDATE.
    ///
    /// Entering `sending` stamps `sent_at`. Entering a terminal state stamps
    /// `completed_at`, clears `next_retry_at`, and counts the attempt when
    /// the row was in `sending`; fail-fast transitions that never reached
    /// the wire keep their count. Terminal rows never transition again.
    /// The response body is truncated to [`RESPONSE_BODY_MAX_CHARS`] before
    /// storage. Returns `None` when the delivery does not exist or is
    /// already terminal.
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: DeliveryStatus,
        update: DeliveryUpdate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let body = update.response_body.map(|b| truncate_response_body(&b));

        sqlx::query_as(
            r"
            UPDATE webhook_deliveries
            SET status = $2,
                attempt_count = CASE
                    WHEN $2 IN ('success', 'failed') AND status = 'sending'
                    THEN attempt_count + 1
                    ELSE attempt_count
                END,
                response_status_code = COALESCE($3, response_status_code),
                response_body = COALESCE($4, response_body),
                response_headers = COALESCE($5, response_headers),
                error_message = COALESCE($6, error_message),
                request_url = COALESCE($7, request_url),
                request_headers = COALESCE($8, request_headers),
                sent_at = CASE WHEN $2 = 'sending' THEN NOW() ELSE sent_at END,
                next_retry_at = CASE WHEN $2 IN ('success', 'failed') THEN NULL ELSE next_retry_at END,
                completed_at = CASE WHEN $2 IN ('success', 'failed') THEN NOW() ELSE completed_at END
            WHERE id = $1
              AND status NOT IN ('success', 'failed')
            RETURNING *
            ",
        )
        .bind(id)
        .bind(status.to_string())
        .bind(update.response_status_code)
        .bind(body)
        .bind(update.response_headers.as_ref())
        .bind(update.error_message.as_deref())
        .bind(update.request_url.as_deref())
        .bind(update.request_headers.as_ref())
        .fetch_optional(pool)
        .await
    }

    /// Record a failed attempt and schedule the next one.
    ///
    /// The increment happens in SQL so concurrent attempts cannot lose
    /// updates; the row moves to `retrying` with `next_retry_at` set to
    /// now + `retry_delay_seconds`. Guarded so `attempt_count` can never
    /// pass `max_attempts` and terminal rows never reopen. Returns `None`
    /// when the delivery is missing, terminal, or out of attempt budget.
    pub async fn increment_attempt(
        pool: &PgPool,
        id: Uuid,
        retry_delay_seconds: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let next_retry_at = Utc::now() + Duration::seconds(retry_delay_seconds);

        sqlx::query_as(
            r"
            UPDATE webhook_deliveries
            SET attempt_count = attempt_count + 1,
                status = 'retrying',
                next_retry_at = $2
            WHERE id = $1
              AND status NOT IN ('success', 'failed')
              AND attempt_count < max_attempts
            RETURNING *
            ",
        )
        .bind(id)
        .bind(next_retry_at)
        .fetch_optional(pool)
        .await
    }

    /// Deliveries due for another attempt, oldest due first.
    ///
    /// Returns rows in `retrying` whose `next_retry_at` has elapsed and
    /// whose attempt budget is not exhausted. Terminal rows never match.
    pub async fn pending_retries(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_deliveries
            WHERE status = 'retrying'
              AND next_retry_at <= NOW()
              AND attempt_count < max_attempts
            ORDER BY next_retry_at
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Reset a delivery for a manual retry.
    ///
    /// Guarded in SQL: only rows that are not `success` and still have
    /// attempt budget are reset. Returns `None` when the row is missing or
    /// ineligible; callers that need to distinguish load the row first.
    pub async fn reset_for_retry(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE webhook_deliveries
            SET attempt_count = 0,
                status = 'pending',
                next_retry_at = NULL,
                completed_at = NULL
            WHERE id = $1
              AND status <> 'success'
              AND attempt_count < max_attempts
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Aggregate counts for one webhook within the last `window_days` days.
    pub async fn stats(
        pool: &PgPool,
        webhook_id: Uuid,
        window_days: i32,
    ) -> Result<DeliveryStats, sqlx::Error> {
        let row: (i64, i64, i64, i64) = sqlx::query_as(
            r"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'success'),
                   COUNT(*) FILTER (WHERE status = 'failed'),
                   COUNT(*) FILTER (WHERE status IN ('pending', 'sending', 'retrying'))
            FROM webhook_deliveries
            WHERE webhook_id = $1
              AND created_at >= NOW() - make_interval(days => $2)
            ",
        )
        .bind(webhook_id)
        .bind(window_days)
        .fetch_one(pool)
        .await?;

        let (total, successful, failed, pending) = row;
        let success_rate = if total > 0 {
            successful as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Ok(DeliveryStats {
            total,
            successful,
            failed,
            pending,
            success_rate,
        })
    }

    /// Bulk-delete deliveries created before the retention cutoff.
    ///
    /// Returns the number of rows removed.
    pub async fn cleanup(pool: &PgPool, older_than_days: i64) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now() - Duration::days(older_than_days);

        let result = sqlx::query(
            r"
            DELETE FROM webhook_deliveries
            WHERE created_at < $1
            ",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Truncate a response body to the storage cap, respecting char boundaries.
fn truncate_response_body(body: &str) -> String {
    if body.chars().count() <= RESPONSE_BODY_MAX_CHARS {
        body.to_string()
    } else {
        body.chars().take(RESPONSE_BODY_MAX_CHARS).collect()
    }
}
