//! `Webhook` model: a registered outbound endpoint with its signing secret.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered outbound webhook endpoint.
///
/// The secret is generated server-side at creation and can be rotated
/// without changing the webhook identity. Deleting a webhook cascades to
/// its subscriptions and delivery history.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Webhook {
    /// Primary key.
    pub id: Uuid,
    /// Human-readable display name.
    pub name: String,
    /// Target URL for deliveries.
    pub url: String,
    /// HMAC signing secret, never derived from user input.
    pub secret: String,
    /// Inactive webhooks receive no deliveries.
    pub is_active: bool,
    /// Custom headers merged into each delivery request (JSON object).
    pub headers: serde_json::Value,
    /// Per-request timeout for deliveries to this endpoint.
    pub timeout_seconds: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to register a new webhook.
#[derive(Debug, Clone)]
pub struct CreateWebhook {
    pub name: String,
    pub url: String,
    pub secret: String,
    pub is_active: bool,
    pub headers: serde_json::Value,
    pub timeout_seconds: i32,
}

/// Partial update: `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateWebhook {
    pub name: Option<String>,
    pub url: Option<String>,
    pub is_active: Option<bool>,
    pub headers: Option<serde_json::Value>,
    pub timeout_seconds: Option<i32>,
}

impl Webhook {
    /// Register a new webhook endpoint.
    pub async fn create(pool: &sqlx::PgPool, data: CreateWebhook) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO webhooks (name, url, secret, is_active, headers, timeout_seconds)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(&data.name)
        .bind(&data.url)
        .bind(&data.secret)
        .bind(data.is_active)
        .bind(&data.headers)
        .bind(data.timeout_seconds)
        .fetch_one(pool)
        .await
    }

    /// Find a webhook by id.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhooks WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// List webhooks, newest first.
    pub async fn list(
        pool: &sqlx::PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhooks
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Count all registered webhooks.
    pub async fn count(pool: &sqlx::PgPool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM webhooks
            ",
        )
        .fetch_one(pool)
        .await?;

        Ok(row.0)
    }

    /// Apply a partial update. Returns `None` if the webhook does not exist.
    pub async fn update(
        pool: &sqlx::PgPool,
        id: Uuid,
        data: UpdateWebhook,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE webhooks
            SET name = COALESCE($2, name),
                url = COALESCE($3, url),
                is_active = COALESCE($4, is_active),
                headers = COALESCE($5, headers),
                timeout_seconds = COALESCE($6, timeout_seconds),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(data.name.as_deref())
        .bind(data.url.as_deref())
        .bind(data.is_active)
        .bind(data.headers.as_ref())
        .bind(data.timeout_seconds)
        .fetch_optional(pool)
        .await
    }

    /// Replace the signing secret. Returns `None` if the webhook does not exist.
    pub async fn rotate_secret(
        pool: &sqlx::PgPool,
        id: Uuid,
        new_secret: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE webhooks
            SET secret = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(new_secret)
        .fetch_optional(pool)
        .await
    }

    /// Delete a webhook. Subscriptions and deliveries cascade.
    ///
    /// Returns true if a row was removed.
    pub async fn delete(pool: &sqlx::PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM webhooks WHERE id = $1
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Active webhooks with an active subscription to the event type.
    ///
    /// This join is the sole selection criterion for event fan-out.
    pub async fn list_active_subscribers(
        pool: &sqlx::PgPool,
        event_type: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT w.* FROM webhooks w
            JOIN webhook_event_subscriptions s ON s.webhook_id = w.id
            WHERE s.event_type = $1
              AND s.is_active = TRUE
              AND w.is_active = TRUE
            ORDER BY w.created_at
            ",
        )
        .bind(event_type)
        .fetch_all(pool)
        .await
    }
}
