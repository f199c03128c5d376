//! `WebhookEventSubscription` model: a (webhook, event type) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription of one webhook to one event type.
///
/// At most one row exists per (webhook, event_type); re-subscribing
/// reactivates the existing row instead of duplicating it, so delivery
/// history stays linked across deactivation cycles.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEventSubscription {
    /// Primary key.
    pub id: Uuid,
    /// Owning webhook.
    pub webhook_id: Uuid,
    /// Free-form event type string, e.g. `user.created`.
    pub event_type: String,
    /// Inactive subscriptions are excluded from fan-out.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl WebhookEventSubscription {
    /// Subscribe a webhook to an event type.
    ///
    /// Upsert: reactivates the existing row when the pair already exists.
    pub async fn subscribe(
        pool: &sqlx::PgPool,
        webhook_id: Uuid,
        event_type: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO webhook_event_subscriptions (webhook_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (webhook_id, event_type)
            DO UPDATE SET is_active = TRUE
            RETURNING *
            ",
        )
        .bind(webhook_id)
        .bind(event_type)
        .fetch_one(pool)
        .await
    }

    /// Remove a subscription row entirely.
    ///
    /// Returns true if a row was removed.
    pub async fn remove(
        pool: &sqlx::PgPool,
        webhook_id: Uuid,
        event_type: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM webhook_event_subscriptions
            WHERE webhook_id = $1 AND event_type = $2
            ",
        )
        .bind(webhook_id)
        .bind(event_type)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip the active flag without deleting history linkage.
    ///
    /// Returns `None` if no such subscription exists.
    pub async fn set_active(
        pool: &sqlx::PgPool,
        webhook_id: Uuid,
        event_type: &str,
        is_active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE webhook_event_subscriptions
            SET is_active = $3
            WHERE webhook_id = $1 AND event_type = $2
            RETURNING *
            ",
        )
        .bind(webhook_id)
        .bind(event_type)
        .bind(is_active)
        .fetch_optional(pool)
        .await
    }

    /// List all subscriptions of a webhook.
    pub async fn list_for_webhook(
        pool: &sqlx::PgPool,
        webhook_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_event_subscriptions
            WHERE webhook_id = $1
            ORDER BY event_type
            ",
        )
        .bind(webhook_id)
        .fetch_all(pool)
        .await
    }
}
