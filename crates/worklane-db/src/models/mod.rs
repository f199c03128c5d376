//! Database entity models for worklane-db.
//!
//! These models represent the database tables and provide
//! type-safe interactions with PostgreSQL.

pub mod webhook;
pub mod webhook_delivery;
pub mod webhook_subscription;

pub use webhook::{CreateWebhook, UpdateWebhook, Webhook};
pub use webhook_delivery::{
    CreateWebhookDelivery, DeliveryFilter, DeliveryStats, DeliveryStatus, DeliveryUpdate,
    WebhookDelivery, DEFAULT_MAX_ATTEMPTS, RESPONSE_BODY_MAX_CHARS,
};
pub use webhook_subscription::WebhookEventSubscription;
