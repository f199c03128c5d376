//! Persistence layer for the Worklane webhook delivery engine.
//!
//! Provides the connection pool, embedded migrations, and the three
//! webhook tables as model types:
//!
//! - [`models::Webhook`] — registered endpoints with signing secrets
//! - [`models::WebhookEventSubscription`] — (webhook, event type) pairs
//! - [`models::WebhookDelivery`] — per-event delivery lifecycle records

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
