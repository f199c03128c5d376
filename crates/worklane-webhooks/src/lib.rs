//! Webhook delivery and retry engine for Worklane events.
//!
//! Provides webhook endpoint management, event fan-out to subscribers,
//! async delivery with HMAC-SHA256 signing, exponential backoff retries,
//! and a per-delivery audit trail.

pub mod error;
pub mod event_types;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod signature;
pub mod validation;
pub mod worker;

pub use error::WebhookError;
pub use router::{webhooks_router, WebhooksState};
pub use services::delivery_service::{DeliveryService, DispatchOutcome};
pub use services::dispatch_queue::DispatchQueue;
pub use services::trigger_service::{TriggerResult, TriggerService};
pub use services::webhook_service::WebhookService;
pub use worker::{WebhookWorker, WorkerConfig};
