//! HTTP handlers for the webhook API.

pub mod deliveries;
pub mod events;
pub mod subscriptions;
pub mod webhooks;
