//! Business logic services for the webhook system.

pub mod delivery_service;
pub mod dispatch_queue;
pub mod trigger_service;
pub mod webhook_service;
