//! Bounded queue feeding delivery ids to the dispatch worker.
//!
//! Producers (the trigger endpoint, manual retries, the retry sweep) enqueue
//! delivery ids without waiting for the HTTP attempt. Enqueueing is
//! fire-and-forget: when the queue is full or the worker is gone the id is
//! dropped with a warning, and the delivery row stays in a non-terminal
//! state where a later dispatch or a manual retry can pick it up again.

use uuid::Uuid;

/// Sending half of the dispatch channel.
#[derive(Clone)]
pub struct DispatchQueue {
    sender: tokio::sync::mpsc::Sender<Uuid>,
}

impl DispatchQueue {
    /// Create a dispatch queue with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<Uuid>) {
        let (sender, receiver) = tokio::sync::mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Enqueue a delivery for dispatch. Returns false if the id was dropped.
    pub fn enqueue(&self, delivery_id: Uuid) -> bool {
        match self.sender.try_send(delivery_id) {
            Ok(()) => true,
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    target: "webhook_delivery",
                    delivery_id = %delivery_id,
                    "Dispatch queue full; delivery stays queued in the store"
                );
                false
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(
                    target: "webhook_delivery",
                    delivery_id = %delivery_id,
                    "Dispatch queue closed; worker is not running"
                );
                false
            }
        }
    }
}
