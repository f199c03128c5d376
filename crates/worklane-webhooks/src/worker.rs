//! Webhook delivery worker.
//!
//! Background task driving deliveries end to end: drains the dispatch
//! queue, sweeps due retries back in on a fixed interval, prunes old
//! delivery records, and handles graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::services::delivery_service::DeliveryService;
use worklane_db::models::WebhookDelivery;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of deliveries dispatched concurrently.
    pub concurrency: usize,

    /// How often to sweep for due retries (in seconds).
    pub retry_sweep_interval_secs: u64,

    /// How often to prune old delivery records (in seconds).
    pub cleanup_interval_secs: u64,

    /// Retention period for delivery records (in days).
    pub retention_days: i64,

    /// Maximum deliveries picked up per sweep.
    pub sweep_batch_size: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            retry_sweep_interval_secs: 60,
            cleanup_interval_secs: 86_400,
            retention_days: 30,
            sweep_batch_size: 100,
        }
    }
}

/// Background worker that executes webhook deliveries.
///
/// Consumes delivery ids from the dispatch queue and runs each through the
/// [`DeliveryService`], bounded by a concurrency semaphore. The retry sweep
/// re-submits deliveries whose `next_retry_at` has elapsed; the dispatcher's
/// own loading guards make duplicate submissions a safe no-op.
pub struct WebhookWorker {
    delivery_service: DeliveryService,
    receiver: mpsc::Receiver<Uuid>,
    shutdown: CancellationToken,
    config: WorkerConfig,
}

impl WebhookWorker {
    /// Create a new worker consuming the dispatch queue.
    #[must_use]
    pub fn new(
        delivery_service: DeliveryService,
        receiver: mpsc::Receiver<Uuid>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            delivery_service,
            receiver,
            shutdown,
            config: WorkerConfig::default(),
        }
    }

    /// Override the worker configuration.
    #[must_use]
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run until shutdown is requested, then drain in-flight deliveries.
    ///
    /// The first sweep fires immediately, so deliveries left in `retrying`
    /// by a previous process pick up right after startup.
    pub async fn run(mut self) {
        info!(
            target: "webhook_worker",
            concurrency = self.config.concurrency,
            retry_sweep_interval_secs = self.config.retry_sweep_interval_secs,
            "Starting webhook delivery worker"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut sweep_interval =
            interval(Duration::from_secs(self.config.retry_sweep_interval_secs));
        let mut cleanup_interval = interval(Duration::from_secs(self.config.cleanup_interval_secs));

        loop {
            tokio::select! {
                maybe_id = self.receiver.recv() => {
                    match maybe_id {
                        Some(delivery_id) => {
                            self.spawn_dispatch(delivery_id, &semaphore).await;
                        }
                        None => {
                            info!(target: "webhook_worker", "Dispatch queue closed, stopping worker");
                            break;
                        }
                    }
                }
                _ = sweep_interval.tick() => {
                    self.run_retry_sweep(&semaphore).await;
                }
                _ = cleanup_interval.tick() => {
                    self.run_cleanup().await;
                }
                () = self.shutdown.cancelled() => {
                    info!(target: "webhook_worker", "Worker shutdown requested");
                    break;
                }
            }
        }

        // Wait for in-flight deliveries to complete
        info!(target: "webhook_worker", "Waiting for in-flight deliveries to complete...");
        let _ = semaphore.acquire_many(self.config.concurrency as u32).await;
        info!(target: "webhook_worker", "Webhook delivery worker stopped");
    }

    /// Dispatch one delivery on a worker slot.
    ///
    /// Waits for a free slot, so queue consumption pauses while every slot
    /// is busy. Store errors from the dispatcher are logged, never fatal.
    async fn spawn_dispatch(&self, delivery_id: Uuid, semaphore: &Arc<Semaphore>) {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            return;
        };

        let service = self.delivery_service.clone();
        tokio::spawn(async move {
            let _permit = permit; // Hold permit until the dispatch completes
            if let Err(e) = service.dispatch_delivery(delivery_id).await {
                error!(
                    target: "webhook_worker",
                    delivery_id = %delivery_id,
                    error = %e,
                    "Dispatch failed to record its outcome"
                );
            }
        });
    }

    /// Pick up deliveries whose retry is due and dispatch them.
    async fn run_retry_sweep(&self, semaphore: &Arc<Semaphore>) {
        let due = match WebhookDelivery::pending_retries(
            self.delivery_service.pool(),
            self.config.sweep_batch_size,
        )
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!(target: "webhook_worker", error = %e, "Retry sweep query failed");
                return;
            }
        };

        if due.is_empty() {
            return;
        }

        debug!(
            target: "webhook_worker",
            count = due.len(),
            "Retry sweep picked up due deliveries"
        );

        for delivery in due {
            self.spawn_dispatch(delivery.id, semaphore).await;
        }
    }

    /// Prune delivery records older than the retention period.
    async fn run_cleanup(&self) {
        match WebhookDelivery::cleanup(self.delivery_service.pool(), self.config.retention_days)
            .await
        {
            Ok(count) if count > 0 => {
                info!(target: "webhook_worker", count = count, "Pruned old delivery records");
            }
            Ok(_) => {}
            Err(e) => {
                error!(target: "webhook_worker", error = %e, "Failed to prune old delivery records");
            }
        }
    }
}
