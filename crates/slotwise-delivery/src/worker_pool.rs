//! Worker pool management with structured concurrency.
//!
//! Supervises delivery worker tasks: spawn, health accounting in the shared
//! stats, and graceful shutdown bounded by a timeout.

use std::{sync::Arc, time::Duration};

use slotwise_core::{
    storage::{DeliveryLedger, SlotLedger},
    Clock,
};
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    client::WebhookClient,
    dispatcher::EndpointConfig,
    engine::{DeliveryConfig, DeliveryWorker, EngineStats},
    error::{DeliveryError, Result},
};

/// Worker pool that manages delivery worker tasks with supervision.
pub struct WorkerPool {
    delivery_ledger: Arc<dyn DeliveryLedger>,
    slot_ledger: Arc<dyn SlotLedger>,
    endpoint: EndpointConfig,
    config: DeliveryConfig,
    client: Arc<WebhookClient>,
    stats: Arc<RwLock<EngineStats>>,
    cancellation_token: CancellationToken,
    worker_handles: Vec<JoinHandle<Result<()>>>,
    clock: Arc<dyn Clock>,
}

impl WorkerPool {
    /// Creates a worker pool over shared engine state.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        delivery_ledger: Arc<dyn DeliveryLedger>,
        slot_ledger: Arc<dyn SlotLedger>,
        endpoint: EndpointConfig,
        config: DeliveryConfig,
        client: Arc<WebhookClient>,
        stats: Arc<RwLock<EngineStats>>,
        cancellation_token: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            delivery_ledger,
            slot_ledger,
            endpoint,
            config,
            client,
            stats,
            cancellation_token,
            worker_handles: Vec::new(),
            clock,
        }
    }

    /// Spawns all configured workers.
    ///
    /// Workers run until cancellation is requested. Returns immediately.
    ///
    /// # Errors
    ///
    /// Currently never fails; the signature allows future validation.
    pub async fn spawn_workers(&mut self) -> Result<()> {
        info!(worker_count = self.config.worker_count, "spawning delivery workers");

        {
            let mut stats = self.stats.write().await;
            stats.active_workers = self.config.worker_count;
        }

        for worker_id in 0..self.config.worker_count {
            let worker = DeliveryWorker::new(
                worker_id,
                self.delivery_ledger.clone(),
                self.slot_ledger.clone(),
                self.endpoint.clone(),
                self.config.clone(),
                self.client.clone(),
                self.stats.clone(),
                self.cancellation_token.clone(),
                self.clock.clone(),
            );

            let handle = tokio::spawn(async move {
                let result = worker.run().await;
                if let Err(ref error) = result {
                    error!(worker_id, error = %error, "delivery worker terminated with error");
                }
                result
            });

            self.worker_handles.push(handle);
        }

        info!(spawned_workers = self.worker_handles.len(), "delivery workers spawned");
        Ok(())
    }

    /// Gracefully shuts down all workers within the timeout.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` when workers do not finish in time.
    pub async fn shutdown_graceful(mut self, timeout: Duration) -> Result<()> {
        info!(
            worker_count = self.worker_handles.len(),
            timeout_seconds = timeout.as_secs(),
            "initiating graceful worker shutdown"
        );

        self.cancellation_token.cancel();

        let shutdown_future = async {
            let mut errors = 0usize;

            for (worker_id, handle) in
                std::mem::take(&mut self.worker_handles).into_iter().enumerate()
            {
                match handle.await {
                    Ok(Ok(())) => {},
                    Ok(Err(error)) => {
                        warn!(worker_id, error = %error, "worker completed with error during shutdown");
                        errors += 1;
                    },
                    Err(join_error) => {
                        let panic = DeliveryError::WorkerPanic {
                            worker_id,
                            message: join_error.to_string(),
                        };
                        error!(worker_id, error = %panic, "worker task died during shutdown");
                        errors += 1;
                    },
                }
            }

            {
                let mut stats = self.stats.write().await;
                stats.active_workers = 0;
            }

            errors
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(errors) => {
                if errors > 0 {
                    warn!(errors, "some workers completed with errors during shutdown");
                }
                info!("worker pool shutdown completed");
                Ok(())
            },
            Err(_elapsed) => {
                error!(
                    timeout_seconds = timeout.as_secs(),
                    "worker shutdown timed out, some workers may still be running"
                );
                Err(DeliveryError::ShutdownTimeout { timeout })
            },
        }
    }

    /// Checks whether any workers are still running.
    pub fn has_active_workers(&self) -> bool {
        self.worker_handles.iter().any(|h| !h.is_finished())
    }

    /// Clock shared with the workers.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.worker_handles.is_empty() {
            return;
        }

        let active = self.worker_handles.iter().filter(|h| !h.is_finished()).count();
        if active > 0 && !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
            warn!(
                active_workers = active,
                "WorkerPool dropped without graceful shutdown, cancelling workers"
            );
        }
    }
}
