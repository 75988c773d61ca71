//! Delivery engine with worker pool and reliability guarantees.
//!
//! Workers claim due records from the delivery ledger (a lock-scoped
//! `Queued -> Sending` transition), sign and POST the stored snapshot, and
//! classify the outcome. Retries are scheduled through `next_attempt_at`,
//! never by blocking a worker.
//!
//! ```text
//! ┌────────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ DeliveryEngine │──▶│ Worker Pool  │──▶│ WebhookClient │
//! └────────────────┘   └──────────────┘   └───────────────┘
//!        │                   │                    │
//!        ▼                   ▼                    ▼
//! ┌────────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ DeliveryLedger │   │ RetryPolicy  │   │ Automation    │
//! │ (due queue)    │   │ (backoff)    │   │ endpoint      │
//! └────────────────┘   └──────────────┘   └───────────────┘
//! ```

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use slotwise_core::{
    storage::{AttemptOutcome, DeliveryLedger, SlotLedger},
    Clock, DeliveryRecord, DeliveryStatus,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    client::{ClientConfig, WebhookClient, WebhookRequest, WebhookResponse},
    crypto,
    dispatcher::EndpointConfig,
    error::{DeliveryError, Result},
    retry::{RetryDecision, RetryPolicy},
    worker_pool::WorkerPool,
};

/// Configuration for the delivery engine.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Number of concurrent delivery workers.
    pub worker_count: usize,

    /// Maximum records to claim per worker batch.
    pub batch_size: usize,

    /// How often workers poll for due records.
    pub poll_interval: Duration,

    /// HTTP client configuration.
    pub client_config: ClientConfig,

    /// Retry policy applied to transient failures.
    pub retry_policy: RetryPolicy,

    /// Maximum time to wait for workers during graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::DEFAULT_WORKER_COUNT,
            batch_size: crate::DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_secs(1),
            client_config: ClientConfig::default(),
            retry_policy: RetryPolicy::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Statistics for delivery engine monitoring.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Number of active delivery workers.
    pub active_workers: usize,
    /// Total records processed since startup.
    pub records_processed: u64,
    /// Terminal delivery successes.
    pub successful_deliveries: u64,
    /// Failed attempts (scheduled for retry or terminal).
    pub failed_deliveries: u64,
    /// Records that exhausted their retries or hit a permanent error.
    pub permanent_failures: u64,
    /// Records currently being delivered.
    pub in_flight_deliveries: u64,
}

/// Main delivery engine coordinating webhook delivery workers.
pub struct DeliveryEngine {
    delivery_ledger: Arc<dyn DeliveryLedger>,
    slot_ledger: Arc<dyn SlotLedger>,
    endpoint: EndpointConfig,
    config: DeliveryConfig,
    client: Arc<WebhookClient>,
    stats: Arc<RwLock<EngineStats>>,
    cancellation_token: CancellationToken,
    worker_pool: Option<WorkerPool>,
    clock: Arc<dyn Clock>,
}

impl DeliveryEngine {
    /// Creates a delivery engine.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be initialized.
    pub fn new(
        delivery_ledger: Arc<dyn DeliveryLedger>,
        slot_ledger: Arc<dyn SlotLedger>,
        endpoint: EndpointConfig,
        config: DeliveryConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = Arc::new(WebhookClient::new(config.client_config.clone())?);

        Ok(Self {
            delivery_ledger,
            slot_ledger,
            endpoint,
            config,
            client,
            stats: Arc::new(RwLock::new(EngineStats::default())),
            cancellation_token: CancellationToken::new(),
            worker_pool: None,
            clock,
        })
    }

    /// Starts the configured worker pool.
    ///
    /// Returns immediately after spawning workers. Use `shutdown()` to stop
    /// gracefully.
    ///
    /// # Errors
    ///
    /// Returns error if the worker pool fails to spawn.
    pub async fn start(&mut self) -> Result<()> {
        info!(
            worker_count = self.config.worker_count,
            batch_size = self.config.batch_size,
            "starting webhook delivery engine"
        );

        let mut worker_pool = WorkerPool::new(
            self.delivery_ledger.clone(),
            self.slot_ledger.clone(),
            self.endpoint.clone(),
            self.config.clone(),
            self.client.clone(),
            self.stats.clone(),
            self.cancellation_token.clone(),
            self.clock.clone(),
        );

        worker_pool.spawn_workers().await?;
        self.worker_pool = Some(worker_pool);

        info!("delivery engine started");
        Ok(())
    }

    /// Gracefully shuts down the engine, letting in-flight deliveries finish
    /// within the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns error if workers fail to join before the deadline.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("shutting down delivery engine");

        if let Some(worker_pool) = self.worker_pool.take() {
            worker_pool.shutdown_graceful(self.config.shutdown_timeout).await?;
        } else {
            info!("delivery engine was not started, nothing to shut down");
        }
        Ok(())
    }

    /// Returns current engine statistics.
    pub async fn stats(&self) -> EngineStats {
        self.stats.read().await.clone()
    }

    /// Processes exactly one batch of due records synchronously.
    ///
    /// For tests and controlled draining: claims one batch, processes it,
    /// and returns the number of records handled without starting persistent
    /// workers.
    ///
    /// # Errors
    ///
    /// Returns error if claiming fails.
    pub async fn process_batch(&self) -> Result<usize> {
        let worker = DeliveryWorker::new(
            0,
            self.delivery_ledger.clone(),
            self.slot_ledger.clone(),
            self.endpoint.clone(),
            self.config.clone(),
            self.client.clone(),
            self.stats.clone(),
            self.cancellation_token.clone(),
            self.clock.clone(),
        );

        worker.process_batch().await
    }
}

/// Individual worker that processes webhook deliveries.
pub struct DeliveryWorker {
    id: usize,
    delivery_ledger: Arc<dyn DeliveryLedger>,
    slot_ledger: Arc<dyn SlotLedger>,
    endpoint: EndpointConfig,
    config: DeliveryConfig,
    client: Arc<WebhookClient>,
    stats: Arc<RwLock<EngineStats>>,
    cancellation_token: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl DeliveryWorker {
    /// Creates a delivery worker.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
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
            id,
            delivery_ledger,
            slot_ledger,
            endpoint,
            config,
            client,
            stats,
            cancellation_token,
            clock,
        }
    }

    /// Main worker loop. Claims and processes records until cancelled.
    ///
    /// # Errors
    ///
    /// Returns error only if worker setup fails; batch errors are logged and
    /// retried after a pause.
    pub async fn run(&self) -> Result<()> {
        info!(worker_id = self.id, "delivery worker starting");

        loop {
            if self.cancellation_token.is_cancelled() {
                info!(worker_id = self.id, "delivery worker received shutdown signal");
                break;
            }

            match self.process_batch().await {
                Ok(0) => {
                    tokio::select! {
                        () = self.clock.sleep(self.config.poll_interval) => {}
                        () = self.cancellation_token.cancelled() => break,
                    }
                },
                Ok(_) => {},
                Err(e) => {
                    error!(worker_id = self.id, error = %e, "worker batch processing failed");
                    // Pause so a broken ledger does not become a hot loop.
                    tokio::select! {
                        () = self.clock.sleep(Duration::from_secs(5)) => {}
                        () = self.cancellation_token.cancelled() => break,
                    }
                },
            }
        }

        info!(worker_id = self.id, "delivery worker stopped");
        Ok(())
    }

    /// Claims and processes one batch of due records.
    ///
    /// # Errors
    ///
    /// Returns error if the claim query fails.
    pub async fn process_batch(&self) -> Result<usize> {
        let now = self.clock.now();
        let records = self
            .delivery_ledger
            .claim_due(self.config.batch_size, now)
            .await
            .map_err(|e| DeliveryError::database(format!("failed to claim due records: {e}")))?;
        let batch_size = records.len();

        debug!(worker_id = self.id, batch_size, "processing delivery batch");

        for record in records {
            if self.cancellation_token.is_cancelled() {
                break;
            }
            self.process_record(record).await;
        }

        Ok(batch_size)
    }

    /// Runs one claimed record through sign, POST, classify.
    async fn process_record(&self, record: DeliveryRecord) {
        {
            let mut stats = self.stats.write().await;
            stats.in_flight_deliveries += 1;
        }

        let outcome = self.attempt_delivery(&record).await;

        {
            let mut stats = self.stats.write().await;
            stats.in_flight_deliveries -= 1;
            stats.records_processed += 1;
        }

        if let Err(e) = outcome {
            error!(
                worker_id = self.id,
                record_id = %record.id,
                error = %e,
                "delivery bookkeeping failed"
            );
        }
    }

    async fn attempt_delivery(&self, record: &DeliveryRecord) -> Result<()> {
        let Some(url) = self.endpoint.url.clone() else {
            // Endpoint was unset after this record queued. Permanent until an
            // operator intervenes.
            self.apply_outcome(
                record,
                DeliveryStatus::Failed,
                None,
                None,
                Some("no webhook endpoint configured".to_string()),
                None,
            )
            .await?;
            return Ok(());
        };

        let body = serde_json::to_vec(&record.payload).map_err(|e| {
            DeliveryError::configuration(format!("payload snapshot unserializable: {e}"))
        })?;
        let signature = crypto::signature_header_value(&body, &self.endpoint.secret);

        let request = WebhookRequest {
            url,
            body: Bytes::from(body),
            idempotency_key: record.idempotency_key.clone(),
            signature_header: self.endpoint.signature_header.clone(),
            signature,
        };

        let attempts_made = record.attempts + 1;

        debug!(
            worker_id = self.id,
            record_id = %record.id,
            attempt = attempts_made,
            "attempting webhook delivery"
        );

        match self.client.post(request).await {
            Ok(response) if response.is_success => {
                self.handle_success(record, &response).await
            },
            Ok(response) if (400..500).contains(&response.status_code) => {
                self.handle_permanent_failure(record, &response).await
            },
            Ok(response) => {
                let err = DeliveryError::server_error(response.status_code, response.body.clone());
                self.handle_transient_failure(record, attempts_made, Some(&response), err).await
            },
            Err(err) => self.handle_transient_failure(record, attempts_made, None, err).await,
        }
    }

    async fn handle_success(
        &self,
        record: &DeliveryRecord,
        response: &WebhookResponse,
    ) -> Result<()> {
        self.apply_outcome(
            record,
            DeliveryStatus::Sent,
            Some(i32::from(response.status_code)),
            Some(response.body.clone()),
            None,
            None,
        )
        .await?;

        // Terminal success flips the appointment's delivery flag.
        if let Err(e) =
            self.slot_ledger.mark_event_sent(record.appointment_id, record.event_type).await
        {
            warn!(
                worker_id = self.id,
                appointment_id = %record.appointment_id,
                error = %e,
                "failed to set appointment delivery flag"
            );
        }

        {
            let mut stats = self.stats.write().await;
            stats.successful_deliveries += 1;
        }

        info!(
            worker_id = self.id,
            record_id = %record.id,
            status_code = response.status_code,
            "webhook delivered"
        );
        Ok(())
    }

    async fn handle_permanent_failure(
        &self,
        record: &DeliveryRecord,
        response: &WebhookResponse,
    ) -> Result<()> {
        let err = DeliveryError::client_error(response.status_code, response.body.clone());

        self.apply_outcome(
            record,
            DeliveryStatus::Failed,
            Some(i32::from(response.status_code)),
            Some(response.body.clone()),
            Some(err.to_string()),
            None,
        )
        .await?;

        {
            let mut stats = self.stats.write().await;
            stats.failed_deliveries += 1;
            stats.permanent_failures += 1;
        }

        error!(
            worker_id = self.id,
            record_id = %record.id,
            status_code = response.status_code,
            "delivery failed permanently, client error is not recoverable by repetition"
        );
        Ok(())
    }

    async fn handle_transient_failure(
        &self,
        record: &DeliveryRecord,
        attempts_made: u32,
        response: Option<&WebhookResponse>,
        err: DeliveryError,
    ) -> Result<()> {
        let response_code = response.map(|r| i32::from(r.status_code));
        let response_body = response.map(|r| r.body.clone());

        {
            let mut stats = self.stats.write().await;
            stats.failed_deliveries += 1;
        }

        match self.config.retry_policy.decide(attempts_made, self.clock.now()) {
            RetryDecision::Retry { next_attempt_at } => {
                self.apply_outcome(
                    record,
                    DeliveryStatus::Queued,
                    response_code,
                    response_body,
                    Some(err.to_string()),
                    Some(next_attempt_at),
                )
                .await?;

                warn!(
                    worker_id = self.id,
                    record_id = %record.id,
                    attempt = attempts_made,
                    next_retry_at = %next_attempt_at,
                    error = %err,
                    "delivery failed, retry scheduled"
                );
            },
            RetryDecision::GiveUp { reason } => {
                let exhausted = DeliveryError::retries_exhausted(attempts_made);
                self.apply_outcome(
                    record,
                    DeliveryStatus::Failed,
                    response_code,
                    response_body,
                    Some(format!("{exhausted}: {err}")),
                    None,
                )
                .await?;

                {
                    let mut stats = self.stats.write().await;
                    stats.permanent_failures += 1;
                }

                error!(
                    worker_id = self.id,
                    record_id = %record.id,
                    attempt = attempts_made,
                    reason = %reason,
                    error = %err,
                    "delivery permanently failed"
                );
            },
        }
        Ok(())
    }

    /// Applies one attempt outcome to the ledger.
    ///
    /// Each invocation of the delivery pipeline lands here exactly once per
    /// branch, which is where the attempts counter increments.
    async fn apply_outcome(
        &self,
        record: &DeliveryRecord,
        status: DeliveryStatus,
        response_code: Option<i32>,
        response_body: Option<String>,
        error_message: Option<String>,
        next_attempt_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()> {
        self.delivery_ledger
            .record_attempt(record.id, AttemptOutcome {
                status,
                response_code,
                response_body,
                error_message,
                next_attempt_at,
                attempted_at: self.clock.now(),
            })
            .await
            .map_err(|e| DeliveryError::database(format!("failed to record attempt: {e}")))?;
        Ok(())
    }
}
