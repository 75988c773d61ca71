//! Webhook delivery engine with reliability guarantees.
//!
//! Propagates appointment lifecycle events to an external automation
//! endpoint with at-least-once, idempotent, HMAC-signed delivery. The
//! pipeline has two halves:
//!
//! 1. **Scheduling** — the [`Dispatcher`] turns a committed domain event into
//!    a durable [`slotwise_core::DeliveryRecord`], keyed by idempotency key,
//!    with the payload snapshot frozen at schedule time.
//! 2. **Delivery** — the [`DeliveryEngine`]'s workers claim due records,
//!    sign and POST the snapshot, classify the response, and either finish
//!    (2xx, 4xx) or schedule a backoff retry (5xx, network, timeout).
//!
//! Delivery failures never propagate to the booking caller; they are
//! observable only through the ledger and the operator commands in [`ops`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod crypto;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ops;
pub mod payload;
pub mod retry;
pub mod worker_pool;

pub use client::{ClientConfig, WebhookClient, WebhookRequest, WebhookResponse};
pub use dispatcher::{DeliveryEventHandler, Dispatcher, EndpointConfig};
pub use engine::{DeliveryConfig, DeliveryEngine, DeliveryWorker, EngineStats};
pub use error::{DeliveryError, Result};
pub use payload::{build_payload, mask_phone, WebhookPayload};
pub use retry::{RetryDecision, RetryPolicy};

/// Default number of concurrent delivery workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default batch size for claiming due records.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
