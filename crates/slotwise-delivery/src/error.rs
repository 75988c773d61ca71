//! Error types for webhook delivery operations.
//!
//! Every failure is classified as transient (retried automatically with
//! backoff, up to the configured ceiling) or permanent (surfaced to
//! operators, never auto-retried). The split drives the retry decision and
//! is the contract the tests pin down.

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error types for webhook delivery operations.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Network-level connectivity failure. Transient.
    #[error("network connection failed: {message}")]
    Network {
        /// Description of the network failure.
        message: String,
    },

    /// HTTP request timeout exceeded. Transient.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Seconds before the request timed out.
        timeout_seconds: u64,
    },

    /// Endpoint responded 4xx. Permanent: repetition cannot fix the request.
    #[error("client error: HTTP {status_code}")]
    ClientError {
        /// HTTP status code (4xx).
        status_code: u16,
        /// Response body content, truncated.
        body: String,
    },

    /// Endpoint responded 5xx. Transient.
    #[error("server error: HTTP {status_code}")]
    ServerError {
        /// HTTP status code (5xx).
        status_code: u16,
        /// Response body content, truncated.
        body: String,
    },

    /// All retry attempts exhausted. Terminal; requires operator action.
    #[error("delivery failed after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// Ledger operation failed during delivery.
    #[error("database error: {message}")]
    Database {
        /// Database error message.
        message: String,
    },

    /// Endpoint or signing configuration is unusable.
    #[error("invalid delivery configuration: {message}")]
    Configuration {
        /// Configuration error message.
        message: String,
    },

    /// A worker task panicked.
    #[error("worker {worker_id} panicked: {message}")]
    WorkerPanic {
        /// Which worker died.
        worker_id: usize,
        /// Join error description.
        message: String,
    },

    /// Graceful shutdown exceeded its deadline.
    #[error("worker shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// The deadline that was exceeded.
        timeout: std::time::Duration,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a client error from an HTTP response.
    pub fn client_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::ClientError { status_code, body: body.into() }
    }

    /// Creates a server error from an HTTP response.
    pub fn server_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::ServerError { status_code, body: body.into() }
    }

    /// Creates a retries-exhausted error.
    pub fn retries_exhausted(attempts: u32) -> Self {
        Self::RetriesExhausted { attempts }
    }

    /// Creates a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Whether this failure should be retried with backoff.
    ///
    /// Network errors, timeouts, and 5xx responses are transient. Client
    /// errors, exhausted retries, and configuration problems are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::ServerError { .. }
            | Self::Database { .. } => true,

            Self::ClientError { .. }
            | Self::RetriesExhausted { .. }
            | Self::Configuration { .. }
            | Self::WorkerPanic { .. }
            | Self::ShutdownTimeout { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_permanent_failures_partition_cleanly() {
        assert!(DeliveryError::network("connection refused").is_retryable());
        assert!(DeliveryError::timeout(10).is_retryable());
        assert!(DeliveryError::server_error(500, "boom").is_retryable());
        assert!(DeliveryError::server_error(503, "unavailable").is_retryable());

        assert!(!DeliveryError::client_error(400, "bad request").is_retryable());
        assert!(!DeliveryError::client_error(404, "not found").is_retryable());
        assert!(!DeliveryError::retries_exhausted(5).is_retryable());
        assert!(!DeliveryError::configuration("missing secret").is_retryable());
    }

    #[test]
    fn error_display_format() {
        assert_eq!(DeliveryError::timeout(10).to_string(), "request timeout after 10s");
        assert_eq!(
            DeliveryError::retries_exhausted(5).to_string(),
            "delivery failed after 5 attempts"
        );
    }
}
