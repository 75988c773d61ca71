//! Domain events and post-commit handler dispatch.
//!
//! Booking and lifecycle services emit events through an explicit handler
//! list invoked only after the enclosing unit of work has durably committed.
//! There is no implicit save-time dispatch: a booking that did not persist is
//! never announced.
//!
//! # Event Flow
//!
//! ```text
//! ┌─────────────────┐  AppointmentEvent   ┌────────────────────┐
//! │ BookingService  │ ───────────────────▶│ MulticastHandler   │
//! │ Lifecycle       │   (post-commit)     │ (fan-out)          │
//! └─────────────────┘                     └────────────────────┘
//!                                                  │
//!                                                  ▼
//!                                         ┌────────────────────┐
//!                                         │ Webhook dispatcher │
//!                                         │ schedules delivery │
//!                                         └────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AppointmentId, EventType};

/// Events emitted by the booking engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AppointmentEvent {
    /// An appointment was booked and durably persisted.
    Created {
        /// The appointment that was booked.
        appointment_id: AppointmentId,
        /// When the booking committed.
        occurred_at: DateTime<Utc>,
    },

    /// An appointment entered `Confirmed` for the first time.
    ///
    /// Re-entering `Confirmed` from `Confirmed` is a no-op upstream and never
    /// reaches handlers.
    Confirmed {
        /// The appointment that was confirmed.
        appointment_id: AppointmentId,
        /// When the confirmation committed.
        occurred_at: DateTime<Utc>,
    },
}

impl AppointmentEvent {
    /// The appointment the event belongs to.
    pub fn appointment_id(&self) -> AppointmentId {
        match self {
            Self::Created { appointment_id, .. } | Self::Confirmed { appointment_id, .. } => {
                *appointment_id
            },
        }
    }

    /// The delivery event type this domain event maps to.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Created { .. } => EventType::Created,
            Self::Confirmed { .. } => EventType::Confirmed,
        }
    }
}

/// Trait for handling appointment events.
///
/// Handlers must not fail the emitting operation: the booking already
/// committed by the time they run. A handler that cannot do its work logs and
/// returns; recovery happens through its own bookkeeping (e.g. the delivery
/// ledger), never by failing the caller.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync + std::fmt::Debug {
    /// Handles one committed appointment event.
    async fn handle_event(&self, event: AppointmentEvent);
}

/// No-op handler that discards all events.
#[derive(Debug, Default)]
pub struct NoOpEventHandler;

impl NoOpEventHandler {
    /// Creates a new no-op event handler.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl EventHandler for NoOpEventHandler {
    async fn handle_event(&self, _event: AppointmentEvent) {}
}

/// Post-commit hook list forwarding events to every subscriber.
///
/// Subscribers run concurrently; none can observe or affect another's
/// outcome.
#[derive(Debug, Clone, Default)]
pub struct MulticastEventHandler {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl MulticastEventHandler {
    /// Creates a new multicast handler with no subscribers.
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Adds a subscriber to receive appointment events.
    pub fn add_subscriber(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

#[async_trait::async_trait]
impl EventHandler for MulticastEventHandler {
    async fn handle_event(&self, event: AppointmentEvent) {
        let futures = self.handlers.iter().map(|handler| async move {
            handler.handle_event(event).await;
        });

        futures::future::join_all(futures).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug)]
    struct CountingHandler {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: AppointmentEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn created_event() -> AppointmentEvent {
        AppointmentEvent::Created {
            appointment_id: AppointmentId::new(),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn multicast_forwards_to_all_subscribers() {
        let mut multicast = MulticastEventHandler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        multicast.add_subscriber(Arc::new(CountingHandler { seen: first.clone() }));
        multicast.add_subscriber(Arc::new(CountingHandler { seen: second.clone() }));

        assert_eq!(multicast.subscriber_count(), 2);
        multicast.handle_event(created_event()).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn multicast_tolerates_empty_subscriber_list() {
        let multicast = MulticastEventHandler::new();
        multicast.handle_event(created_event()).await;
    }

    #[test]
    fn event_maps_to_delivery_event_type() {
        let event = created_event();
        assert_eq!(event.event_type(), EventType::Created);

        let confirmed = AppointmentEvent::Confirmed {
            appointment_id: AppointmentId::new(),
            occurred_at: Utc::now(),
        };
        assert_eq!(confirmed.event_type(), EventType::Confirmed);
    }
}
