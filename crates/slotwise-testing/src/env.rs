//! Deterministic test environment.

use std::sync::Arc;

use slotwise_booking::{
    AppointmentLifecycle, AvailabilityCalculator, BookingPolicy, BookingService, NoopNotifier,
};
use slotwise_core::{
    storage::{MemoryDeliveryLedger, MemoryDirectory, MemorySlotLedger},
    Clock, EventHandler, MulticastEventHandler, NoOpEventHandler, TestClock,
};
use slotwise_delivery::{
    DeliveryConfig, DeliveryEngine, DeliveryEventHandler, Dispatcher, EndpointConfig,
};

use crate::fixtures::SalonFixture;

/// In-memory environment wiring every service the tests exercise.
///
/// One `TestEnv` is one isolated world: its own ledgers, directory, and
/// clock. Construct pipelines piecemeal (a dispatcher here, a booking
/// service there) or use `booking_with_delivery` for the full wiring.
pub struct TestEnv {
    /// Slot ledger shared by booking and delivery.
    pub slot_ledger: Arc<MemorySlotLedger>,
    /// Delivery ledger behind the dispatcher and engine.
    pub delivery_ledger: Arc<MemoryDeliveryLedger>,
    /// Seedable directory.
    pub directory: Arc<MemoryDirectory>,
    /// Controllable clock shared by every component built from this env.
    pub clock: Arc<TestClock>,
}

impl TestEnv {
    /// Creates a fresh, empty environment.
    pub fn new() -> Self {
        Self {
            slot_ledger: Arc::new(MemorySlotLedger::new()),
            delivery_ledger: Arc::new(MemoryDeliveryLedger::new()),
            directory: Arc::new(MemoryDirectory::new()),
            clock: Arc::new(TestClock::new()),
        }
    }

    /// Seeds the standard salon fixture.
    pub async fn seed_salon(&self) -> SalonFixture {
        SalonFixture::seed(&self.directory).await
    }

    /// Builds a dispatcher against the given endpoint.
    pub fn dispatcher(&self, endpoint: EndpointConfig) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            self.slot_ledger.clone(),
            self.delivery_ledger.clone(),
            self.directory.clone(),
            endpoint,
            self.clock.clone(),
        ))
    }

    /// Builds a delivery engine against the given endpoint.
    pub fn engine(&self, endpoint: EndpointConfig, config: DeliveryConfig) -> DeliveryEngine {
        DeliveryEngine::new(
            self.delivery_ledger.clone(),
            self.slot_ledger.clone(),
            endpoint,
            config,
            self.clock.clone(),
        )
        .expect("delivery engine builds with default client config")
    }

    /// Builds a booking service with the given post-commit handler.
    pub fn booking_service(&self, events: Arc<dyn EventHandler>) -> BookingService {
        BookingService::new(
            self.slot_ledger.clone(),
            self.directory.clone(),
            events,
            self.clock.clone(),
            BookingPolicy::default(),
        )
    }

    /// Builds a booking service with no event subscribers.
    pub fn booking_service_quiet(&self) -> BookingService {
        self.booking_service(Arc::new(NoOpEventHandler::new()))
    }

    /// Builds a lifecycle service with the given post-commit handler.
    pub fn lifecycle(&self, events: Arc<dyn EventHandler>) -> AppointmentLifecycle {
        AppointmentLifecycle::new(
            self.slot_ledger.clone(),
            self.directory.clone(),
            events,
            Arc::new(NoopNotifier),
            self.clock.clone(),
        )
    }

    /// Builds an availability calculator.
    pub fn availability(&self) -> AvailabilityCalculator {
        AvailabilityCalculator::new(self.directory.clone(), self.slot_ledger.clone())
    }

    /// Full booking-to-delivery wiring against one endpoint.
    ///
    /// Returns the booking service (with the dispatcher subscribed
    /// post-commit), the dispatcher, and an engine ready to drain batches.
    pub fn booking_with_delivery(
        &self,
        endpoint: EndpointConfig,
        config: DeliveryConfig,
    ) -> (BookingService, Arc<Dispatcher>, DeliveryEngine) {
        let dispatcher = self.dispatcher(endpoint.clone());

        let mut hooks = MulticastEventHandler::new();
        hooks.add_subscriber(Arc::new(DeliveryEventHandler::new(dispatcher.clone())));
        let events: Arc<dyn EventHandler> = Arc::new(hooks);

        let booking = self.booking_service(events);
        let engine = self.engine(endpoint, config);

        (booking, dispatcher, engine)
    }

    /// A timestamp safely in the future of the env clock.
    pub fn future_date(&self) -> chrono::NaiveDate {
        self.clock.now().date_naive() + chrono::Duration::days(7)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
