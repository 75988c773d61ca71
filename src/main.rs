//! Slotwise service entry point.
//!
//! Wires the booking engine and the webhook delivery engine over PostgreSQL
//! and coordinates graceful startup and shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use slotwise_api::{AppState, Config};
use slotwise_booking::{
    AppointmentLifecycle, AvailabilityCalculator, BookingPolicy, BookingService, NoopNotifier,
};
use slotwise_core::{
    storage::{self, PgDeliveryLedger, PgDirectory, PgSlotLedger},
    EventHandler, MulticastEventHandler, RealClock,
};
use slotwise_delivery::{DeliveryEngine, DeliveryEventHandler, Dispatcher};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log);

    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        webhook_configured = config.webhook_url.is_some(),
        "starting slotwise"
    );

    let pool = create_database_pool(&config).await?;
    info!("database connection pool established");

    storage::run_migrations(&pool).await.context("failed to run migrations")?;
    info!("database migrations completed");

    let clock = Arc::new(RealClock::new());
    let slot_ledger = Arc::new(PgSlotLedger::new(pool.clone()));
    let delivery_ledger = Arc::new(PgDeliveryLedger::new(pool.clone()));
    let directory = Arc::new(PgDirectory::new(pool.clone()));

    let endpoint = config.to_endpoint_config();
    let dispatcher = Arc::new(Dispatcher::new(
        slot_ledger.clone(),
        delivery_ledger.clone(),
        directory.clone(),
        endpoint.clone(),
        clock.clone(),
    ));

    let mut hooks = MulticastEventHandler::new();
    hooks.add_subscriber(Arc::new(DeliveryEventHandler::new(dispatcher.clone())));
    let events: Arc<dyn EventHandler> = Arc::new(hooks);

    let policy = BookingPolicy {
        grace: chrono::Duration::minutes(config.booking_grace_minutes),
        notes_max_chars: config.notes_max_chars,
    };
    let booking = Arc::new(BookingService::new(
        slot_ledger.clone(),
        directory.clone(),
        events.clone(),
        clock.clone(),
        policy,
    ));
    let availability = Arc::new(AvailabilityCalculator::with_slot_minutes(
        directory.clone(),
        slot_ledger.clone(),
        config.slot_minutes,
    ));
    let lifecycle = Arc::new(AppointmentLifecycle::new(
        slot_ledger.clone(),
        directory.clone(),
        events,
        Arc::new(NoopNotifier),
        clock.clone(),
    ));

    let mut engine = DeliveryEngine::new(
        delivery_ledger,
        slot_ledger,
        endpoint,
        config.to_delivery_config(),
        clock,
    )
    .map_err(|e| anyhow::anyhow!("failed to build delivery engine: {e}"))?;
    engine.start().await.map_err(|e| anyhow::anyhow!("failed to start delivery engine: {e}"))?;

    let state = AppState::new(booking, availability, lifecycle);
    let addr = config.parse_server_addr()?;

    info!(addr = %addr, "slotwise is ready");

    if let Err(e) = slotwise_api::start_server(state, addr).await {
        error!(error = %e, "server failed");
    }

    info!("shutting down delivery engine");
    engine.shutdown().await.map_err(|e| anyhow::anyhow!("engine shutdown failed: {e}"))?;

    pool.close().await;
    info!("slotwise shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with retry.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("failed to verify database connection")?;
                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("failed to create database connection pool after retries");
            },
        }
    }
}
