//! Paygate server binary.
//!
//! Loads configuration, wires the Postgres adapters and gateway client
//! into the HTTP surface, and runs the periodic reconciliation sweep for
//! orders whose webhook was lost.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use paygate::adapters::gateway::GatewayClient;
use paygate::adapters::http::{api_router, PaymentAppState};
use paygate::adapters::postgres::{
    PostgresMembershipStore, PostgresNotificationRepository, PostgresOrderRepository,
    PostgresPlanCatalog, PostgresRefundRepository,
};
use paygate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!().run(&pool).await?;
        tracing::info!("database migrations applied");
    }

    let gateway = Arc::new(GatewayClient::new(config.gateway.clone())?);
    let webhook_verifier = gateway.webhook_verifier()?;

    let state = PaymentAppState {
        orders: Arc::new(PostgresOrderRepository::new(pool.clone())),
        refunds: Arc::new(PostgresRefundRepository::new(pool.clone())),
        notifications: Arc::new(PostgresNotificationRepository::new(pool.clone())),
        memberships: Arc::new(PostgresMembershipStore::new(pool.clone())),
        plans: Arc::new(PostgresPlanCatalog::new(pool.clone())),
        gateway,
        webhook_verifier,
        product_code: config.gateway.product_code.clone(),
        pending_timeout_minutes: config.gateway.pending_timeout_minutes,
    };

    // Pull-based safety net for orders whose webhook never arrived.
    {
        let state = state.clone();
        let interval_secs = config.gateway.reconcile_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                state.reconcile_pending_handler().handle().await;
            }
        });
    }

    let app = api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(CorsLayer::permissive());

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, "paygate listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
