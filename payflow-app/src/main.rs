//! # Payflow Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the ledger adapter
//! - Create the payment engine
//! - Start the HTTP server

mod config;

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_sim::SimGateway;
use payflow_engine::{PaymentEngine, inbound::HttpServer};
use payflow_ledger::build_ledger;

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,payflow_app=debug,payflow_engine=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = config::Config::from_env()?;

    init_logging(config.log_json);

    tracing::info!("Starting payflow server on port {}", config.port);
    tracing::info!("Using ledger: {}", config.ledger_url);

    // Build ledger (handles connection and migration)
    let ledger = build_ledger(&config.ledger_url).await?;

    // Create the payment engine
    let engine = PaymentEngine::with_config(ledger, SimGateway::new(), config.engine());

    // Create and run the HTTP server
    let server = HttpServer::new(engine);

    // Periodically drop idempotency records past their TTL
    let state = server.state();
    let purge_every = Duration::from_secs(config.purge_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        ticker.tick().await; // the first tick completes immediately
        loop {
            ticker.tick().await;
            match state.engine.purge_expired().await {
                Ok(purged) if purged > 0 => {
                    tracing::info!(purged, "Purged expired idempotency records");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Idempotency purge failed"),
            }
        }
    });

    let addr = format!("0.0.0.0:{}", config.port);
    server.run(&addr).await?;

    Ok(())
}
