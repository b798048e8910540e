//! Eventhub registration server binary.

use anyhow::Context;
use eventhub_server::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal outside development
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,eventhub=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting eventhub server");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        brokers = %config.redpanda.brokers,
        topic = %config.redpanda.topic,
        port = config.server.port,
        "Configuration loaded"
    );

    eventhub_server::run(config).await.context("server failed")
}
