//! Process wiring: pools, stores, channel, coordinator, HTTP listeners.

use crate::config::{Config, DatabaseConfig};
use crate::error::ServerError;
use axum::http::{HeaderName, StatusCode};
use axum::{Router, routing::get};
use eventhub_core::environment::SystemClock;
use eventhub_postgres::{PostgresCapacityLedger, PostgresInteractionLog};
use eventhub_redpanda::RedpandaChannel;
use eventhub_runtime::RegistrationCoordinator;
use eventhub_runtime::metrics::MetricsServer;
use eventhub_web::AppState;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Open a pool with the configured limits and statement timeout.
///
/// # Errors
///
/// Returns [`ServerError::Database`] if the URL is invalid or no connection can be made.
pub async fn connect_pool(database: &'static str, config: &DatabaseConfig) -> Result<PgPool, ServerError> {
    let options: PgConnectOptions = config
        .url
        .parse()
        .map_err(|source| ServerError::Database { database, source })?;
    let options =
        options.options([("statement_timeout", format!("{}ms", config.statement_timeout_ms))]);

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .idle_timeout(Duration::from_secs(config.idle_timeout))
        .connect_with(options)
        .await
        .map_err(|source| ServerError::Database { database, source })
}

/// Build every collaborator, then serve until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns [`ServerError`] if any dependency fails to initialize or the listener fails.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.server.metrics_port).into();
    let mut metrics = MetricsServer::new(metrics_addr);
    metrics.start()?;

    info!("Connecting to ledger database...");
    let ledger_pool = connect_pool("ledger", &config.ledger_database).await?;
    let ledger = PostgresCapacityLedger::from_pool(ledger_pool);
    ledger.migrate().await?;
    info!("Ledger ready");

    info!("Connecting to interaction database...");
    let interaction_pool = connect_pool("interaction", &config.interaction_database).await?;
    let interactions = Arc::new(PostgresInteractionLog::from_pool(interaction_pool));
    interactions.migrate().await?;
    info!("Interaction log ready");

    info!("Connecting to Redpanda...");
    let channel = RedpandaChannel::builder()
        .brokers(&config.redpanda.brokers)
        .topic(&config.redpanda.topic)
        .producer_acks(&config.redpanda.acks)
        .timeout(Duration::from_millis(config.redpanda.timeout_ms))
        .build()?;

    let coordinator = RegistrationCoordinator::new(
        Arc::new(ledger),
        interactions.clone(),
        Arc::new(channel),
        Arc::new(SystemClock),
        config.coordinator.to_coordinator_config(),
    );

    let identity_header = HeaderName::from_bytes(config.server.identity_header.as_bytes())
        .map_err(|_| ServerError::IdentityHeader(config.server.identity_header.clone()))?;
    let state = AppState::new(Arc::new(coordinator), interactions).with_identity_header(identity_header);
    let app = eventhub_web::router(state);

    spawn_metrics_listener(metrics).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    let shutdown = Arc::new(Notify::new());
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                shutdown_signal().await;
                shutdown.notify_waiters();
            }
        })
        .into_future();

    let drain_timeout = Duration::from_secs(config.server.shutdown_timeout);
    tokio::select! {
        result = serve => result?,
        () = async {
            shutdown.notified().await;
            tokio::time::sleep(drain_timeout).await;
        } => {
            warn!(timeout_secs = drain_timeout.as_secs(), "In-flight requests did not drain in time");
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Serve the Prometheus scrape endpoint on its own port.
async fn spawn_metrics_listener(metrics: MetricsServer) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(metrics.addr()).await?;
    info!(address = %metrics.addr(), "Metrics listening");

    let metrics = Arc::new(metrics);
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move {
                metrics
                    .render()
                    .map_or((StatusCode::SERVICE_UNAVAILABLE, String::new()), |body| {
                        (StatusCode::OK, body)
                    })
            }
        }),
    );

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics listener failed");
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
