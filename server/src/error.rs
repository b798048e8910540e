//! Startup and serving failures of the server process.

use crate::config::ConfigError;
use eventhub_core::channel::ChannelError;
use eventhub_core::interaction_log::InteractionLogError;
use eventhub_core::ledger::LedgerError;
use eventhub_runtime::metrics::MetricsError;
use thiserror::Error;

/// Why the server failed to start or stopped abnormally.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A database pool could not be created
    #[error("Failed to connect to {database} database: {source}")]
    Database {
        /// Which pool
        database: &'static str,
        /// Underlying driver error
        source: sqlx::Error,
    },

    /// Ledger migrations failed
    #[error("Ledger setup failed: {0}")]
    Ledger(#[from] LedgerError),

    /// Interaction log migrations failed
    #[error("Interaction log setup failed: {0}")]
    InteractionLog(#[from] InteractionLogError),

    /// The settlement channel could not be created
    #[error("Settlement channel setup failed: {0}")]
    Channel(#[from] ChannelError),

    /// The Prometheus recorder could not be installed
    #[error("Metrics setup failed: {0}")]
    Metrics(#[from] MetricsError),

    /// The identity header name is not a valid HTTP header
    #[error("Invalid identity header '{0}'")]
    IdentityHeader(String),

    /// Binding or serving failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
