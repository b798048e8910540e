//! Eventhub registration server.
//!
//! Loads [`Config`](config::Config) from the environment and wires the Postgres
//! ledger and interaction log, the Redpanda settlement channel and the HTTP surface.

pub mod app;
pub mod config;
pub mod error;

pub use app::run;
pub use config::{Config, ConfigError};
pub use error::ServerError;
