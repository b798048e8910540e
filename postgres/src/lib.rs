//! `PostgreSQL` stores for eventhub.
//!
//! - [`PostgresCapacityLedger`]: the authoritative capacity ledger, with per-event
//!   row locks
//! - [`PostgresInteractionLog`]: the append-only interaction log, normally pointed at
//!   a separate database
//!
//! Both use runtime-checked `sqlx` queries and embed their migrations.
//!
//! # Example
//!
//! ```no_run
//! use eventhub_postgres::{PostgresCapacityLedger, PostgresInteractionLog};
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = PostgresCapacityLedger::new("postgres://localhost/eventhub").await?;
//! ledger.migrate().await?;
//!
//! let log = PostgresInteractionLog::from_pool(PgPool::connect("postgres://localhost/interactions").await?);
//! log.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod error_codes;
mod interaction_log;
mod ledger;

pub use error_codes::PgErrorCode;
pub use interaction_log::PostgresInteractionLog;
pub use ledger::PostgresCapacityLedger;
