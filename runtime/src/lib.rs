//! # Eventhub Runtime
//!
//! The registration coordinator and the machinery around it: bounded retries with
//! jitter, the retrying ledger decorator and Prometheus metrics.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventhub_core::environment::SystemClock;
//! use eventhub_runtime::{CoordinatorConfig, RegistrationCoordinator};
//! # use std::sync::Arc;
//! # fn example(
//! #     ledger: Arc<dyn eventhub_core::CapacityLedger>,
//! #     log: Arc<dyn eventhub_core::InteractionLog>,
//! #     channel: Arc<dyn eventhub_core::OrderedChannel>,
//! # ) {
//! let coordinator = RegistrationCoordinator::new(
//!     ledger,
//!     log,
//!     channel,
//!     Arc::new(SystemClock),
//!     CoordinatorConfig::default(),
//! );
//! # }
//! ```

pub mod coordinator;
pub mod ledger;
pub mod metrics;
pub mod retry;

pub use coordinator::{Accepted, CoordinatorConfig, RegistrationCoordinator};
pub use ledger::RetryingLedger;
pub use retry::RetryPolicy;
