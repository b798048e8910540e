//! # Eventhub Testing
//!
//! Testing utilities for the registration pipeline.
//!
//! This crate provides:
//! - In-memory implementations of the ledger, interaction log and channel, each with
//!   failure injection
//! - A fixed clock for deterministic timestamps
//! - proptest strategies for registration workloads
//!
//! ## Example
//!
//! ```
//! use eventhub_testing::{InMemoryCapacityLedger, InMemoryChannel, InMemoryInteractionLog};
//!
//! let ledger = InMemoryCapacityLedger::new();
//! let log = InMemoryInteractionLog::new();
//! let channel = InMemoryChannel::new();
//!
//! // Simulate a broker outage for the next two publishes
//! channel.fail_next_publishes(2);
//! # let _ = (ledger, log);
//! ```

use chrono::{DateTime, Utc};
use eventhub_core::environment::Clock;

pub mod channel;
pub mod interaction_log;
pub mod ledger;

/// Mock implementations of injected capabilities.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use eventhub_testing::mocks::FixedClock;
    /// use eventhub_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Never in practice: the timestamp is a literal.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers.
pub mod helpers {
    /// Install a `tracing` subscriber that writes through the test harness.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use eventhub_core::types::UserId;
    use proptest::prelude::*;

    /// One step of a registration workload against a single event.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RegistrationOp {
        /// Try to take a spot
        Register(UserId),
        /// Give a spot back
        Unregister(UserId),
    }

    /// Users drawn from a small pool so duplicates and re-registrations happen often.
    pub fn user_id(pool: u8) -> impl Strategy<Value = UserId> {
        (0..pool.max(1)).prop_map(|n| UserId::new(format!("user-{n}")))
    }

    /// A register-heavy mix of operations.
    pub fn registration_op(pool: u8) -> impl Strategy<Value = RegistrationOp> {
        prop_oneof![
            3 => user_id(pool).prop_map(RegistrationOp::Register),
            1 => user_id(pool).prop_map(RegistrationOp::Unregister),
        ]
    }

    /// A sequence of operations of length `1..=max_len`.
    pub fn workload(pool: u8, max_len: usize) -> impl Strategy<Value = Vec<RegistrationOp>> {
        prop::collection::vec(registration_op(pool), 1..=max_len.max(1))
    }
}

pub use channel::InMemoryChannel;
pub use interaction_log::InMemoryInteractionLog;
pub use ledger::InMemoryCapacityLedger;
pub use mocks::{FixedClock, test_clock};
