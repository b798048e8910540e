//! # Eventhub Core
//!
//! Domain types and collaborator traits for event registration coordination.
//!
//! A registration request touches three stores with different guarantees:
//!
//! - **Capacity ledger** ([`ledger::CapacityLedger`]): strongly consistent, owns the
//!   event's `total_spots`/`registered_count` and the active registrations.
//! - **Interaction log** ([`interaction_log::InteractionLog`]): append-only,
//!   eventually consistent audit and analytics store.
//! - **Ordered channel** ([`channel::OrderedChannel`]): at-least-once broker with
//!   FIFO ordering per event id, drained by an external settlement consumer.
//!
//! The ledger decides; the log and the channel record the decision. This crate has
//! no I/O: implementations live in `eventhub-postgres`, `eventhub-redpanda` and
//! `eventhub-testing`, and the orchestration lives in `eventhub-runtime`.

pub mod channel;
pub mod environment;
pub mod error;
pub mod interaction_log;
pub mod ledger;
pub mod types;

pub use channel::{ChannelError, IntentStream, OrderedChannel};
pub use environment::{Clock, SystemClock};
pub use error::RegistrationError;
pub use interaction_log::{InteractionLog, InteractionLogError};
pub use ledger::{CapacityLedger, LedgerError, ReleaseOutcome, ReserveOutcome};
pub use types::*;
