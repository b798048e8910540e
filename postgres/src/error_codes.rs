//! `PostgreSQL` SQLSTATE codes and their mapping onto ledger errors.
//!
//! Full list: <https://www.postgresql.org/docs/current/errcodes-appendix.html>

use eventhub_core::interaction_log::InteractionLogError;
use eventhub_core::ledger::LedgerError;

/// `PostgreSQL` SQLSTATE error codes used by the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PgErrorCode;

impl PgErrorCode {
    /// Check constraint violation - Code 23514
    pub const CHECK_VIOLATION: &'static str = "23514";

    /// Serialization failure - Code 40001
    pub const SERIALIZATION_FAILURE: &'static str = "40001";

    /// Deadlock detected - Code 40P01
    pub const DEADLOCK_DETECTED: &'static str = "40P01";

    /// Lock not available - Code 55P03 (`lock_timeout` expired)
    pub const LOCK_NOT_AVAILABLE: &'static str = "55P03";

    /// Query canceled - Code 57014 (`statement_timeout` expired)
    pub const QUERY_CANCELED: &'static str = "57014";

    /// Whether another attempt of the same transaction may succeed.
    #[inline]
    #[must_use]
    pub fn is_retryable_transaction_error(code: &str) -> bool {
        code == Self::SERIALIZATION_FAILURE
            || code == Self::DEADLOCK_DETECTED
            || code == Self::LOCK_NOT_AVAILABLE
    }
}

/// Classify a sqlx error from a ledger transaction.
pub(crate) fn ledger_error(error: &sqlx::Error) -> LedgerError {
    match error {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(code) if PgErrorCode::is_retryable_transaction_error(code) => {
                LedgerError::Conflict(format!("SQLSTATE {code}"))
            }
            Some(PgErrorCode::QUERY_CANCELED) => LedgerError::Timeout,
            Some(PgErrorCode::CHECK_VIOLATION) => LedgerError::Invalid(db.message().to_string()),
            _ => LedgerError::Storage(error.to_string()),
        },
        sqlx::Error::PoolTimedOut => LedgerError::Timeout,
        _ => LedgerError::Storage(error.to_string()),
    }
}

/// Classify a sqlx error from the interaction store.
pub(crate) fn log_error(error: &sqlx::Error) -> InteractionLogError {
    match error {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            InteractionLogError::Corrupt(error.to_string())
        }
        _ => InteractionLogError::Unavailable(error.to_string()),
    }
}
