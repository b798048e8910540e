//! `PostgreSQL` interaction log.
//!
//! Backed by a pool separate from the ledger's. Appends are idempotent on the record
//! id, so a retried append whose first attempt actually landed does not duplicate.

use crate::error_codes::log_error;
use chrono::{DateTime, Utc};
use eventhub_core::interaction_log::{InteractionLog, InteractionLogError};
use eventhub_core::types::{
    EventId, EventRegistrationCount, InteractionId, InteractionRecord, RegistrationAction, UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// `PostgreSQL`-backed [`InteractionLog`].
#[derive(Clone, Debug)]
pub struct PostgresInteractionLog {
    pool: PgPool,
}

impl PostgresInteractionLog {
    /// Use an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the interaction log schema.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionLogError::Unavailable`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), InteractionLogError> {
        let mut migrator = sqlx::migrate!("./migrations/interactions");
        migrator.set_ignore_missing(true);
        migrator
            .run(&self.pool)
            .await
            .map_err(|e| InteractionLogError::Unavailable(format!("interaction migration failed: {e}")))
    }

    fn row_to_record(row: &PgRow) -> Result<InteractionRecord, InteractionLogError> {
        let action: String = row.try_get("action").map_err(|e| log_error(&e))?;
        let action = RegistrationAction::parse(&action)
            .ok_or_else(|| InteractionLogError::Corrupt(format!("unknown action '{action}'")))?;
        let user_id: String = row.try_get("user_id").map_err(|e| log_error(&e))?;
        let timestamp: DateTime<Utc> = row.try_get("occurred_at").map_err(|e| log_error(&e))?;

        Ok(InteractionRecord {
            id: InteractionId::from_uuid(row.try_get("id").map_err(|e| log_error(&e))?),
            event_id: EventId::from_uuid(row.try_get("event_id").map_err(|e| log_error(&e))?),
            user_id: UserId::new(user_id),
            action,
            timestamp,
        })
    }
}

impl InteractionLog for PostgresInteractionLog {
    fn append(
        &self,
        record: InteractionRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), InteractionLogError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO user_interactions (id, event_id, user_id, action, occurred_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                ",
            )
            .bind(record.id.as_uuid())
            .bind(record.event_id.as_uuid())
            .bind(record.user_id.as_str())
            .bind(record.action.as_str())
            .bind(record.timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| log_error(&e))?;

            metrics::counter!("eventhub_interactions_appended_total", "action" => record.action.as_str())
                .increment(1);
            Ok(())
        })
    }

    fn query_by_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<InteractionRecord>, InteractionLogError>> + Send + '_>>
    {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT id, event_id, user_id, action, occurred_at
                FROM user_interactions
                WHERE event_id = $1
                ORDER BY occurred_at ASC, seq ASC
                ",
            )
            .bind(event_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| log_error(&e))?;

            rows.iter().map(Self::row_to_record).collect()
        })
    }

    fn query_most_registered(
        &self,
        top_n: usize,
    ) -> Pin<
        Box<dyn Future<Output = Result<Vec<EventRegistrationCount>, InteractionLogError>> + Send + '_>,
    > {
        Box::pin(async move {
            let limit = i64::try_from(top_n).unwrap_or(i64::MAX);
            let rows = sqlx::query(
                r"
                SELECT event_id,
                       SUM(CASE WHEN action = 'register' THEN 1 ELSE -1 END)::BIGINT AS net
                FROM user_interactions
                GROUP BY event_id
                HAVING SUM(CASE WHEN action = 'register' THEN 1 ELSE -1 END) > 0
                ORDER BY net DESC, event_id ASC
                LIMIT $1
                ",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| log_error(&e))?;

            rows.iter()
                .map(|row| {
                    let net: i64 = row.try_get("net").map_err(|e| log_error(&e))?;
                    Ok(EventRegistrationCount {
                        event_id: EventId::from_uuid(
                            row.try_get("event_id").map_err(|e| log_error(&e))?,
                        ),
                        registrations: u64::try_from(net).unwrap_or(0),
                    })
                })
                .collect()
        })
    }

    fn purge_by_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<u64, InteractionLogError>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM user_interactions WHERE event_id = $1")
                .bind(event_id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| log_error(&e))?;

            tracing::info!(%event_id, purged = result.rows_affected(), "Interaction records purged");
            Ok(result.rows_affected())
        })
    }
}
