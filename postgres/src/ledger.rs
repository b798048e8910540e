//! `PostgreSQL` capacity ledger.
//!
//! Reservations and releases run in a `READ COMMITTED` transaction that first takes
//! a row lock on the event (`SELECT ... FOR UPDATE`). Concurrent requests for the
//! same event queue on that lock; requests for other events never touch it. The
//! `CHECK (registered_count <= total_spots)` constraint is a second line of defence.

use crate::error_codes::ledger_error;
use chrono::{DateTime, Utc};
use eventhub_core::ledger::{CapacityLedger, LedgerError, ReleaseOutcome, ReserveOutcome};
use eventhub_core::types::{Event, EventId, NewEvent, RegistrationStatus, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::future::Future;
use std::pin::Pin;

/// `PostgreSQL`-backed [`CapacityLedger`].
///
/// # Example
///
/// ```no_run
/// use eventhub_postgres::PostgresCapacityLedger;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = PostgresCapacityLedger::new("postgres://localhost/eventhub").await?;
/// ledger.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresCapacityLedger {
    pool: PgPool,
}

impl PostgresCapacityLedger {
    /// Connect with a default pool.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the connection fails.
    pub async fn new(database_url: &str) -> Result<Self, LedgerError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Use an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the ledger schema.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        let mut migrator = sqlx::migrate!("./migrations/ledger");
        // The interaction log may share this database and its migration table.
        migrator.set_ignore_missing(true);
        migrator
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(format!("ledger migration failed: {e}")))
    }

    async fn lock_event(
        tx: &mut Transaction<'_, Postgres>,
        event_id: EventId,
    ) -> Result<Option<(i32, i32)>, sqlx::Error> {
        let row = sqlx::query(
            r"
            SELECT total_spots, registered_count
            FROM events
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(event_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|row| Ok((row.try_get("total_spots")?, row.try_get("registered_count")?)))
            .transpose()
    }

    async fn registration_status(
        tx: &mut Transaction<'_, Postgres>,
        event_id: EventId,
        user_id: &UserId,
    ) -> Result<Option<RegistrationStatus>, sqlx::Error> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM registrations WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        Ok(status.as_deref().and_then(RegistrationStatus::parse))
    }

    async fn reserve_in_tx(&self, event_id: EventId, user_id: &UserId) -> Result<ReserveOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some((total_spots, registered_count)) = Self::lock_event(&mut tx, event_id).await? else {
            tx.rollback().await?;
            return Ok(ReserveOutcome::EventNotFound);
        };

        if Self::registration_status(&mut tx, event_id, user_id).await?
            == Some(RegistrationStatus::Active)
        {
            tx.rollback().await?;
            return Ok(ReserveOutcome::AlreadyRegistered);
        }

        if registered_count >= total_spots {
            tx.rollback().await?;
            return Ok(ReserveOutcome::CapacityExceeded);
        }

        sqlx::query("UPDATE events SET registered_count = registered_count + 1 WHERE id = $1")
            .bind(event_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            INSERT INTO registrations (event_id, user_id, status, updated_at)
            VALUES ($1, $2, 'active', now())
            ON CONFLICT (event_id, user_id)
            DO UPDATE SET status = 'active', updated_at = now()
            ",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ReserveOutcome::Reserved)
    }

    async fn release_in_tx(&self, event_id: EventId, user_id: &UserId) -> Result<ReleaseOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if Self::lock_event(&mut tx, event_id).await?.is_none() {
            tx.rollback().await?;
            return Ok(ReleaseOutcome::EventNotFound);
        }

        if Self::registration_status(&mut tx, event_id, user_id).await?
            != Some(RegistrationStatus::Active)
        {
            tx.rollback().await?;
            return Ok(ReleaseOutcome::NotRegistered);
        }

        sqlx::query(
            "UPDATE events SET registered_count = GREATEST(registered_count - 1, 0) WHERE id = $1",
        )
        .bind(event_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE registrations
            SET status = 'released', updated_at = now()
            WHERE event_id = $1 AND user_id = $2
            ",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ReleaseOutcome::Released)
    }

    fn row_to_event(row: &PgRow) -> Result<Event, sqlx::Error> {
        let total_spots: i32 = row.try_get("total_spots")?;
        let registered_count: i32 = row.try_get("registered_count")?;
        let organizer_id: String = row.try_get("organizer_id")?;

        Ok(Event {
            id: EventId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            location: row.try_get("location")?,
            date: row.try_get("date")?,
            organizer_id: UserId::new(organizer_id),
            total_spots: u32::try_from(total_spots).unwrap_or(0),
            registered_count: u32::try_from(registered_count).unwrap_or(0),
        })
    }
}

impl CapacityLedger for PostgresCapacityLedger {
    fn try_reserve(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<ReserveOutcome, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let outcome = self
                .reserve_in_tx(event_id, &user_id)
                .await
                .map_err(|e| ledger_error(&e))?;
            tracing::debug!(%event_id, %user_id, ?outcome, "Reservation decided");
            Ok(outcome)
        })
    }

    fn release(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<ReleaseOutcome, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let outcome = self
                .release_in_tx(event_id, &user_id)
                .await
                .map_err(|e| ledger_error(&e))?;
            tracing::debug!(%event_id, %user_id, ?outcome, "Release decided");
            Ok(outcome)
        })
    }

    fn create_event(
        &self,
        event: NewEvent,
    ) -> Pin<Box<dyn Future<Output = Result<Event, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            if event.name.trim().is_empty() {
                return Err(LedgerError::Invalid("event name is required".to_string()));
            }
            let total_spots = i32::try_from(event.total_spots).map_err(|_| {
                LedgerError::Invalid(format!("total_spots {} is too large", event.total_spots))
            })?;

            let event = event.into_event(EventId::new());
            let created_at: DateTime<Utc> = sqlx::query_scalar(
                r"
                INSERT INTO events (id, name, description, location, date, organizer_id, total_spots)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING created_at
                ",
            )
            .bind(event.id.as_uuid())
            .bind(&event.name)
            .bind(&event.description)
            .bind(&event.location)
            .bind(&event.date)
            .bind(event.organizer_id.as_str())
            .bind(total_spots)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ledger_error(&e))?;

            tracing::info!(event_id = %event.id, total_spots, %created_at, "Event created");
            Ok(event)
        })
    }

    fn get_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Event>, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, name, description, location, date, organizer_id,
                       total_spots, registered_count
                FROM events
                WHERE id = $1
                ",
            )
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ledger_error(&e))?;

            row.as_ref()
                .map(Self::row_to_event)
                .transpose()
                .map_err(|e| LedgerError::Storage(e.to_string()))
        })
    }

    fn delete_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<bool, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM events WHERE id = $1")
                .bind(event_id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| ledger_error(&e))?;

            Ok(result.rows_affected() > 0)
        })
    }
}
