use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, MovieId, PrincipalId, TheatreId};
use domain::{Aggregate, Booking, BookingEvent, Money, SeatId, SeatLayout, SeatSet, Theatre, Version};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    EventEnvelope, EventId, Result, StoreError,
    store::{ClaimOutcome, ReservationStore, StoreTransaction},
};

/// Attempts at the conditional claim before giving up on a moving target.
const CLAIM_ATTEMPTS: usize = 3;

/// PostgreSQL-backed reservation store.
#[derive(Clone)]
pub struct PostgresReservationStore {
    pool: PgPool,
}

impl PostgresReservationStore {
    /// Creates a new PostgreSQL reservation store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn parse_seats(raw: Vec<String>) -> Result<SeatSet> {
    raw.into_iter()
        .map(|s| SeatId::parse(s).map_err(|e| StoreError::CorruptRecord(e.to_string())))
        .collect()
}

fn row_to_theatre(row: PgRow) -> Result<Theatre> {
    let layout: SeatLayout = serde_json::from_value(row.try_get("layout")?)?;
    let claimed = parse_seats(row.try_get("claimed_seats")?)?;

    Theatre::new(
        TheatreId::from_uuid(row.try_get::<Uuid, _>("id")?),
        MovieId::from_uuid(row.try_get::<Uuid, _>("movie_id")?),
        row.try_get::<String, _>("name")?,
        layout,
        Money::from_minor(row.try_get("unit_price")?),
    )
    .with_claimed(claimed)
    .map_err(|e| StoreError::CorruptRecord(e.to_string()))
}

fn row_to_booking(row: PgRow) -> Result<Booking> {
    let mut booking: Booking = serde_json::from_value(row.try_get("document")?)?;
    booking.set_version(Version::new(row.try_get("version")?));
    Ok(booking)
}

fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
    Ok(EventEnvelope {
        event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
        event_type: row.try_get("event_type")?,
        booking_id: BookingId::from_uuid(row.try_get::<Uuid, _>("booking_id")?),
        version: Version::new(row.try_get("version")?),
        recorded_at: row.try_get("recorded_at")?,
        payload: serde_json::from_value(row.try_get("payload")?)?,
    })
}

const THEATRE_COLUMNS: &str = "id, movie_id, name, layout, unit_price, claimed_seats";

/// Transaction over the PostgreSQL store.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn append_events(&mut self, envelopes: &[EventEnvelope]) -> Result<()> {
        for envelope in envelopes {
            sqlx::query(
                r#"
                INSERT INTO booking_events (id, booking_id, version, event_type, recorded_at, payload)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(envelope.event_id.as_uuid())
            .bind(envelope.booking_id.as_uuid())
            .bind(envelope.version.as_i64())
            .bind(&envelope.event_type)
            .bind(envelope.recorded_at)
            .bind(serde_json::to_value(&envelope.payload)?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_booking_event_version")
                {
                    return StoreError::ConcurrencyConflict {
                        booking_id: envelope.booking_id,
                        expected: Version::new(envelope.version.as_i64() - 1),
                        actual: envelope.version,
                    };
                }
                StoreError::Database(e)
            })?;
        }
        Ok(())
    }

    /// Works out why the conditional claim matched no row.
    async fn diagnose_claim(
        &mut self,
        theatre_id: TheatreId,
        seats: &SeatSet,
    ) -> Result<Option<ClaimOutcome>> {
        let theatre = self.theatre(theatre_id).await?;
        let invalid = theatre.layout().invalid_seats(seats);
        if !invalid.is_empty() {
            return Ok(Some(ClaimOutcome::InvalidSeats(invalid)));
        }
        let conflicts = theatre.conflicts(seats);
        if !conflicts.is_empty() {
            return Ok(Some(ClaimOutcome::Conflict(conflicts)));
        }
        // The conflicting claim was released in between; try again.
        Ok(None)
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn theatre(&mut self, theatre_id: TheatreId) -> Result<Theatre> {
        let row = sqlx::query(&format!(
            "SELECT {THEATRE_COLUMNS} FROM theatres WHERE id = $1"
        ))
        .bind(theatre_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StoreError::TheatreNotFound(theatre_id))?;

        row_to_theatre(row)
    }

    #[tracing::instrument(skip(self, seats), fields(seats = %seats))]
    async fn try_claim(
        &mut self,
        theatre_id: TheatreId,
        seats: &SeatSet,
    ) -> Result<ClaimOutcome> {
        let requested = seats.to_strings();

        for _ in 0..CLAIM_ATTEMPTS {
            // Test-and-set over the whole set in one statement; a concurrent
            // claimer blocks on the row lock and re-evaluates the condition.
            let result = sqlx::query(
                r#"
                UPDATE theatres
                SET claimed_seats = claimed_seats || $2::text[]
                WHERE id = $1
                  AND NOT (claimed_seats && $2::text[])
                  AND $2::text[] <@ seat_ids
                "#,
            )
            .bind(theatre_id.as_uuid())
            .bind(&requested)
            .execute(&mut *self.tx)
            .await?;

            if result.rows_affected() == 1 {
                return Ok(ClaimOutcome::Claimed);
            }
            if let Some(outcome) = self.diagnose_claim(theatre_id, seats).await? {
                tracing::debug!(?outcome, "seat claim refused");
                return Ok(outcome);
            }
        }

        // Every diagnosis found the seats free again; no seat can be named.
        Err(StoreError::ClaimContention(theatre_id))
    }

    async fn release(&mut self, theatre_id: TheatreId, seats: &SeatSet) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE theatres
            SET claimed_seats = ARRAY(
                SELECT seat FROM unnest(claimed_seats) AS seat
                WHERE seat <> ALL($2::text[])
            )
            WHERE id = $1
            "#,
        )
        .bind(theatre_id.as_uuid())
        .bind(seats.to_strings())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TheatreNotFound(theatre_id));
        }
        Ok(())
    }

    async fn booking(&mut self, booking_id: BookingId) -> Result<Booking> {
        let row = sqlx::query("SELECT document, version FROM bookings WHERE id = $1")
            .bind(booking_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(StoreError::BookingNotFound(booking_id))?;

        row_to_booking(row)
    }

    async fn insert_booking(
        &mut self,
        booking: &Booking,
        events: &[BookingEvent],
    ) -> Result<Version> {
        let booking_id = booking.id();
        let version = Version::initial().advance(events.len());

        sqlx::query(
            r#"
            INSERT INTO bookings (id, payer_id, theatre_id, payment_state, created_at, version, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(booking_id.as_uuid())
        .bind(booking.payer_id().as_uuid())
        .bind(booking.theatre_id().as_uuid())
        .bind(booking.payment_state().as_str())
        .bind(booking.created_at())
        .bind(version.as_i64())
        .bind(serde_json::to_value(booking)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("bookings_pkey") {
                    return StoreError::DuplicateBooking(booking_id);
                }
                if db_err.constraint() == Some("bookings_theatre_id_fkey") {
                    return StoreError::TheatreNotFound(booking.theatre_id());
                }
            }
            StoreError::Database(e)
        })?;

        let envelopes = EventEnvelope::sequence(booking_id, Version::initial(), events);
        self.append_events(&envelopes).await?;
        Ok(version)
    }

    async fn update_booking(
        &mut self,
        booking: &Booking,
        expected: Version,
        events: &[BookingEvent],
    ) -> Result<Version> {
        let booking_id = booking.id();
        let version = expected.advance(events.len());

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET payment_state = $2, version = $3, document = $4
            WHERE id = $1 AND version = $5
            "#,
        )
        .bind(booking_id.as_uuid())
        .bind(booking.payment_state().as_str())
        .bind(version.as_i64())
        .bind(serde_json::to_value(booking)?)
        .bind(expected.as_i64())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM bookings WHERE id = $1")
                    .bind(booking_id.as_uuid())
                    .fetch_optional(&mut *self.tx)
                    .await?;

            return match actual {
                Some(actual) => Err(StoreError::ConcurrencyConflict {
                    booking_id,
                    expected,
                    actual: Version::new(actual),
                }),
                None => Err(StoreError::BookingNotFound(booking_id)),
            };
        }

        let envelopes = EventEnvelope::sequence(booking_id, expected, events);
        self.append_events(&envelopes).await?;
        Ok(version)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for PostgresReservationStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn register_theatre(&self, theatre: &Theatre) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO theatres (id, movie_id, name, layout, seat_ids, unit_price, claimed_seats)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(theatre.id().as_uuid())
        .bind(theatre.movie_id().as_uuid())
        .bind(theatre.name())
        .bind(serde_json::to_value(theatre.layout())?)
        .bind(theatre.layout().seats().to_strings())
        .bind(theatre.unit_price().minor_units())
        .bind(theatre.claimed().to_strings())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("theatres_pkey")
            {
                return StoreError::DuplicateTheatre(theatre.id());
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_theatre(&self, theatre_id: TheatreId) -> Result<Option<Theatre>> {
        let row = sqlx::query(&format!(
            "SELECT {THEATRE_COLUMNS} FROM theatres WHERE id = $1"
        ))
        .bind(theatre_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_theatre).transpose()
    }

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query("SELECT document, version FROM bookings WHERE id = $1")
            .bind(booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_booking).transpose()
    }

    async fn bookings_for_payer(&self, payer_id: PrincipalId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(
            r#"
            SELECT document, version FROM bookings
            WHERE payer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(payer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_booking).collect()
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>> {
        let rows = sqlx::query("SELECT document, version FROM bookings ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_booking).collect()
    }

    async fn pending_bookings_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query(
            r#"
            SELECT document, version FROM bookings
            WHERE payment_state = 'PENDING' AND created_at < $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_booking).collect()
    }

    async fn booking_history(&self, booking_id: BookingId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, booking_id, version, event_type, recorded_at, payload
            FROM booking_events
            WHERE booking_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(booking_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_event).collect()
    }
}
