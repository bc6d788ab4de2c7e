use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, PrincipalId, TheatreId};
use domain::{Booking, BookingEvent, ClaimError, SeatSet, Theatre, Version};

use crate::{EventEnvelope, Result};

/// Result of an atomic seat claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Every requested seat is now claimed.
    Claimed,

    /// Nothing was claimed; these requested seats were already taken.
    Conflict(SeatSet),

    /// Nothing was claimed; these requested seats are not in the layout.
    InvalidSeats(SeatSet),
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed)
    }
}

impl From<std::result::Result<(), ClaimError>> for ClaimOutcome {
    fn from(result: std::result::Result<(), ClaimError>) -> Self {
        match result {
            Ok(()) => ClaimOutcome::Claimed,
            Err(ClaimError::Conflict(seats)) => ClaimOutcome::Conflict(seats),
            Err(ClaimError::InvalidSeats(seats)) => ClaimOutcome::InvalidSeats(seats),
        }
    }
}

/// A unit of work spanning seat inventory and booking records.
///
/// Nothing written through a transaction is visible to others until
/// [`StoreTransaction::commit`]. Dropping a transaction without committing
/// discards every change it made.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Loads a theatre, including its claimed seats.
    async fn theatre(&mut self, theatre_id: TheatreId) -> Result<Theatre>;

    /// Claims all of `seats` or none of them, as one conditional write.
    async fn try_claim(&mut self, theatre_id: TheatreId, seats: &SeatSet)
    -> Result<ClaimOutcome>;

    /// Removes `seats` from the claimed set. Unclaimed seats are ignored.
    async fn release(&mut self, theatre_id: TheatreId, seats: &SeatSet) -> Result<()>;

    /// Loads a booking document.
    async fn booking(&mut self, booking_id: BookingId) -> Result<Booking>;

    /// Stores a new booking with the events that created it.
    ///
    /// Returns the booking's version, which equals the number of events.
    async fn insert_booking(&mut self, booking: &Booking, events: &[BookingEvent])
    -> Result<Version>;

    /// Replaces a booking document if it is still at `expected`, appending `events`.
    ///
    /// Fails with `ConcurrencyConflict` if another writer got there first.
    async fn update_booking(
        &mut self,
        booking: &Booking,
        expected: Version,
        events: &[BookingEvent],
    ) -> Result<Version>;

    /// Makes every change visible atomically.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every change.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Storage for theatres, bookings and booking history.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Starts a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Registers a theatre from the catalog.
    async fn register_theatre(&self, theatre: &Theatre) -> Result<()>;

    async fn get_theatre(&self, theatre_id: TheatreId) -> Result<Option<Theatre>>;

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Bookings paid for by `payer_id`, newest first.
    async fn bookings_for_payer(&self, payer_id: PrincipalId) -> Result<Vec<Booking>>;

    /// Every booking, newest first.
    async fn all_bookings(&self) -> Result<Vec<Booking>>;

    /// PENDING bookings created strictly before `cutoff`, oldest first.
    async fn pending_bookings_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>>;

    /// Recorded events of a booking in version order.
    async fn booking_history(&self, booking_id: BookingId) -> Result<Vec<EventEnvelope>>;
}

/// Single-operation helpers, each running in its own transaction.
#[async_trait]
pub trait ReservationStoreExt: ReservationStore {
    /// Atomically claims `seats` and commits.
    async fn try_claim(&self, theatre_id: TheatreId, seats: &SeatSet) -> Result<ClaimOutcome> {
        let mut tx = self.begin().await?;
        let outcome = tx.try_claim(theatre_id, seats).await?;
        if outcome.is_claimed() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(outcome)
    }

    /// Releases `seats` and commits.
    async fn release(&self, theatre_id: TheatreId, seats: &SeatSet) -> Result<()> {
        let mut tx = self.begin().await?;
        tx.release(theatre_id, seats).await?;
        tx.commit().await
    }

    /// Returns the theatre's currently claimed seats.
    async fn claimed_seats(&self, theatre_id: TheatreId) -> Result<SeatSet> {
        let theatre = self
            .get_theatre(theatre_id)
            .await?
            .ok_or(crate::StoreError::TheatreNotFound(theatre_id))?;
        Ok(theatre.claimed().clone())
    }
}

// Blanket implementation for all ReservationStore implementations
impl<T: ReservationStore + ?Sized> ReservationStoreExt for T {}
