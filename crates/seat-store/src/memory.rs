use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, PrincipalId, TheatreId};
use domain::{Aggregate, Booking, BookingEvent, PaymentState, SeatSet, Theatre, Version};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    EventEnvelope, Result, StoreError,
    store::{ClaimOutcome, ReservationStore, StoreTransaction},
};

#[derive(Default)]
struct MemoryState {
    theatres: HashMap<TheatreId, Theatre>,
    bookings: HashMap<BookingId, Booking>,
    history: HashMap<BookingId, Vec<EventEnvelope>>,
}

/// In-memory reservation store for tests and single-process deployments.
///
/// A transaction holds the store lock from `begin` until it commits or is
/// dropped, so transactions are serializable. Changes are staged on the
/// transaction and only written back on commit.
#[derive(Clone, Default)]
pub struct InMemoryReservationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryReservationStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored bookings.
    pub async fn booking_count(&self) -> usize {
        self.state.lock().await.bookings.len()
    }

    fn newest_first(mut bookings: Vec<Booking>) -> Vec<Booking> {
        bookings.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        bookings
    }
}

/// Transaction over the in-memory store.
pub struct InMemoryTransaction {
    state: OwnedMutexGuard<MemoryState>,
    theatres: HashMap<TheatreId, Theatre>,
    bookings: HashMap<BookingId, Booking>,
    history: Vec<EventEnvelope>,
}

impl InMemoryTransaction {
    fn staged_theatre(&mut self, theatre_id: TheatreId) -> Result<&mut Theatre> {
        if !self.theatres.contains_key(&theatre_id) {
            let theatre = self
                .state
                .theatres
                .get(&theatre_id)
                .cloned()
                .ok_or(StoreError::TheatreNotFound(theatre_id))?;
            self.theatres.insert(theatre_id, theatre);
        }
        self.theatres
            .get_mut(&theatre_id)
            .ok_or(StoreError::TheatreNotFound(theatre_id))
    }

    fn current_booking(&self, booking_id: BookingId) -> Option<&Booking> {
        self.bookings
            .get(&booking_id)
            .or_else(|| self.state.bookings.get(&booking_id))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn theatre(&mut self, theatre_id: TheatreId) -> Result<Theatre> {
        Ok(self.staged_theatre(theatre_id)?.clone())
    }

    async fn try_claim(
        &mut self,
        theatre_id: TheatreId,
        seats: &SeatSet,
    ) -> Result<ClaimOutcome> {
        let theatre = self.staged_theatre(theatre_id)?;
        Ok(theatre.try_claim(seats).into())
    }

    async fn release(&mut self, theatre_id: TheatreId, seats: &SeatSet) -> Result<()> {
        self.staged_theatre(theatre_id)?.release(seats);
        Ok(())
    }

    async fn booking(&mut self, booking_id: BookingId) -> Result<Booking> {
        self.current_booking(booking_id)
            .cloned()
            .ok_or(StoreError::BookingNotFound(booking_id))
    }

    async fn insert_booking(
        &mut self,
        booking: &Booking,
        events: &[BookingEvent],
    ) -> Result<Version> {
        let booking_id = booking.id();
        if self.current_booking(booking_id).is_some() {
            return Err(StoreError::DuplicateBooking(booking_id));
        }
        if !self.state.theatres.contains_key(&booking.theatre_id()) {
            return Err(StoreError::TheatreNotFound(booking.theatre_id()));
        }

        let envelopes = EventEnvelope::sequence(booking_id, Version::initial(), events);
        let version = Version::initial().advance(events.len());

        let mut stored = booking.clone();
        stored.set_version(version);
        self.bookings.insert(booking_id, stored);
        self.history.extend(envelopes);
        Ok(version)
    }

    async fn update_booking(
        &mut self,
        booking: &Booking,
        expected: Version,
        events: &[BookingEvent],
    ) -> Result<Version> {
        let booking_id = booking.id();
        let actual = self
            .current_booking(booking_id)
            .map(|b| b.version())
            .ok_or(StoreError::BookingNotFound(booking_id))?;
        if actual != expected {
            return Err(StoreError::ConcurrencyConflict {
                booking_id,
                expected,
                actual,
            });
        }

        let envelopes = EventEnvelope::sequence(booking_id, expected, events);
        let version = expected.advance(events.len());

        let mut stored = booking.clone();
        stored.set_version(version);
        self.bookings.insert(booking_id, stored);
        self.history.extend(envelopes);
        Ok(version)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction {
            mut state,
            theatres,
            bookings,
            history,
        } = *self;

        state.theatres.extend(theatres);
        state.bookings.extend(bookings);
        for envelope in history {
            state
                .history
                .entry(envelope.booking_id)
                .or_default()
                .push(envelope);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let state = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            state,
            theatres: HashMap::new(),
            bookings: HashMap::new(),
            history: Vec::new(),
        }))
    }

    async fn register_theatre(&self, theatre: &Theatre) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.theatres.contains_key(&theatre.id()) {
            return Err(StoreError::DuplicateTheatre(theatre.id()));
        }
        state.theatres.insert(theatre.id(), theatre.clone());
        Ok(())
    }

    async fn get_theatre(&self, theatre_id: TheatreId) -> Result<Option<Theatre>> {
        Ok(self.state.lock().await.theatres.get(&theatre_id).cloned())
    }

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&booking_id).cloned())
    }

    async fn bookings_for_payer(&self, payer_id: PrincipalId) -> Result<Vec<Booking>> {
        let state = self.state.lock().await;
        let bookings = state
            .bookings
            .values()
            .filter(|b| b.payer_id() == payer_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(bookings))
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(Self::newest_first(state.bookings.values().cloned().collect()))
    }

    async fn pending_bookings_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.payment_state() == PaymentState::Pending && b.created_at() < cutoff)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at());
        Ok(bookings)
    }

    async fn booking_history(&self, booking_id: BookingId) -> Result<Vec<EventEnvelope>> {
        let state = self.state.lock().await;
        Ok(state.history.get(&booking_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReservationStoreExt;
    use common::MovieId;
    use domain::{Money, NewBooking, PaymentMode, SeatLayout};

    fn seats(ids: &[&str]) -> SeatSet {
        SeatSet::parse_request(ids.iter().copied()).unwrap()
    }

    async fn store_with_hall() -> (InMemoryReservationStore, Theatre) {
        let store = InMemoryReservationStore::new();
        let theatre = Theatre::new(
            TheatreId::new(),
            MovieId::new(),
            "Main Hall",
            SeatLayout::grid(&["A", "B"], 4).unwrap(),
            Money::from_minor(15_000),
        );
        store.register_theatre(&theatre).await.unwrap();
        (store, theatre)
    }

    fn pending_booking(theatre: &Theatre, seat_ids: &[&str]) -> (Booking, Vec<BookingEvent>) {
        Booking::create(
            NewBooking {
                booking_id: BookingId::new(),
                payer_id: PrincipalId::new(),
                theatre_id: theatre.id(),
                movie_id: theatre.movie_id(),
                seats: seats(seat_ids),
                payment_mode: PaymentMode::Deferred,
                amount: theatre.price_for(seat_ids.len()),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn claim_then_conflict_names_overlap() {
        let (store, theatre) = store_with_hall().await;

        let first = store.try_claim(theatre.id(), &seats(&["A1"])).await.unwrap();
        let second = store
            .try_claim(theatre.id(), &seats(&["A1", "A2"]))
            .await
            .unwrap();

        assert_eq!(first, ClaimOutcome::Claimed);
        assert_eq!(second, ClaimOutcome::Conflict(seats(&["A1"])));
        assert_eq!(
            store.claimed_seats(theatre.id()).await.unwrap(),
            seats(&["A1"])
        );
    }

    #[tokio::test]
    async fn claim_reports_invalid_seats() {
        let (store, theatre) = store_with_hall().await;
        let outcome = store
            .try_claim(theatre.id(), &seats(&["A1", "Q7"]))
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::InvalidSeats(seats(&["Q7"])));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (store, theatre) = store_with_hall().await;
        store.try_claim(theatre.id(), &seats(&["B1"])).await.unwrap();

        store.release(theatre.id(), &seats(&["B1"])).await.unwrap();
        store.release(theatre.id(), &seats(&["B1"])).await.unwrap();

        assert!(store.claimed_seats(theatre.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_theatre_is_not_found() {
        let store = InMemoryReservationStore::new();
        let result = store.try_claim(TheatreId::new(), &seats(&["A1"])).await;
        assert!(matches!(result, Err(StoreError::TheatreNotFound(_))));
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let (store, theatre) = store_with_hall().await;
        let (booking, events) = pending_booking(&theatre, &["A1"]);

        {
            let mut tx = store.begin().await.unwrap();
            tx.try_claim(theatre.id(), booking.seats()).await.unwrap();
            tx.insert_booking(&booking, &events).await.unwrap();
        }

        assert!(store.claimed_seats(theatre.id()).await.unwrap().is_empty());
        assert!(store.get_booking(booking.id()).await.unwrap().is_none());
        assert!(store.booking_history(booking.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let (store, theatre) = store_with_hall().await;
        let (booking, events) = pending_booking(&theatre, &["A1", "A2"]);

        let mut tx = store.begin().await.unwrap();
        tx.try_claim(theatre.id(), booking.seats()).await.unwrap();
        let version = tx.insert_booking(&booking, &events).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(version, Version::first());
        let stored = store.get_booking(booking.id()).await.unwrap().unwrap();
        assert_eq!(stored.version(), Version::first());
        assert_eq!(
            store.claimed_seats(theatre.id()).await.unwrap(),
            seats(&["A1", "A2"])
        );
        let history = store.booking_history(booking.id()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, "BookingCreated");
    }

    #[tokio::test]
    async fn stale_update_is_a_concurrency_conflict() {
        let (store, theatre) = store_with_hall().await;
        let (mut booking, events) = pending_booking(&theatre, &["A1"]);

        let mut tx = store.begin().await.unwrap();
        let version = tx.insert_booking(&booking, &events).await.unwrap();
        tx.commit().await.unwrap();
        booking.set_version(version);

        let cancel = booking.cancel(Utc::now()).unwrap();
        let mut tx = store.begin().await.unwrap();
        let result = tx
            .update_booking(&booking, Version::initial(), &cancel)
            .await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));

        let next = tx.update_booking(&booking, version, &cancel).await.unwrap();
        assert_eq!(next, Version::new(2));
    }

    #[tokio::test]
    async fn listings_are_newest_first() {
        let (store, theatre) = store_with_hall().await;
        let (older, older_events) = pending_booking(&theatre, &["A1"]);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let (newer, newer_events) = pending_booking(&theatre, &["A2"]);

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&older, &older_events).await.unwrap();
        tx.insert_booking(&newer, &newer_events).await.unwrap();
        tx.commit().await.unwrap();

        let all = store.all_bookings().await.unwrap();
        assert_eq!(all[0].id(), newer.id());
        assert_eq!(all[1].id(), older.id());

        let pending = store
            .pending_bookings_created_before(Utc::now())
            .await
            .unwrap();
        assert_eq!(pending[0].id(), older.id());

        let for_payer = store.bookings_for_payer(older.payer_id()).await.unwrap();
        assert_eq!(for_payer.len(), 1);
    }
}
