//! Reservation coordinator.
//!
//! Every operation that touches both the seat inventory and a booking runs
//! inside one store transaction. An error after seats were claimed or
//! released rolls the transaction back, which undoes the seat change.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{BookingId, MovieId, PrincipalId, TheatreId};
use domain::{
    Aggregate, Booking, BookingEvent, Money, NewBooking, PaymentMode, PaymentState, Principal,
    SeatSet, Theatre,
};
use seat_store::{ClaimOutcome, EventEnvelope, ReservationStore, StoreTransaction};
use serde::{Deserialize, Serialize};

use crate::error::{ReservationError, Result};
use crate::policy::{ClaimTiming, ReservationPolicy};
use crate::services::{OrderHandle, PaymentGateway};
use crate::settlement::{PaymentSettlement, SettleRequest};
use crate::signature::PaymentSignatureVerifier;
use crate::ticket::TicketIssuer;

/// A request to book seats in a theatre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub theatre_id: TheatreId,
    pub movie_id: MovieId,
    pub seats: Vec<String>,
    #[serde(default)]
    pub payment_mode: PaymentMode,
}

/// Result of a successful reservation.
#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub booking: Booking,

    /// Gateway order the client must pay; deferred bookings only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderHandle>,
}

/// Seat availability for a theatre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatMap {
    pub theatre_id: TheatreId,
    pub movie_id: MovieId,
    pub name: String,
    pub rows: Vec<Vec<String>>,
    pub claimed: Vec<String>,
    pub available: usize,
    pub unit_price: Money,
}

/// Orchestrates reservations, cancellations and seat reassignments.
pub struct ReservationCoordinator<S> {
    store: S,
    settlement: Arc<PaymentSettlement<S>>,
    issuer: TicketIssuer,
    policy: ReservationPolicy,
}

impl<S: Clone> Clone for ReservationCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            settlement: Arc::clone(&self.settlement),
            issuer: self.issuer.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S> ReservationCoordinator<S>
where
    S: ReservationStore + Clone,
{
    pub fn new(
        store: S,
        gateway: Arc<dyn PaymentGateway>,
        verifier: PaymentSignatureVerifier,
        issuer: TicketIssuer,
        policy: ReservationPolicy,
    ) -> Self {
        let settlement = PaymentSettlement::new(
            store.clone(),
            gateway,
            verifier,
            issuer.clone(),
            policy.clone(),
        );
        Self {
            store,
            settlement: Arc::new(settlement),
            issuer,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settlement(&self) -> &PaymentSettlement<S> {
        &self.settlement
    }

    pub fn policy(&self) -> &ReservationPolicy {
        &self.policy
    }

    /// Books seats for `principal`.
    ///
    /// Direct bookings are PAID with a ticket on return. Deferred bookings
    /// are PENDING with a gateway order; their seats are claimed now unless
    /// the policy defers the claim to settlement.
    ///
    /// A lost race fails with [`ReservationError::SeatsAlreadyBooked`] naming
    /// the taken seats and is never retried here.
    #[tracing::instrument(
        skip(self, principal, request),
        fields(
            principal_id = %principal.id,
            theatre_id = %request.theatre_id,
            mode = request.payment_mode.as_str()
        )
    )]
    pub async fn reserve(&self, principal: &Principal, request: ReserveRequest) -> Result<Reservation> {
        let started = Instant::now();

        let seats = SeatSet::parse_request(&request.seats)?;
        let theatre = self
            .store
            .get_theatre(request.theatre_id)
            .await?
            .ok_or(ReservationError::TheatreNotFound(request.theatre_id))?;

        if theatre.movie_id() != request.movie_id {
            return Err(ReservationError::InvalidInput(format!(
                "theatre {} does not show movie {}",
                theatre.id(),
                request.movie_id
            )));
        }

        let invalid = theatre.layout().invalid_seats(&seats);
        if !invalid.is_empty() {
            return Err(ReservationError::InvalidSeat { seats: invalid });
        }

        // The gateway is called before the transaction opens so a slow
        // gateway never holds seat locks. Visibly taken seats fail here
        // without creating an order.
        let order = match request.payment_mode {
            PaymentMode::Direct => None,
            PaymentMode::Deferred => {
                let taken = theatre.conflicts(&seats);
                if !taken.is_empty() {
                    let e = ReservationError::SeatsAlreadyBooked { seats: taken };
                    note_conflict(&e);
                    return Err(e);
                }
                Some(self.settlement.create_order(&theatre, &seats).await?)
            }
        };

        let mut tx = self.store.begin().await?;
        let result = self
            .reserve_in(&mut *tx, principal.id, &theatre, seats, request.payment_mode, order)
            .await;

        match result {
            Ok(reservation) => {
                tx.commit().await?;
                metrics::counter!("reservations_total", "mode" => request.payment_mode.as_str())
                    .increment(1);
                metrics::histogram!("reservation_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    booking_id = %reservation.booking.id(),
                    seats = %reservation.booking.seats(),
                    state = %reservation.booking.payment_state(),
                    "seats reserved"
                );
                Ok(reservation)
            }
            Err(e) => {
                note_conflict(&e);
                abort(tx, &e).await;
                Err(e)
            }
        }
    }

    async fn reserve_in(
        &self,
        tx: &mut dyn StoreTransaction,
        payer_id: PrincipalId,
        theatre: &Theatre,
        seats: SeatSet,
        payment_mode: PaymentMode,
        order: Option<OrderHandle>,
    ) -> Result<Reservation> {
        let claim_now = payment_mode == PaymentMode::Direct
            || self.policy.claim_timing == ClaimTiming::AtOrder;

        if claim_now {
            claim(tx, theatre.id(), &seats).await?;
        } else {
            // Late claim: fail early on seats that are visibly taken, but
            // leave the real claim to settlement.
            let current = tx.theatre(theatre.id()).await?;
            let taken = current.conflicts(&seats);
            if !taken.is_empty() {
                return Err(ReservationError::SeatsAlreadyBooked { seats: taken });
            }
        }

        let now = Utc::now();
        let (mut booking, mut events) = Booking::create(
            NewBooking {
                booking_id: BookingId::new(),
                payer_id,
                theatre_id: theatre.id(),
                movie_id: theatre.movie_id(),
                amount: theatre.price_for(seats.len()),
                seats,
                payment_mode,
            },
            now,
        )?;

        if claim_now {
            let claimed = booking.claim_seats(now)?;
            record(&mut booking, &mut events, claimed);
        }

        match &order {
            None => {
                let settled = booking.settle(None, None, now)?;
                record(&mut booking, &mut events, settled);

                let ticket = self.issuer.issue(&booking, theatre).await?;
                let issued = booking.issue_ticket(ticket, now)?;
                record(&mut booking, &mut events, issued);
            }
            Some(order) => {
                let initiated = booking.initiate_payment(order.order_id.clone(), now)?;
                record(&mut booking, &mut events, initiated);
            }
        }

        let version = tx.insert_booking(&booking, &events).await?;
        booking.set_version(version);

        Ok(Reservation { booking, order })
    }

    /// Confirms payment for a deferred booking.
    pub async fn settle(&self, request: SettleRequest) -> Result<Booking> {
        self.settlement.settle(request).await
    }

    /// Cancels a booking and releases its seats.
    ///
    /// Only the payer or an admin may cancel. Cancelling an already
    /// cancelled booking returns it unchanged.
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn cancel(&self, principal: &Principal, booking_id: BookingId) -> Result<Booking> {
        let mut tx = self.store.begin().await?;

        let result = match tx.booking(booking_id).await {
            Ok(booking) if !principal.can_act_for(booking.payer_id()) => Err(
                ReservationError::Forbidden(format!("cannot cancel booking {booking_id}")),
            ),
            Ok(booking) => cancel_in(&mut *tx, booking).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok((booking, true)) => {
                tx.commit().await?;
                metrics::counter!("bookings_cancelled_total").increment(1);
                tracing::info!("booking cancelled");
                Ok(booking)
            }
            Ok((booking, false)) => {
                tx.rollback().await?;
                Ok(booking)
            }
            Err(e) => {
                abort(tx, &e).await;
                Err(e)
            }
        }
    }

    /// Cancels a PENDING booking created before `cutoff`.
    ///
    /// Returns false if the booking was settled or resolved in the meantime.
    #[tracing::instrument(skip(self))]
    pub async fn expire_pending(&self, booking_id: BookingId, cutoff: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.store.begin().await?;

        let result = match tx.booking(booking_id).await {
            Ok(booking)
                if booking.payment_state() != PaymentState::Pending
                    || booking.created_at() >= cutoff =>
            {
                Ok((booking, false))
            }
            Ok(booking) => cancel_in(&mut *tx, booking).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok((booking, true)) => {
                tx.commit().await?;
                tracing::info!(seats = %booking.seats(), "pending hold expired");
                Ok(true)
            }
            Ok((_, false)) => {
                tx.rollback().await?;
                Ok(false)
            }
            Err(e) => {
                abort(tx, &e).await;
                Err(e)
            }
        }
    }

    /// Moves a booking to a different set of seats. Admin only.
    ///
    /// The release of dropped seats and the claim of new ones happen in one
    /// transaction: if any new seat is taken, the booking keeps exactly the
    /// seats it had. A PAID booking gets a fresh ticket naming the new seats.
    #[tracing::instrument(skip(self, principal, seats), fields(principal_id = %principal.id))]
    pub async fn reassign_seats(
        &self,
        principal: &Principal,
        booking_id: BookingId,
        seats: &[String],
    ) -> Result<Booking> {
        if !principal.is_admin() {
            return Err(ReservationError::Forbidden(
                "only admins may reassign seats".to_string(),
            ));
        }
        let seats = SeatSet::parse_request(seats)?;

        let mut tx = self.store.begin().await?;
        match self.reassign_in(&mut *tx, booking_id, seats).await {
            Ok((booking, true)) => {
                tx.commit().await?;
                metrics::counter!("seat_reassignments_total").increment(1);
                tracing::info!(seats = %booking.seats(), "seats reassigned");
                Ok(booking)
            }
            Ok((booking, false)) => {
                tx.rollback().await?;
                Ok(booking)
            }
            Err(e) => {
                abort(tx, &e).await;
                Err(e)
            }
        }
    }

    async fn reassign_in(
        &self,
        tx: &mut dyn StoreTransaction,
        booking_id: BookingId,
        seats: SeatSet,
    ) -> Result<(Booking, bool)> {
        let mut booking = tx.booking(booking_id).await?;
        let theatre = tx.theatre(booking.theatre_id()).await?;

        let invalid = theatre.layout().invalid_seats(&seats);
        if !invalid.is_empty() {
            return Err(ReservationError::InvalidSeat { seats: invalid });
        }

        let now = Utc::now();
        let reassigned = booking.reassign(seats.clone(), theatre.price_for(seats.len()), now)?;
        if reassigned.is_empty() {
            return Ok((booking, false));
        }

        if booking.seats_held() {
            let to_release = booking.seats().difference(&seats);
            let to_claim = seats.difference(booking.seats());
            if !to_release.is_empty() {
                tx.release(theatre.id(), &to_release).await?;
            }
            if !to_claim.is_empty() {
                claim(tx, theatre.id(), &to_claim).await?;
            }
        } else {
            let taken = theatre.conflicts(&seats);
            if !taken.is_empty() {
                return Err(ReservationError::SeatsAlreadyBooked { seats: taken });
            }
        }

        let expected = booking.version();
        let mut events = Vec::new();
        record(&mut booking, &mut events, reassigned);

        if booking.payment_state() == PaymentState::Paid {
            let ticket = self.issuer.issue(&booking, &theatre).await?;
            let issued = booking.issue_ticket(ticket, now)?;
            record(&mut booking, &mut events, issued);
        }

        let version = tx.update_booking(&booking, expected, &events).await?;
        booking.set_version(version);
        Ok((booking, true))
    }

    /// Loads a booking visible to `principal`.
    pub async fn get_booking(&self, principal: &Principal, booking_id: BookingId) -> Result<Booking> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(ReservationError::BookingNotFound(booking_id))?;

        if !principal.can_act_for(booking.payer_id()) {
            return Err(ReservationError::Forbidden(format!(
                "cannot view booking {booking_id}"
            )));
        }
        Ok(booking)
    }

    /// Bookings paid for by `payer_id`, newest first.
    pub async fn bookings_for_payer(
        &self,
        principal: &Principal,
        payer_id: PrincipalId,
    ) -> Result<Vec<Booking>> {
        if !principal.can_act_for(payer_id) {
            return Err(ReservationError::Forbidden(format!(
                "cannot list bookings of {payer_id}"
            )));
        }
        Ok(self.store.bookings_for_payer(payer_id).await?)
    }

    /// Every booking, newest first. Admin only.
    pub async fn all_bookings(&self, principal: &Principal) -> Result<Vec<Booking>> {
        if !principal.is_admin() {
            return Err(ReservationError::Forbidden(
                "only admins may list all bookings".to_string(),
            ));
        }
        Ok(self.store.all_bookings().await?)
    }

    /// Recorded events of a booking visible to `principal`.
    pub async fn booking_history(
        &self,
        principal: &Principal,
        booking_id: BookingId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get_booking(principal, booking_id).await?;
        Ok(self.store.booking_history(booking_id).await?)
    }

    /// Layout and currently claimed seats of a theatre.
    pub async fn seat_map(&self, theatre_id: TheatreId) -> Result<SeatMap> {
        let theatre = self
            .store
            .get_theatre(theatre_id)
            .await?
            .ok_or(ReservationError::TheatreNotFound(theatre_id))?;

        let rows = theatre
            .layout()
            .rows()
            .iter()
            .map(|row| row.iter().map(|seat| seat.as_str().to_string()).collect())
            .collect();

        Ok(SeatMap {
            theatre_id: theatre.id(),
            movie_id: theatre.movie_id(),
            name: theatre.name().to_string(),
            rows,
            claimed: theatre.claimed().to_strings(),
            available: theatre
                .layout()
                .capacity()
                .saturating_sub(theatre.claimed().len()),
            unit_price: theatre.unit_price(),
        })
    }
}

impl<S> std::fmt::Debug for ReservationCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationCoordinator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn note_conflict(e: &ReservationError) {
    if let ReservationError::SeatsAlreadyBooked { seats } = e {
        metrics::counter!("reservation_conflicts_total").increment(1);
        tracing::info!(seats = %seats, "seats already booked");
    }
}

/// Claims `seats` or fails naming the seats that stopped it.
async fn claim(tx: &mut dyn StoreTransaction, theatre_id: TheatreId, seats: &SeatSet) -> Result<()> {
    match tx.try_claim(theatre_id, seats).await? {
        ClaimOutcome::Claimed => Ok(()),
        ClaimOutcome::Conflict(taken) => Err(ReservationError::SeatsAlreadyBooked { seats: taken }),
        ClaimOutcome::InvalidSeats(invalid) => Err(ReservationError::InvalidSeat { seats: invalid }),
    }
}

/// Releases the booking's held seats and marks it CANCELLED.
///
/// Returns false when the booking was already cancelled.
async fn cancel_in(tx: &mut dyn StoreTransaction, mut booking: Booking) -> Result<(Booking, bool)> {
    let cancelled = booking.cancel(Utc::now())?;
    if cancelled.is_empty() {
        return Ok((booking, false));
    }

    let held = booking.held_seats();
    if !held.is_empty() {
        tx.release(booking.theatre_id(), &held).await?;
    }

    let expected = booking.version();
    let mut events = Vec::new();
    record(&mut booking, &mut events, cancelled);

    let version = tx.update_booking(&booking, expected, &events).await?;
    booking.set_version(version);
    Ok((booking, true))
}

/// Applies freshly produced events and queues them for the store.
pub(crate) fn record(booking: &mut Booking, events: &mut Vec<BookingEvent>, new: Vec<BookingEvent>) {
    booking.apply_events(new.iter().cloned());
    events.extend(new);
}

/// Rolls back after `cause`. Dropping the transaction discards it anyway,
/// so a failed rollback is only logged.
pub(crate) async fn abort(tx: Box<dyn StoreTransaction>, cause: &ReservationError) {
    match tx.rollback().await {
        Ok(()) => tracing::debug!(cause = %cause, "transaction rolled back"),
        Err(e) => tracing::warn!(cause = %cause, error = %e, "rollback failed"),
    }
}
