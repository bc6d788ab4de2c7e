//! Booking aggregate implementation.

use chrono::{DateTime, Utc};
use common::{BookingId, MovieId, PrincipalId, TheatreId};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::{Money, SeatSet, Version};

use super::events::{
    BookingCancelledData, BookingCreatedData, PaymentFailedData, PaymentInitiatedData,
    PaymentSettledData, PaymentUnhonouredData, SeatsClaimedData, SeatsReassignedData,
    TicketIssuedData,
};
use super::{BookingError, BookingEvent, PaymentMode, PaymentState};

/// Gateway references recorded once payment is initiated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRef {
    pub order_id: String,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

/// Opaque ticket artifact produced by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketArtifact(String);

impl TicketArtifact {
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Input for creating a booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_id: BookingId,
    pub payer_id: PrincipalId,
    pub theatre_id: TheatreId,
    pub movie_id: MovieId,
    pub seats: SeatSet,
    pub payment_mode: PaymentMode,
    pub amount: Money,
}

/// Booking aggregate root.
///
/// `seats_held` tracks whether the booking's seats are currently claimed in
/// the theatre inventory. A PAID booking always holds its seats; a FAILED or
/// CANCELLED booking never does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    id: BookingId,

    #[serde(default)]
    version: Version,

    payer_id: PrincipalId,
    theatre_id: TheatreId,
    movie_id: MovieId,
    seats: SeatSet,
    payment_mode: PaymentMode,
    payment_state: PaymentState,
    seats_held: bool,
    amount: Money,
    payment_ref: Option<PaymentRef>,
    ticket: Option<TicketArtifact>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Aggregate for Booking {
    type Event = BookingEvent;
    type Error = BookingError;

    fn aggregate_type() -> &'static str {
        "Booking"
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            BookingEvent::BookingCreated(data) => self.apply_created(data),
            BookingEvent::PaymentInitiated(data) => {
                self.payment_ref = Some(PaymentRef {
                    order_id: data.order_id,
                    payment_id: None,
                    signature: None,
                });
                self.updated_at = data.initiated_at;
            }
            BookingEvent::SeatsClaimed(data) => {
                self.seats_held = true;
                self.updated_at = data.claimed_at;
            }
            BookingEvent::PaymentSettled(data) => {
                self.payment_state = PaymentState::Paid;
                self.record_payment(data.payment_id, data.signature);
                self.updated_at = data.settled_at;
            }
            BookingEvent::PaymentFailed(data) => {
                self.payment_state = PaymentState::Failed;
                self.seats_held = false;
                self.ticket = None;
                self.record_payment(data.payment_id, data.signature);
                self.failure_reason = Some(data.reason);
                self.updated_at = data.failed_at;
            }
            BookingEvent::PaymentUnhonoured(data) => {
                self.record_payment(Some(data.payment_id), Some(data.signature));
                self.failure_reason = Some(data.reason);
                self.updated_at = data.recorded_at;
            }
            BookingEvent::TicketIssued(data) => {
                self.ticket = Some(data.ticket);
                self.updated_at = data.issued_at;
            }
            BookingEvent::SeatsReassigned(data) => {
                self.seats = data.seats;
                self.amount = data.amount;
                // The old artifact names the previous seats.
                self.ticket = None;
                self.updated_at = data.reassigned_at;
            }
            BookingEvent::BookingCancelled(data) => {
                self.payment_state = PaymentState::Cancelled;
                self.seats_held = false;
                self.ticket = None;
                self.updated_at = data.cancelled_at;
            }
        }
    }
}

// Query methods
impl Booking {
    pub fn id(&self) -> BookingId {
        self.id
    }

    pub fn payer_id(&self) -> PrincipalId {
        self.payer_id
    }

    pub fn theatre_id(&self) -> TheatreId {
        self.theatre_id
    }

    pub fn movie_id(&self) -> MovieId {
        self.movie_id
    }

    pub fn seats(&self) -> &SeatSet {
        &self.seats
    }

    pub fn payment_mode(&self) -> PaymentMode {
        self.payment_mode
    }

    pub fn payment_state(&self) -> PaymentState {
        self.payment_state
    }

    /// Returns true while the booking's seats are claimed in the theatre.
    pub fn seats_held(&self) -> bool {
        self.seats_held
    }

    /// Seats this booking currently holds in the theatre inventory.
    pub fn held_seats(&self) -> SeatSet {
        if self.seats_held {
            self.seats.clone()
        } else {
            SeatSet::new()
        }
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn payment_ref(&self) -> Option<&PaymentRef> {
        self.payment_ref.as_ref()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.payment_ref.as_ref().map(|r| r.order_id.as_str())
    }

    pub fn ticket(&self) -> Option<&TicketArtifact> {
        self.ticket.as_ref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.payment_state.is_terminal()
    }
}

// Command methods - these validate and return events
impl Booking {
    /// Opens a new PENDING booking.
    pub fn create(
        new: NewBooking,
        now: DateTime<Utc>,
    ) -> Result<(Booking, Vec<BookingEvent>), BookingError> {
        if new.seats.is_empty() {
            return Err(BookingError::EmptySeats);
        }
        if new.amount.is_negative() {
            return Err(BookingError::NegativeAmount(new.amount));
        }

        let events = vec![BookingEvent::BookingCreated(BookingCreatedData {
            booking_id: new.booking_id,
            payer_id: new.payer_id,
            theatre_id: new.theatre_id,
            movie_id: new.movie_id,
            seats: new.seats,
            payment_mode: new.payment_mode,
            amount: new.amount,
            created_at: now,
        })];

        let mut booking = Booking::default();
        booking.apply_events(events.clone());
        Ok((booking, events))
    }

    /// Records the gateway order created for a deferred booking.
    pub fn initiate_payment(
        &self,
        order_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        if self.payment_mode != PaymentMode::Deferred {
            return Err(BookingError::NotDeferred);
        }
        self.ensure(self.payment_state.can_settle(), "initiate payment for")?;
        if let Some(existing) = &self.payment_ref {
            return Err(BookingError::PaymentAlreadyInitiated(
                existing.order_id.clone(),
            ));
        }

        Ok(vec![BookingEvent::PaymentInitiated(PaymentInitiatedData {
            order_id: order_id.into(),
            initiated_at: now,
        })])
    }

    /// Records that the booking's seats were claimed in the inventory.
    pub fn claim_seats(&self, now: DateTime<Utc>) -> Result<Vec<BookingEvent>, BookingError> {
        self.ensure(self.payment_state.can_settle(), "claim seats for")?;
        if self.seats_held {
            return Err(BookingError::SeatsAlreadyHeld);
        }

        Ok(vec![BookingEvent::SeatsClaimed(SeatsClaimedData {
            seats: self.seats.clone(),
            claimed_at: now,
        })])
    }

    /// Marks payment as confirmed. Seats must already be held.
    pub fn settle(
        &self,
        payment_id: Option<String>,
        signature: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        self.ensure(self.payment_state.can_settle(), "settle")?;
        if !self.seats_held {
            return Err(BookingError::SeatsNotHeld);
        }

        Ok(vec![BookingEvent::PaymentSettled(PaymentSettledData {
            payment_id,
            signature,
            settled_at: now,
        })])
    }

    /// Marks payment as failed; any held seats are reported in the event so
    /// the caller can release them.
    pub fn fail_payment(
        &self,
        payment_id: Option<String>,
        signature: Option<String>,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        self.ensure(self.payment_state.can_fail(), "fail payment for")?;

        Ok(vec![BookingEvent::PaymentFailed(PaymentFailedData {
            payment_id,
            signature,
            released: self.held_seats(),
            reason: reason.into(),
            failed_at: now,
        })])
    }

    /// Records a verified gateway payment for a FAILED or CANCELLED booking.
    ///
    /// The state is unchanged; the payment reference is kept so the payment
    /// can be refunded.
    pub fn record_unhonoured_payment(
        &self,
        payment_id: impl Into<String>,
        signature: impl Into<String>,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        self.ensure(
            self.payment_state.can_record_unhonoured_payment(),
            "record an unhonoured payment for",
        )?;
        if self.payment_ref.is_none() {
            return Err(BookingError::PaymentNotInitiated);
        }

        Ok(vec![BookingEvent::PaymentUnhonoured(PaymentUnhonouredData {
            payment_id: payment_id.into(),
            signature: signature.into(),
            reason: reason.into(),
            recorded_at: now,
        })])
    }

    /// Attaches a ticket artifact to a PAID booking.
    pub fn issue_ticket(
        &self,
        ticket: TicketArtifact,
        now: DateTime<Utc>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        self.ensure(self.payment_state.can_issue_ticket(), "issue a ticket for")?;

        Ok(vec![BookingEvent::TicketIssued(TicketIssuedData {
            ticket,
            issued_at: now,
        })])
    }

    /// Replaces the booking's seats. Returns no events when the seats are unchanged.
    pub fn reassign(
        &self,
        seats: SeatSet,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        self.ensure(self.payment_state.can_reassign(), "reassign seats of")?;
        if seats.is_empty() {
            return Err(BookingError::EmptySeats);
        }
        if amount.is_negative() {
            return Err(BookingError::NegativeAmount(amount));
        }
        if seats == self.seats {
            return Ok(vec![]);
        }

        Ok(vec![BookingEvent::SeatsReassigned(SeatsReassignedData {
            previous: self.seats.clone(),
            seats,
            amount,
            reassigned_at: now,
        })])
    }

    /// Cancels the booking. Returns no events when it is already cancelled.
    pub fn cancel(&self, now: DateTime<Utc>) -> Result<Vec<BookingEvent>, BookingError> {
        if self.payment_state == PaymentState::Cancelled {
            return Ok(vec![]);
        }

        Ok(vec![BookingEvent::BookingCancelled(BookingCancelledData {
            released: self.held_seats(),
            cancelled_at: now,
        })])
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), BookingError> {
        if allowed {
            Ok(())
        } else {
            Err(BookingError::InvalidTransition {
                action,
                state: self.payment_state,
            })
        }
    }
}

// Event application helpers
impl Booking {
    fn apply_created(&mut self, data: BookingCreatedData) {
        self.id = data.booking_id;
        self.payer_id = data.payer_id;
        self.theatre_id = data.theatre_id;
        self.movie_id = data.movie_id;
        self.seats = data.seats;
        self.payment_mode = data.payment_mode;
        self.payment_state = PaymentState::Pending;
        self.seats_held = false;
        self.amount = data.amount;
        self.created_at = data.created_at;
        self.updated_at = data.created_at;
    }

    fn record_payment(&mut self, payment_id: Option<String>, signature: Option<String>) {
        if let Some(payment_ref) = self.payment_ref.as_mut() {
            if payment_id.is_some() {
                payment_ref.payment_id = payment_id;
            }
            if signature.is_some() {
                payment_ref.signature = signature;
            }
        }
    }
}
