//! Booking domain events.

use chrono::{DateTime, Utc};
use common::{BookingId, MovieId, PrincipalId, TheatreId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::{Money, SeatSet};

use super::{PaymentMode, TicketArtifact};

/// Events that can occur on a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingEvent {
    /// Booking was created in the PENDING state.
    BookingCreated(BookingCreatedData),

    /// A gateway order was created for the booking.
    PaymentInitiated(PaymentInitiatedData),

    /// The booking's seats were claimed in the theatre inventory.
    SeatsClaimed(SeatsClaimedData),

    /// Payment was confirmed.
    PaymentSettled(PaymentSettledData),

    /// Payment could not be honoured.
    PaymentFailed(PaymentFailedData),

    /// A verified payment arrived for a booking that no longer holds seats.
    PaymentUnhonoured(PaymentUnhonouredData),

    /// A ticket artifact was attached.
    TicketIssued(TicketIssuedData),

    /// Seats were changed by an admin correction.
    SeatsReassigned(SeatsReassignedData),

    /// Booking was cancelled.
    BookingCancelled(BookingCancelledData),
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingCreated(_) => "BookingCreated",
            BookingEvent::PaymentInitiated(_) => "PaymentInitiated",
            BookingEvent::SeatsClaimed(_) => "SeatsClaimed",
            BookingEvent::PaymentSettled(_) => "PaymentSettled",
            BookingEvent::PaymentFailed(_) => "PaymentFailed",
            BookingEvent::PaymentUnhonoured(_) => "PaymentUnhonoured",
            BookingEvent::TicketIssued(_) => "TicketIssued",
            BookingEvent::SeatsReassigned(_) => "SeatsReassigned",
            BookingEvent::BookingCancelled(_) => "BookingCancelled",
        }
    }
}

/// Data for BookingCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCreatedData {
    pub booking_id: BookingId,
    pub payer_id: PrincipalId,
    pub theatre_id: TheatreId,
    pub movie_id: MovieId,
    pub seats: SeatSet,
    pub payment_mode: PaymentMode,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

/// Data for PaymentInitiated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInitiatedData {
    /// Gateway order id.
    pub order_id: String,
    pub initiated_at: DateTime<Utc>,
}

/// Data for SeatsClaimed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatsClaimedData {
    pub seats: SeatSet,
    pub claimed_at: DateTime<Utc>,
}

/// Data for PaymentSettled event.
///
/// Direct bookings settle without a gateway payment id or signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSettledData {
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub settled_at: DateTime<Utc>,
}

/// Data for PaymentFailed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    /// Seats the booking held when payment failed; the caller releases them.
    pub released: SeatSet,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Data for PaymentUnhonoured event. The payment must be refunded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentUnhonouredData {
    pub payment_id: String,
    pub signature: String,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Data for TicketIssued event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketIssuedData {
    pub ticket: TicketArtifact,
    pub issued_at: DateTime<Utc>,
}

/// Data for SeatsReassigned event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatsReassignedData {
    pub previous: SeatSet,
    pub seats: SeatSet,
    pub amount: Money,
    pub reassigned_at: DateTime<Utc>,
}

/// Data for BookingCancelled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCancelledData {
    /// Seats returned to the theatre; empty when none were held.
    pub released: SeatSet,
    pub cancelled_at: DateTime<Utc>,
}
