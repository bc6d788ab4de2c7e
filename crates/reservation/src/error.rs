//! Reservation error types.

use common::{BookingId, TheatreId};
use domain::{BookingError, SeatError, SeatSet};
use seat_store::StoreError;
use thiserror::Error;

/// Errors that can occur while reserving, settling, cancelling or reassigning.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Missing or malformed input, rejected before any mutation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested seats are not in the theatre layout.
    #[error("Invalid seat(s): {seats}")]
    InvalidSeat { seats: SeatSet },

    /// Requested seats are held by another booking. Pick different seats.
    #[error("Seat(s) already booked: {seats}")]
    SeatsAlreadyBooked { seats: SeatSet },

    /// The payment signature did not verify.
    #[error("Invalid payment signature")]
    PaymentSignatureInvalid,

    /// The order id does not belong to the booking.
    #[error("Order ID mismatch for booking {booking_id}")]
    OrderMismatch { booking_id: BookingId },

    /// Payment succeeded but the seats could not be claimed; needs a refund.
    #[error(
        "Payment {payment_id} for booking {booking_id} succeeded but seat(s) are unavailable: {seats}"
    )]
    PaidButSeatsUnavailable {
        booking_id: BookingId,
        payment_id: String,
        seats: SeatSet,
    },

    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    #[error("Theatre not found: {0}")]
    TheatreNotFound(TheatreId),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    /// The booking is not in a state that allows the operation.
    #[error("Invalid booking state: {0}")]
    InvalidState(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Ticket renderer error: {0}")]
    Renderer(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl ReservationError {
    /// Returns true only for transient store failures.
    ///
    /// Business outcomes such as seat conflicts or forged signatures are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReservationError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ReservationError::InvalidInput(_) => "INVALID_INPUT",
            ReservationError::InvalidSeat { .. } => "INVALID_SEAT",
            ReservationError::SeatsAlreadyBooked { .. } => "SEATS_ALREADY_BOOKED",
            ReservationError::PaymentSignatureInvalid => "PAYMENT_SIGNATURE_INVALID",
            ReservationError::OrderMismatch { .. } => "ORDER_MISMATCH",
            ReservationError::PaidButSeatsUnavailable { .. } => "PAID_BUT_SEATS_UNAVAILABLE",
            ReservationError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            ReservationError::TheatreNotFound(_) => "THEATRE_NOT_FOUND",
            ReservationError::Forbidden(_) => "FORBIDDEN",
            ReservationError::InvalidState(_) => "INVALID_STATE",
            ReservationError::Gateway(_) => "GATEWAY_ERROR",
            ReservationError::Renderer(_) => "RENDERER_ERROR",
            ReservationError::Catalog(_) => "CATALOG_ERROR",
            ReservationError::Store(_) => "STORE_ERROR",
        }
    }

    /// Seats named by the error, if any.
    pub fn seats(&self) -> Option<&SeatSet> {
        match self {
            ReservationError::InvalidSeat { seats }
            | ReservationError::SeatsAlreadyBooked { seats }
            | ReservationError::PaidButSeatsUnavailable { seats, .. } => Some(seats),
            _ => None,
        }
    }
}

impl From<StoreError> for ReservationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TheatreNotFound(id) => ReservationError::TheatreNotFound(id),
            StoreError::BookingNotFound(id) => ReservationError::BookingNotFound(id),
            other => ReservationError::Store(other),
        }
    }
}

impl From<BookingError> for ReservationError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::EmptySeats | BookingError::NegativeAmount(_) => {
                ReservationError::InvalidInput(e.to_string())
            }
            other => ReservationError::InvalidState(other.to_string()),
        }
    }
}

impl From<SeatError> for ReservationError {
    fn from(e: SeatError) -> Self {
        ReservationError::InvalidInput(e.to_string())
    }
}

/// Convenience type alias for reservation results.
pub type Result<T> = std::result::Result<T, ReservationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Version;

    fn seats(ids: &[&str]) -> SeatSet {
        SeatSet::parse_request(ids.iter().copied()).unwrap()
    }

    #[test]
    fn business_outcomes_are_not_retryable() {
        let conflict = ReservationError::SeatsAlreadyBooked {
            seats: seats(&["A1"]),
        };
        assert!(!conflict.is_retryable());
        assert!(!ReservationError::PaymentSignatureInvalid.is_retryable());
        assert!(
            !ReservationError::PaidButSeatsUnavailable {
                booking_id: BookingId::new(),
                payment_id: "pay_1".into(),
                seats: seats(&["A1"]),
            }
            .is_retryable()
        );
    }

    #[test]
    fn stale_booking_write_is_retryable() {
        let err: ReservationError = StoreError::ConcurrencyConflict {
            booking_id: BookingId::new(),
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into();
        assert!(err.is_retryable());
        assert_eq!(err.code(), "STORE_ERROR");
    }

    #[test]
    fn contended_claim_is_retryable_and_names_no_seats() {
        let err: ReservationError = StoreError::ClaimContention(TheatreId::new()).into();
        assert!(err.is_retryable());
        assert!(err.seats().is_none());
    }

    #[test]
    fn store_not_found_maps_to_domain_not_found() {
        let id = BookingId::new();
        let err: ReservationError = StoreError::BookingNotFound(id).into();
        assert!(matches!(err, ReservationError::BookingNotFound(found) if found == id));
    }

    #[test]
    fn conflict_names_seats() {
        let err = ReservationError::SeatsAlreadyBooked {
            seats: seats(&["A2", "A1"]),
        };
        assert_eq!(err.to_string(), "Seat(s) already booked: A1, A2");
        assert_eq!(err.seats(), Some(&seats(&["A1", "A2"])));
    }

    #[test]
    fn booking_errors_map_to_input_or_state() {
        let empty: ReservationError = BookingError::EmptySeats.into();
        assert!(matches!(empty, ReservationError::InvalidInput(_)));

        let state: ReservationError = BookingError::SeatsNotHeld.into();
        assert!(matches!(state, ReservationError::InvalidState(_)));
    }
}
