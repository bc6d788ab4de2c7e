use thiserror::Error;

use crate::Money;

use super::PaymentState;

/// Errors raised by booking commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    /// The command is not allowed in the booking's current state.
    #[error("Cannot {action} a booking in {state} state")]
    InvalidTransition {
        action: &'static str,
        state: PaymentState,
    },

    #[error("A booking must hold at least one seat")]
    EmptySeats,

    #[error("Booking amount must not be negative: {0}")]
    NegativeAmount(Money),

    #[error("Payment already initiated with order {0}")]
    PaymentAlreadyInitiated(String),

    #[error("No payment order was created for this booking")]
    PaymentNotInitiated,

    #[error("Booking is not paid through the payment gateway")]
    NotDeferred,

    #[error("Booking seats are already held")]
    SeatsAlreadyHeld,

    #[error("Booking seats are not held")]
    SeatsNotHeld,
}
