//! Domain model for the seat booking engine.
//!
//! This crate provides:
//! - Seat identifiers, seat sets and theatre layouts
//! - The theatre claimed-seat invariant (all-or-nothing claims)
//! - The `Booking` aggregate with its payment state machine and events
//! - Principals and roles supplied by authentication

pub mod aggregate;
pub mod booking;
mod money;
mod principal;
mod seat;
pub mod theatre;
mod version;

pub use aggregate::{Aggregate, DomainEvent};
pub use booking::{
    Booking, BookingError, BookingEvent, NewBooking, PaymentMode, PaymentRef, PaymentState,
    TicketArtifact,
};
pub use money::Money;
pub use principal::{Principal, Role};
pub use seat::{SeatError, SeatId, SeatSet};
pub use theatre::{ClaimError, SeatLayout, Theatre};
pub use version::Version;
