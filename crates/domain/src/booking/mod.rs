//! Booking aggregate and its payment lifecycle.

mod aggregate;
mod error;
pub mod events;
mod state;

pub use aggregate::{Booking, NewBooking, PaymentRef, TicketArtifact};
pub use error::BookingError;
pub use events::BookingEvent;
pub use state::{PaymentMode, PaymentState};
