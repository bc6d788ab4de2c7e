//! Seat reservation and payment settlement engine.
//!
//! A reservation claims seats and writes the booking in one store
//! transaction. Deferred bookings are confirmed later by settlement, which
//! verifies the gateway signature, claims seats if they were not claimed at
//! order time, and issues the ticket.
//!
//! Any failure after seats are claimed rolls the transaction back, which is
//! the compensating release of those seats.

pub mod coordinator;
pub mod error;
pub mod expiry;
pub mod policy;
pub mod services;
pub mod settlement;
pub mod signature;
pub mod ticket;

pub use coordinator::{Reservation, ReservationCoordinator, ReserveRequest, SeatMap};
pub use error::{ReservationError, Result};
pub use expiry::PendingHoldSweeper;
pub use policy::{ClaimTiming, ReservationPolicy};
pub use services::{
    Catalog, DataUrlRenderer, InMemoryCatalog, InMemoryPaymentGateway, Movie, OrderHandle,
    PaymentConfirmation, PaymentGateway, TicketRenderer,
};
pub use settlement::{PaymentSettlement, SettleRequest};
pub use signature::{PaymentSignatureVerifier, Verification};
pub use ticket::{TicketIssuer, TicketPayload};
