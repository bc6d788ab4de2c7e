//! Seat inventory and booking record storage.
//!
//! The atomic claim/release primitive lives here, together with booking
//! documents and their event history. Both backends expose the same
//! transactional interface so that a seat claim and the booking write it
//! pays for commit or roll back together.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use event::{EventEnvelope, EventId};
pub use memory::InMemoryReservationStore;
pub use postgres::PostgresReservationStore;
pub use store::{ClaimOutcome, ReservationStore, ReservationStoreExt, StoreTransaction};
