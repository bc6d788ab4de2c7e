//! Shared identifier types for the seat booking engine.

mod types;

pub use types::{BookingId, MovieId, PrincipalId, TheatreId};
