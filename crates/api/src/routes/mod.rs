//! HTTP route handlers.

pub mod bookings;
pub mod health;
pub mod metrics;
pub mod theatres;

use std::sync::Arc;

use reservation::ReservationCoordinator;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub coordinator: ReservationCoordinator<S>,
}

pub type SharedState<S> = Arc<AppState<S>>;

fn parse_id<T: From<Uuid>>(id: &str, what: &str) -> Result<T, ApiError> {
    let uuid = Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} ID format: {e}")))?;
    Ok(T::from(uuid))
}
