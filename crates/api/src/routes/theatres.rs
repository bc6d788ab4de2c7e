//! Theatre seat map endpoint.

use axum::Json;
use axum::extract::{Path, State};
use common::TheatreId;
use reservation::SeatMap;
use seat_store::ReservationStore;

use super::{SharedState, parse_id};
use crate::error::ApiError;

/// GET /theatres/:id/seats: layout rows and claimed seats.
#[tracing::instrument(skip(state))]
pub async fn seat_map<S: ReservationStore + Clone + 'static>(
    State(state): State<SharedState<S>>,
    Path(id): Path<String>,
) -> Result<Json<SeatMap>, ApiError> {
    let theatre_id: TheatreId = parse_id(&id, "theatre")?;
    Ok(Json(state.coordinator.seat_map(theatre_id).await?))
}
