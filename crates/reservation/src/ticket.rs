//! Ticket issuance.

use std::sync::Arc;

use common::BookingId;
use domain::{Booking, TicketArtifact, Theatre};
use serde::{Deserialize, Serialize};

use crate::error::{ReservationError, Result};
use crate::services::{Catalog, DataUrlRenderer, TicketRenderer};

/// Movie name printed when the catalog does not know the movie.
const UNKNOWN_MOVIE: &str = "Unknown";

/// What a ticket encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPayload {
    pub booking_id: BookingId,
    pub movie_name: String,
    pub theatre_name: String,
    pub seat_numbers: Vec<String>,
    pub user_id: String,
}

impl TicketPayload {
    /// Re-derives the payload from an artifact rendered by [`DataUrlRenderer`].
    pub fn from_artifact(artifact: &TicketArtifact) -> Result<Self> {
        let value = DataUrlRenderer::decode(artifact)?;
        serde_json::from_value(value).map_err(|e| ReservationError::Renderer(e.to_string()))
    }
}

/// Builds ticket payloads and hands them to the renderer.
#[derive(Clone)]
pub struct TicketIssuer {
    catalog: Arc<dyn Catalog>,
    renderer: Arc<dyn TicketRenderer>,
}

impl TicketIssuer {
    pub fn new(catalog: Arc<dyn Catalog>, renderer: Arc<dyn TicketRenderer>) -> Self {
        Self { catalog, renderer }
    }

    /// Builds the payload for the booking's current seats.
    pub async fn payload(&self, booking: &Booking, theatre: &Theatre) -> Result<TicketPayload> {
        let movie_name = self
            .catalog
            .movie(booking.movie_id())
            .await?
            .map(|movie| movie.name)
            .unwrap_or_else(|| UNKNOWN_MOVIE.to_string());

        Ok(TicketPayload {
            booking_id: booking.id(),
            movie_name,
            theatre_name: theatre.name().to_string(),
            seat_numbers: booking.seats().to_strings(),
            user_id: booking.payer_id().to_string(),
        })
    }

    /// Renders a fresh artifact. Must be called again whenever the seats change.
    #[tracing::instrument(skip(self, booking, theatre), fields(booking_id = %booking.id()))]
    pub async fn issue(&self, booking: &Booking, theatre: &Theatre) -> Result<TicketArtifact> {
        let payload = self.payload(booking, theatre).await?;
        let value =
            serde_json::to_value(&payload).map_err(|e| ReservationError::Renderer(e.to_string()))?;
        let artifact = self.renderer.render(&value).await?;
        tracing::debug!(seats = %booking.seats(), "ticket rendered");
        Ok(artifact)
    }
}

impl std::fmt::Debug for TicketIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketIssuer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryCatalog, Movie};
    use chrono::Utc;
    use common::{MovieId, PrincipalId, TheatreId};
    use domain::{Money, NewBooking, PaymentMode, SeatLayout, SeatSet};

    fn fixture(movie_id: MovieId) -> (Booking, Theatre) {
        let theatre = Theatre::new(
            TheatreId::new(),
            movie_id,
            "Main Hall",
            SeatLayout::grid(&["A"], 2).unwrap(),
            Money::from_minor(250),
        );
        let (booking, _) = Booking::create(
            NewBooking {
                booking_id: BookingId::new(),
                payer_id: PrincipalId::new(),
                theatre_id: theatre.id(),
                movie_id,
                seats: SeatSet::parse_request(["A2", "A1"]).unwrap(),
                payment_mode: PaymentMode::Direct,
                amount: Money::from_minor(500),
            },
            Utc::now(),
        )
        .unwrap();
        (booking, theatre)
    }

    #[tokio::test]
    async fn issued_ticket_round_trips() {
        let catalog = InMemoryCatalog::new();
        let movie_id = MovieId::new();
        catalog.add_movie(Movie::new(movie_id, "Dune"));
        let issuer = TicketIssuer::new(Arc::new(catalog), Arc::new(DataUrlRenderer::new()));
        let (booking, theatre) = fixture(movie_id);

        let artifact = issuer.issue(&booking, &theatre).await.unwrap();
        let payload = TicketPayload::from_artifact(&artifact).unwrap();

        assert_eq!(payload.booking_id, booking.id());
        assert_eq!(payload.movie_name, "Dune");
        assert_eq!(payload.theatre_name, "Main Hall");
        assert_eq!(payload.seat_numbers, vec!["A1", "A2"]);
        assert_eq!(payload.user_id, booking.payer_id().to_string());
    }

    #[tokio::test]
    async fn unknown_movie_is_named_unknown() {
        let issuer = TicketIssuer::new(
            Arc::new(InMemoryCatalog::new()),
            Arc::new(DataUrlRenderer::new()),
        );
        let (booking, theatre) = fixture(MovieId::new());

        let payload = issuer.payload(&booking, &theatre).await.unwrap();

        assert_eq!(payload.movie_name, "Unknown");
    }

    #[test]
    fn payload_serializes_camel_case() {
        let payload = TicketPayload {
            booking_id: BookingId::new(),
            movie_name: "m".into(),
            theatre_name: "t".into(),
            seat_numbers: vec!["A1".into()],
            user_id: "u".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("seatNumbers").is_some());
        assert!(json.get("theatreName").is_some());
    }
}
