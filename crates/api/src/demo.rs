//! Demo catalog for running without a database.

use common::{MovieId, TheatreId};
use domain::{Money, SeatLayout, Theatre};
use reservation::{InMemoryCatalog, Movie, ReservationError};
use seat_store::ReservationStore;

pub const DEMO_MOVIE: &str = "The Grand Premiere";
pub const DEMO_THEATRE: &str = "Main Hall";

/// Ticket price in minor units.
pub const DEMO_UNIT_PRICE: i64 = 25_000;

/// Registers a demo movie and a "Main Hall" theatre with rows A to E of ten seats.
pub async fn seed<S: ReservationStore>(
    store: &S,
    catalog: &InMemoryCatalog,
) -> Result<Theatre, ReservationError> {
    let movie_id = MovieId::new();
    catalog.add_movie(Movie::new(movie_id, DEMO_MOVIE));

    let layout = SeatLayout::grid(&["A", "B", "C", "D", "E"], 10)?;
    let theatre = Theatre::new(
        TheatreId::new(),
        movie_id,
        DEMO_THEATRE,
        layout,
        Money::from_minor(DEMO_UNIT_PRICE),
    );
    store.register_theatre(&theatre).await?;

    tracing::info!(
        theatre_id = %theatre.id(),
        movie_id = %movie_id,
        seats = theatre.layout().capacity(),
        "seeded demo catalog"
    );
    Ok(theatre)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seat_store::InMemoryReservationStore;

    #[tokio::test]
    async fn test_seed_registers_main_hall() {
        let store = InMemoryReservationStore::new();
        let catalog = InMemoryCatalog::new();

        let theatre = seed(&store, &catalog).await.unwrap();

        let stored = store.get_theatre(theatre.id()).await.unwrap().unwrap();
        assert_eq!(stored.name(), "Main Hall");
        assert_eq!(stored.layout().capacity(), 50);
        assert_eq!(catalog.movie_count(), 1);
    }
}
