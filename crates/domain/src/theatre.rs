//! Theatre seat layout and the claimed-seat invariant.

use common::{MovieId, TheatreId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Money, SeatError, SeatId, SeatSet};

/// Why a claim on a theatre's seats was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// Some requested seats do not exist in the layout.
    #[error("Seats not in layout: {0}")]
    InvalidSeats(SeatSet),

    /// Some requested seats are already claimed.
    #[error("Seats already claimed: {0}")]
    Conflict(SeatSet),
}

/// Ordered rows of seat identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<SeatId>>", into = "Vec<Vec<SeatId>>")]
pub struct SeatLayout {
    rows: Vec<Vec<SeatId>>,
    seats: SeatSet,
}

impl SeatLayout {
    /// Builds a layout from raw rows; every seat id must be unique.
    pub fn from_rows<R, S>(rows: impl IntoIterator<Item = R>) -> Result<Self, SeatError>
    where
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for row in rows {
            let mut seats_in_row = Vec::new();
            for raw in row {
                seats_in_row.push(SeatId::parse(raw)?);
            }
            parsed.push(seats_in_row);
        }
        Self::try_from(parsed)
    }

    /// Builds a rectangular layout such as `A1..A10, B1..B10`.
    pub fn grid(row_labels: &[&str], seats_per_row: usize) -> Result<Self, SeatError> {
        Self::from_rows(row_labels.iter().map(|label| {
            (1..=seats_per_row)
                .map(|n| format!("{label}{n}"))
                .collect::<Vec<_>>()
        }))
    }

    pub fn rows(&self) -> &[Vec<SeatId>] {
        &self.rows
    }

    /// All seats in the layout.
    pub fn seats(&self) -> &SeatSet {
        &self.seats
    }

    pub fn capacity(&self) -> usize {
        self.seats.len()
    }

    pub fn contains(&self, seat: &SeatId) -> bool {
        self.seats.contains(seat)
    }

    /// Returns the requested seats that are not part of this layout.
    pub fn invalid_seats(&self, requested: &SeatSet) -> SeatSet {
        requested.difference(&self.seats)
    }
}

impl TryFrom<Vec<Vec<SeatId>>> for SeatLayout {
    type Error = SeatError;

    fn try_from(rows: Vec<Vec<SeatId>>) -> Result<Self, Self::Error> {
        let mut seats = SeatSet::new();
        for seat in rows.iter().flatten() {
            if !seats.insert(seat.clone()) {
                return Err(SeatError::DuplicateSeat(seat.clone()));
            }
        }
        Ok(Self { rows, seats })
    }
}

impl From<SeatLayout> for Vec<Vec<SeatId>> {
    fn from(layout: SeatLayout) -> Self {
        layout.rows
    }
}

/// A theatre screening a single movie, with its seat layout and the seats
/// currently held by confirmed or in-flight bookings.
///
/// `claimed` is always a subset of the layout and only changes through
/// [`Theatre::try_claim`] and [`Theatre::release`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theatre {
    id: TheatreId,
    movie_id: MovieId,
    name: String,
    layout: SeatLayout,
    unit_price: Money,
    #[serde(default)]
    claimed: SeatSet,
}

impl Theatre {
    pub fn new(
        id: TheatreId,
        movie_id: MovieId,
        name: impl Into<String>,
        layout: SeatLayout,
        unit_price: Money,
    ) -> Self {
        Self {
            id,
            movie_id,
            name: name.into(),
            layout,
            unit_price,
            claimed: SeatSet::new(),
        }
    }

    /// Restores a previously persisted claimed set, enforcing the layout invariant.
    pub fn with_claimed(mut self, claimed: SeatSet) -> Result<Self, ClaimError> {
        self.try_claim(&claimed)?;
        Ok(self)
    }

    pub fn id(&self) -> TheatreId {
        self.id
    }

    pub fn movie_id(&self) -> MovieId {
        self.movie_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &SeatLayout {
        &self.layout
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn claimed(&self) -> &SeatSet {
        &self.claimed
    }

    /// Price of a booking for `seat_count` seats.
    pub fn price_for(&self, seat_count: usize) -> Money {
        self.unit_price.multiply(seat_count)
    }

    /// Checks every requested seat exists in the layout.
    pub fn validate(&self, requested: &SeatSet) -> Result<(), ClaimError> {
        let invalid = self.layout.invalid_seats(requested);
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ClaimError::InvalidSeats(invalid))
        }
    }

    /// Returns the requested seats that are already claimed.
    pub fn conflicts(&self, requested: &SeatSet) -> SeatSet {
        requested.intersection(&self.claimed)
    }

    /// Claims every requested seat, or none of them.
    pub fn try_claim(&mut self, requested: &SeatSet) -> Result<(), ClaimError> {
        self.validate(requested)?;
        let conflicts = self.conflicts(requested);
        if !conflicts.is_empty() {
            return Err(ClaimError::Conflict(conflicts));
        }
        self.claimed.extend(requested);
        Ok(())
    }

    /// Releases the seats. Seats that are not claimed are ignored.
    pub fn release(&mut self, seats: &SeatSet) {
        self.claimed.remove_all(seats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(ids: &[&str]) -> SeatSet {
        SeatSet::parse_request(ids.iter().copied()).unwrap()
    }

    fn main_hall() -> Theatre {
        Theatre::new(
            TheatreId::new(),
            MovieId::new(),
            "Main Hall",
            SeatLayout::grid(&["A", "B"], 3).unwrap(),
            Money::from_minor(15_000),
        )
    }

    #[test]
    fn grid_layout_has_expected_seats() {
        let layout = SeatLayout::grid(&["A", "B"], 3).unwrap();
        assert_eq!(layout.capacity(), 6);
        assert_eq!(layout.rows().len(), 2);
        assert_eq!(layout.rows()[1][2].as_str(), "B3");
    }

    #[test]
    fn layout_rejects_duplicate_seats() {
        let result = SeatLayout::from_rows(vec![vec!["A1", "A2"], vec!["A2"]]);
        assert_eq!(
            result,
            Err(SeatError::DuplicateSeat(SeatId::parse("A2").unwrap()))
        );
    }

    #[test]
    fn claim_is_all_or_nothing() {
        let mut theatre = main_hall();
        theatre.try_claim(&seats(&["A1"])).unwrap();

        let result = theatre.try_claim(&seats(&["A1", "A2"]));

        assert_eq!(result, Err(ClaimError::Conflict(seats(&["A1"]))));
        assert_eq!(theatre.claimed(), &seats(&["A1"]));
    }

    #[test]
    fn claim_rejects_seats_outside_layout() {
        let mut theatre = main_hall();
        let result = theatre.try_claim(&seats(&["A1", "Z9"]));

        assert_eq!(result, Err(ClaimError::InvalidSeats(seats(&["Z9"]))));
        assert!(theatre.claimed().is_empty());
    }

    #[test]
    fn release_is_idempotent() {
        let mut theatre = main_hall();
        theatre.try_claim(&seats(&["A1", "B2"])).unwrap();

        theatre.release(&seats(&["A1"]));
        theatre.release(&seats(&["A1"]));

        assert_eq!(theatre.claimed(), &seats(&["B2"]));
    }

    #[test]
    fn with_claimed_enforces_layout() {
        assert!(main_hall().with_claimed(seats(&["C1"])).is_err());
        let restored = main_hall().with_claimed(seats(&["A3"])).unwrap();
        assert_eq!(restored.claimed(), &seats(&["A3"]));
    }

    #[test]
    fn layout_serializes_as_rows() {
        let layout = SeatLayout::grid(&["A"], 2).unwrap();
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json, serde_json::json!([["A1", "A2"]]));

        let back: SeatLayout = serde_json::from_value(json).unwrap();
        assert_eq!(back, layout);
    }
}
