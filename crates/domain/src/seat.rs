//! Seat identifiers and seat sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building seat identifiers or seat sets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeatError {
    /// A seat identifier was empty or only whitespace.
    #[error("Seat identifier must not be empty")]
    EmptySeatId,

    /// The same seat was requested more than once.
    #[error("Seat requested more than once: {0}")]
    DuplicateSeat(SeatId),

    /// No seats were requested.
    #[error("At least one seat is required")]
    NoSeats,
}

/// Identifier of a single seat in a theatre layout (e.g. `"A1"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatId(String);

impl SeatId {
    /// Parses a seat identifier, trimming surrounding whitespace.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, SeatError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(SeatError::EmptySeatId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the seat identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SeatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SeatId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An ordered set of distinct seat identifiers.
///
/// Ordering is lexicographic so error messages and ticket payloads list
/// seats deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatSet(BTreeSet<SeatId>);

impl SeatSet {
    /// Creates an empty seat set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a seat set from raw strings, rejecting empty ids and duplicates.
    ///
    /// An empty request is rejected with [`SeatError::NoSeats`].
    pub fn parse_request<I, S>(raw: I) -> Result<Self, SeatError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seats = BTreeSet::new();
        for value in raw {
            let seat = SeatId::parse(value)?;
            if !seats.insert(seat.clone()) {
                return Err(SeatError::DuplicateSeat(seat));
            }
        }
        if seats.is_empty() {
            return Err(SeatError::NoSeats);
        }
        Ok(Self(seats))
    }

    /// Returns the number of seats.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set holds no seats.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the seat is in the set.
    pub fn contains(&self, seat: &SeatId) -> bool {
        self.0.contains(seat)
    }

    /// Adds a seat, returning false if it was already present.
    pub fn insert(&mut self, seat: SeatId) -> bool {
        self.0.insert(seat)
    }

    /// Iterates seats in order.
    pub fn iter(&self) -> impl Iterator<Item = &SeatId> {
        self.0.iter()
    }

    /// Seats present in both sets.
    pub fn intersection(&self, other: &SeatSet) -> SeatSet {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    /// Seats in `self` that are not in `other`.
    pub fn difference(&self, other: &SeatSet) -> SeatSet {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    /// Returns true if the sets share at least one seat.
    pub fn overlaps(&self, other: &SeatSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Returns true if every seat of `self` is in `other`.
    pub fn is_subset(&self, other: &SeatSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Adds every seat of `other`.
    pub fn extend(&mut self, other: &SeatSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Removes every seat of `other`; seats not present are ignored.
    pub fn remove_all(&mut self, other: &SeatSet) {
        for seat in other.iter() {
            self.0.remove(seat);
        }
    }

    /// Returns the seats as plain strings, in order.
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|s| s.0.clone()).collect()
    }
}

impl FromIterator<SeatId> for SeatSet {
    fn from_iter<T: IntoIterator<Item = SeatId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SeatSet {
    type Item = &'a SeatId;
    type IntoIter = std::collections::btree_set::Iter<'a, SeatId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for SeatSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(SeatId::as_str).collect();
        write!(f, "{}", joined.join(", "))
    }
}
