use common::{BookingId, TheatreId};
use domain::Version;
use thiserror::Error;

/// Errors that can occur when interacting with the reservation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The booking document changed since it was read.
    #[error(
        "Concurrency conflict for booking {booking_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        booking_id: BookingId,
        expected: Version,
        actual: Version,
    },

    /// Concurrent claims and releases kept changing the theatre's seats
    /// between the claim and its diagnosis.
    #[error("Seat claims for theatre {0} are contended; retry")]
    ClaimContention(TheatreId),

    #[error("Theatre not found: {0}")]
    TheatreNotFound(TheatreId),

    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    #[error("Theatre already registered: {0}")]
    DuplicateTheatre(TheatreId),

    #[error("Booking already exists: {0}")]
    DuplicateBooking(BookingId),

    /// A persisted record violates a domain invariant.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if retrying the whole operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_)
                | StoreError::ConcurrencyConflict { .. }
                | StoreError::ClaimContention(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contention_and_version_conflicts_are_transient() {
        assert!(StoreError::ClaimContention(TheatreId::new()).is_transient());
        assert!(
            StoreError::ConcurrencyConflict {
                booking_id: BookingId::new(),
                expected: Version::new(1),
                actual: Version::new(2),
            }
            .is_transient()
        );
        assert!(!StoreError::TheatreNotFound(TheatreId::new()).is_transient());
        assert!(!StoreError::CorruptRecord("bad seat".into()).is_transient());
    }
}
