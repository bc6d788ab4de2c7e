use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier is its own type so a theatre id can never be passed
/// where a booking id is expected.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a booking document.
    BookingId
);

uuid_id!(
    /// Unique identifier for a theatre (one screen showing one movie).
    TheatreId
);

uuid_id!(
    /// Unique identifier for a movie in the catalog.
    MovieId
);

uuid_id!(
    /// Identifier of an authenticated principal, as supplied by the
    /// authentication layer.
    PrincipalId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_id_new_creates_unique_ids() {
        let id1 = BookingId::new();
        let id2 = BookingId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn theatre_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = TheatreId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn principal_id_parses_from_string() {
        let uuid = Uuid::new_v4();
        let parsed: PrincipalId = uuid.to_string().parse().unwrap();
        assert_eq!(parsed.as_uuid(), uuid);
        assert!("not-a-uuid".parse::<PrincipalId>().is_err());
    }

    #[test]
    fn ids_serialize_as_bare_uuid() {
        let id = MovieId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
        let deserialized: MovieId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
