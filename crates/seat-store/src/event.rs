use chrono::{DateTime, Utc};
use common::BookingId;
use domain::{BookingEvent, DomainEvent, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A booking event as recorded in the history, with its position and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// The event type (e.g., "BookingCreated", "SeatsReassigned").
    pub event_type: String,

    pub booking_id: BookingId,

    /// The version of the booking after this event.
    pub version: Version,

    pub recorded_at: DateTime<Utc>,

    pub payload: BookingEvent,
}

impl EventEnvelope {
    /// Wraps an event recorded at `version`.
    pub fn record(booking_id: BookingId, version: Version, event: BookingEvent) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event.event_type().to_string(),
            booking_id,
            version,
            recorded_at: Utc::now(),
            payload: event,
        }
    }

    /// Wraps a batch of events that follow `current`, numbering them sequentially.
    pub fn sequence(
        booking_id: BookingId,
        current: Version,
        events: &[BookingEvent],
    ) -> Vec<EventEnvelope> {
        let mut version = current;
        events
            .iter()
            .map(|event| {
                version = version.next();
                Self::record(booking_id, version, event.clone())
            })
            .collect()
    }
}
