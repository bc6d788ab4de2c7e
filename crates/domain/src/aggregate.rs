//! Core aggregate and domain event traits.

use serde::{Serialize, de::DeserializeOwned};

use crate::Version;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name used when the event is recorded.
    fn event_type(&self) -> &'static str;
}

/// Trait for event-sourced aggregates.
///
/// Commands validate against the current state and return the events they
/// would produce; `apply` folds an event into the state and never fails.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the current version of the aggregate.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the store after a successful write.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// Must be pure and deterministic, and must not fail.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Rebuilds an aggregate by replaying its recorded events.
    fn replay(events: impl IntoIterator<Item = Self::Event>) -> Self {
        let mut aggregate = Self::default();
        let mut count = 0;
        for event in events {
            aggregate.apply(event);
            count += 1;
        }
        aggregate.set_version(Version::initial().advance(count));
        aggregate
    }
}
