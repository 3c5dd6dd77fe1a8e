use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use bloodcore_core::{AggregateId, ExpectedVersion, HospitalId};
use std::sync::Arc;

/// An event ready to be appended to a stream (not yet assigned a sequence
/// number). The event store assigns sequence numbers during append.
///
/// Lifecycle: domain event -> `UncommittedEvent` (wrapped with stream
/// metadata) -> `StoredEvent` (persisted, sequence assigned) ->
/// `EventEnvelope` (published to the bus for projections).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub hospital_id: HospitalId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers are stream-scoped (one stream per hospital + aggregate),
/// monotonically increasing and immutable once assigned. They drive event
/// ordering, optimistic concurrency and projection idempotency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub hospital_id: HospitalId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into a hospital-scoped envelope for publication.
    pub fn to_envelope(&self) -> bloodcore_events::EventEnvelope<JsonValue> {
        bloodcore_events::EventEnvelope::new(
            self.event_id,
            self.hospital_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Event store operation error.
///
/// These are infrastructure errors (storage, concurrency, isolation), as
/// opposed to domain errors (validation, accounting invariants).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("hospital isolation violation: {0}")]
    HospitalIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event publication failed: {0}")]
    Publish(String),
}

/// Append-only, hospital-scoped event store.
///
/// Events are organized into streams, one per aggregate instance, keyed
/// `(hospital_id, aggregate_id)`. Implementations must:
/// - enforce hospital isolation on reads and writes
/// - enforce optimistic concurrency against the current stream version
/// - assign monotonically increasing sequence numbers (no gaps)
/// - persist each append batch atomically (all events or none)
pub trait EventStore: Send + Sync {
    /// Append events to an aggregate stream (append-only).
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append two batches to two distinct aggregate streams as one atomic
    /// commit.
    ///
    /// Either both batches persist (each against its own expected version)
    /// or neither does. This is the transaction boundary for paired writes
    /// that span two aggregates (a donation record with its ledger credit,
    /// a fulfillment with its ledger debit): a failure anywhere in the
    /// commit must leave both streams unchanged.
    fn append_pair(
        &self,
        first: (Vec<UncommittedEvent>, ExpectedVersion),
        second: (Vec<UncommittedEvent>, ExpectedVersion),
    ) -> Result<(Vec<StoredEvent>, Vec<StoredEvent>), EventStoreError>;

    /// Load the full stream for a hospital + aggregate.
    fn load_stream(
        &self,
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn append_pair(
        &self,
        first: (Vec<UncommittedEvent>, ExpectedVersion),
        second: (Vec<UncommittedEvent>, ExpectedVersion),
    ) -> Result<(Vec<StoredEvent>, Vec<StoredEvent>), EventStoreError> {
        (**self).append_pair(first, second)
    }

    fn load_stream(
        &self,
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(hospital_id, aggregate_id)
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    ///
    /// Serializes the event to JSON and captures the metadata needed for
    /// future deserialization, keeping the store decoupled from domain types.
    pub fn from_typed<E>(
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: bloodcore_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            hospital_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
