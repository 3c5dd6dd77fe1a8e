//! Command execution pipeline (application-level orchestration).
//!
//! Implements the command dispatch pattern for event-sourced aggregates:
//! load history, rehydrate state, handle the command (pure decision logic),
//! persist the resulting events, publish them to the bus.
//!
//! The dispatcher sits between the service facade and the infrastructure
//! traits (`EventStore`, `EventBus`), keeping domain code pure and the
//! execution model identical for every aggregate. Events are persisted
//! before publication; if publication fails the events are already durable,
//! so retrying gives at-least-once delivery and consumers must be
//! idempotent.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use bloodcore_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, HospitalId};
use bloodcore_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    Concurrency(String),
    /// Hospital isolation violation (cross-hospital or cross-aggregate stream mixing).
    HospitalIsolation(String),
    /// Domain validation failure (deterministic).
    Validation(String),
    /// Operation not valid for the aggregate's current lifecycle state.
    InvalidState(String),
    /// A debit would take available stock below zero.
    InsufficientStock {
        blood_type: bloodcore_core::BloodType,
        requested_ml: i64,
        available_ml: i64,
    },
    /// Domain-level not found.
    NotFound,
    /// Failed to deserialize historical event payloads into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::HospitalIsolation(msg) => {
                DispatchError::HospitalIsolation(msg.clone())
            }
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvalidState(msg) => DispatchError::InvalidState(msg),
            DomainError::InsufficientStock {
                blood_type,
                requested_ml,
                available_ml,
            } => DispatchError::InsufficientStock {
                blood_type,
                requested_ml,
                available_ml,
            },
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests can run fully in memory and a
/// durable backend can be swapped in without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

/// The decided-but-not-yet-appended half of a dispatch.
///
/// Produced by `prepare`, consumed by `commit`. Splitting the pipeline at
/// this point lets `dispatch_pair` run both decision steps before either
/// stream is touched.
struct PreparedDispatch {
    expected: ExpectedVersion,
    uncommitted: Vec<UncommittedEvent>,
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full event-sourcing pipeline.
    ///
    /// 1. Load the stream (hospital-scoped) and validate it
    /// 2. Rehydrate the aggregate from history
    /// 3. Handle the command (pure, no mutation)
    /// 4. Append the decided events with an optimistic concurrency check
    /// 5. Publish committed events to the bus
    ///
    /// The `make_aggregate` factory keeps the dispatcher generic: domain
    /// code controls construction (e.g. `StockLevel::empty(id)`).
    ///
    /// On a concurrency failure the caller should reload and re-execute the
    /// command, or surface the conflict.
    pub fn dispatch<A>(
        &self,
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(HospitalId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: bloodcore_events::Event + Serialize + DeserializeOwned,
    {
        let prepared = self.prepare::<A>(
            hospital_id,
            aggregate_id,
            aggregate_type,
            command,
            make_aggregate,
        )?;
        self.commit(prepared)
    }

    /// Dispatch two commands against two different aggregates as one
    /// transaction.
    ///
    /// Both decision steps run before anything is persisted, and the two
    /// decided batches go to the store as a single atomic paired append:
    /// a domain rejection on either side, or a store failure anywhere in
    /// the commit, leaves both streams unchanged and publishes nothing.
    /// Callers must hold whatever serialization guard they use for writes
    /// across the whole call.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch_pair<A1, A2>(
        &self,
        hospital_id: HospitalId,
        first: (AggregateId, &str, A1::Command),
        make_first: impl FnOnce(HospitalId, AggregateId) -> A1,
        second: (AggregateId, &str, A2::Command),
        make_second: impl FnOnce(HospitalId, AggregateId) -> A2,
    ) -> Result<(Vec<StoredEvent>, Vec<StoredEvent>), DispatchError>
    where
        A1: Aggregate<Error = DomainError>,
        A1::Event: bloodcore_events::Event + Serialize + DeserializeOwned,
        A2: Aggregate<Error = DomainError>,
        A2::Event: bloodcore_events::Event + Serialize + DeserializeOwned,
    {
        let (first_id, first_type, first_cmd) = first;
        let (second_id, second_type, second_cmd) = second;

        // Decide both before appending either.
        let prepared_first =
            self.prepare::<A1>(hospital_id, first_id, first_type, first_cmd, make_first)?;
        let prepared_second =
            self.prepare::<A2>(hospital_id, second_id, second_type, second_cmd, make_second)?;

        let (committed_first, committed_second) = self.store.append_pair(
            (prepared_first.uncommitted, prepared_first.expected),
            (prepared_second.uncommitted, prepared_second.expected),
        )?;

        // Publish only after both batches are durable.
        for stored in committed_first.iter().chain(committed_second.iter()) {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok((committed_first, committed_second))
    }

    fn prepare<A>(
        &self,
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(HospitalId, AggregateId) -> A,
    ) -> Result<PreparedDispatch, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: bloodcore_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history (hospital-scoped)
        let history = self.store.load_stream(hospital_id, aggregate_id)?;
        validate_loaded_stream(hospital_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(hospital_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    hospital_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PreparedDispatch {
            expected,
            uncommitted,
        })
    }

    fn commit(&self, prepared: PreparedDispatch) -> Result<Vec<StoredEvent>, DispatchError> {
        if prepared.uncommitted.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let committed = self.store.append(prepared.uncommitted, prepared.expected)?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    hospital_id: HospitalId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforce hospital isolation even if a buggy backend returns
    // cross-hospital data, and ensure sequence numbers are monotonic.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.hospital_id != hospital_id {
            return Err(DispatchError::HospitalIsolation(format!(
                "loaded stream contains wrong hospital_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::HospitalIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
