use std::collections::HashMap;
use std::sync::RwLock;

use bloodcore_core::{AggregateId, ExpectedVersion, HospitalId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    hospital_id: HospitalId,
    aggregate_id: AggregateId,
}

/// A validated append batch: one stream, one aggregate type.
///
/// Computed up front so both halves of a paired append can be checked
/// before either stream is touched.
#[derive(Debug)]
struct BatchPlan {
    key: StreamKey,
    aggregate_type: String,
}

/// In-memory append-only event store.
///
/// Streams are keyed `(hospital, aggregate)`; the whole map sits behind one
/// lock, which is what makes the paired append atomic here. Intended for
/// tests/dev, not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate batch homogeneity and derive the target stream.
    fn plan(events: &[UncommittedEvent]) -> Result<BatchPlan, EventStoreError> {
        let hospital_id = events[0].hospital_id;
        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.hospital_id != hospital_id {
                return Err(EventStoreError::HospitalIsolation(format!(
                    "batch contains multiple hospital_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        Ok(BatchPlan {
            key: StreamKey {
                hospital_id,
                aggregate_id,
            },
            aggregate_type,
        })
    }

    /// Check a planned batch against the stream as it currently stands.
    ///
    /// Returns the stream's current version; nothing is mutated.
    fn check(
        streams: &HashMap<StreamKey, Vec<StoredEvent>>,
        plan: &BatchPlan,
        expected_version: ExpectedVersion,
    ) -> Result<u64, EventStoreError> {
        let stream: &[StoredEvent] = streams.get(&plan.key).map(Vec::as_slice).unwrap_or(&[]);
        let current = stream.last().map(|e| e.sequence_number).unwrap_or(0);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Aggregate type is fixed by the stream's first event.
        if let Some(existing) = stream.first() {
            if existing.aggregate_type != plan.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, plan.aggregate_type
                )));
            }
        }

        Ok(current)
    }

    /// Assign sequence numbers and push a pre-validated batch.
    fn push(
        stream: &mut Vec<StoredEvent>,
        events: Vec<UncommittedEvent>,
        current: u64,
    ) -> Vec<StoredEvent> {
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                hospital_id: e.hospital_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }
        committed
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let plan = Self::plan(&events)?;

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let current = Self::check(&streams, &plan, expected_version)?;
        Ok(Self::push(
            streams.entry(plan.key).or_default(),
            events,
            current,
        ))
    }

    fn append_pair(
        &self,
        first: (Vec<UncommittedEvent>, ExpectedVersion),
        second: (Vec<UncommittedEvent>, ExpectedVersion),
    ) -> Result<(Vec<StoredEvent>, Vec<StoredEvent>), EventStoreError> {
        let (first_events, first_expected) = first;
        let (second_events, second_expected) = second;

        // A one-sided pair degrades to a plain append.
        if first_events.is_empty() {
            return Ok((vec![], self.append(second_events, second_expected)?));
        }
        if second_events.is_empty() {
            return Ok((self.append(first_events, first_expected)?, vec![]));
        }

        let first_plan = Self::plan(&first_events)?;
        let second_plan = Self::plan(&second_events)?;

        if first_plan.key == second_plan.key {
            return Err(EventStoreError::InvalidAppend(
                "paired append requires two distinct streams".to_string(),
            ));
        }
        if first_plan.key.hospital_id != second_plan.key.hospital_id {
            return Err(EventStoreError::HospitalIsolation(
                "paired append must target a single hospital".to_string(),
            ));
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        // Validate both streams before inserting into either.
        let first_current = Self::check(&streams, &first_plan, first_expected)?;
        let second_current = Self::check(&streams, &second_plan, second_expected)?;

        let committed_first = Self::push(
            streams.entry(first_plan.key).or_default(),
            first_events,
            first_current,
        );
        let committed_second = Self::push(
            streams.entry(second_plan.key).or_default(),
            second_events,
            second_current,
        );

        Ok((committed_first, committed_second))
    }

    fn load_stream(
        &self,
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            hospital_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn uncommitted(
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
    ) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            hospital_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: format!("{aggregate_type}.tested"),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn paired_append_commits_both_streams() {
        let store = InMemoryEventStore::new();
        let hospital_id = HospitalId::new();
        let request_stream = AggregateId::new();
        let stock_stream = AggregateId::new();

        let (first, second) = store
            .append_pair(
                (
                    vec![uncommitted(hospital_id, request_stream, "requests.request")],
                    ExpectedVersion::Exact(0),
                ),
                (
                    vec![uncommitted(hospital_id, stock_stream, "inventory.stock")],
                    ExpectedVersion::Exact(0),
                ),
            )
            .unwrap();

        assert_eq!(first[0].sequence_number, 1);
        assert_eq!(second[0].sequence_number, 1);
        assert_eq!(store.load_stream(hospital_id, request_stream).unwrap().len(), 1);
        assert_eq!(store.load_stream(hospital_id, stock_stream).unwrap().len(), 1);
    }

    #[test]
    fn paired_append_commits_nothing_when_second_stream_is_stale() {
        let store = InMemoryEventStore::new();
        let hospital_id = HospitalId::new();
        let request_stream = AggregateId::new();
        let stock_stream = AggregateId::new();

        // The stock stream already has one event; Exact(0) below is stale.
        store
            .append(
                vec![uncommitted(hospital_id, stock_stream, "inventory.stock")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let err = store
            .append_pair(
                (
                    vec![uncommitted(hospital_id, request_stream, "requests.request")],
                    ExpectedVersion::Exact(0),
                ),
                (
                    vec![uncommitted(hospital_id, stock_stream, "inventory.stock")],
                    ExpectedVersion::Exact(0),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));

        // The first stream must not have been touched.
        assert!(store.load_stream(hospital_id, request_stream).unwrap().is_empty());
        assert_eq!(store.load_stream(hospital_id, stock_stream).unwrap().len(), 1);
    }

    #[test]
    fn paired_append_rejects_a_single_stream() {
        let store = InMemoryEventStore::new();
        let hospital_id = HospitalId::new();
        let stream = AggregateId::new();

        let err = store
            .append_pair(
                (
                    vec![uncommitted(hospital_id, stream, "inventory.stock")],
                    ExpectedVersion::Exact(0),
                ),
                (
                    vec![uncommitted(hospital_id, stream, "inventory.stock")],
                    ExpectedVersion::Exact(0),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
    }

    #[test]
    fn paired_append_rejects_two_hospitals() {
        let store = InMemoryEventStore::new();

        let err = store
            .append_pair(
                (
                    vec![uncommitted(HospitalId::new(), AggregateId::new(), "a")],
                    ExpectedVersion::Exact(0),
                ),
                (
                    vec![uncommitted(HospitalId::new(), AggregateId::new(), "b")],
                    ExpectedVersion::Exact(0),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::HospitalIsolation(_)));
    }
}
