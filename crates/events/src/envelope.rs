use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bloodcore_core::{AggregateId, HospitalId};

/// Stream metadata carried alongside every published event.
///
/// Projections route and validate on this alone: the hospital partition,
/// the stream identity, and the position within the stream. Payloads stay
/// opaque until a consumer that knows the aggregate type deserializes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub event_id: Uuid,
    pub hospital_id: HospitalId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,
}

/// Envelope for an event: stream metadata plus the payload.
///
/// Hospital isolation is enforced at this level via `hospital_id`;
/// `sequence_number` is append-only and drives projection idempotency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    #[serde(flatten)]
    metadata: EnvelopeMetadata,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            metadata: EnvelopeMetadata {
                event_id,
                hospital_id,
                aggregate_id,
                aggregate_type: aggregate_type.into(),
                sequence_number,
            },
            payload,
        }
    }

    pub fn metadata(&self) -> &EnvelopeMetadata {
        &self.metadata
    }

    pub fn event_id(&self) -> Uuid {
        self.metadata.event_id
    }

    pub fn hospital_id(&self) -> HospitalId {
        self.metadata.hospital_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.metadata.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.metadata.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.metadata.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serializes_inline_with_the_payload() {
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            HospitalId::new(),
            AggregateId::new(),
            "inventory.stock",
            3,
            serde_json::json!({"quantity_ml": 450}),
        );

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["aggregate_type"], "inventory.stock");
        assert_eq!(value["sequence_number"], 3);
        assert_eq!(value["payload"]["quantity_ml"], 450);

        let back: EventEnvelope<serde_json::Value> = serde_json::from_value(value).unwrap();
        assert_eq!(back, envelope);
    }
}
