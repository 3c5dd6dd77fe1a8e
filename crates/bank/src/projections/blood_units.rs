use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use bloodcore_collection::{BloodUnit, DonationEvent, DonationId, UnitStatus};
use bloodcore_core::{AggregateId, HospitalId};
use bloodcore_events::EventEnvelope;

use crate::read_model::HospitalStore;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    hospital_id: HospitalId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum BloodUnitsProjectionError {
    #[error("failed to deserialize donation event: {0}")]
    Deserialize(String),

    #[error("hospital isolation violation: {0}")]
    HospitalIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Stored blood unit list, derived from donation events.
///
/// One unit per recorded donation; discarding a donation removes its unit
/// from storage. The expiry scanner consumes this list and evaluates expiry
/// lazily against the wall clock, so no sweep job mutates unit records here.
#[derive(Debug)]
pub struct BloodUnitsProjection<S>
where
    S: HospitalStore<DonationId, BloodUnit>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> BloodUnitsProjection<S>
where
    S: HospitalStore<DonationId, BloodUnit>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, hospital_id: HospitalId, unit_id: DonationId) -> Option<BloodUnit> {
        self.store.get(hospital_id, &unit_id)
    }

    pub fn list(&self, hospital_id: HospitalId) -> Vec<BloodUnit> {
        self.store.list(hospital_id)
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), BloodUnitsProjectionError> {
        if envelope.aggregate_type() != "collection.donation" {
            return Ok(());
        }

        let hospital_id = envelope.hospital_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let key = CursorKey {
                hospital_id,
                aggregate_id,
            };
            let last = *cursors.get(&key).unwrap_or(&0);

            if seq == 0 {
                return Err(BloodUnitsProjectionError::NonMonotonicSequence { last, found: seq });
            }
            if seq <= last {
                return Ok(());
            }
            if seq != last + 1 && last != 0 {
                return Err(BloodUnitsProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let donation: DonationEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| BloodUnitsProjectionError::Deserialize(e.to_string()))?;

            match donation {
                DonationEvent::DonationRecorded(e) => {
                    if e.hospital_id != hospital_id {
                        return Err(BloodUnitsProjectionError::HospitalIsolation(
                            "event hospital_id does not match envelope hospital_id".to_string(),
                        ));
                    }
                    if e.donation_id.0 != aggregate_id {
                        return Err(BloodUnitsProjectionError::HospitalIsolation(
                            "event donation_id does not match envelope aggregate_id".to_string(),
                        ));
                    }

                    self.store.upsert(
                        hospital_id,
                        e.donation_id,
                        BloodUnit {
                            unit_id: e.donation_id,
                            donor_id: e.donor_id,
                            donor_name: e.donor_name,
                            blood_type: e.blood_type,
                            quantity_ml: e.quantity_ml,
                            collection_date: e.collected_on,
                            expiry_date: e.expiry_date,
                            status: UnitStatus::Available,
                        },
                    );
                }
                DonationEvent::DonationDiscarded(e) => {
                    self.store.remove(hospital_id, &e.donation_id);
                }
            }

            cursors.insert(key, seq);
        }

        Ok(())
    }
}
