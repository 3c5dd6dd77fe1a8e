use std::collections::HashMap;
use std::sync::RwLock;

use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use thiserror::Error;

use bloodcore_collection::DonationEvent;
use bloodcore_core::{AggregateId, HospitalId};
use bloodcore_donors::DonorId;
use bloodcore_events::EventEnvelope;

use crate::read_model::HospitalStore;

/// Per-donor donation statistics, derived from donation events.
///
/// The donor aggregate itself carries no counters; this read model is the
/// only place "times donated" and "last donated on" exist, so the numbers
/// can never drift from the donation records they are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonorStats {
    pub donor_id: DonorId,
    pub donation_count: u64,
    pub total_donated_ml: i64,
    pub last_donation: Option<NaiveDate>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    hospital_id: HospitalId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum DonorStatsProjectionError {
    #[error("failed to deserialize donation event: {0}")]
    Deserialize(String),

    #[error("hospital isolation violation: {0}")]
    HospitalIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Donor statistics projection over donation envelopes.
#[derive(Debug)]
pub struct DonorStatsProjection<S>
where
    S: HospitalStore<DonorId, DonorStats>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> DonorStatsProjection<S>
where
    S: HospitalStore<DonorId, DonorStats>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, hospital_id: HospitalId, donor_id: DonorId) -> Option<DonorStats> {
        self.store.get(hospital_id, &donor_id)
    }

    pub fn list(&self, hospital_id: HospitalId) -> Vec<DonorStats> {
        self.store.list(hospital_id)
    }

    /// Apply a published envelope into the projection.
    ///
    /// A discarded donation still counts as a donation made; discarding a
    /// bag does not rewrite the donor's history.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), DonorStatsProjectionError> {
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
                return Err(DonorStatsProjectionError::NonMonotonicSequence { last, found: seq });
            }
            if seq <= last {
                return Ok(());
            }
            if seq != last + 1 && last != 0 {
                return Err(DonorStatsProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let donation: DonationEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| DonorStatsProjectionError::Deserialize(e.to_string()))?;

            if let DonationEvent::DonationRecorded(e) = &donation {
                if e.hospital_id != hospital_id {
                    return Err(DonorStatsProjectionError::HospitalIsolation(
                        "event hospital_id does not match envelope hospital_id".to_string(),
                    ));
                }

                let mut stats = self.store.get(hospital_id, &e.donor_id).unwrap_or(DonorStats {
                    donor_id: e.donor_id,
                    donation_count: 0,
                    total_donated_ml: 0,
                    last_donation: None,
                });

                stats.donation_count += 1;
                stats.total_donated_ml += e.quantity_ml;
                stats.last_donation = match stats.last_donation {
                    Some(existing) => Some(existing.max(e.collected_on)),
                    None => Some(e.collected_on),
                };

                self.store.upsert(hospital_id, e.donor_id, stats);
            }

            cursors.insert(key, seq);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryHospitalStore;
    use bloodcore_collection::{DonationDiscarded, DonationId, DonationRecorded};
    use bloodcore_core::BloodType;
    use chrono::Utc;
    use std::sync::Arc;

    fn make_envelope(
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
        seq: u64,
        event: DonationEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            uuid::Uuid::now_v7(),
            hospital_id,
            aggregate_id,
            "collection.donation".to_string(),
            seq,
            serde_json::to_value(&event).unwrap(),
        )
    }

    fn recorded(
        hospital_id: HospitalId,
        donation_id: DonationId,
        donor_id: DonorId,
        collected_on: NaiveDate,
    ) -> DonationEvent {
        DonationEvent::DonationRecorded(DonationRecorded {
            hospital_id,
            donation_id,
            donor_id,
            donor_name: "John Smith".to_string(),
            blood_type: BloodType::APositive,
            quantity_ml: 450,
            hemoglobin_g_dl: None,
            notes: None,
            collected_on,
            expiry_date: collected_on + chrono::Duration::days(42),
            occurred_at: Utc::now(),
        })
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn donations_accumulate_per_donor() {
        let store = Arc::new(InMemoryHospitalStore::<DonorId, DonorStats>::new());
        let proj = DonorStatsProjection::new(store);

        let hospital_id = HospitalId::new();
        let donor_id = DonorId::new(AggregateId::new());

        for (i, d) in [day(1), day(15)].iter().enumerate() {
            let donation_id = DonationId::new(AggregateId::new());
            proj.apply_envelope(&make_envelope(
                hospital_id,
                donation_id.0,
                1,
                recorded(hospital_id, donation_id, donor_id, *d),
            ))
            .unwrap();

            let stats = proj.get(hospital_id, donor_id).unwrap();
            assert_eq!(stats.donation_count, (i + 1) as u64);
            assert_eq!(stats.last_donation, Some(*d));
        }

        let stats = proj.get(hospital_id, donor_id).unwrap();
        assert_eq!(stats.total_donated_ml, 900);
    }

    #[test]
    fn last_donation_never_moves_backwards() {
        let store = Arc::new(InMemoryHospitalStore::<DonorId, DonorStats>::new());
        let proj = DonorStatsProjection::new(store);

        let hospital_id = HospitalId::new();
        let donor_id = DonorId::new(AggregateId::new());

        // A backdated record arrives after a newer one.
        for d in [day(20), day(3)] {
            let donation_id = DonationId::new(AggregateId::new());
            proj.apply_envelope(&make_envelope(
                hospital_id,
                donation_id.0,
                1,
                recorded(hospital_id, donation_id, donor_id, d),
            ))
            .unwrap();
        }

        let stats = proj.get(hospital_id, donor_id).unwrap();
        assert_eq!(stats.donation_count, 2);
        assert_eq!(stats.last_donation, Some(day(20)));
    }

    #[test]
    fn discard_does_not_rewrite_donor_history() {
        let store = Arc::new(InMemoryHospitalStore::<DonorId, DonorStats>::new());
        let proj = DonorStatsProjection::new(store);

        let hospital_id = HospitalId::new();
        let donor_id = DonorId::new(AggregateId::new());
        let donation_id = DonationId::new(AggregateId::new());

        proj.apply_envelope(&make_envelope(
            hospital_id,
            donation_id.0,
            1,
            recorded(hospital_id, donation_id, donor_id, day(1)),
        ))
        .unwrap();
        proj.apply_envelope(&make_envelope(
            hospital_id,
            donation_id.0,
            2,
            DonationEvent::DonationDiscarded(DonationDiscarded {
                hospital_id,
                donation_id,
                reason: "failed visual inspection".to_string(),
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        let stats = proj.get(hospital_id, donor_id).unwrap();
        assert_eq!(stats.donation_count, 1);
        assert_eq!(stats.total_donated_ml, 450);
    }

    #[test]
    fn duplicate_delivery_is_idempotent() {
        let store = Arc::new(InMemoryHospitalStore::<DonorId, DonorStats>::new());
        let proj = DonorStatsProjection::new(store);

        let hospital_id = HospitalId::new();
        let donor_id = DonorId::new(AggregateId::new());
        let donation_id = DonationId::new(AggregateId::new());

        let env = make_envelope(
            hospital_id,
            donation_id.0,
            1,
            recorded(hospital_id, donation_id, donor_id, day(1)),
        );
        proj.apply_envelope(&env).unwrap();
        proj.apply_envelope(&env).unwrap();

        let stats = proj.get(hospital_id, donor_id).unwrap();
        assert_eq!(stats.donation_count, 1);
    }
}
