use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use bloodcore_core::{AggregateId, BloodType, HospitalId, Milliliters};
use bloodcore_events::EventEnvelope;
use bloodcore_inventory::StockEvent;

use crate::read_model::HospitalStore;

/// Queryable inventory read model: current counters per blood type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryStats {
    pub blood_type: BloodType,
    pub available: Milliliters,
    pub reserved: Milliliters,
}

impl InventoryStats {
    pub fn total(&self) -> Milliliters {
        Milliliters(self.available.0 + self.reserved.0)
    }

    /// Critically short: at or below the threshold.
    pub fn is_critical(&self, threshold: Milliliters) -> bool {
        self.available <= threshold
    }

    pub fn is_low(&self, threshold: Milliliters) -> bool {
        self.available <= threshold
    }
}

/// Hospital+aggregate cursor to support at-least-once delivery (idempotent projection).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    hospital_id: HospitalId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum InventoryProjectionError {
    #[error("failed to deserialize stock event: {0}")]
    Deserialize(String),

    #[error("hospital isolation violation: {0}")]
    HospitalIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Inventory statistics projection.
///
/// Consumes published envelopes (JSON payloads) and maintains a
/// hospital-isolated per-blood-type read model. Read models are disposable
/// and rebuildable from the event stream; the ledger remains authoritative.
#[derive(Debug)]
pub struct InventoryStatsProjection<S>
where
    S: HospitalStore<BloodType, InventoryStats>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> InventoryStatsProjection<S>
where
    S: HospitalStore<BloodType, InventoryStats>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Query the read model for one hospital/blood type.
    pub fn get(&self, hospital_id: HospitalId, blood_type: BloodType) -> Option<InventoryStats> {
        self.store.get(hospital_id, &blood_type)
    }

    /// List all tracked blood types for a hospital.
    pub fn list(&self, hospital_id: HospitalId) -> Vec<InventoryStats> {
        self.store.list(hospital_id)
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Ignores envelopes from other aggregate types
    /// - Enforces hospital isolation
    /// - Enforces monotonic sequence per (hospital, aggregate) stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), InventoryProjectionError> {
        if envelope.aggregate_type() != "inventory.stock" {
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
                return Err(InventoryProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                // First event may land at any positive sequence; after that
                // we require strict increments.
                return Err(InventoryProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let stock: StockEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| InventoryProjectionError::Deserialize(e.to_string()))?;

            // Validate hospital isolation at the event level.
            let (event_hospital, stock_id, blood_type) = match &stock {
                StockEvent::StockCredited(e) => (e.hospital_id, e.stock_id, e.blood_type),
                StockEvent::StockReserved(e) => (e.hospital_id, e.stock_id, e.blood_type),
                StockEvent::StockReleased(e) => (e.hospital_id, e.stock_id, e.blood_type),
                StockEvent::StockIssued(e) => (e.hospital_id, e.stock_id, e.blood_type),
                StockEvent::StockAdjusted(e) => (e.hospital_id, e.stock_id, e.blood_type),
            };

            if event_hospital != hospital_id {
                return Err(InventoryProjectionError::HospitalIsolation(
                    "event hospital_id does not match envelope hospital_id".to_string(),
                ));
            }

            if stock_id.0 != aggregate_id {
                return Err(InventoryProjectionError::HospitalIsolation(
                    "event stock_id does not match envelope aggregate_id".to_string(),
                ));
            }

            let mut stats = self.store.get(hospital_id, &blood_type).unwrap_or(InventoryStats {
                blood_type,
                available: Milliliters(0),
                reserved: Milliliters(0),
            });

            match stock {
                StockEvent::StockCredited(e) => {
                    stats.available.0 += e.quantity_ml;
                }
                StockEvent::StockReserved(e) => {
                    stats.available.0 -= e.quantity_ml;
                    stats.reserved.0 += e.quantity_ml;
                }
                StockEvent::StockReleased(e) => {
                    stats.reserved.0 -= e.quantity_ml;
                    stats.available.0 += e.quantity_ml;
                }
                StockEvent::StockIssued(e) => {
                    stats.available.0 -= e.quantity_ml;
                }
                StockEvent::StockAdjusted(e) => {
                    stats.available.0 += e.delta_ml;
                }
            }

            self.store.upsert(hospital_id, blood_type, stats);

            // Advance cursor after successful apply.
            cursors.insert(key, seq);
        }

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), InventoryProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        // Clear read model per hospital before rebuilding.
        {
            let mut hospitals = envs.iter().map(|e| e.hospital_id()).collect::<Vec<_>>();
            hospitals.sort_by_key(|h| *h.as_uuid().as_bytes());
            hospitals.dedup();
            for h in hospitals {
                self.store.clear_hospital(h);
            }
        }

        // Deterministic replay order: hospital, aggregate, sequence.
        envs.sort_by_key(|e| {
            (
                *e.hospital_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
