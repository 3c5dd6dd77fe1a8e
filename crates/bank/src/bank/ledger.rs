//! Inventory ledger operations (per-blood-type accounting).

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use bloodcore_core::{BloodType, DomainError, HospitalId, Milliliters, StaffId};
use bloodcore_events::{EventBus, EventEnvelope};
use bloodcore_inventory::{
    AdjustStock, CreditStock, ReleaseStock, ReserveStock, StockCommand, StockLevel, StockLevelId,
};

use super::BloodBank;
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

impl<S, B> BloodBank<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Current ledger counters for one blood type.
    ///
    /// Every blood type always has a ledger entry: a stream with no events
    /// rehydrates to zero available / zero reserved.
    pub fn stock_level(
        &self,
        hospital_id: HospitalId,
        blood_type: BloodType,
    ) -> Result<StockLevel, DispatchError> {
        let stock_id = StockLevelId::for_blood_type(blood_type);
        self.rehydrate(hospital_id, stock_id.0, |_| StockLevel::empty(stock_id))
    }

    /// Ledger lookup by display code (e.g. `"O-"`).
    ///
    /// The catalog is closed, so an unknown code is a lookup miss, not a
    /// validation failure.
    pub fn stock_level_by_code(
        &self,
        hospital_id: HospitalId,
        code: &str,
    ) -> Result<StockLevel, DispatchError> {
        let blood_type: BloodType = code.parse().map_err(|_| DispatchError::NotFound)?;
        self.stock_level(hospital_id, blood_type)
    }

    /// All eight ledger entries, in catalog order.
    pub fn stock_levels(&self, hospital_id: HospitalId) -> Result<Vec<StockLevel>, DispatchError> {
        BloodType::ALL
            .iter()
            .map(|bt| self.stock_level(hospital_id, *bt))
            .collect()
    }

    /// Credit available stock (manual restock or transfer-in).
    ///
    /// Oversized credits are assumed to be data-entry mistakes and rejected
    /// before they reach the ledger.
    pub fn credit_stock(
        &self,
        hospital_id: HospitalId,
        staff_id: StaffId,
        blood_type: BloodType,
        quantity: Milliliters,
    ) -> Result<StockLevel, DispatchError> {
        if quantity.0 > self.policy().max_credit_ml {
            return Err(DomainError::validation(format!(
                "credit of {} exceeds the single-credit cap of {} ml",
                quantity,
                self.policy().max_credit_ml
            ))
            .into());
        }

        let stock_id = StockLevelId::for_blood_type(blood_type);
        let _gate = self.write_gate()?;
        self.dispatcher().dispatch(
            hospital_id,
            stock_id.0,
            "inventory.stock",
            StockCommand::CreditStock(CreditStock {
                hospital_id,
                stock_id,
                blood_type,
                quantity_ml: quantity.0,
                occurred_at: Utc::now(),
            }),
            |_, _| StockLevel::empty(stock_id),
        )?;

        info!(%hospital_id, %staff_id, %blood_type, quantity_ml = quantity.0, "stock credited");
        self.stock_level(hospital_id, blood_type)
    }

    /// Move available stock into the reserved pool.
    pub fn reserve_stock(
        &self,
        hospital_id: HospitalId,
        staff_id: StaffId,
        blood_type: BloodType,
        quantity: Milliliters,
    ) -> Result<StockLevel, DispatchError> {
        let stock_id = StockLevelId::for_blood_type(blood_type);
        let _gate = self.write_gate()?;
        self.dispatcher().dispatch(
            hospital_id,
            stock_id.0,
            "inventory.stock",
            StockCommand::ReserveStock(ReserveStock {
                hospital_id,
                stock_id,
                blood_type,
                quantity_ml: quantity.0,
                occurred_at: Utc::now(),
            }),
            |_, _| StockLevel::empty(stock_id),
        )?;

        info!(%hospital_id, %staff_id, %blood_type, quantity_ml = quantity.0, "stock reserved");
        self.stock_level(hospital_id, blood_type)
    }

    /// Return reserved stock to the available pool.
    pub fn release_stock(
        &self,
        hospital_id: HospitalId,
        staff_id: StaffId,
        blood_type: BloodType,
        quantity: Milliliters,
    ) -> Result<StockLevel, DispatchError> {
        let stock_id = StockLevelId::for_blood_type(blood_type);
        let _gate = self.write_gate()?;
        self.dispatcher().dispatch(
            hospital_id,
            stock_id.0,
            "inventory.stock",
            StockCommand::ReleaseStock(ReleaseStock {
                hospital_id,
                stock_id,
                blood_type,
                quantity_ml: quantity.0,
                occurred_at: Utc::now(),
            }),
            |_, _| StockLevel::empty(stock_id),
        )?;

        info!(%hospital_id, %staff_id, %blood_type, quantity_ml = quantity.0, "stock released");
        self.stock_level(hospital_id, blood_type)
    }

    /// Signed manual correction of the available counter.
    ///
    /// A negative adjustment that exceeds available stock is rejected as
    /// insufficient stock, never clamped to zero.
    pub fn adjust_stock(
        &self,
        hospital_id: HospitalId,
        staff_id: StaffId,
        blood_type: BloodType,
        delta: Milliliters,
    ) -> Result<StockLevel, DispatchError> {
        let stock_id = StockLevelId::for_blood_type(blood_type);
        let _gate = self.write_gate()?;
        self.dispatcher().dispatch(
            hospital_id,
            stock_id.0,
            "inventory.stock",
            StockCommand::AdjustStock(AdjustStock {
                hospital_id,
                stock_id,
                blood_type,
                delta_ml: delta.0,
                occurred_at: Utc::now(),
            }),
            |_, _| StockLevel::empty(stock_id),
        )?;

        info!(%hospital_id, %staff_id, %blood_type, delta_ml = delta.0, "stock adjusted");
        self.stock_level(hospital_id, blood_type)
    }
}
