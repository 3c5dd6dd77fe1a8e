//! Donation intake and discard (the write path that feeds the ledger).

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use bloodcore_collection::{
    DiscardDonation, Donation, DonationCommand, DonationId, RecordDonation,
};
use bloodcore_core::{AggregateId, BloodType, DomainError, HospitalId, Milliliters, StaffId};
use bloodcore_donors::{Donor, DonorId};
use bloodcore_events::{EventBus, EventEnvelope};
use bloodcore_inventory::{
    AdjustStock, CreditStock, StockCommand, StockLevel, StockLevelId,
};

use super::BloodBank;
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

/// Input for recording a completed donation.
#[derive(Debug, Clone)]
pub struct RecordDonationInput {
    pub hospital_id: HospitalId,
    pub staff_id: StaffId,
    pub donor_id: DonorId,
    pub quantity: Milliliters,
    pub hemoglobin_g_dl: Option<f32>,
    pub notes: Option<String>,
    pub collected_on: NaiveDate,
}

/// What intake hands back: the new unit's identity and its stamped expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationReceipt {
    pub donation_id: DonationId,
    pub donor_id: DonorId,
    pub blood_type: BloodType,
    pub quantity: Milliliters,
    pub expiry_date: NaiveDate,
}

impl<S, B> BloodBank<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Record a completed donation.
    ///
    /// One logical transaction: the donation record and the matching ledger
    /// credit commit together, or neither does. The unit's blood type comes
    /// from the donor's registered profile, not from intake input, so a
    /// typed unit can never disagree with its donor.
    pub fn record_donation(
        &self,
        input: RecordDonationInput,
    ) -> Result<DonationReceipt, DispatchError> {
        self.validate_intake(&input)?;

        let donor: Donor = self.get_donor(input.hospital_id, input.donor_id)?;
        let blood_type = donor
            .blood_type()
            .ok_or_else(|| DispatchError::InvalidState("donor has no blood type on file".into()))?;

        let donation_id = DonationId::new(AggregateId::new());
        let stock_id = StockLevelId::for_blood_type(blood_type);
        let expiry_date = self.policy().expiry_date(input.collected_on);
        let occurred_at = Utc::now();

        let record = RecordDonation {
            hospital_id: input.hospital_id,
            donation_id,
            donor_id: input.donor_id,
            donor_name: donor.name().to_string(),
            blood_type,
            quantity_ml: input.quantity.0,
            hemoglobin_g_dl: input.hemoglobin_g_dl,
            notes: input.notes.clone(),
            collected_on: input.collected_on,
            expiry_date,
            occurred_at,
        };
        let credit = CreditStock {
            hospital_id: input.hospital_id,
            stock_id,
            blood_type,
            quantity_ml: input.quantity.0,
            occurred_at,
        };

        let _gate = self.write_gate()?;
        self.dispatcher().dispatch_pair(
            input.hospital_id,
            (
                donation_id.0,
                "collection.donation",
                DonationCommand::RecordDonation(record),
            ),
            |_, id| Donation::empty(DonationId::new(id)),
            (
                stock_id.0,
                "inventory.stock",
                StockCommand::CreditStock(credit),
            ),
            |_, _| StockLevel::empty(stock_id),
        )?;

        info!(
            hospital_id = %input.hospital_id,
            staff_id = %input.staff_id,
            donor_id = %input.donor_id,
            %donation_id,
            %blood_type,
            quantity_ml = input.quantity.0,
            "donation recorded"
        );

        Ok(DonationReceipt {
            donation_id,
            donor_id: input.donor_id,
            blood_type,
            quantity: input.quantity,
            expiry_date,
        })
    }

    /// Discard a recorded donation and debit its volume from the ledger.
    ///
    /// Fails if the volume has already been issued: the ledger debit would
    /// go negative, and the paired commit aborts before either stream is
    /// touched.
    pub fn discard_donation(
        &self,
        hospital_id: HospitalId,
        staff_id: StaffId,
        donation_id: DonationId,
        reason: impl Into<String>,
    ) -> Result<(), DispatchError> {
        let donation: Donation = self.rehydrate(hospital_id, donation_id.0, |id| {
            Donation::empty(DonationId::new(id))
        })?;
        if !donation.is_recorded() {
            return Err(DispatchError::NotFound);
        }
        let blood_type = donation
            .blood_type()
            .ok_or_else(|| DispatchError::InvalidState("donation has no blood type".into()))?;
        let quantity_ml = donation.quantity_ml();

        let stock_id = StockLevelId::for_blood_type(blood_type);
        let occurred_at = Utc::now();

        let _gate = self.write_gate()?;
        self.dispatcher().dispatch_pair(
            hospital_id,
            (
                donation_id.0,
                "collection.donation",
                DonationCommand::DiscardDonation(DiscardDonation {
                    hospital_id,
                    donation_id,
                    reason: reason.into(),
                    occurred_at,
                }),
            ),
            |_, id| Donation::empty(DonationId::new(id)),
            (
                stock_id.0,
                "inventory.stock",
                StockCommand::AdjustStock(AdjustStock {
                    hospital_id,
                    stock_id,
                    blood_type,
                    delta_ml: -quantity_ml,
                    occurred_at,
                }),
            ),
            |_, _| StockLevel::empty(stock_id),
        )?;

        info!(%hospital_id, %staff_id, %donation_id, %blood_type, quantity_ml, "donation discarded");
        Ok(())
    }

    fn validate_intake(&self, input: &RecordDonationInput) -> Result<(), DispatchError> {
        if input.quantity.0 <= 0 {
            return Err(DomainError::validation("donation volume must be positive").into());
        }
        if input.quantity.0 > self.policy().max_donation_ml {
            return Err(DomainError::validation(format!(
                "donation of {} exceeds the per-donation cap of {} ml",
                input.quantity,
                self.policy().max_donation_ml
            ))
            .into());
        }
        if let Some(hb) = input.hemoglobin_g_dl {
            let policy = self.policy();
            if hb < policy.min_hemoglobin_g_dl || hb > policy.max_hemoglobin_g_dl {
                return Err(DomainError::validation(format!(
                    "hemoglobin {hb} g/dL is outside the acceptable range ({} - {})",
                    policy.min_hemoglobin_g_dl, policy.max_hemoglobin_g_dl
                ))
                .into());
            }
        }
        Ok(())
    }
}
