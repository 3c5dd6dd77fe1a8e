//! Donor directory operations.

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use bloodcore_core::{AggregateId, BloodType, Gender, HospitalId, StaffId};
use bloodcore_donors::{ContactInfo, Donor, DonorCommand, DonorId, RegisterDonor, UpdateContact};
use bloodcore_events::{EventBus, EventEnvelope};

use super::BloodBank;
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

/// Input for donor registration.
#[derive(Debug, Clone)]
pub struct RegisterDonorInput {
    pub hospital_id: HospitalId,
    pub staff_id: StaffId,
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub blood_type: BloodType,
    pub contact: ContactInfo,
}

impl<S, B> BloodBank<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Register a new donor and return the assigned identifier.
    pub fn register_donor(&self, input: RegisterDonorInput) -> Result<DonorId, DispatchError> {
        let donor_id = DonorId::new(AggregateId::new());

        let _gate = self.write_gate()?;
        self.dispatcher().dispatch(
            input.hospital_id,
            donor_id.0,
            "donors.donor",
            DonorCommand::RegisterDonor(RegisterDonor {
                hospital_id: input.hospital_id,
                donor_id,
                name: input.name,
                age: input.age,
                gender: input.gender,
                blood_type: input.blood_type,
                contact: input.contact,
                occurred_at: Utc::now(),
            }),
            |_, id| Donor::empty(DonorId::new(id)),
        )?;

        info!(
            hospital_id = %input.hospital_id,
            staff_id = %input.staff_id,
            %donor_id,
            "donor registered"
        );
        Ok(donor_id)
    }

    /// Load a donor's current profile.
    pub fn get_donor(
        &self,
        hospital_id: HospitalId,
        donor_id: DonorId,
    ) -> Result<Donor, DispatchError> {
        let donor = self.rehydrate(hospital_id, donor_id.0, |id| Donor::empty(DonorId::new(id)))?;
        if !donor.is_registered() {
            return Err(DispatchError::NotFound);
        }
        Ok(donor)
    }

    /// Replace a donor's contact details.
    pub fn update_donor_contact(
        &self,
        hospital_id: HospitalId,
        staff_id: StaffId,
        donor_id: DonorId,
        contact: ContactInfo,
    ) -> Result<Donor, DispatchError> {
        let _gate = self.write_gate()?;
        self.dispatcher().dispatch(
            hospital_id,
            donor_id.0,
            "donors.donor",
            DonorCommand::UpdateContact(UpdateContact {
                hospital_id,
                donor_id,
                contact,
                occurred_at: Utc::now(),
            }),
            |_, id| Donor::empty(DonorId::new(id)),
        )?;

        info!(%hospital_id, %staff_id, %donor_id, "donor contact updated");
        self.get_donor(hospital_id, donor_id)
    }
}
