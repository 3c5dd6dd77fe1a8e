use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use bloodcore_core::{Aggregate, AggregateId, AggregateRoot, BloodType, DomainError, HospitalId};
use bloodcore_donors::DonorId;
use bloodcore_events::{Command, Event};

/// Donation identifier (hospital-scoped via `hospital_id` fields in
/// events/commands). Doubles as the blood-unit id: one donation, one unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DonationId(pub AggregateId);

impl DonationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DonationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Donation record status. A recorded donation is available for use
/// immediately; discarding it is an explicit admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Available,
    Discarded,
}

/// Aggregate root: Donation (the audit-trail record of one collection).
///
/// Immutable once recorded, except for the single transition to Discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Donation {
    id: DonationId,
    hospital_id: Option<HospitalId>,
    donor_id: Option<DonorId>,
    donor_name: String,
    blood_type: Option<BloodType>,
    quantity_ml: i64,
    hemoglobin_g_dl: Option<f32>,
    notes: Option<String>,
    collected_on: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    status: DonationStatus,
    version: u64,
    recorded: bool,
}

impl Donation {
    /// Create an empty, not-yet-recorded aggregate instance for rehydration.
    pub fn empty(id: DonationId) -> Self {
        Self {
            id,
            hospital_id: None,
            donor_id: None,
            donor_name: String::new(),
            blood_type: None,
            quantity_ml: 0,
            hemoglobin_g_dl: None,
            notes: None,
            collected_on: None,
            expiry_date: None,
            status: DonationStatus::Available,
            version: 0,
            recorded: false,
        }
    }

    pub fn id_typed(&self) -> DonationId {
        self.id
    }

    pub fn hospital_id(&self) -> Option<HospitalId> {
        self.hospital_id
    }

    pub fn donor_id(&self) -> Option<DonorId> {
        self.donor_id
    }

    pub fn donor_name(&self) -> &str {
        &self.donor_name
    }

    pub fn blood_type(&self) -> Option<BloodType> {
        self.blood_type
    }

    pub fn quantity_ml(&self) -> i64 {
        self.quantity_ml
    }

    pub fn hemoglobin_g_dl(&self) -> Option<f32> {
        self.hemoglobin_g_dl
    }

    pub fn collected_on(&self) -> Option<NaiveDate> {
        self.collected_on
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    pub fn status(&self) -> DonationStatus {
        self.status
    }

    pub fn is_recorded(&self) -> bool {
        self.recorded
    }
}

impl AggregateRoot for Donation {
    type Id = DonationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordDonation.
///
/// `expiry_date` is stamped by the caller (collection date + the bank's
/// shelf-life policy) so the record stays a closed fact even if the policy
/// changes later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDonation {
    pub hospital_id: HospitalId,
    pub donation_id: DonationId,
    pub donor_id: DonorId,
    pub donor_name: String,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub hemoglobin_g_dl: Option<f32>,
    pub notes: Option<String>,
    pub collected_on: NaiveDate,
    pub expiry_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DiscardDonation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardDonation {
    pub hospital_id: HospitalId,
    pub donation_id: DonationId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DonationCommand {
    RecordDonation(RecordDonation),
    DiscardDonation(DiscardDonation),
}

impl Command for DonationCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            DonationCommand::RecordDonation(c) => c.donation_id.0,
            DonationCommand::DiscardDonation(c) => c.donation_id.0,
        }
    }
}

/// Event: DonationRecorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRecorded {
    pub hospital_id: HospitalId,
    pub donation_id: DonationId,
    pub donor_id: DonorId,
    pub donor_name: String,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub hemoglobin_g_dl: Option<f32>,
    pub notes: Option<String>,
    pub collected_on: NaiveDate,
    pub expiry_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DonationDiscarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationDiscarded {
    pub hospital_id: HospitalId,
    pub donation_id: DonationId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DonationEvent {
    DonationRecorded(DonationRecorded),
    DonationDiscarded(DonationDiscarded),
}

impl Event for DonationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DonationEvent::DonationRecorded(_) => "collection.donation.recorded",
            DonationEvent::DonationDiscarded(_) => "collection.donation.discarded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DonationEvent::DonationRecorded(e) => e.occurred_at,
            DonationEvent::DonationDiscarded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Donation {
    type Command = DonationCommand;
    type Event = DonationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DonationEvent::DonationRecorded(e) => {
                self.id = e.donation_id;
                self.hospital_id = Some(e.hospital_id);
                self.donor_id = Some(e.donor_id);
                self.donor_name = e.donor_name.clone();
                self.blood_type = Some(e.blood_type);
                self.quantity_ml = e.quantity_ml;
                self.hemoglobin_g_dl = e.hemoglobin_g_dl;
                self.notes = e.notes.clone();
                self.collected_on = Some(e.collected_on);
                self.expiry_date = Some(e.expiry_date);
                self.status = DonationStatus::Available;
                self.recorded = true;
            }
            DonationEvent::DonationDiscarded(_) => {
                self.status = DonationStatus::Discarded;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DonationCommand::RecordDonation(cmd) => self.handle_record(cmd),
            DonationCommand::DiscardDonation(cmd) => self.handle_discard(cmd),
        }
    }
}

impl Donation {
    fn handle_record(&self, cmd: &RecordDonation) -> Result<Vec<DonationEvent>, DomainError> {
        if self.recorded {
            return Err(DomainError::conflict("donation already recorded"));
        }
        if cmd.donor_name.trim().is_empty() {
            return Err(DomainError::validation("donor name cannot be empty"));
        }
        if cmd.quantity_ml <= 0 {
            return Err(DomainError::validation("donation volume must be positive"));
        }
        if cmd.expiry_date <= cmd.collected_on {
            return Err(DomainError::validation(
                "expiry date must be after the collection date",
            ));
        }

        Ok(vec![DonationEvent::DonationRecorded(DonationRecorded {
            hospital_id: cmd.hospital_id,
            donation_id: cmd.donation_id,
            donor_id: cmd.donor_id,
            donor_name: cmd.donor_name.clone(),
            blood_type: cmd.blood_type,
            quantity_ml: cmd.quantity_ml,
            hemoglobin_g_dl: cmd.hemoglobin_g_dl,
            notes: cmd.notes.clone(),
            collected_on: cmd.collected_on,
            expiry_date: cmd.expiry_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_discard(&self, cmd: &DiscardDonation) -> Result<Vec<DonationEvent>, DomainError> {
        if !self.recorded {
            return Err(DomainError::not_found());
        }
        if self.hospital_id != Some(cmd.hospital_id) {
            return Err(DomainError::invalid_state(
                "donation belongs to a different hospital",
            ));
        }
        if self.id != cmd.donation_id {
            return Err(DomainError::invalid_state("donation_id mismatch"));
        }
        if self.status != DonationStatus::Available {
            return Err(DomainError::invalid_state(
                "only available donations can be discarded",
            ));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("discard reason cannot be empty"));
        }

        Ok(vec![DonationEvent::DonationDiscarded(DonationDiscarded {
            hospital_id: cmd.hospital_id,
            donation_id: cmd.donation_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
