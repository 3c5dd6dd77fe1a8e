use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloodcore_core::{
    Aggregate, AggregateId, AggregateRoot, BloodType, DomainError, Gender, HospitalId,
};
use bloodcore_events::{Command, Event};

/// Donor eligibility window in years.
const MIN_DONOR_AGE: u8 = 18;
const MAX_DONOR_AGE: u8 = 65;

/// Donor identifier (hospital-scoped via `hospital_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DonorId(pub AggregateId);

impl DonorId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DonorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Contact information for a donor. Phone is required; the rest is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Donor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Donor {
    id: DonorId,
    hospital_id: Option<HospitalId>,
    name: String,
    age: u8,
    gender: Gender,
    blood_type: Option<BloodType>,
    contact: ContactInfo,
    version: u64,
    registered: bool,
}

impl Donor {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: DonorId) -> Self {
        Self {
            id,
            hospital_id: None,
            name: String::new(),
            age: 0,
            gender: Gender::Other,
            blood_type: None,
            contact: ContactInfo::default(),
            version: 0,
            registered: false,
        }
    }

    pub fn id_typed(&self) -> DonorId {
        self.id
    }

    pub fn hospital_id(&self) -> Option<HospitalId> {
        self.hospital_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn blood_type(&self) -> Option<BloodType> {
        self.blood_type
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

impl AggregateRoot for Donor {
    type Id = DonorId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterDonor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDonor {
    pub hospital_id: HospitalId,
    pub donor_id: DonorId,
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub blood_type: BloodType,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateContact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateContact {
    pub hospital_id: HospitalId,
    pub donor_id: DonorId,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DonorCommand {
    RegisterDonor(RegisterDonor),
    UpdateContact(UpdateContact),
}

impl Command for DonorCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            DonorCommand::RegisterDonor(c) => c.donor_id.0,
            DonorCommand::UpdateContact(c) => c.donor_id.0,
        }
    }
}

/// Event: DonorRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorRegistered {
    pub hospital_id: HospitalId,
    pub donor_id: DonorId,
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub blood_type: BloodType,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DonorContactUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorContactUpdated {
    pub hospital_id: HospitalId,
    pub donor_id: DonorId,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DonorEvent {
    DonorRegistered(DonorRegistered),
    DonorContactUpdated(DonorContactUpdated),
}

impl Event for DonorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DonorEvent::DonorRegistered(_) => "donors.donor.registered",
            DonorEvent::DonorContactUpdated(_) => "donors.donor.contact_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DonorEvent::DonorRegistered(e) => e.occurred_at,
            DonorEvent::DonorContactUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Donor {
    type Command = DonorCommand;
    type Event = DonorEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DonorEvent::DonorRegistered(e) => {
                self.id = e.donor_id;
                self.hospital_id = Some(e.hospital_id);
                self.name = e.name.clone();
                self.age = e.age;
                self.gender = e.gender;
                self.blood_type = Some(e.blood_type);
                self.contact = e.contact.clone();
                self.registered = true;
            }
            DonorEvent::DonorContactUpdated(e) => {
                self.contact = e.contact.clone();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DonorCommand::RegisterDonor(cmd) => self.handle_register(cmd),
            DonorCommand::UpdateContact(cmd) => self.handle_update_contact(cmd),
        }
    }
}

impl Donor {
    fn ensure_hospital(&self, hospital_id: HospitalId) -> Result<(), DomainError> {
        if !self.registered {
            return Ok(());
        }
        if self.hospital_id != Some(hospital_id) {
            return Err(DomainError::invalid_state(
                "donor belongs to a different hospital",
            ));
        }
        Ok(())
    }

    fn ensure_donor_id(&self, donor_id: DonorId) -> Result<(), DomainError> {
        if self.id != donor_id {
            return Err(DomainError::invalid_state("donor_id mismatch"));
        }
        Ok(())
    }

    fn validate_contact(contact: &ContactInfo) -> Result<(), DomainError> {
        if contact.phone.trim().is_empty() {
            return Err(DomainError::validation("phone number cannot be empty"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterDonor) -> Result<Vec<DonorEvent>, DomainError> {
        if self.registered {
            return Err(DomainError::conflict("donor already registered"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("donor name cannot be empty"));
        }
        if !(MIN_DONOR_AGE..=MAX_DONOR_AGE).contains(&cmd.age) {
            return Err(DomainError::validation(format!(
                "donor age must be between {MIN_DONOR_AGE} and {MAX_DONOR_AGE}"
            )));
        }
        Self::validate_contact(&cmd.contact)?;

        Ok(vec![DonorEvent::DonorRegistered(DonorRegistered {
            hospital_id: cmd.hospital_id,
            donor_id: cmd.donor_id,
            name: cmd.name.clone(),
            age: cmd.age,
            gender: cmd.gender,
            blood_type: cmd.blood_type,
            contact: cmd.contact.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_contact(&self, cmd: &UpdateContact) -> Result<Vec<DonorEvent>, DomainError> {
        if !self.registered {
            return Err(DomainError::not_found());
        }
        self.ensure_hospital(cmd.hospital_id)?;
        self.ensure_donor_id(cmd.donor_id)?;
        Self::validate_contact(&cmd.contact)?;

        Ok(vec![DonorEvent::DonorContactUpdated(DonorContactUpdated {
            hospital_id: cmd.hospital_id,
            donor_id: cmd.donor_id,
            contact: cmd.contact.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
