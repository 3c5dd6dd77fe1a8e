use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use bloodcore_core::{
    Aggregate, AggregateId, AggregateRoot, BloodType, DomainError, Gender, HospitalId,
};
use bloodcore_events::{Command, Event};

const MAX_PATIENT_AGE: u8 = 120;

/// Blood request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub AggregateId);

impl RequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Clinical urgency of a request. Ordering matters: `Critical` sorts above
/// `High` so triage lists can sort by urgency directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

/// Request lifecycle status. Fulfilled and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Fulfilled | RequestStatus::Cancelled)
    }
}

/// Aggregate root: BloodRequest.
///
/// A request holds no stock while Pending; the debit against the ledger
/// happens in the same commit as the transition to Fulfilled, so a cancelled
/// request never has anything to return.
#[derive(Debug, Clone, PartialEq)]
pub struct BloodRequest {
    id: RequestId,
    hospital_id: Option<HospitalId>,
    patient_name: String,
    patient_age: u8,
    patient_gender: Option<Gender>,
    blood_type: Option<BloodType>,
    quantity_ml: i64,
    urgency: Urgency,
    facility: String,
    requested_on: Option<NaiveDate>,
    notes: Option<String>,
    status: RequestStatus,
    version: u64,
    submitted: bool,
}

impl BloodRequest {
    /// Create an empty, not-yet-submitted aggregate instance for rehydration.
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            hospital_id: None,
            patient_name: String::new(),
            patient_age: 0,
            patient_gender: None,
            blood_type: None,
            quantity_ml: 0,
            urgency: Urgency::Low,
            facility: String::new(),
            requested_on: None,
            notes: None,
            status: RequestStatus::Pending,
            version: 0,
            submitted: false,
        }
    }

    pub fn id_typed(&self) -> RequestId {
        self.id
    }

    pub fn hospital_id(&self) -> Option<HospitalId> {
        self.hospital_id
    }

    pub fn patient_name(&self) -> &str {
        &self.patient_name
    }

    pub fn patient_age(&self) -> u8 {
        self.patient_age
    }

    pub fn patient_gender(&self) -> Option<Gender> {
        self.patient_gender
    }

    pub fn blood_type(&self) -> Option<BloodType> {
        self.blood_type
    }

    pub fn quantity_ml(&self) -> i64 {
        self.quantity_ml
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    pub fn facility(&self) -> &str {
        &self.facility
    }

    pub fn requested_on(&self) -> Option<NaiveDate> {
        self.requested_on
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }
}

impl AggregateRoot for BloodRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub hospital_id: HospitalId,
    pub request_id: RequestId,
    pub patient_name: String,
    pub patient_age: u8,
    pub patient_gender: Gender,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub urgency: Urgency,
    pub facility: String,
    pub requested_on: NaiveDate,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FulfillRequest. The matching stock issue is committed alongside
/// the event this produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillRequest {
    pub hospital_id: HospitalId,
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub hospital_id: HospitalId,
    pub request_id: RequestId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestCommand {
    SubmitRequest(SubmitRequest),
    FulfillRequest(FulfillRequest),
    CancelRequest(CancelRequest),
}

impl Command for RequestCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            RequestCommand::SubmitRequest(c) => c.request_id.0,
            RequestCommand::FulfillRequest(c) => c.request_id.0,
            RequestCommand::CancelRequest(c) => c.request_id.0,
        }
    }
}

/// Event: RequestSubmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSubmitted {
    pub hospital_id: HospitalId,
    pub request_id: RequestId,
    pub patient_name: String,
    pub patient_age: u8,
    pub patient_gender: Gender,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub urgency: Urgency,
    pub facility: String,
    pub requested_on: NaiveDate,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestFulfilled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFulfilled {
    pub hospital_id: HospitalId,
    pub request_id: RequestId,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestCancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelled {
    pub hospital_id: HospitalId,
    pub request_id: RequestId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestEvent {
    RequestSubmitted(RequestSubmitted),
    RequestFulfilled(RequestFulfilled),
    RequestCancelled(RequestCancelled),
}

impl Event for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::RequestSubmitted(_) => "requests.request.submitted",
            RequestEvent::RequestFulfilled(_) => "requests.request.fulfilled",
            RequestEvent::RequestCancelled(_) => "requests.request.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequestEvent::RequestSubmitted(e) => e.occurred_at,
            RequestEvent::RequestFulfilled(e) => e.occurred_at,
            RequestEvent::RequestCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for BloodRequest {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::RequestSubmitted(e) => {
                self.id = e.request_id;
                self.hospital_id = Some(e.hospital_id);
                self.patient_name = e.patient_name.clone();
                self.patient_age = e.patient_age;
                self.patient_gender = Some(e.patient_gender);
                self.blood_type = Some(e.blood_type);
                self.quantity_ml = e.quantity_ml;
                self.urgency = e.urgency;
                self.facility = e.facility.clone();
                self.requested_on = Some(e.requested_on);
                self.notes = e.notes.clone();
                self.status = RequestStatus::Pending;
                self.submitted = true;
            }
            RequestEvent::RequestFulfilled(_) => {
                self.status = RequestStatus::Fulfilled;
            }
            RequestEvent::RequestCancelled(_) => {
                self.status = RequestStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::SubmitRequest(cmd) => self.handle_submit(cmd),
            RequestCommand::FulfillRequest(cmd) => self.handle_fulfill(cmd),
            RequestCommand::CancelRequest(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl BloodRequest {
    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if self.submitted {
            return Err(DomainError::conflict("request already submitted"));
        }
        if cmd.patient_name.trim().is_empty() {
            return Err(DomainError::validation("patient name cannot be empty"));
        }
        if cmd.patient_age > MAX_PATIENT_AGE {
            return Err(DomainError::validation("patient age is implausible"));
        }
        if cmd.quantity_ml <= 0 {
            return Err(DomainError::validation(
                "requested quantity must be positive",
            ));
        }

        Ok(vec![RequestEvent::RequestSubmitted(RequestSubmitted {
            hospital_id: cmd.hospital_id,
            request_id: cmd.request_id,
            patient_name: cmd.patient_name.clone(),
            patient_age: cmd.patient_age,
            patient_gender: cmd.patient_gender,
            blood_type: cmd.blood_type,
            quantity_ml: cmd.quantity_ml,
            urgency: cmd.urgency,
            facility: cmd.facility.clone(),
            requested_on: cmd.requested_on,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fulfill(&self, cmd: &FulfillRequest) -> Result<Vec<RequestEvent>, DomainError> {
        let (blood_type, quantity_ml) = self.ensure_pending(cmd.hospital_id, cmd.request_id)?;

        Ok(vec![RequestEvent::RequestFulfilled(RequestFulfilled {
            hospital_id: cmd.hospital_id,
            request_id: cmd.request_id,
            blood_type,
            quantity_ml,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_pending(cmd.hospital_id, cmd.request_id)?;

        Ok(vec![RequestEvent::RequestCancelled(RequestCancelled {
            hospital_id: cmd.hospital_id,
            request_id: cmd.request_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn ensure_pending(
        &self,
        hospital_id: HospitalId,
        request_id: RequestId,
    ) -> Result<(BloodType, i64), DomainError> {
        if !self.submitted {
            return Err(DomainError::not_found());
        }
        if self.hospital_id != Some(hospital_id) {
            return Err(DomainError::invalid_state(
                "request belongs to a different hospital",
            ));
        }
        if self.id != request_id {
            return Err(DomainError::invalid_state("request_id mismatch"));
        }
        if self.status != RequestStatus::Pending {
            return Err(DomainError::invalid_state(
                "only pending requests can be fulfilled or cancelled",
            ));
        }
        let blood_type = self
            .blood_type
            .ok_or_else(|| DomainError::invalid_state("request has no blood type"))?;
        Ok((blood_type, self.quantity_ml))
    }
}
