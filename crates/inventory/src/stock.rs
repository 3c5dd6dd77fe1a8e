use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bloodcore_core::{Aggregate, AggregateId, AggregateRoot, BloodType, DomainError, HospitalId};
use bloodcore_events::{Command, Event};

/// Stock stream identifier (hospital-scoped via `hospital_id` fields in
/// events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockLevelId(pub AggregateId);

impl StockLevelId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// Stable stream identity for a blood type.
    ///
    /// The catalog is closed, so the ledger can address a blood type's
    /// stream without a lookup table. Hospital scoping comes from the store
    /// key; the same eight stream ids exist in every hospital.
    pub fn for_blood_type(blood_type: BloodType) -> Self {
        let raw = 0x424c_4f4f_4443_4f52_4553_544f_434b_0000u128 | u128::from(blood_type.index());
        Self(AggregateId::from_uuid(Uuid::from_u128(raw)))
    }
}

impl core::fmt::Display for StockLevelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: per-blood-type stock level.
///
/// Holds the authoritative `available` and `reserved` counters in ml.
/// Invariant: both counters stay non-negative after every applied event;
/// commands that would break that are rejected, never clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    id: StockLevelId,
    hospital_id: Option<HospitalId>,
    blood_type: Option<BloodType>,
    available_ml: i64,
    reserved_ml: i64,
    version: u64,
}

impl StockLevel {
    /// Create an empty aggregate instance for rehydration.
    ///
    /// Stock streams have no explicit "create" step: the blood type catalog
    /// is closed, so every stream conceptually exists at zero from the
    /// start and opens on its first event.
    pub fn empty(id: StockLevelId) -> Self {
        Self {
            id,
            hospital_id: None,
            blood_type: None,
            available_ml: 0,
            reserved_ml: 0,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> StockLevelId {
        self.id
    }

    pub fn hospital_id(&self) -> Option<HospitalId> {
        self.hospital_id
    }

    pub fn blood_type(&self) -> Option<BloodType> {
        self.blood_type
    }

    /// Stock free to be reserved or issued, in ml.
    pub fn available_ml(&self) -> i64 {
        self.available_ml
    }

    /// Stock committed to a request but not yet consumed, in ml.
    pub fn reserved_ml(&self) -> i64 {
        self.reserved_ml
    }

    pub fn total_ml(&self) -> i64 {
        self.available_ml + self.reserved_ml
    }
}

impl AggregateRoot for StockLevel {
    type Id = StockLevelId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreditStock (donation intake or manual restock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditStock {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock (move available -> reserved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseStock (move reserved -> available).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueStock (consume available stock for a fulfillment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (manual admin correction, signed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub delta_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    CreditStock(CreditStock),
    ReserveStock(ReserveStock),
    ReleaseStock(ReleaseStock),
    IssueStock(IssueStock),
    AdjustStock(AdjustStock),
}

impl Command for StockCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            StockCommand::CreditStock(c) => c.stock_id.0,
            StockCommand::ReserveStock(c) => c.stock_id.0,
            StockCommand::ReleaseStock(c) => c.stock_id.0,
            StockCommand::IssueStock(c) => c.stock_id.0,
            StockCommand::AdjustStock(c) => c.stock_id.0,
        }
    }
}

/// Event: StockCredited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCredited {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReleased {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssued {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub hospital_id: HospitalId,
    pub stock_id: StockLevelId,
    pub blood_type: BloodType,
    pub delta_ml: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    StockCredited(StockCredited),
    StockReserved(StockReserved),
    StockReleased(StockReleased),
    StockIssued(StockIssued),
    StockAdjusted(StockAdjusted),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockCredited(_) => "inventory.stock.credited",
            StockEvent::StockReserved(_) => "inventory.stock.reserved",
            StockEvent::StockReleased(_) => "inventory.stock.released",
            StockEvent::StockIssued(_) => "inventory.stock.issued",
            StockEvent::StockAdjusted(_) => "inventory.stock.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::StockCredited(e) => e.occurred_at,
            StockEvent::StockReserved(e) => e.occurred_at,
            StockEvent::StockReleased(e) => e.occurred_at,
            StockEvent::StockIssued(e) => e.occurred_at,
            StockEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLevel {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::StockCredited(e) => {
                self.hospital_id = Some(e.hospital_id);
                self.blood_type = Some(e.blood_type);
                self.available_ml += e.quantity_ml;
            }
            StockEvent::StockReserved(e) => {
                self.hospital_id = Some(e.hospital_id);
                self.blood_type = Some(e.blood_type);
                self.available_ml -= e.quantity_ml;
                self.reserved_ml += e.quantity_ml;
            }
            StockEvent::StockReleased(e) => {
                self.hospital_id = Some(e.hospital_id);
                self.blood_type = Some(e.blood_type);
                self.reserved_ml -= e.quantity_ml;
                self.available_ml += e.quantity_ml;
            }
            StockEvent::StockIssued(e) => {
                self.hospital_id = Some(e.hospital_id);
                self.blood_type = Some(e.blood_type);
                self.available_ml -= e.quantity_ml;
            }
            StockEvent::StockAdjusted(e) => {
                self.hospital_id = Some(e.hospital_id);
                self.blood_type = Some(e.blood_type);
                self.available_ml += e.delta_ml;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::CreditStock(cmd) => self.handle_credit(cmd),
            StockCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            StockCommand::ReleaseStock(cmd) => self.handle_release(cmd),
            StockCommand::IssueStock(cmd) => self.handle_issue(cmd),
            StockCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl StockLevel {
    fn ensure_hospital(&self, hospital_id: HospitalId) -> Result<(), DomainError> {
        match self.hospital_id {
            Some(existing) if existing != hospital_id => Err(DomainError::invalid_state(
                "stock stream belongs to a different hospital",
            )),
            _ => Ok(()),
        }
    }

    fn ensure_stream(&self, stock_id: StockLevelId, blood_type: BloodType) -> Result<(), DomainError> {
        if self.id != stock_id {
            return Err(DomainError::invalid_state("stock_id mismatch"));
        }
        if matches!(self.blood_type, Some(existing) if existing != blood_type) {
            return Err(DomainError::invalid_state(
                "blood type does not match this stock stream",
            ));
        }
        Ok(())
    }

    fn handle_credit(&self, cmd: &CreditStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_hospital(cmd.hospital_id)?;
        self.ensure_stream(cmd.stock_id, cmd.blood_type)?;

        if cmd.quantity_ml <= 0 {
            return Err(DomainError::validation("credit quantity must be positive"));
        }

        Ok(vec![StockEvent::StockCredited(StockCredited {
            hospital_id: cmd.hospital_id,
            stock_id: cmd.stock_id,
            blood_type: cmd.blood_type,
            quantity_ml: cmd.quantity_ml,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_hospital(cmd.hospital_id)?;
        self.ensure_stream(cmd.stock_id, cmd.blood_type)?;

        if cmd.quantity_ml <= 0 {
            return Err(DomainError::validation("reserve quantity must be positive"));
        }

        // All-or-nothing: one atomic check against this type's available count.
        if self.available_ml < cmd.quantity_ml {
            return Err(DomainError::insufficient_stock(
                cmd.blood_type,
                cmd.quantity_ml,
                self.available_ml,
            ));
        }

        Ok(vec![StockEvent::StockReserved(StockReserved {
            hospital_id: cmd.hospital_id,
            stock_id: cmd.stock_id,
            blood_type: cmd.blood_type,
            quantity_ml: cmd.quantity_ml,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_hospital(cmd.hospital_id)?;
        self.ensure_stream(cmd.stock_id, cmd.blood_type)?;

        if cmd.quantity_ml <= 0 {
            return Err(DomainError::validation("release quantity must be positive"));
        }

        if self.reserved_ml < cmd.quantity_ml {
            return Err(DomainError::invalid_state(format!(
                "cannot release {} ml of {}: only {} ml reserved",
                cmd.quantity_ml, cmd.blood_type, self.reserved_ml
            )));
        }

        Ok(vec![StockEvent::StockReleased(StockReleased {
            hospital_id: cmd.hospital_id,
            stock_id: cmd.stock_id,
            blood_type: cmd.blood_type,
            quantity_ml: cmd.quantity_ml,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_hospital(cmd.hospital_id)?;
        self.ensure_stream(cmd.stock_id, cmd.blood_type)?;

        if cmd.quantity_ml <= 0 {
            return Err(DomainError::validation("issue quantity must be positive"));
        }

        if self.available_ml < cmd.quantity_ml {
            return Err(DomainError::insufficient_stock(
                cmd.blood_type,
                cmd.quantity_ml,
                self.available_ml,
            ));
        }

        Ok(vec![StockEvent::StockIssued(StockIssued {
            hospital_id: cmd.hospital_id,
            stock_id: cmd.stock_id,
            blood_type: cmd.blood_type,
            quantity_ml: cmd.quantity_ml,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_hospital(cmd.hospital_id)?;
        self.ensure_stream(cmd.stock_id, cmd.blood_type)?;

        if cmd.delta_ml == 0 {
            return Err(DomainError::validation("adjustment delta cannot be zero"));
        }

        // Fail, never clamp: a correction that would take available stock
        // negative means the correction itself is wrong.
        let new_available = self.available_ml + cmd.delta_ml;
        if new_available < 0 {
            return Err(DomainError::insufficient_stock(
                cmd.blood_type,
                -cmd.delta_ml,
                self.available_ml,
            ));
        }

        Ok(vec![StockEvent::StockAdjusted(StockAdjusted {
            hospital_id: cmd.hospital_id,
            stock_id: cmd.stock_id,
            blood_type: cmd.blood_type,
            delta_ml: cmd.delta_ml,
            occurred_at: cmd.occurred_at,
        })])
    }
}
