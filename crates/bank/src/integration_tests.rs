//! Integration tests for the full accounting pipeline.
//!
//! Tests: BloodBank facade → EventStore → EventBus → Projections
//!
//! Verifies:
//! - Donation intake credits the ledger and the paired commit is all-or-nothing
//! - Fulfillment debits the ledger atomically with the status transition
//! - Hospital isolation is preserved end to end
//! - Concurrent writers cannot over-reserve a blood type

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use bloodcore_collection::{DonationStatus, UnitStatus};
use bloodcore_core::{
    BankPolicy, BloodType, ExpectedVersion, Gender, HospitalId, Milliliters, StaffId,
};
use bloodcore_donors::{ContactInfo, DonorId};
use bloodcore_events::{EventBus, EventEnvelope, InMemoryEventBus};
use bloodcore_requests::{RequestStatus, Urgency};

use crate::bank::{BloodBank, RecordDonationInput, RegisterDonorInput, SubmitRequestInput};
use crate::command_dispatcher::DispatchError;
use crate::event_store::{
    EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent,
};
use crate::projections::blood_units::BloodUnitsProjection;
use crate::projections::inventory_stats::{InventoryStats, InventoryStatsProjection};
use crate::read_model::InMemoryHospitalStore;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Bank = BloodBank<InMemoryEventStore, Bus>;
type StatsProjection = InventoryStatsProjection<
    Arc<InMemoryHospitalStore<BloodType, InventoryStats>>,
>;
type UnitsProjection = BloodUnitsProjection<
    Arc<InMemoryHospitalStore<bloodcore_collection::DonationId, bloodcore_collection::BloodUnit>>,
>;

fn test_hospital_id() -> HospitalId {
    HospitalId::new()
}

fn test_staff_id() -> StaffId {
    StaffId::new()
}

fn collected_on() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
}

fn setup() -> (Arc<Bank>, Arc<StatsProjection>, Arc<UnitsProjection>) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let bank = Arc::new(BloodBank::new(store, bus.clone(), BankPolicy::default()));

    let stats = Arc::new(InventoryStatsProjection::new(Arc::new(
        InMemoryHospitalStore::new(),
    )));
    let units = Arc::new(BloodUnitsProjection::new(Arc::new(
        InMemoryHospitalStore::new(),
    )));

    // Subscribe to the bus BEFORE any events are published
    let stats_clone = stats.clone();
    let units_clone = units.clone();
    let bus_clone = bus.clone();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    std::thread::spawn(move || {
        let sub = bus_clone.subscribe();
        let _ = ready_tx.send(());
        loop {
            match sub.recv() {
                Ok(env) => {
                    if let Err(e) = stats_clone.apply_envelope(&env) {
                        eprintln!("failed to apply envelope to stats: {e:?}");
                    }
                    if let Err(e) = units_clone.apply_envelope(&env) {
                        eprintln!("failed to apply envelope to units: {e:?}");
                    }
                }
                Err(_) => break,
            }
        }
    });
    // Ensure subscriber is ready before returning (prevents missing early events).
    let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));

    (bank, stats, units)
}

/// Helper: wait a short time for the subscriber thread to process events.
fn wait_for_processing() {
    std::thread::sleep(std::time::Duration::from_millis(50));
}

fn register_test_donor<S: EventStore>(
    bank: &BloodBank<S, Bus>,
    hospital_id: HospitalId,
    blood_type: BloodType,
) -> DonorId {
    bank.register_donor(RegisterDonorInput {
        hospital_id,
        staff_id: test_staff_id(),
        name: "John Smith".to_string(),
        age: 34,
        gender: Gender::Male,
        blood_type,
        contact: ContactInfo {
            phone: "555-0101".to_string(),
            email: Some("john@example.com".to_string()),
            address: None,
        },
    })
    .unwrap()
}

fn record_test_donation<S: EventStore>(
    bank: &BloodBank<S, Bus>,
    hospital_id: HospitalId,
    donor_id: DonorId,
    quantity_ml: i64,
) -> crate::bank::DonationReceipt {
    bank.record_donation(RecordDonationInput {
        hospital_id,
        staff_id: test_staff_id(),
        donor_id,
        quantity: Milliliters(quantity_ml),
        hemoglobin_g_dl: Some(14.2),
        notes: None,
        collected_on: collected_on(),
    })
    .unwrap()
}

fn submit_test_request<S: EventStore>(
    bank: &BloodBank<S, Bus>,
    hospital_id: HospitalId,
    blood_type: BloodType,
    quantity_ml: i64,
) -> bloodcore_requests::RequestId {
    bank.submit_request(SubmitRequestInput {
        hospital_id,
        staff_id: test_staff_id(),
        patient_name: "Maria Lopez".to_string(),
        patient_age: 41,
        patient_gender: Gender::Female,
        blood_type,
        quantity: Milliliters(quantity_ml),
        urgency: Urgency::High,
        facility: "City General ER".to_string(),
        requested_on: collected_on(),
        notes: None,
    })
    .unwrap()
}

#[test]
fn donation_intake_credits_ledger_and_creates_unit() {
    let (bank, stats, units) = setup();
    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::APositive);

    let receipt = record_test_donation(&bank, hospital_id, donor_id, 450);
    assert_eq!(receipt.blood_type, BloodType::APositive);
    assert_eq!(
        receipt.expiry_date,
        NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()
    );

    let stock = bank.stock_level(hospital_id, BloodType::APositive).unwrap();
    assert_eq!(stock.available_ml(), 450);
    assert_eq!(stock.reserved_ml(), 0);

    wait_for_processing();

    let rm = stats.get(hospital_id, BloodType::APositive).unwrap();
    assert_eq!(rm.available, Milliliters(450));

    let stored_units = units.list(hospital_id);
    assert_eq!(stored_units.len(), 1);
    assert_eq!(stored_units[0].unit_id, receipt.donation_id);
    assert_eq!(stored_units[0].status, UnitStatus::Available);
    assert_eq!(stored_units[0].expiry_date, receipt.expiry_date);
}

#[test]
fn oversized_donation_is_rejected_without_ledger_effect() {
    let (bank, _, _) = setup();
    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::OPositive);

    let err = bank
        .record_donation(RecordDonationInput {
            hospital_id,
            staff_id: test_staff_id(),
            donor_id,
            quantity: Milliliters(600),
            hemoglobin_g_dl: None,
            notes: None,
            collected_on: collected_on(),
        })
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));

    let stock = bank.stock_level(hospital_id, BloodType::OPositive).unwrap();
    assert_eq!(stock.available_ml(), 0);
}

#[test]
fn low_hemoglobin_is_rejected() {
    let (bank, _, _) = setup();
    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::OPositive);

    let err = bank
        .record_donation(RecordDonationInput {
            hospital_id,
            staff_id: test_staff_id(),
            donor_id,
            quantity: Milliliters(450),
            hemoglobin_g_dl: Some(11.0),
            notes: None,
            collected_on: collected_on(),
        })
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));
}

#[test]
fn donation_for_unknown_donor_is_rejected() {
    let (bank, _, _) = setup();
    let hospital_id = test_hospital_id();

    let err = bank
        .record_donation(RecordDonationInput {
            hospital_id,
            staff_id: test_staff_id(),
            donor_id: DonorId::new(bloodcore_core::AggregateId::new()),
            quantity: Milliliters(450),
            hemoglobin_g_dl: None,
            notes: None,
            collected_on: collected_on(),
        })
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound));
}

#[test]
fn fulfillment_debits_ledger_and_transitions_request() {
    let (bank, stats, _) = setup();
    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::ONegative);

    // Three donations: 1350 ml on the shelf.
    for _ in 0..3 {
        record_test_donation(&bank, hospital_id, donor_id, 450);
    }

    let request_id = submit_test_request(&bank, hospital_id, BloodType::ONegative, 900);
    let fulfilled = bank
        .fulfill_request(hospital_id, test_staff_id(), request_id)
        .unwrap();
    assert_eq!(fulfilled.status(), RequestStatus::Fulfilled);

    let stock = bank.stock_level(hospital_id, BloodType::ONegative).unwrap();
    assert_eq!(stock.available_ml(), 450);

    wait_for_processing();
    let rm = stats.get(hospital_id, BloodType::ONegative).unwrap();
    assert_eq!(rm.available, Milliliters(450));
}

#[test]
fn insufficient_stock_leaves_request_pending() {
    let (bank, _, _) = setup();
    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::AbNegative);
    record_test_donation(&bank, hospital_id, donor_id, 450);

    let request_id = submit_test_request(&bank, hospital_id, BloodType::AbNegative, 900);
    let err = bank
        .fulfill_request(hospital_id, test_staff_id(), request_id)
        .unwrap_err();

    match err {
        DispatchError::InsufficientStock {
            blood_type,
            requested_ml,
            available_ml,
        } => {
            assert_eq!(blood_type, BloodType::AbNegative);
            assert_eq!(requested_ml, 900);
            assert_eq!(available_ml, 450);
        }
        e => panic!("expected InsufficientStock, got: {e:?}"),
    }

    // No partial fulfillment: the request stays Pending, the ledger untouched.
    let request = bank.get_request(hospital_id, request_id).unwrap();
    assert_eq!(request.status(), RequestStatus::Pending);

    let stock = bank.stock_level(hospital_id, BloodType::AbNegative).unwrap();
    assert_eq!(stock.available_ml(), 450);
}

#[test]
fn fulfilling_a_fulfilled_request_is_invalid_state() {
    let (bank, _, _) = setup();
    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::BPositive);
    record_test_donation(&bank, hospital_id, donor_id, 450);

    let request_id = submit_test_request(&bank, hospital_id, BloodType::BPositive, 450);
    bank.fulfill_request(hospital_id, test_staff_id(), request_id)
        .unwrap();

    let err = bank
        .fulfill_request(hospital_id, test_staff_id(), request_id)
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidState(_)));
}

#[test]
fn cancelling_a_pending_request_has_no_ledger_effect() {
    let (bank, _, _) = setup();
    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::APositive);
    record_test_donation(&bank, hospital_id, donor_id, 450);

    let request_id = submit_test_request(&bank, hospital_id, BloodType::APositive, 450);
    let cancelled = bank
        .cancel_request(
            hospital_id,
            test_staff_id(),
            request_id,
            Some("duplicate entry".to_string()),
        )
        .unwrap();
    assert_eq!(cancelled.status(), RequestStatus::Cancelled);

    let stock = bank.stock_level(hospital_id, BloodType::APositive).unwrap();
    assert_eq!(stock.available_ml(), 450);
    assert_eq!(stock.reserved_ml(), 0);
}

#[test]
fn discard_removes_unit_and_debits_ledger() {
    let (bank, _, units) = setup();
    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::OPositive);
    let receipt = record_test_donation(&bank, hospital_id, donor_id, 450);

    bank.discard_donation(
        hospital_id,
        test_staff_id(),
        receipt.donation_id,
        "failed visual inspection",
    )
    .unwrap();

    let stock = bank.stock_level(hospital_id, BloodType::OPositive).unwrap();
    assert_eq!(stock.available_ml(), 0);

    wait_for_processing();
    assert!(units.get(hospital_id, receipt.donation_id).is_none());
}

#[test]
fn discard_after_issue_aborts_both_streams() {
    let (bank, _, _) = setup();
    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::ANegative);
    let receipt = record_test_donation(&bank, hospital_id, donor_id, 450);

    // Issue all the stock through a fulfillment.
    let request_id = submit_test_request(&bank, hospital_id, BloodType::ANegative, 450);
    bank.fulfill_request(hospital_id, test_staff_id(), request_id)
        .unwrap();

    // The discard's ledger debit would go negative, so nothing commits.
    let err = bank
        .discard_donation(
            hospital_id,
            test_staff_id(),
            receipt.donation_id,
            "clerical error",
        )
        .unwrap_err();
    assert!(matches!(err, DispatchError::InsufficientStock { .. }));

    // The donation record is untouched by the failed pair.
    let donation = bank
        .rehydrate(hospital_id, receipt.donation_id.0, |id| {
            bloodcore_collection::Donation::empty(bloodcore_collection::DonationId::new(id))
        })
        .unwrap();
    assert_eq!(donation.status(), DonationStatus::Available);
}

#[test]
fn hospital_isolation_preserved() {
    let (bank, stats, _) = setup();
    let hospital1 = test_hospital_id();
    let hospital2 = test_hospital_id();

    let donor1 = register_test_donor(&bank, hospital1, BloodType::APositive);
    record_test_donation(&bank, hospital1, donor1, 450);

    let stock1 = bank.stock_level(hospital1, BloodType::APositive).unwrap();
    let stock2 = bank.stock_level(hospital2, BloodType::APositive).unwrap();
    assert_eq!(stock1.available_ml(), 450);
    assert_eq!(stock2.available_ml(), 0);

    wait_for_processing();
    assert!(stats.get(hospital1, BloodType::APositive).is_some());
    assert!(stats.get(hospital2, BloodType::APositive).is_none());

    // A donor registered in one hospital is invisible in the other.
    assert!(matches!(
        bank.get_donor(hospital2, donor1).unwrap_err(),
        DispatchError::NotFound
    ));
}

#[test]
fn concurrent_reserves_cannot_overdraw() {
    let (bank, _, _) = setup();
    let hospital_id = test_hospital_id();
    let staff_id = test_staff_id();

    bank.credit_stock(hospital_id, staff_id, BloodType::ONegative, Milliliters(1350))
        .unwrap();

    // Two writers race for 900 ml each out of 1350.
    let mut handles = Vec::new();
    for _ in 0..2 {
        let bank = bank.clone();
        handles.push(std::thread::spawn(move || {
            bank.reserve_stock(
                hospital_id,
                StaffId::new(),
                BloodType::ONegative,
                Milliliters(900),
            )
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(DispatchError::InsufficientStock { .. }))));

    let stock = bank.stock_level(hospital_id, BloodType::ONegative).unwrap();
    assert_eq!(stock.available_ml(), 450);
    assert_eq!(stock.reserved_ml(), 900);
}

#[test]
fn unknown_blood_type_code_reads_as_not_found() {
    let (bank, _, _) = setup();
    let hospital_id = test_hospital_id();

    // "C+" is not in the catalog: a lookup miss, not a validation error.
    let err = bank.stock_level_by_code(hospital_id, "C+").unwrap_err();
    assert!(matches!(err, DispatchError::NotFound));

    // A catalog code always resolves, even with an empty ledger.
    let stock = bank.stock_level_by_code(hospital_id, "O-").unwrap();
    assert_eq!(stock.available_ml(), 0);
}

/// Store wrapper whose paired append can be made to fail on demand,
/// simulating a storage backend going away mid-commit.
#[derive(Debug, Default)]
struct FlakyEventStore {
    inner: InMemoryEventStore,
    fail_paired_appends: AtomicBool,
}

impl EventStore for FlakyEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.append(events, expected_version)
    }

    fn append_pair(
        &self,
        first: (Vec<UncommittedEvent>, ExpectedVersion),
        second: (Vec<UncommittedEvent>, ExpectedVersion),
    ) -> Result<(Vec<StoredEvent>, Vec<StoredEvent>), EventStoreError> {
        if self.fail_paired_appends.load(Ordering::SeqCst) {
            return Err(EventStoreError::InvalidAppend(
                "storage backend unavailable".to_string(),
            ));
        }
        self.inner.append_pair(first, second)
    }

    fn load_stream(
        &self,
        hospital_id: HospitalId,
        aggregate_id: bloodcore_core::AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.load_stream(hospital_id, aggregate_id)
    }
}

#[test]
fn store_failure_during_paired_commit_leaves_both_streams_unchanged() {
    let store = Arc::new(FlakyEventStore::default());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let bank: BloodBank<FlakyEventStore, Bus> =
        BloodBank::new(store.clone(), bus, BankPolicy::default());

    let hospital_id = test_hospital_id();
    let donor_id = register_test_donor(&bank, hospital_id, BloodType::BNegative);
    record_test_donation(&bank, hospital_id, donor_id, 450);
    let request_id = submit_test_request(&bank, hospital_id, BloodType::BNegative, 450);

    // The backend dies right at the fulfillment commit.
    store.fail_paired_appends.store(true, Ordering::SeqCst);
    let err = bank
        .fulfill_request(hospital_id, test_staff_id(), request_id)
        .unwrap_err();
    assert!(matches!(err, DispatchError::Store(_)));

    // Neither side of the pair landed: the request is still Pending and the
    // ledger still carries the full donation.
    let request = bank.get_request(hospital_id, request_id).unwrap();
    assert_eq!(request.status(), RequestStatus::Pending);

    let stock = bank.stock_level(hospital_id, BloodType::BNegative).unwrap();
    assert_eq!(stock.available_ml(), 450);
    assert_eq!(stock.reserved_ml(), 0);
}

#[test]
fn critical_threshold_uses_read_model() {
    let (bank, stats, _) = setup();
    let hospital_id = test_hospital_id();
    let staff_id = test_staff_id();

    // 2 units of O- on the shelf: at the default critical threshold of 3.
    bank.credit_stock(hospital_id, staff_id, BloodType::ONegative, Milliliters(900))
        .unwrap();
    wait_for_processing();

    let rm = stats.get(hospital_id, BloodType::ONegative).unwrap();
    let policy = bank.policy();
    assert!(rm.is_critical(policy.critical_threshold_ml()));
    assert!(rm.is_low(policy.low_threshold_ml()));

    // Stock well past the low threshold is neither.
    bank.credit_stock(hospital_id, staff_id, BloodType::ONegative, Milliliters(4500))
        .unwrap();
    wait_for_processing();

    let rm = stats.get(hospital_id, BloodType::ONegative).unwrap();
    assert!(!rm.is_critical(policy.critical_threshold_ml()));
    assert!(!rm.is_low(policy.low_threshold_ml()));
}
