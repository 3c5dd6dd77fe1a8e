use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use std::sync::Arc;

use bloodcore_bank::command_dispatcher::CommandDispatcher;
use bloodcore_bank::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use bloodcore_bank::projections::inventory_stats::InventoryStatsProjection;
use bloodcore_bank::read_model::InMemoryHospitalStore;
use bloodcore_core::{BloodType, ExpectedVersion, HospitalId};
use bloodcore_events::{EventEnvelope, InMemoryEventBus};
use bloodcore_inventory::{
    CreditStock, ReserveStock, StockCommand, StockCredited, StockEvent, StockLevel, StockLevelId,
};

fn setup_dispatcher() -> (
    CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>,
    HospitalId,
) {
    let store = InMemoryEventStore::new();
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);
    let hospital_id = HospitalId::new();
    (dispatcher, hospital_id)
}

fn credit_command(hospital_id: HospitalId, blood_type: BloodType, quantity_ml: i64) -> StockCommand {
    let stock_id = StockLevelId::for_blood_type(blood_type);
    StockCommand::CreditStock(CreditStock {
        hospital_id,
        stock_id,
        blood_type,
        quantity_ml,
        occurred_at: Utc::now(),
    })
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    // Benchmark: first credit on a fresh hospital (no history)
    group.bench_function("credit_fresh_stream", |b| {
        let (dispatcher, _) = setup_dispatcher();
        let stock_id = StockLevelId::for_blood_type(BloodType::OPositive);
        b.iter(|| {
            let hospital_id = HospitalId::new();
            dispatcher
                .dispatch(
                    hospital_id,
                    stock_id.0,
                    "inventory.stock",
                    black_box(credit_command(hospital_id, BloodType::OPositive, 450)),
                    |_, _| StockLevel::empty(stock_id),
                )
                .unwrap();
        });
    });

    // Benchmark: reserve against a stream with history
    group.bench_function("reserve_with_history", |b| {
        let (dispatcher, hospital_id) = setup_dispatcher();
        let stock_id = StockLevelId::for_blood_type(BloodType::OPositive);

        dispatcher
            .dispatch(
                hospital_id,
                stock_id.0,
                "inventory.stock",
                credit_command(hospital_id, BloodType::OPositive, 1_000_000_000),
                |_, _| StockLevel::empty(stock_id),
            )
            .unwrap();

        b.iter(|| {
            dispatcher
                .dispatch(
                    hospital_id,
                    stock_id.0,
                    "inventory.stock",
                    StockCommand::ReserveStock(ReserveStock {
                        hospital_id,
                        stock_id,
                        blood_type: BloodType::OPositive,
                        quantity_ml: black_box(450),
                        occurred_at: Utc::now(),
                    }),
                    |_, _| StockLevel::empty(stock_id),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let hospital_id = HospitalId::new();
                let stock_id = StockLevelId::for_blood_type(BloodType::APositive);

                b.iter(|| {
                    let events: Vec<UncommittedEvent> = (0..size)
                        .map(|i| {
                            let event = StockEvent::StockCredited(StockCredited {
                                hospital_id,
                                stock_id,
                                blood_type: BloodType::APositive,
                                quantity_ml: (i + 1) as i64,
                                occurred_at: Utc::now(),
                            });
                            UncommittedEvent::from_typed(
                                hospital_id,
                                stock_id.0,
                                "inventory.stock",
                                uuid::Uuid::now_v7(),
                                &event,
                            )
                            .unwrap()
                        })
                        .collect();

                    black_box(store.append(events, ExpectedVersion::Any).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_projection_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild_speed");

    for event_count in [10, 100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("rebuild_from_events", event_count),
            event_count,
            |b, &count| {
                let store = InMemoryEventStore::new();
                let hospital_id = HospitalId::new();
                let stock_id = StockLevelId::for_blood_type(BloodType::BPositive);

                let mut all_envelopes = Vec::new();
                for i in 0..count {
                    let event = StockEvent::StockCredited(StockCredited {
                        hospital_id,
                        stock_id,
                        blood_type: BloodType::BPositive,
                        quantity_ml: ((i % 10) + 1) as i64,
                        occurred_at: Utc::now(),
                    });
                    let uncommitted = UncommittedEvent::from_typed(
                        hospital_id,
                        stock_id.0,
                        "inventory.stock",
                        uuid::Uuid::now_v7(),
                        &event,
                    )
                    .unwrap();
                    let stored = store
                        .append(vec![uncommitted], ExpectedVersion::Exact(i as u64))
                        .unwrap();
                    all_envelopes.push(stored[0].to_envelope());
                }

                let projection = InventoryStatsProjection::new(Arc::new(
                    InMemoryHospitalStore::new(),
                ));

                b.iter(|| {
                    projection
                        .rebuild_from_scratch(black_box(all_envelopes.clone()))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_projection_rebuild_speed
);
criterion_main!(benches);
