//! The blood bank service facade.
//!
//! `BloodBank` wires the domain aggregates to the event store, bus and
//! projections, and exposes the operations the dashboard calls: ledger
//! queries and corrections, donor registration, donation intake and request
//! fulfillment.
//!
//! Writes are serialized through a single global gate. Contention is low
//! (one bank, eight stock streams), and holding the gate across a paired
//! commit is what makes the donation-intake and fulfillment transactions
//! all-or-nothing with respect to concurrent writers. Per-stream optimistic
//! concurrency remains underneath as a second line of defense. Reads do not
//! take the gate; they rehydrate from the store's committed streams.

mod directory;
mod fulfillment;
mod ledger;
mod recorder;

pub use directory::RegisterDonorInput;
pub use fulfillment::SubmitRequestInput;
pub use recorder::{DonationReceipt, RecordDonationInput};

use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use bloodcore_core::{Aggregate, AggregateId, BankPolicy, HospitalId};
use bloodcore_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

/// Application service for one blood bank deployment.
///
/// Hospital scoping is per call, so a single `BloodBank` instance can serve
/// several hospitals backed by the same store.
pub struct BloodBank<S, B> {
    store: Arc<S>,
    dispatcher: CommandDispatcher<Arc<S>, B>,
    policy: BankPolicy,
    write_gate: Mutex<()>,
}

impl<S, B> BloodBank<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: Arc<S>, bus: B, policy: BankPolicy) -> Self {
        let dispatcher = CommandDispatcher::new(Arc::clone(&store), bus);
        Self {
            store,
            dispatcher,
            policy,
            write_gate: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &BankPolicy {
        &self.policy
    }

    pub(crate) fn dispatcher(&self) -> &CommandDispatcher<Arc<S>, B> {
        &self.dispatcher
    }

    /// Acquire the global write gate.
    pub(crate) fn write_gate(&self) -> Result<MutexGuard<'_, ()>, DispatchError> {
        self.write_gate
            .lock()
            .map_err(|_| DispatchError::Concurrency("write gate poisoned".to_string()))
    }

    /// Rebuild an aggregate's current state from its committed stream.
    pub(crate) fn rehydrate<A>(
        &self,
        hospital_id: HospitalId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let mut history = self.store.load_stream(hospital_id, aggregate_id)?;
        history.sort_by_key(|e| e.sequence_number);

        let mut aggregate = make_aggregate(aggregate_id);
        for stored in history {
            let ev: A::Event = serde_json::from_value(stored.payload)
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            aggregate.apply(&ev);
        }

        Ok(aggregate)
    }
}
