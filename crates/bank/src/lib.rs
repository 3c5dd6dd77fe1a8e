//! Application and infrastructure layer for the blood bank.
//!
//! Composes the event store, command dispatcher, projections and the
//! `BloodBank` service facade that the dashboard layer calls.

pub mod bank;
pub mod command_dispatcher;
pub mod event_store;
pub mod expiry;
pub mod projections;
pub mod read_model;

pub use bank::{
    BloodBank, DonationReceipt, RecordDonationInput, RegisterDonorInput, SubmitRequestInput,
};
pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use read_model::{HospitalStore, InMemoryHospitalStore};

#[cfg(test)]
mod integration_tests;
