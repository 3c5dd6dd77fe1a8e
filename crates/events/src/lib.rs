//! Domain events and the pub/sub plumbing that distributes them.
//!
//! Events are immutable facts, versioned for schema evolution, and
//! append-only. This crate stays transport-agnostic: the in-memory bus is
//! for tests/dev, and the traits leave room for real brokers later.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod hospital;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::{EnvelopeMetadata, EventEnvelope};
pub use event::Event;
pub use hospital::HospitalScoped;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
