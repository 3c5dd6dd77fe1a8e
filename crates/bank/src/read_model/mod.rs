//! Hospital-isolated read model storage abstractions.

pub mod hospital_store;

pub use hospital_store::{HospitalStore, InMemoryHospitalStore};
