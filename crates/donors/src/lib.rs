//! Donor registry domain module (event-sourced).
//!
//! This crate contains business rules for donors, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Per-donor
//! donation statistics are not kept here; they are derived from donation
//! events by a read-model projection.

pub mod donor;

pub use donor::{
    ContactInfo, Donor, DonorCommand, DonorContactUpdated, DonorEvent, DonorId, DonorRegistered,
    RegisterDonor, UpdateContact,
};
