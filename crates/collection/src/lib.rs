//! Blood collection domain module (event-sourced).
//!
//! This crate contains business rules for donation intake: the immutable
//! donation audit record (one per collected donation, with its expiry date
//! stamped at collection time) and the blood-unit record type the dashboard
//! and expiry scanner consume.

pub mod donation;
pub mod unit;

pub use donation::{
    Donation, DonationCommand, DonationDiscarded, DonationEvent, DonationId, DonationRecorded,
    DonationStatus, DiscardDonation, RecordDonation,
};
pub use unit::{BloodUnit, UnitStatus};
