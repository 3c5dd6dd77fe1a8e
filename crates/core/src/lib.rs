//! `bloodcore-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod blood_type;
pub mod entity;
pub mod error;
pub mod id;
pub mod policy;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use blood_type::BloodType;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, HospitalId, StaffId};
pub use policy::BankPolicy;
pub use value_object::{Gender, Milliliters, ValueObject};
