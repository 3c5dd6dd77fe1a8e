//! Value objects: equality by value, not identity.
//!
//! Value objects are domain objects defined entirely by their attribute
//! values. Two value objects with the same values are considered equal.

use serde::{Deserialize, Serialize};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify"
/// one, create a new one with the new values. `Milliliters { 450 }` is a
/// value object; `Donor { id, .. }` is an entity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A whole-milliliter blood volume.
///
/// Milliliters are the canonical unit of account across the ledger,
/// donations and requests. The dashboard "unit" is a display conversion
/// only (see [`Milliliters::display_units`]).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Milliliters(pub i64);

impl Milliliters {
    pub fn new(ml: i64) -> Self {
        Self(ml)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Convert to display units, rounding down. A partial unit on the
    /// shelf is not a full unit a clinician can request.
    pub fn display_units(self, ml_per_unit: i64) -> i64 {
        if ml_per_unit <= 0 {
            return 0;
        }
        self.0 / ml_per_unit
    }
}

impl ValueObject for Milliliters {}

impl core::fmt::Display for Milliliters {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ml", self.0)
    }
}

/// Gender as recorded on donor and patient records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl ValueObject for Gender {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_units_round_down() {
        assert_eq!(Milliliters(900).display_units(450), 2);
        assert_eq!(Milliliters(899).display_units(450), 1);
        assert_eq!(Milliliters(449).display_units(450), 0);
        assert_eq!(Milliliters(0).display_units(450), 0);
    }

    #[test]
    fn display_units_guard_against_bad_divisor() {
        assert_eq!(Milliliters(450).display_units(0), 0);
    }
}
