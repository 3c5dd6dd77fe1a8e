//! Bank-wide accounting policy.
//!
//! Every number that showed up as a magic literal somewhere in a blood bank
//! (shelf life, donation bounds, alert thresholds) lives here as a named,
//! constructible value. The defaults match current clinical practice for
//! red cells; banks running older 35-day bags construct a different policy.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::value_object::Milliliters;

/// Shelf life of a red-cell unit, in days.
pub const DEFAULT_SHELF_LIFE_DAYS: i64 = 42;

/// Volume of one display "unit" of blood (a standard whole-blood donation).
pub const DEFAULT_ML_PER_UNIT: i64 = 450;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankPolicy {
    /// Days after collection at which a unit must be discarded.
    pub shelf_life_days: i64,
    /// Upper bound for a single recorded donation, in ml.
    pub max_donation_ml: i64,
    /// Upper bound for a single manual ledger credit, in ml. Larger values
    /// are assumed to be data-entry mistakes and rejected.
    pub max_credit_ml: i64,
    /// Display conversion between ml and dashboard units.
    pub ml_per_unit: i64,
    /// At or below this many units, a blood type is critically short.
    pub critical_threshold_units: i64,
    /// At or below this many units, a blood type is running low.
    pub low_threshold_units: i64,
    /// Acceptable donor hemoglobin range, in g/dL.
    pub min_hemoglobin_g_dl: f32,
    pub max_hemoglobin_g_dl: f32,
}

impl Default for BankPolicy {
    fn default() -> Self {
        Self {
            shelf_life_days: DEFAULT_SHELF_LIFE_DAYS,
            max_donation_ml: 500,
            max_credit_ml: 5_000,
            ml_per_unit: DEFAULT_ML_PER_UNIT,
            critical_threshold_units: 3,
            low_threshold_units: 10,
            min_hemoglobin_g_dl: 12.5,
            max_hemoglobin_g_dl: 20.0,
        }
    }
}

impl BankPolicy {
    /// Expiry date for a unit collected on `collected_on`.
    pub fn expiry_date(&self, collected_on: NaiveDate) -> NaiveDate {
        collected_on + Duration::days(self.shelf_life_days)
    }

    /// Critical-shortage threshold expressed in the canonical unit.
    pub fn critical_threshold_ml(&self) -> Milliliters {
        Milliliters(self.critical_threshold_units * self.ml_per_unit)
    }

    /// Low-stock threshold expressed in the canonical unit.
    pub fn low_threshold_ml(&self) -> Milliliters {
        Milliliters(self.low_threshold_units * self.ml_per_unit)
    }
}
