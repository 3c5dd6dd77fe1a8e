//! Expiry scanning over stored blood units.
//!
//! Purely advisory: these functions never touch the ledger counters. Expiry
//! is evaluated lazily against the wall clock at read time; no background
//! sweep mutates unit records.

use chrono::{Duration, NaiveDate};

use bloodcore_collection::{BloodUnit, UnitStatus};

/// Units expiring within the horizon, soonest first.
///
/// Includes units whose expiry date is today (still usable) up to and
/// including `today + horizon_days`. Only Available units are reported;
/// used, reserved and already-lapsed units are not actionable alerts.
pub fn find_expiring_within(
    units: &[BloodUnit],
    today: NaiveDate,
    horizon_days: i64,
) -> Vec<BloodUnit> {
    let horizon = today + Duration::days(horizon_days);
    let mut expiring: Vec<BloodUnit> = units
        .iter()
        .filter(|u| {
            u.status == UnitStatus::Available && u.expiry_date >= today && u.expiry_date <= horizon
        })
        .cloned()
        .collect();
    expiring.sort_by_key(|u| u.expiry_date);
    expiring
}

/// The status a unit effectively has once the clock is taken into account.
///
/// An Available unit past its expiry date reads as Expired; every other
/// state is reported as stored (reserved and used units have left the
/// shelf, so the clock no longer applies).
pub fn effective_status(unit: &BloodUnit, today: NaiveDate) -> UnitStatus {
    if unit.status == UnitStatus::Available && unit.is_expired(today) {
        UnitStatus::Expired
    } else {
        unit.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodcore_collection::DonationId;
    use bloodcore_core::{AggregateId, BloodType};
    use bloodcore_donors::DonorId;

    fn unit(expiry: NaiveDate, status: UnitStatus) -> BloodUnit {
        BloodUnit {
            unit_id: DonationId::new(AggregateId::new()),
            donor_id: DonorId::new(AggregateId::new()),
            donor_name: "Sam Park".to_string(),
            blood_type: BloodType::BPositive,
            quantity_ml: 450,
            collection_date: expiry - Duration::days(42),
            expiry_date: expiry,
            status,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn results_are_sorted_by_expiry_ascending() {
        let units = vec![
            unit(day(20), UnitStatus::Available),
            unit(day(12), UnitStatus::Available),
            unit(day(16), UnitStatus::Available),
        ];

        let expiring = find_expiring_within(&units, day(10), 14);
        let dates: Vec<_> = expiring.iter().map(|u| u.expiry_date).collect();
        assert_eq!(dates, vec![day(12), day(16), day(20)]);
    }

    #[test]
    fn horizon_bounds_are_inclusive() {
        let units = vec![
            unit(day(10), UnitStatus::Available),
            unit(day(17), UnitStatus::Available),
            unit(day(18), UnitStatus::Available),
        ];

        let expiring = find_expiring_within(&units, day(10), 7);
        let dates: Vec<_> = expiring.iter().map(|u| u.expiry_date).collect();
        assert_eq!(dates, vec![day(10), day(17)]);
    }

    #[test]
    fn lapsed_and_non_available_units_are_excluded() {
        let units = vec![
            unit(day(9), UnitStatus::Available),
            unit(day(12), UnitStatus::Reserved),
            unit(day(12), UnitStatus::Used),
            unit(day(12), UnitStatus::Expired),
        ];

        assert!(find_expiring_within(&units, day(10), 7).is_empty());
    }

    #[test]
    fn effective_status_lapses_available_units_only() {
        let lapsed = unit(day(9), UnitStatus::Available);
        assert_eq!(effective_status(&lapsed, day(10)), UnitStatus::Expired);

        let fresh = unit(day(10), UnitStatus::Available);
        assert_eq!(effective_status(&fresh, day(10)), UnitStatus::Available);

        let reserved = unit(day(9), UnitStatus::Reserved);
        assert_eq!(effective_status(&reserved, day(10)), UnitStatus::Reserved);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(find_expiring_within(&[], day(10), 7).is_empty());
    }
}
