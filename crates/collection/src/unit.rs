use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bloodcore_core::BloodType;
use bloodcore_donors::DonorId;

use crate::donation::DonationId;

/// Lifecycle status of a stored blood unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Available,
    Reserved,
    Used,
    Expired,
}

impl UnitStatus {
    /// Legal transitions: Available -> Reserved | Expired, Reserved -> Used.
    /// Used and Expired are terminal.
    pub fn can_transition_to(self, next: UnitStatus) -> bool {
        matches!(
            (self, next),
            (UnitStatus::Available, UnitStatus::Reserved)
                | (UnitStatus::Available, UnitStatus::Expired)
                | (UnitStatus::Reserved, UnitStatus::Used)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UnitStatus::Used | UnitStatus::Expired)
    }
}

/// A stored blood unit as seen by the dashboard and the expiry scanner.
///
/// One unit per donation; `unit_id` is the donation id. This is a read-model
/// record, not an aggregate: the unit list is rebuilt from donation events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodUnit {
    pub unit_id: DonationId,
    pub donor_id: DonorId,
    pub donor_name: String,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub collection_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub status: UnitStatus,
}

impl BloodUnit {
    /// A unit is expired strictly after its expiry date: on the expiry date
    /// itself it is still usable.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodcore_core::AggregateId;

    fn test_unit(expiry: NaiveDate) -> BloodUnit {
        BloodUnit {
            unit_id: DonationId::new(AggregateId::new()),
            donor_id: DonorId::new(AggregateId::new()),
            donor_name: "Jane Roe".to_string(),
            blood_type: BloodType::ONegative,
            quantity_ml: 450,
            collection_date: expiry - chrono::Duration::days(42),
            expiry_date: expiry,
            status: UnitStatus::Available,
        }
    }

    #[test]
    fn available_can_be_reserved_or_expired() {
        assert!(UnitStatus::Available.can_transition_to(UnitStatus::Reserved));
        assert!(UnitStatus::Available.can_transition_to(UnitStatus::Expired));
        assert!(!UnitStatus::Available.can_transition_to(UnitStatus::Used));
    }

    #[test]
    fn reserved_can_only_be_used() {
        assert!(UnitStatus::Reserved.can_transition_to(UnitStatus::Used));
        assert!(!UnitStatus::Reserved.can_transition_to(UnitStatus::Available));
        assert!(!UnitStatus::Reserved.can_transition_to(UnitStatus::Expired));
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        for terminal in [UnitStatus::Used, UnitStatus::Expired] {
            assert!(terminal.is_terminal());
            for next in [
                UnitStatus::Available,
                UnitStatus::Reserved,
                UnitStatus::Used,
                UnitStatus::Expired,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn unit_is_usable_on_its_expiry_date() {
        let expiry = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let unit = test_unit(expiry);

        assert!(!unit.is_expired(expiry));
        assert!(unit.is_expired(expiry + chrono::Duration::days(1)));
    }
}
