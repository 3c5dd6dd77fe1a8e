//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: Can be reconstructed from the event stream
//! - **Hospital-isolated**: Data is partitioned by hospital
//! - **Idempotent**: Safe for at-least-once delivery

pub mod blood_units;
pub mod donor_stats;
pub mod inventory_stats;

pub use blood_units::{BloodUnitsProjection, BloodUnitsProjectionError};
pub use donor_stats::{DonorStats, DonorStatsProjection, DonorStatsProjectionError};
pub use inventory_stats::{InventoryProjectionError, InventoryStats, InventoryStatsProjection};
