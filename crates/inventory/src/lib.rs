//! Inventory ledger domain module (event-sourced).
//!
//! Authoritative available/reserved milliliter counts per blood type,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage). One stock stream exists per blood type; a hospital's ledger is
//! the set of its eight streams.

pub mod stock;

pub use stock::{
    AdjustStock, CreditStock, IssueStock, ReleaseStock, ReserveStock, StockAdjusted, StockCommand,
    StockCredited, StockEvent, StockIssued, StockLevel, StockLevelId, StockReleased, StockReserved,
};
