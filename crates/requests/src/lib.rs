//! Blood request domain module (event-sourced).
//!
//! This crate contains business rules for patient blood requests: a small
//! lifecycle aggregate (pending -> fulfilled | cancelled) whose fulfillment
//! is always paired with a matching stock issue in the inventory ledger.

pub mod request;

pub use request::{
    BloodRequest, CancelRequest, FulfillRequest, RequestCancelled, RequestCommand, RequestEvent,
    RequestFulfilled, RequestId, RequestStatus, RequestSubmitted, SubmitRequest, Urgency,
};
