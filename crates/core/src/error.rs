//! Domain error model.

use thiserror::Error;

use crate::blood_type::BloodType;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// stock accounting, lifecycle). Infrastructure concerns belong elsewhere.
/// Accounting operations are never retried blindly by the core; retry, if
/// any, is the caller's decision after inspecting the error kind.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed or out-of-range input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is not valid for the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A debit would take available stock below zero.
    ///
    /// Carries requested vs. available so the failure can be explained to
    /// the end user, not just logged.
    #[error(
        "insufficient {blood_type} stock: requested {requested_ml} ml, available {available_ml} ml"
    )]
    InsufficientStock {
        blood_type: BloodType,
        requested_ml: i64,
        available_ml: i64,
    },

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn insufficient_stock(blood_type: BloodType, requested_ml: i64, available_ml: i64) -> Self {
        Self::InsufficientStock {
            blood_type,
            requested_ml,
            available_ml,
        }
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
