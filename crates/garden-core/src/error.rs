//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A timer duration was negative, fractional or not a number at all.
    #[error("Invalid duration: {value} (expected a non-negative integer of milliseconds)")]
    InvalidDuration { value: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
