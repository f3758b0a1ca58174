//! Garden Core - Shared types for the installation relay
//!
//! This crate provides the domain types shared between the wire
//! protocol (garden-protocol) and the relay daemon (gardend).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod countdown;
pub mod error;
pub mod group;

// Re-exports for convenience
pub use countdown::{parse_duration_ms, Countdown, CountdownPhase, CountdownState, TickOutcome};
pub use error::{DomainError, DomainResult};
pub use group::{ConnectedCounts, Group};
