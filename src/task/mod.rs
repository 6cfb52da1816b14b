//! Task lifecycle management for Tasklane.
//!
//! Tasks live in workbaskets, move through a validated state machine, carry
//! attachments and secondary object references, and are guarded by
//! optimistic concurrency on every write. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Query plans in [`query`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]
//! - Engine settings in [`config`]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod query;
pub mod services;

#[cfg(test)]
#[expect(clippy::expect_used, reason = "Test code uses expect for assertion clarity")]
mod tests;
