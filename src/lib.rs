//! Tasklane: a task lifecycle engine for human workflow.
//!
//! The crate manages work items routed into workbaskets: creation with
//! service-level planning, claiming and completion, transfer between
//! workbaskets, bulk updates with per-item error reporting, and a filter,
//! sort and paging query engine.
//!
//! # Architecture
//!
//! Tasklane follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage, lookups and identity
//! - **Adapters**: In-memory and `PostgreSQL` implementations of the ports
//!
//! # Modules
//!
//! - [`task`]: Task lifecycle, queries and persistence

pub mod task;
