//! Adapters implementing the task ports.
//!
//! # Available Adapters
//!
//! - [`memory::InMemoryTaskStore`]: thread-safe in-memory storage used by
//!   tests and embedded deployments, together with an in-memory workbasket
//!   and classification directory
//! - [`postgres::PostgresTaskStore`]: `PostgreSQL` persistence using Diesel

pub mod memory;
pub mod postgres;
