//! `PostgreSQL` adapters for task lifecycle persistence.
//!
//! Typed Diesel queries cover single-row reads and writes. Query plans are
//! rendered to parameterised SQL by [`sql`] and bound at execution time.

mod conversion;
mod models;
mod repository;
mod schema;
pub mod sql;

pub use repository::{PostgresTaskStore, TaskPgPool};
