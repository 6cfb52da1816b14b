//! Engine integration tests over the in-memory adapters.
//!
//! Tests are organized into modules by functionality:
//! - `lifecycle_tests`: create, claim, complete, update and delete
//! - `attachment_tests`: child records and classification resolution
//! - `bulk_tests`: bulk operations and their per-item failures
//! - `query_tests`: filtering, ordering, paging and access scoping
//! - `transfer_tests`: transfers and rerouting
//! - `service_level_tests`: planned and due date derivation
//! - `concurrency_tests`: writes racing a competing writer

#![expect(
    clippy::expect_used,
    reason = "Test code uses expect for assertion clarity"
)]

mod in_memory {
    pub mod helpers;
    pub mod racing_store;

    mod attachment_tests;
    mod bulk_tests;
    mod concurrency_tests;
    mod lifecycle_tests;
    mod query_tests;
    mod service_level_tests;
    mod transfer_tests;
}
