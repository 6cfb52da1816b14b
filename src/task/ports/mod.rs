//! Port contracts for the task lifecycle engine.
//!
//! Ports define infrastructure-agnostic interfaces used by task services:
//! persistence, caller identity, workbasket and classification lookups,
//! history and routing.

pub mod access;
pub mod history;
pub mod lookup;
pub mod query;
pub mod repository;
pub mod routing;

pub use access::{Caller, CallerContext, Role, WorkbasketPermission};
pub use history::{DisabledHistorySink, TaskEventKind, TaskHistoryEvent, TaskHistorySink};
pub use lookup::{ClassificationLookup, LookupError, LookupResult, Workbasket, WorkbasketLookup};
pub use query::TaskQueryStore;
pub use routing::{NoRouting, TaskRouter};
pub use repository::{
    AttachmentRepository, ObjectReferenceRepository, TaskPatch, TaskRepository, TaskStore,
    TaskStoreError, TaskStoreResult,
};
#[cfg(test)]
pub use repository::{MockAttachmentRepository, MockObjectReferenceRepository};
