//! Application services for task lifecycle orchestration.
//!
//! Every service is built from a [`TaskPorts`] value and is cheap to clone.
//! Single-item operations return the specific [`TaskError`]; bulk
//! operations report per-item failures in a
//! [`BulkResult`](crate::task::domain::BulkResult) and only fail as a whole
//! when a precondition of the call itself is violated.

mod bulk;
mod context;
mod error;
mod lifecycle;
mod query;
mod service_level;
mod synchronizer;
mod transfer;

pub use context::{TaskPorts, WorkbasketRef};
pub use error::{NotFoundTarget, TaskError, TaskResult};
pub use lifecycle::{CreateTaskRequest, TaskLifecycleService};
pub use query::TaskQueryService;
pub use service_level::{ServiceLevelResolution, ServiceLevelResolver};
pub use synchronizer::{
    AttachmentSynchronizer, ChildDiff, ObjectReferenceSynchronizer, diff_children,
    plan_attachments, plan_object_references, resolve_attachment_classifications,
};
pub use transfer::TaskTransferService;
