//! Domain model for the task lifecycle engine.
//!
//! Tasks are routed through workbaskets, claimed by users, and completed.
//! The domain layer owns the task aggregate and its state machine, working
//! day arithmetic, and the value types shared with ports and services. It
//! has no knowledge of storage or of the services that resolve workbaskets
//! and classifications.

mod attachment;
mod bulk;
mod calendar;
mod custom;
mod error;
mod ids;
mod object_reference;
mod references;
mod state;
mod summary;
mod task;

pub use attachment::{Attachment, PersistedAttachmentData};
pub use bulk::{BulkKey, BulkResult};
pub use calendar::{CustomHoliday, WorkingDayCalendar};
pub use custom::{CustomField, CustomIntField};
pub use error::{ParseCallbackStateError, ParseTaskStateError, TaskDomainError};
pub use ids::{AccessId, AttachmentId, ClassificationId, ExternalId, ObjectReferenceId, TaskId, WorkbasketId};
pub use object_reference::{ObjectReference, SecondaryObjectReference};
pub use references::{ClassificationSummary, ServiceLevel, WorkbasketSummary};
pub use state::{CallbackState, TaskState};
pub use summary::{FieldChange, MinimalTask, TaskSummary};
pub use task::{
    CompletionOutcome, NewTaskData, PersistedTaskData, Task, TaskVersion,
    check_callback_transition,
};
