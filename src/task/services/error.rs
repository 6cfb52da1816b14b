//! Service-level error taxonomy.

use crate::task::{
    domain::{AccessId, CallbackState, ExternalId, TaskDomainError, TaskId, TaskState},
    ports::{LookupError, TaskStoreError},
    query::InvalidQueryError,
};
use std::fmt;
use thiserror::Error;

/// Result type for task service operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// What could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundTarget {
    /// Task by identifier.
    Task(TaskId),
    /// Task by external identifier.
    ExternalTask(ExternalId),
    /// Workbasket by identifier or key and domain.
    Workbasket(String),
    /// Classification by identifier or key and domain.
    Classification(String),
}

impl fmt::Display for NotFoundTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => write!(f, "task {id}"),
            Self::ExternalTask(id) => write!(f, "task with external id {id}"),
            Self::Workbasket(reference) => write!(f, "workbasket {reference}"),
            Self::Classification(reference) => write!(f, "classification {reference}"),
        }
    }
}

/// Errors returned by task services, for single calls and per bulk item.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The addressed entity does not exist.
    #[error("{0} not found")]
    NotFound(NotFoundTarget),

    /// The task state does not permit the operation.
    #[error("task {task_id} is in state {state}, expected one of {allowed:?}")]
    InvalidState {
        /// Task identifier.
        task_id: TaskId,
        /// Current state.
        state: TaskState,
        /// States the operation accepts.
        allowed: Vec<TaskState>,
    },

    /// The callback state does not permit the operation.
    #[error("task {task_id} has callback state {callback_state}, expected one of {allowed:?}")]
    InvalidCallbackState {
        /// Task identifier.
        task_id: TaskId,
        /// Current callback state.
        callback_state: CallbackState,
        /// Callback states the operation accepts.
        allowed: Vec<CallbackState>,
    },

    /// The caller does not own the task.
    #[error("task {task_id} is owned by {owner:?}, not by {caller}")]
    InvalidOwner {
        /// Task identifier.
        task_id: TaskId,
        /// Current owner.
        owner: Option<AccessId>,
        /// Caller.
        caller: AccessId,
    },

    /// The caller lacks a permission or role.
    #[error("{access_id} is not authorised for {required} on {resource}")]
    NotAuthorized {
        /// Caller user id.
        access_id: AccessId,
        /// Resource the check was made on.
        resource: String,
        /// Missing permission or role.
        required: String,
    },

    /// The task changed since the caller read it; reload and retry.
    #[error("task {0} was modified concurrently")]
    Concurrency(TaskId),

    /// Malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A task with the external identifier already exists.
    #[error("task with external id {0} already exists")]
    AlreadyExists(ExternalId),

    /// An attachment with the identifier already exists.
    #[error("attachment {0} already exists")]
    AttachmentAlreadyExists(String),

    /// A secondary reference with the identifier already exists.
    #[error("object reference {0} already exists")]
    ObjectReferenceAlreadyExists(String),

    /// The requested page starts after the last row.
    #[error("page offset {offset} is out of range, only {available} rows match")]
    PageOutOfRange {
        /// Requested offset.
        offset: usize,
        /// Number of matching rows.
        available: usize,
    },

    /// Unclassified store failure.
    #[error(transparent)]
    Persistence(TaskStoreError),

    /// A lookup service failed.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// An internal invariant does not hold.
    #[error("system error: {0}")]
    System(String),
}

impl TaskError {
    pub(crate) fn not_authorized(
        access_id: &AccessId,
        resource: impl fmt::Display,
        required: impl fmt::Display,
    ) -> Self {
        Self::NotAuthorized {
            access_id: access_id.clone(),
            resource: resource.to_string(),
            required: required.to_string(),
        }
    }
}

impl From<TaskDomainError> for TaskError {
    fn from(err: TaskDomainError) -> Self {
        match err {
            TaskDomainError::InvalidState {
                task_id,
                state,
                allowed,
            } => Self::InvalidState {
                task_id,
                state,
                allowed,
            },
            TaskDomainError::InvalidCallbackState {
                task_id,
                callback_state,
                allowed,
            } => Self::InvalidCallbackState {
                task_id,
                callback_state,
                allowed,
            },
            TaskDomainError::InvalidOwner {
                task_id,
                owner,
                caller,
            } => Self::InvalidOwner {
                task_id,
                owner,
                caller,
            },
            TaskDomainError::WorkingDayOutOfRange { .. } => Self::System(err.to_string()),
            TaskDomainError::BlankIdentifier(_)
            | TaskDomainError::UnknownCustomField(_)
            | TaskDomainError::InvalidObjectReference { .. }
            | TaskDomainError::InvalidServiceLevel(_) => Self::InvalidArgument(err.to_string()),
        }
    }
}

impl From<TaskStoreError> for TaskError {
    fn from(err: TaskStoreError) -> Self {
        match err {
            TaskStoreError::DuplicateExternalId(external_id) => Self::AlreadyExists(external_id),
            TaskStoreError::DuplicateAttachment(id) => Self::AttachmentAlreadyExists(id.to_string()),
            TaskStoreError::DuplicateObjectReference(id) => {
                Self::ObjectReferenceAlreadyExists(id.to_string())
            }
            TaskStoreError::NotFound(id) => Self::NotFound(NotFoundTarget::Task(id)),
            other @ (TaskStoreError::DuplicateTask(_)
            | TaskStoreError::InvalidPersistedData(_)
            | TaskStoreError::Persistence(_)) => Self::Persistence(other),
        }
    }
}

impl From<InvalidQueryError> for TaskError {
    fn from(err: InvalidQueryError) -> Self {
        Self::InvalidArgument(err.0)
    }
}
