//! Error types for task domain validation and parsing.

use super::{AccessId, CallbackState, TaskId, TaskState};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// An identifier was empty after trimming.
    #[error("{0} must not be blank")]
    BlankIdentifier(&'static str),

    /// The task is not in one of the states the operation accepts.
    #[error("task {task_id} is in state {state}, expected one of {allowed:?}")]
    InvalidState {
        /// Task identifier.
        task_id: TaskId,
        /// Current task state.
        state: TaskState,
        /// States the operation accepts.
        allowed: Vec<TaskState>,
    },

    /// The task callback state does not permit the operation.
    #[error("task {task_id} has callback state {callback_state}, expected one of {allowed:?}")]
    InvalidCallbackState {
        /// Task identifier.
        task_id: TaskId,
        /// Current callback state.
        callback_state: CallbackState,
        /// Callback states the operation accepts.
        allowed: Vec<CallbackState>,
    },

    /// The caller is not the owner the operation requires.
    #[error("task {task_id} is owned by {owner:?}, not by {caller}")]
    InvalidOwner {
        /// Task identifier.
        task_id: TaskId,
        /// Current owner, if any.
        owner: Option<AccessId>,
        /// Caller that attempted the operation.
        caller: AccessId,
    },

    /// A custom field key is outside the supported set.
    #[error("unknown custom field '{0}'")]
    UnknownCustomField(String),

    /// An object reference is missing a mandatory component.
    #[error("{context} object reference is invalid: {reason}")]
    InvalidObjectReference {
        /// Where the reference was found, for example `primary` or `attachment`.
        context: &'static str,
        /// Which component is missing.
        reason: &'static str,
    },

    /// A service level is not an ISO-8601 duration.
    #[error("invalid service level '{0}'")]
    InvalidServiceLevel(String),

    /// Working-day arithmetic left the supported calendar range.
    #[error("cannot shift {start} by {days} working days")]
    WorkingDayOutOfRange {
        /// Anchor of the computation.
        start: DateTime<Utc>,
        /// Requested working-day offset.
        days: i64,
    },
}

/// Error returned while parsing task states from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task state: {0}")]
pub struct ParseTaskStateError(pub String);

/// Error returned while parsing callback states from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown callback state: {0}")]
pub struct ParseCallbackStateError(pub String);
