//! Repository ports for tasks and their child collections.

use crate::task::domain::{
    AccessId, Attachment, AttachmentId, CallbackState, CustomField, ExternalId, MinimalTask,
    ObjectReferenceId, SecondaryObjectReference, Task, TaskId, TaskState, TaskVersion,
    WorkbasketSummary,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::{TaskQueryStore, WorkbasketPermission};

/// Result type for store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Task row persistence contract.
///
/// Writes touch the task row only; attachments and secondary references go
/// through their own repositories.
pub trait TaskRepository: Send + Sync {
    /// Loads a task together with its attachments and secondary references.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails or holds undecodable
    /// data.
    fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>>;

    /// Stores a new task row.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateTask`] or
    /// [`TaskStoreError::DuplicateExternalId`] on key collisions.
    fn insert(&self, task: &Task) -> TaskStoreResult<()>;

    /// Overwrites the task row if its stored version still equals
    /// `expected`. Returns `false` when the guard did not match.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn update(&self, task: &Task, expected: &TaskVersion) -> TaskStoreResult<bool>;

    /// Deletes a task row. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn delete(&self, id: TaskId) -> TaskStoreResult<bool>;

    /// Deletes the listed task rows that are in one of `required_states`
    /// (any state when `None`) and whose callback state is not
    /// `blocked_callback`. Returns the ids of the removed rows.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn delete_many(
        &self,
        ids: &[TaskId],
        required_states: Option<&[TaskState]>,
        blocked_callback: CallbackState,
    ) -> TaskStoreResult<Vec<TaskId>>;

    /// Applies `patch` to every listed task whose state is one of
    /// `required_states` (any state when `None`) and returns the number of
    /// rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn update_many(
        &self,
        ids: &[TaskId],
        patch: &TaskPatch,
        required_states: Option<&[TaskState]>,
    ) -> TaskStoreResult<usize>;

    /// Loads minimal projections of the listed tasks; unknown ids are
    /// omitted.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn find_minimal(&self, ids: &[TaskId]) -> TaskStoreResult<Vec<MinimalTask>>;

    /// Loads minimal projections by external identifier; unknown ids are
    /// omitted.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn find_minimal_by_external_ids(
        &self,
        external_ids: &[ExternalId],
    ) -> TaskStoreResult<Vec<MinimalTask>>;

    /// Returns the listed tasks whose workbasket grants `permission` to none
    /// of `access_ids`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn find_ids_without_permission(
        &self,
        ids: &[TaskId],
        access_ids: &[AccessId],
        permission: WorkbasketPermission,
    ) -> TaskStoreResult<Vec<TaskId>>;
}

/// Attachment persistence contract.
#[cfg_attr(test, mockall::automock)]
pub trait AttachmentRepository: Send + Sync {
    /// Loads the attachments of the listed tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn find_attachments(&self, task_ids: &[TaskId]) -> TaskStoreResult<Vec<Attachment>>;

    /// Stores a new attachment.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateAttachment`] on an identifier
    /// collision.
    fn insert_attachment(&self, attachment: &Attachment) -> TaskStoreResult<()>;

    /// Overwrites an attachment.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn update_attachment(&self, attachment: &Attachment) -> TaskStoreResult<()>;

    /// Deletes an attachment.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn delete_attachment(&self, id: AttachmentId) -> TaskStoreResult<()>;

    /// Deletes every attachment of the listed tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn delete_attachments_of(&self, task_ids: &[TaskId]) -> TaskStoreResult<usize>;
}

/// Secondary object reference persistence contract.
#[cfg_attr(test, mockall::automock)]
pub trait ObjectReferenceRepository: Send + Sync {
    /// Loads the secondary references of the listed tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn find_object_references(
        &self,
        task_ids: &[TaskId],
    ) -> TaskStoreResult<Vec<SecondaryObjectReference>>;

    /// Stores a new secondary reference.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateObjectReference`] on an identifier
    /// collision.
    fn insert_object_reference(&self, reference: &SecondaryObjectReference) -> TaskStoreResult<()>;

    /// Overwrites a secondary reference.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn update_object_reference(&self, reference: &SecondaryObjectReference) -> TaskStoreResult<()>;

    /// Deletes a secondary reference.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn delete_object_reference(&self, id: ObjectReferenceId) -> TaskStoreResult<()>;

    /// Deletes every secondary reference of the listed tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn delete_object_references_of(&self, task_ids: &[TaskId]) -> TaskStoreResult<usize>;
}

/// Everything the engine needs from a store.
pub trait TaskStore:
    TaskRepository + AttachmentRepository + ObjectReferenceRepository + TaskQueryStore
{
}

impl<T> TaskStore for T where
    T: TaskRepository + AttachmentRepository + ObjectReferenceRepository + TaskQueryStore
{
}

/// Column changes applied by a batched update.
///
/// `None` leaves a column untouched; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPatch {
    /// New modification timestamp, always written.
    pub modified: DateTime<Utc>,
    /// New lifecycle state.
    pub state: Option<TaskState>,
    /// New owner.
    pub owner: Option<Option<AccessId>>,
    /// New claim timestamp.
    pub claimed: Option<Option<DateTime<Utc>>>,
    /// New completion timestamp.
    pub completed: Option<Option<DateTime<Utc>>>,
    /// New read flag.
    pub read: Option<bool>,
    /// New transferred flag.
    pub transferred: Option<bool>,
    /// New planned start.
    pub planned: Option<Option<DateTime<Utc>>>,
    /// New due date.
    pub due: Option<Option<DateTime<Utc>>>,
    /// New workbasket.
    pub workbasket: Option<WorkbasketSummary>,
    /// New callback state.
    pub callback_state: Option<CallbackState>,
    /// Custom fields to set or clear.
    pub custom: BTreeMap<CustomField, Option<String>>,
}

impl TaskPatch {
    /// Creates a patch that only stamps `modified`.
    #[must_use]
    pub const fn new(modified: DateTime<Utc>) -> Self {
        Self {
            modified,
            state: None,
            owner: None,
            claimed: None,
            completed: None,
            read: None,
            transferred: None,
            planned: None,
            due: None,
            workbasket: None,
            callback_state: None,
            custom: BTreeMap::new(),
        }
    }

    /// Sets the state.
    #[must_use]
    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets or clears the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: Option<AccessId>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets or clears the claim timestamp.
    #[must_use]
    pub fn with_claimed(mut self, claimed: Option<DateTime<Utc>>) -> Self {
        self.claimed = Some(claimed);
        self
    }

    /// Sets or clears the completion timestamp.
    #[must_use]
    pub fn with_completed(mut self, completed: Option<DateTime<Utc>>) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Sets the read flag.
    #[must_use]
    pub fn with_read(mut self, read: bool) -> Self {
        self.read = Some(read);
        self
    }

    /// Sets the transferred flag.
    #[must_use]
    pub fn with_transferred(mut self, transferred: bool) -> Self {
        self.transferred = Some(transferred);
        self
    }

    /// Sets or clears the planned start.
    #[must_use]
    pub fn with_planned(mut self, planned: Option<DateTime<Utc>>) -> Self {
        self.planned = Some(planned);
        self
    }

    /// Sets or clears the due date.
    #[must_use]
    pub fn with_due(mut self, due: Option<DateTime<Utc>>) -> Self {
        self.due = Some(due);
        self
    }

    /// Moves the task to another workbasket.
    #[must_use]
    pub fn with_workbasket(mut self, workbasket: WorkbasketSummary) -> Self {
        self.workbasket = Some(workbasket);
        self
    }

    /// Sets the callback state.
    #[must_use]
    pub fn with_callback_state(mut self, callback_state: CallbackState) -> Self {
        self.callback_state = Some(callback_state);
        self
    }

    /// Sets or clears custom fields.
    #[must_use]
    pub fn with_custom_fields(mut self, custom: BTreeMap<CustomField, Option<String>>) -> Self {
        self.custom = custom;
        self
    }

    /// Applies the patch in place.
    pub fn apply(&self, task: &mut Task) {
        if let Some(state) = self.state {
            task.set_state(state);
        }
        if let Some(owner) = &self.owner {
            task.set_owner(owner.clone());
        }
        if let Some(claimed) = self.claimed {
            task.set_claimed(claimed);
        }
        if let Some(completed) = self.completed {
            task.set_completed(completed);
        }
        if let Some(read) = self.read {
            task.set_read(read, self.modified);
        }
        if let Some(transferred) = self.transferred {
            task.set_transferred(transferred);
        }
        if let Some(planned) = self.planned {
            task.set_planned(planned);
        }
        if let Some(due) = self.due {
            task.set_due(due);
        }
        if let Some(workbasket) = &self.workbasket {
            task.set_workbasket(workbasket.clone());
        }
        if let Some(callback_state) = self.callback_state {
            task.set_callback_state(callback_state);
        }
        for (field, value) in &self.custom {
            task.set_custom_field(*field, value.clone());
        }
        task.touch(self.modified);
    }
}

/// Errors returned by store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// A task with the same external identifier already exists.
    #[error("duplicate external task identifier: {0}")]
    DuplicateExternalId(ExternalId),

    /// An attachment with the same identifier already exists.
    #[error("duplicate attachment identifier: {0}")]
    DuplicateAttachment(AttachmentId),

    /// A secondary reference with the same identifier already exists.
    #[error("duplicate object reference identifier: {0}")]
    DuplicateObjectReference(ObjectReferenceId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Stored data could not be decoded.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Wraps a decoding error.
    pub fn invalid_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }
}
