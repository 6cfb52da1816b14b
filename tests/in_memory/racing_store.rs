//! Store wrapper that lets a competing writer act between a service's read
//! and its write.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tasklane::task::{
    adapters::memory::InMemoryTaskStore,
    domain::{
        AccessId, Attachment, AttachmentId, CallbackState, ExternalId, MinimalTask,
        ObjectReferenceId, SecondaryObjectReference, Task, TaskId, TaskState, TaskSummary,
        TaskVersion,
    },
    ports::{
        AttachmentRepository, ObjectReferenceRepository, TaskPatch, TaskQueryStore,
        TaskRepository, TaskStoreResult, WorkbasketPermission,
    },
    query::{FilterValue, QueryField, QueryPlan},
};

/// What happens right before the next task row write.
pub enum Interference {
    /// Another writer changes the store first.
    Meddle(Box<dyn FnOnce(&InMemoryTaskStore) + Send>),
    /// The write silently leaves this task alone.
    Skip(TaskId),
    /// The write succeeds everywhere but reports one row fewer.
    UnderReport,
}

/// [`InMemoryTaskStore`] with one pending [`Interference`] for the next
/// task row write: `update`, `update_many` or `delete_many`.
pub struct RacingStore {
    inner: InMemoryTaskStore,
    pending: Mutex<Option<Interference>>,
}

impl RacingStore {
    pub fn new(inner: InMemoryTaskStore) -> Self {
        Self {
            inner,
            pending: Mutex::new(None),
        }
    }

    /// Arms `interference` for the next task row write only.
    pub fn before_next_write(&self, interference: Interference) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(interference);
    }

    /// Returns the ids to hand to the wrapped store and whether the result
    /// should be under-reported.
    fn interfere(&self, ids: &[TaskId]) -> (Vec<TaskId>, bool) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            None => (ids.to_vec(), false),
            Some(Interference::Meddle(act)) => {
                act(&self.inner);
                (ids.to_vec(), false)
            }
            Some(Interference::Skip(skipped)) => (
                ids.iter().copied().filter(|id| *id != skipped).collect(),
                false,
            ),
            Some(Interference::UnderReport) => (ids.to_vec(), true),
        }
    }
}

impl TaskRepository for RacingStore {
    fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        self.inner.find_by_id(id)
    }

    fn insert(&self, task: &Task) -> TaskStoreResult<()> {
        self.inner.insert(task)
    }

    fn update(&self, task: &Task, expected: &TaskVersion) -> TaskStoreResult<bool> {
        let (targets, under_report) = self.interfere(&[task.id()]);
        if targets.is_empty() {
            return Ok(false);
        }
        Ok(self.inner.update(task, expected)? && !under_report)
    }

    fn delete(&self, id: TaskId) -> TaskStoreResult<bool> {
        self.inner.delete(id)
    }

    fn delete_many(
        &self,
        ids: &[TaskId],
        required_states: Option<&[TaskState]>,
        blocked_callback: CallbackState,
    ) -> TaskStoreResult<Vec<TaskId>> {
        let (targets, under_report) = self.interfere(ids);
        let mut removed = self
            .inner
            .delete_many(&targets, required_states, blocked_callback)?;
        if under_report {
            removed.pop();
        }
        Ok(removed)
    }

    fn update_many(
        &self,
        ids: &[TaskId],
        patch: &TaskPatch,
        required_states: Option<&[TaskState]>,
    ) -> TaskStoreResult<usize> {
        let (targets, under_report) = self.interfere(ids);
        let changed = self.inner.update_many(&targets, patch, required_states)?;
        Ok(if under_report {
            changed.saturating_sub(1)
        } else {
            changed
        })
    }

    fn find_minimal(&self, ids: &[TaskId]) -> TaskStoreResult<Vec<MinimalTask>> {
        self.inner.find_minimal(ids)
    }

    fn find_minimal_by_external_ids(
        &self,
        external_ids: &[ExternalId],
    ) -> TaskStoreResult<Vec<MinimalTask>> {
        self.inner.find_minimal_by_external_ids(external_ids)
    }

    fn find_ids_without_permission(
        &self,
        ids: &[TaskId],
        access_ids: &[AccessId],
        permission: WorkbasketPermission,
    ) -> TaskStoreResult<Vec<TaskId>> {
        self.inner
            .find_ids_without_permission(ids, access_ids, permission)
    }
}

impl AttachmentRepository for RacingStore {
    fn find_attachments(&self, task_ids: &[TaskId]) -> TaskStoreResult<Vec<Attachment>> {
        self.inner.find_attachments(task_ids)
    }

    fn insert_attachment(&self, attachment: &Attachment) -> TaskStoreResult<()> {
        self.inner.insert_attachment(attachment)
    }

    fn update_attachment(&self, attachment: &Attachment) -> TaskStoreResult<()> {
        self.inner.update_attachment(attachment)
    }

    fn delete_attachment(&self, id: AttachmentId) -> TaskStoreResult<()> {
        self.inner.delete_attachment(id)
    }

    fn delete_attachments_of(&self, task_ids: &[TaskId]) -> TaskStoreResult<usize> {
        self.inner.delete_attachments_of(task_ids)
    }
}

impl ObjectReferenceRepository for RacingStore {
    fn find_object_references(
        &self,
        task_ids: &[TaskId],
    ) -> TaskStoreResult<Vec<SecondaryObjectReference>> {
        self.inner.find_object_references(task_ids)
    }

    fn insert_object_reference(&self, reference: &SecondaryObjectReference) -> TaskStoreResult<()> {
        self.inner.insert_object_reference(reference)
    }

    fn update_object_reference(&self, reference: &SecondaryObjectReference) -> TaskStoreResult<()> {
        self.inner.update_object_reference(reference)
    }

    fn delete_object_reference(&self, id: ObjectReferenceId) -> TaskStoreResult<()> {
        self.inner.delete_object_reference(id)
    }

    fn delete_object_references_of(&self, task_ids: &[TaskId]) -> TaskStoreResult<usize> {
        self.inner.delete_object_references_of(task_ids)
    }
}

impl TaskQueryStore for RacingStore {
    fn select(&self, plan: &QueryPlan) -> TaskStoreResult<Vec<TaskSummary>> {
        self.inner.select(plan)
    }

    fn count(&self, plan: &QueryPlan) -> TaskStoreResult<usize> {
        self.inner.count(plan)
    }

    fn select_values(
        &self,
        plan: &QueryPlan,
        field: QueryField,
    ) -> TaskStoreResult<Vec<FilterValue>> {
        self.inner.select_values(plan, field)
    }

    fn claim_first(
        &self,
        plan: &QueryPlan,
        owner: &AccessId,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<Option<Task>> {
        self.inner.claim_first(plan, owner, now)
    }
}
