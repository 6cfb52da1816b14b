//! In-memory task store for tests and embedding.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::directory::{DirectoryState, InMemoryDirectory};
use super::matcher::{Candidate, Matcher, apply_direction, compare_candidates, compare_values, value_of};
use crate::task::{
    domain::{
        AccessId, Attachment, AttachmentId, CallbackState, ExternalId, MinimalTask, ObjectReferenceId,
        SecondaryObjectReference, Task, TaskId, TaskState, TaskSummary, TaskVersion,
    },
    ports::{
        AttachmentRepository, ObjectReferenceRepository, TaskPatch, TaskQueryStore,
        TaskRepository, TaskStoreError, TaskStoreResult, WorkbasketPermission,
    },
    query::{FilterValue, QueryField, QueryPlan, SortDirection},
};

/// Thread-safe in-memory implementation of every store port.
///
/// Task rows, attachments and secondary references are kept apart the way a
/// relational store keeps them, so the engine's child synchronisation is
/// exercised for real. Classification summaries are stored in their reduced
/// form. Read scoping and name joins consult the shared
/// [`InMemoryDirectory`].
#[derive(Debug, Clone)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<StoreState>>,
    directory: InMemoryDirectory,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: BTreeMap<TaskId, Task>,
    attachments: BTreeMap<TaskId, Vec<Attachment>>,
    references: BTreeMap<TaskId, Vec<SecondaryObjectReference>>,
}

impl StoreState {
    fn assemble(&self, row: &Task) -> Task {
        let mut task = row.clone();
        for attachment in self.attachments.get(&row.id()).into_iter().flatten() {
            task.add_attachment(attachment.clone());
        }
        for reference in self.references.get(&row.id()).into_iter().flatten() {
            task.add_secondary_object_reference(reference.clone());
        }
        task
    }

    fn candidate<'a>(&'a self, row: &'a Task, directory: &'a DirectoryState) -> Candidate<'a> {
        Candidate {
            task: row,
            attachments: self
                .attachments
                .get(&row.id())
                .map_or(&[][..], Vec::as_slice),
            references: self
                .references
                .get(&row.id())
                .map_or(&[][..], Vec::as_slice),
            classification: row
                .classification()
                .id
                .as_ref()
                .and_then(|id| directory.classification(id)),
            workbasket: directory.workbasket(&row.workbasket().id),
        }
    }

    /// Returns the matching candidates in plan order, before paging.
    fn matching<'a>(
        &'a self,
        plan: &QueryPlan,
        directory: &'a DirectoryState,
    ) -> TaskStoreResult<Vec<Candidate<'a>>> {
        let matcher = Matcher::compile(plan).map_err(TaskStoreError::persistence)?;
        let mut found: Vec<Candidate<'a>> = self
            .tasks
            .values()
            .filter(|row| {
                plan.access_filter().is_none_or(|access_ids| {
                    directory.permits(access_ids, &row.workbasket().id, WorkbasketPermission::Read)
                })
            })
            .map(|row| self.candidate(row, directory))
            .filter(|candidate| matcher.matches(candidate))
            .collect();
        found.sort_by(|left, right| compare_candidates(plan.sort(), left, right));
        Ok(found)
    }

    fn attachment_exists(&self, id: AttachmentId) -> bool {
        self.attachments
            .values()
            .flatten()
            .any(|attachment| attachment.id() == id)
    }

    fn reference_exists(&self, id: ObjectReferenceId) -> bool {
        self.references
            .values()
            .flatten()
            .any(|reference| reference.id() == id)
    }
}

/// Task row without its children and with the reduced classification.
fn stored_row(task: &Task) -> Task {
    let mut row = task.clone();
    let attachment_ids: Vec<AttachmentId> = row.attachments().iter().map(Attachment::id).collect();
    for id in attachment_ids {
        row.remove_attachment(id);
    }
    let reference_ids: Vec<ObjectReferenceId> = row
        .secondary_object_references()
        .iter()
        .map(SecondaryObjectReference::id)
        .collect();
    for id in reference_ids {
        row.remove_secondary_object_reference(id);
    }
    let classification = row.classification().stored_view();
    row.set_classification(classification);
    row
}

fn stored_attachment(attachment: &Attachment) -> Attachment {
    let mut stored = attachment.clone();
    stored.set_classification(attachment.classification().stored_view());
    stored
}

fn detached(kind: &str) -> TaskStoreError {
    TaskStoreError::persistence(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("{kind} is not attached to a task"),
    ))
}

fn paged<T>(rows: Vec<T>, plan: &QueryPlan) -> Vec<T> {
    match plan.page() {
        Some(page) => rows.into_iter().skip(page.offset).take(page.limit).collect(),
        None => rows,
    }
}

impl InMemoryTaskStore {
    /// Creates an empty store scoped by `directory`.
    #[must_use]
    pub fn new(directory: InMemoryDirectory) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            directory,
        }
    }

    /// Returns the directory used for read scoping and name joins.
    #[must_use]
    pub const fn directory(&self) -> &InMemoryDirectory {
        &self.directory
    }

    fn read(&self) -> TaskStoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> TaskStoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn read_directory(&self) -> TaskStoreResult<RwLockReadGuard<'_, DirectoryState>> {
        self.directory.read().map_err(TaskStoreError::persistence)
    }
}

impl TaskRepository for InMemoryTaskStore {
    fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).map(|row| state.assemble(row)))
    }

    fn insert(&self, task: &Task) -> TaskStoreResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskStoreError::DuplicateTask(task.id()));
        }
        if state
            .tasks
            .values()
            .any(|row| row.external_id() == task.external_id())
        {
            return Err(TaskStoreError::DuplicateExternalId(
                task.external_id().clone(),
            ));
        }
        state.tasks.insert(task.id(), stored_row(task));
        Ok(())
    }

    fn update(&self, task: &Task, expected: &TaskVersion) -> TaskStoreResult<bool> {
        let mut state = self.write()?;
        let Some(row) = state.tasks.get_mut(&task.id()) else {
            return Ok(false);
        };
        if row.version() != *expected {
            return Ok(false);
        }
        *row = stored_row(task);
        Ok(true)
    }

    fn delete(&self, id: TaskId) -> TaskStoreResult<bool> {
        let mut state = self.write()?;
        Ok(state.tasks.remove(&id).is_some())
    }

    fn delete_many(
        &self,
        ids: &[TaskId],
        required_states: Option<&[TaskState]>,
        blocked_callback: CallbackState,
    ) -> TaskStoreResult<Vec<TaskId>> {
        let mut state = self.write()?;
        let mut removed = Vec::new();
        for id in ids {
            let deletable = state.tasks.get(id).is_some_and(|row| {
                row.callback_state() != blocked_callback
                    && required_states.is_none_or(|states| states.contains(&row.state()))
            });
            if deletable && state.tasks.remove(id).is_some() {
                removed.push(*id);
            }
        }
        Ok(removed)
    }

    fn update_many(
        &self,
        ids: &[TaskId],
        patch: &TaskPatch,
        required_states: Option<&[TaskState]>,
    ) -> TaskStoreResult<usize> {
        let mut state = self.write()?;
        let mut changed = 0;
        let unique: HashSet<TaskId> = ids.iter().copied().collect();
        for id in unique {
            let Some(row) = state.tasks.get_mut(&id) else {
                continue;
            };
            if required_states.is_some_and(|states| !states.contains(&row.state())) {
                continue;
            }
            patch.apply(row);
            changed += 1;
        }
        Ok(changed)
    }

    fn find_minimal(&self, ids: &[TaskId]) -> TaskStoreResult<Vec<MinimalTask>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .map(MinimalTask::from)
            .collect())
    }

    fn find_minimal_by_external_ids(
        &self,
        external_ids: &[ExternalId],
    ) -> TaskStoreResult<Vec<MinimalTask>> {
        let state = self.read()?;
        Ok(external_ids
            .iter()
            .filter_map(|external_id| {
                state
                    .tasks
                    .values()
                    .find(|row| row.external_id() == external_id)
            })
            .map(MinimalTask::from)
            .collect())
    }

    fn find_ids_without_permission(
        &self,
        ids: &[TaskId],
        access_ids: &[AccessId],
        permission: WorkbasketPermission,
    ) -> TaskStoreResult<Vec<TaskId>> {
        let state = self.read()?;
        let directory = self.read_directory()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .filter(|row| !directory.permits(access_ids, &row.workbasket().id, permission))
            .map(Task::id)
            .collect())
    }
}

impl AttachmentRepository for InMemoryTaskStore {
    fn find_attachments(&self, task_ids: &[TaskId]) -> TaskStoreResult<Vec<Attachment>> {
        let state = self.read()?;
        Ok(task_ids
            .iter()
            .filter_map(|id| state.attachments.get(id))
            .flatten()
            .cloned()
            .collect())
    }

    fn insert_attachment(&self, attachment: &Attachment) -> TaskStoreResult<()> {
        let task_id = attachment.task_id().ok_or_else(|| detached("attachment"))?;
        let mut state = self.write()?;
        if state.attachment_exists(attachment.id()) {
            return Err(TaskStoreError::DuplicateAttachment(attachment.id()));
        }
        state
            .attachments
            .entry(task_id)
            .or_default()
            .push(stored_attachment(attachment));
        Ok(())
    }

    fn update_attachment(&self, attachment: &Attachment) -> TaskStoreResult<()> {
        let task_id = attachment.task_id().ok_or_else(|| detached("attachment"))?;
        let mut state = self.write()?;
        if let Some(stored) = state
            .attachments
            .get_mut(&task_id)
            .and_then(|items| items.iter_mut().find(|item| item.id() == attachment.id()))
        {
            *stored = stored_attachment(attachment);
        }
        Ok(())
    }

    fn delete_attachment(&self, id: AttachmentId) -> TaskStoreResult<()> {
        let mut state = self.write()?;
        for items in state.attachments.values_mut() {
            items.retain(|item| item.id() != id);
        }
        Ok(())
    }

    fn delete_attachments_of(&self, task_ids: &[TaskId]) -> TaskStoreResult<usize> {
        let mut state = self.write()?;
        Ok(task_ids
            .iter()
            .filter_map(|id| state.attachments.remove(id))
            .map(|items| items.len())
            .sum())
    }
}

impl ObjectReferenceRepository for InMemoryTaskStore {
    fn find_object_references(
        &self,
        task_ids: &[TaskId],
    ) -> TaskStoreResult<Vec<SecondaryObjectReference>> {
        let state = self.read()?;
        Ok(task_ids
            .iter()
            .filter_map(|id| state.references.get(id))
            .flatten()
            .cloned()
            .collect())
    }

    fn insert_object_reference(&self, reference: &SecondaryObjectReference) -> TaskStoreResult<()> {
        let task_id = reference
            .task_id()
            .ok_or_else(|| detached("object reference"))?;
        let mut state = self.write()?;
        if state.reference_exists(reference.id()) {
            return Err(TaskStoreError::DuplicateObjectReference(reference.id()));
        }
        state
            .references
            .entry(task_id)
            .or_default()
            .push(reference.clone());
        Ok(())
    }

    fn update_object_reference(&self, reference: &SecondaryObjectReference) -> TaskStoreResult<()> {
        let task_id = reference
            .task_id()
            .ok_or_else(|| detached("object reference"))?;
        let mut state = self.write()?;
        if let Some(stored) = state
            .references
            .get_mut(&task_id)
            .and_then(|items| items.iter_mut().find(|item| item.id() == reference.id()))
        {
            *stored = reference.clone();
        }
        Ok(())
    }

    fn delete_object_reference(&self, id: ObjectReferenceId) -> TaskStoreResult<()> {
        let mut state = self.write()?;
        for items in state.references.values_mut() {
            items.retain(|item| item.id() != id);
        }
        Ok(())
    }

    fn delete_object_references_of(&self, task_ids: &[TaskId]) -> TaskStoreResult<usize> {
        let mut state = self.write()?;
        Ok(task_ids
            .iter()
            .filter_map(|id| state.references.remove(id))
            .map(|items| items.len())
            .sum())
    }
}

impl TaskQueryStore for InMemoryTaskStore {
    fn select(&self, plan: &QueryPlan) -> TaskStoreResult<Vec<TaskSummary>> {
        let state = self.read()?;
        let directory = self.read_directory()?;
        let found = state.matching(plan, &directory)?;
        Ok(paged(found, plan)
            .into_iter()
            .map(|candidate| TaskSummary::from(&state.assemble(candidate.task)))
            .collect())
    }

    fn count(&self, plan: &QueryPlan) -> TaskStoreResult<usize> {
        let state = self.read()?;
        let directory = self.read_directory()?;
        Ok(state.matching(plan, &directory)?.len())
    }

    fn select_values(
        &self,
        plan: &QueryPlan,
        field: QueryField,
    ) -> TaskStoreResult<Vec<FilterValue>> {
        let state = self.read()?;
        let directory = self.read_directory()?;
        let matcher = Matcher::compile(plan).map_err(TaskStoreError::persistence)?;
        let mut values: Vec<FilterValue> = Vec::new();
        for candidate in state.matching(plan, &directory)? {
            for row in candidate.rows() {
                if !matcher.row_matches(&row) {
                    continue;
                }
                let value = value_of(field, &row);
                if !value.is_null() && !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        let direction = plan
            .sort()
            .first()
            .map_or(SortDirection::Ascending, |key| key.direction);
        values.sort_by(|left, right| apply_direction(compare_values(left, right), direction));
        Ok(paged(values, plan))
    }

    fn claim_first(
        &self,
        plan: &QueryPlan,
        owner: &AccessId,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<Option<Task>> {
        let mut state = self.write()?;
        let directory = self.read_directory()?;
        let chosen = state
            .matching(plan, &directory)?
            .into_iter()
            .find(|candidate| {
                let task_state = candidate.task.state();
                !task_state.is_final() && !task_state.is_claimed()
            })
            .map(|candidate| candidate.task.id());
        drop(directory);
        let Some(id) = chosen else {
            return Ok(None);
        };
        let Some(row) = state.tasks.get_mut(&id) else {
            return Ok(None);
        };
        row.claim(owner, false, now)
            .map_err(TaskStoreError::persistence)?;
        let claimed = row.clone();
        Ok(Some(state.assemble(&claimed)))
    }
}
