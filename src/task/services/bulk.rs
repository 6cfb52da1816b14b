//! Bulk lifecycle operations with per-item failure reporting.
//!
//! Every bulk call follows the same shape: repeated ids are dropped,
//! existence and authorisation are checked up front, survivors are written
//! with one conditional batched update per group, and a short affected-row
//! count is explained by re-reading the rows.

use super::context::TaskPorts;
use super::error::{NotFoundTarget, TaskError, TaskResult};
use super::lifecycle::{TaskLifecycleService, require_admin};
use super::query::authorised_plan;
use super::service_level::dedupe;
use crate::task::{
    domain::{
        AccessId, BulkKey, BulkResult, CallbackState, CustomField, ExternalId, MinimalTask,
        ObjectReference, Task, TaskId, TaskState, TaskSummary, check_callback_transition,
    },
    ports::{Caller, TaskEventKind, TaskPatch, TaskStore, WorkbasketPermission},
    query::TaskQuery,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Failures found when a batched write changed fewer rows than expected.
#[derive(Debug, Default)]
pub(crate) struct Shortfall {
    attributed: Vec<(TaskId, TaskError)>,
    unattributed: Vec<TaskError>,
}

impl Shortfall {
    pub(crate) fn record_into(self, result: &mut BulkResult<TaskId, TaskError>) {
        for (id, error) in self.attributed {
            result.add_error(id, error);
        }
        for error in self.unattributed {
            result.add_unattributed(error);
        }
    }

    pub(crate) fn failed(&self) -> BTreeSet<TaskId> {
        self.attributed.iter().map(|(id, _)| *id).collect()
    }
}

/// Re-reads `ids` after a batched write stamped `stamp` on `affected` rows
/// and blames each row that was not written.
///
/// Vanished rows are `NotFound`, rows outside `allowed` are
/// `InvalidState` and rows that should have changed but did not are
/// `Concurrency`. Whatever remains of the shortfall is unattributed.
pub(crate) fn explain_shortfall(
    store: &dyn TaskStore,
    ids: &[TaskId],
    affected: usize,
    allowed: Option<&[TaskState]>,
    stamp: DateTime<Utc>,
) -> TaskResult<Shortfall> {
    let expected = ids.len().saturating_sub(affected);
    let rows: BTreeMap<TaskId, MinimalTask> = store
        .find_minimal(ids)?
        .into_iter()
        .map(|task| (task.id, task))
        .collect();

    let mut shortfall = Shortfall::default();
    for id in ids {
        let error = match rows.get(id) {
            None => TaskError::NotFound(NotFoundTarget::Task(*id)),
            Some(row) if row.modified == stamp => continue,
            Some(row) if allowed.is_some_and(|states| !states.contains(&row.state)) => {
                TaskError::InvalidState {
                    task_id: *id,
                    state: row.state,
                    allowed: allowed.map(<[TaskState]>::to_vec).unwrap_or_default(),
                }
            }
            Some(_) => TaskError::Concurrency(*id),
        };
        shortfall.attributed.push((*id, error));
    }
    let residual = expected.saturating_sub(shortfall.attributed.len());
    for _ in 0..residual {
        shortfall.unattributed.push(TaskError::System(
            "batched update changed fewer rows than expected".to_owned(),
        ));
    }
    if expected > 0 {
        warn!(
            expected,
            attributed = shortfall.attributed.len(),
            unattributed = residual,
            "batched update fell short"
        );
    }
    Ok(shortfall)
}

/// Loads the listed tasks and drops those that do not exist or that the
/// caller may not read, recording why.
pub(super) fn existing_and_readable(
    ports: &TaskPorts,
    caller: &Caller,
    ids: &[TaskId],
    result: &mut BulkResult<TaskId, TaskError>,
) -> TaskResult<Vec<MinimalTask>> {
    let found: BTreeMap<TaskId, MinimalTask> = ports
        .store
        .find_minimal(ids)?
        .into_iter()
        .map(|task| (task.id, task))
        .collect();
    let mut survivors = Vec::new();
    for id in ids {
        match found.get(id) {
            Some(task) => survivors.push(task.clone()),
            None => result.add_error(*id, TaskError::NotFound(NotFoundTarget::Task(*id))),
        }
    }
    if caller.is_task_admin() || survivors.is_empty() {
        return Ok(survivors);
    }
    let survivor_ids: Vec<TaskId> = survivors.iter().map(|task| task.id).collect();
    let denied: BTreeSet<TaskId> = ports
        .store
        .find_ids_without_permission(
            &survivor_ids,
            &caller.access_ids(),
            WorkbasketPermission::Read,
        )?
        .into_iter()
        .collect();
    for id in &denied {
        result.add_error(
            *id,
            TaskError::not_authorized(
                caller.user_id(),
                format!("task {id}"),
                WorkbasketPermission::Read,
            ),
        );
    }
    survivors.retain(|task| !denied.contains(&task.id));
    Ok(survivors)
}

/// Runs one conditional batched update and folds any shortfall into
/// `result`. Returns the ids that were written.
pub(super) fn write_batch(
    ports: &TaskPorts,
    ids: &[TaskId],
    patch: &TaskPatch,
    required_states: Option<&[TaskState]>,
    result: &mut BulkResult<TaskId, TaskError>,
) -> TaskResult<Vec<TaskId>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let affected = ports.store.update_many(ids, patch, required_states)?;
    if affected >= ids.len() {
        return Ok(ids.to_vec());
    }
    let shortfall = explain_shortfall(
        ports.store.as_ref(),
        ids,
        affected,
        required_states,
        patch.modified,
    )?;
    let failed = shortfall.failed();
    shortfall.record_into(result);
    Ok(ids.iter().copied().filter(|id| !failed.contains(id)).collect())
}

/// Loads full tasks for history snapshots when the sink is enabled.
pub(super) fn snapshot(ports: &TaskPorts, ids: &[TaskId]) -> TaskResult<Vec<Task>> {
    if !ports.history_enabled() {
        return Ok(Vec::new());
    }
    let mut tasks = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(task) = ports.store.find_by_id(*id)? {
            tasks.push(task);
        }
    }
    Ok(tasks)
}

/// Records one event per written task, diffing against `before`.
pub(super) fn record_batch_events(
    ports: &TaskPorts,
    kind: TaskEventKind,
    user_id: &AccessId,
    before: Vec<Task>,
    written: &[TaskId],
) -> TaskResult<()> {
    if before.is_empty() {
        return Ok(());
    }
    let written_ids: BTreeSet<TaskId> = written.iter().copied().collect();
    for previous in before {
        if !written_ids.contains(&previous.id()) {
            continue;
        }
        if let Some(after) = ports.store.find_by_id(previous.id())? {
            ports.record_event(kind, user_id, Some(TaskSummary::from(&previous)), &after);
        }
    }
    Ok(())
}

impl TaskLifecycleService {
    /// Completes tasks claimed by the caller.
    ///
    /// Already completed tasks are skipped without error.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] only when a store or lookup call fails.
    pub fn complete_tasks(&self, ids: &[TaskId]) -> TaskResult<BulkResult<TaskId, TaskError>> {
        self.complete_many(ids, false)
    }

    /// Completes tasks regardless of ownership, claiming unclaimed ones for
    /// the caller first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] only when a store or lookup call fails.
    pub fn force_complete_tasks(
        &self,
        ids: &[TaskId],
    ) -> TaskResult<BulkResult<TaskId, TaskError>> {
        self.complete_many(ids, true)
    }

    /// Deletes completed tasks with their children.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotAuthorized`] for the whole call without the
    /// admin role.
    pub fn delete_tasks(&self, ids: &[TaskId]) -> TaskResult<BulkResult<TaskId, TaskError>> {
        self.delete_many(ids, false)
    }

    /// Deletes tasks in any state with their children.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotAuthorized`] for the whole call without the
    /// admin role.
    pub fn force_delete_tasks(
        &self,
        ids: &[TaskId],
    ) -> TaskResult<BulkResult<TaskId, TaskError>> {
        self.delete_many(ids, true)
    }

    /// Sets the owner of tasks in state `Ready`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] only when a store or lookup call fails.
    pub fn set_owner_of_tasks(
        &self,
        owner: &AccessId,
        requested: &[TaskId],
    ) -> TaskResult<BulkResult<TaskId, TaskError>> {
        let mut result = BulkResult::new();
        let ids = dedupe(requested);
        if ids.is_empty() {
            return Ok(result);
        }
        let caller = self.ports.current_caller();
        let mut ready = Vec::new();
        for task in existing_and_readable(&self.ports, &caller, &ids, &mut result)? {
            if task.state == TaskState::Ready {
                ready.push(task.id);
            } else {
                result.add_error(
                    task.id,
                    TaskError::InvalidState {
                        task_id: task.id,
                        state: task.state,
                        allowed: vec![TaskState::Ready],
                    },
                );
            }
        }
        let patch = TaskPatch::new(self.ports.now()).with_owner(Some(owner.clone()));
        let written = write_batch(
            &self.ports,
            &ready,
            &patch,
            Some([TaskState::Ready].as_slice()),
            &mut result,
        )?;
        info!(owner = %owner, written = written.len(), failed = result.len(), "set owner of tasks");
        Ok(result)
    }

    /// Sets the callback state of tasks addressed by external identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] only when a store call fails.
    pub fn set_callback_state_for_tasks(
        &self,
        requested: &[ExternalId],
        state: CallbackState,
    ) -> TaskResult<BulkResult<ExternalId, TaskError>> {
        let mut result = BulkResult::new();
        let mut seen = BTreeSet::new();
        let external_ids: Vec<ExternalId> = requested
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();
        if external_ids.is_empty() {
            return Ok(result);
        }

        let found: BTreeMap<ExternalId, MinimalTask> = self
            .ports
            .store
            .find_minimal_by_external_ids(&external_ids)?
            .into_iter()
            .map(|task| (task.external_id.clone(), task))
            .collect();
        let mut survivors: Vec<TaskId> = Vec::new();
        let mut by_task: BTreeMap<TaskId, ExternalId> = BTreeMap::new();
        for external_id in &external_ids {
            let Some(task) = found.get(external_id) else {
                result.add_error(
                    external_id.clone(),
                    TaskError::NotFound(NotFoundTarget::ExternalTask(external_id.clone())),
                );
                continue;
            };
            if let Err(err) =
                check_callback_transition(task.id, task.state, task.callback_state, state)
            {
                result.add_error(external_id.clone(), err.into());
                continue;
            }
            survivors.push(task.id);
            by_task.insert(task.id, external_id.clone());
        }

        let required: Option<Vec<TaskState>> = match state {
            CallbackState::None => None,
            CallbackState::CallbackProcessingRequired => Some(TaskState::NON_FINAL.to_vec()),
            CallbackState::Claimed => Some(vec![TaskState::Claimed]),
            CallbackState::CallbackProcessingCompleted => Some(vec![TaskState::Completed]),
        };
        let patch = TaskPatch::new(self.ports.now()).with_callback_state(state);
        let mut by_id = BulkResult::new();
        write_batch(&self.ports, &survivors, &patch, required.as_deref(), &mut by_id)?;
        for (key, error) in by_id {
            match key {
                BulkKey::Item(id) => match by_task.get(&id) {
                    Some(external_id) => result.add_error(external_id.clone(), error),
                    None => result.add_unattributed(error),
                },
                BulkKey::Unattributed(_) => result.add_unattributed(error),
            }
        }
        info!(callback_state = %state, failed = result.len(), "set callback state of tasks");
        Ok(result)
    }

    /// Sets the planned date of tasks and recomputes their due dates.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] only when a store or lookup call fails.
    pub fn set_planned_of_tasks(
        &self,
        planned: DateTime<Utc>,
        ids: &[TaskId],
    ) -> TaskResult<BulkResult<TaskId, TaskError>> {
        self.resolver.set_planned_of_tasks(planned, ids)
    }

    /// Sets or clears custom fields on non-final tasks and returns the ids
    /// that changed. Unknown, completed and unreadable tasks are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidArgument`] for an empty field map or a
    /// key outside `custom_1` to `custom_16`.
    pub fn update_custom_fields_by_ids(
        &self,
        requested: &[TaskId],
        fields: &BTreeMap<String, Option<String>>,
    ) -> TaskResult<Vec<TaskId>> {
        let custom = parse_custom_fields(fields)?;
        let ids = dedupe(requested);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let caller = self.ports.current_caller();
        let mut ignored = BulkResult::new();
        let survivors: Vec<TaskId> =
            existing_and_readable(&self.ports, &caller, &ids, &mut ignored)?
                .into_iter()
                .filter(|task| !task.state.is_final())
                .map(|task| task.id)
                .collect();
        let patch = TaskPatch::new(self.ports.now()).with_custom_fields(custom);
        let written = write_batch(
            &self.ports,
            &survivors,
            &patch,
            Some(TaskState::NON_FINAL.as_slice()),
            &mut ignored,
        )?;
        info!(requested = ids.len(), written = written.len(), "updated custom fields");
        Ok(written)
    }

    /// Sets or clears custom fields on the caller-readable, non-final tasks
    /// whose primary object reference equals `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidArgument`] for an empty field map, an
    /// unknown key or a malformed reference.
    pub fn update_custom_fields_by_reference(
        &self,
        reference: &ObjectReference,
        fields: &BTreeMap<String, Option<String>>,
    ) -> TaskResult<Vec<TaskId>> {
        reference.validate("object reference selector")?;
        parse_custom_fields(fields)?;
        let caller = self.ports.current_caller();
        let query = TaskQuery::new()
            .primary_object_reference_is(reference)
            .state_not_in([TaskState::Completed]);
        let plan = authorised_plan(&self.ports, &caller, &query)?;
        let ids: Vec<TaskId> = self
            .ports
            .store
            .select(&plan)?
            .into_iter()
            .map(|summary| summary.id)
            .collect();
        self.update_custom_fields_by_ids(&ids, fields)
    }

    fn complete_many(
        &self,
        requested: &[TaskId],
        force: bool,
    ) -> TaskResult<BulkResult<TaskId, TaskError>> {
        let mut result = BulkResult::new();
        let ids = dedupe(requested);
        if ids.is_empty() {
            return Ok(result);
        }
        let caller = self.ports.current_caller();
        let access_ids = caller.access_ids();

        let mut claimed = Vec::new();
        let mut unclaimed = Vec::new();
        for task in existing_and_readable(&self.ports, &caller, &ids, &mut result)? {
            if task.state.is_final() {
                continue;
            }
            if task.state.is_claimed() {
                let owned = task.owner.as_ref().is_some_and(|owner| access_ids.contains(owner));
                if force || owned {
                    claimed.push(task.id);
                } else {
                    result.add_error(
                        task.id,
                        TaskError::InvalidOwner {
                            task_id: task.id,
                            owner: task.owner.clone(),
                            caller: caller.user_id().clone(),
                        },
                    );
                }
            } else if force {
                unclaimed.push(task.id);
            } else {
                result.add_error(
                    task.id,
                    TaskError::InvalidState {
                        task_id: task.id,
                        state: task.state,
                        allowed: TaskState::CLAIMED.to_vec(),
                    },
                );
            }
        }

        let all: Vec<TaskId> = claimed.iter().chain(&unclaimed).copied().collect();
        let before = snapshot(&self.ports, &all)?;
        let now = self.ports.now();
        let completed = TaskPatch::new(now)
            .with_state(TaskState::Completed)
            .with_completed(Some(now))
            .with_read(true);
        let mut written = write_batch(
            &self.ports,
            &claimed,
            &completed,
            Some(TaskState::CLAIMED.as_slice()),
            &mut result,
        )?;
        let claimed_and_completed = completed
            .with_owner(Some(caller.user_id().clone()))
            .with_claimed(Some(now));
        let unclaimed_states = [TaskState::Ready, TaskState::ReadyForReview];
        written.extend(write_batch(
            &self.ports,
            &unclaimed,
            &claimed_and_completed,
            Some(unclaimed_states.as_slice()),
            &mut result,
        )?);
        record_batch_events(
            &self.ports,
            TaskEventKind::Completed,
            caller.user_id(),
            before,
            &written,
        )?;
        info!(completed = written.len(), failed = result.len(), force, "completed tasks");
        Ok(result)
    }

    fn delete_many(
        &self,
        requested: &[TaskId],
        force: bool,
    ) -> TaskResult<BulkResult<TaskId, TaskError>> {
        let caller = self.ports.current_caller();
        require_admin(&caller)?;
        let mut result = BulkResult::new();
        let ids = dedupe(requested);
        if ids.is_empty() {
            return Ok(result);
        }

        let found: BTreeMap<TaskId, MinimalTask> = self
            .ports
            .store
            .find_minimal(&ids)?
            .into_iter()
            .map(|task| (task.id, task))
            .collect();
        let mut survivors = Vec::new();
        for id in &ids {
            match found.get(id) {
                None => result.add_error(*id, TaskError::NotFound(NotFoundTarget::Task(*id))),
                Some(task) => match deletion_error(task, force) {
                    Some(error) => result.add_error(*id, error),
                    None => survivors.push(*id),
                },
            }
        }
        if survivors.is_empty() {
            return Ok(result);
        }

        let removed = delete_guarded(self.ports.store.as_ref(), &survivors, force)?;
        if removed.len() < survivors.len() {
            let removed_ids: BTreeSet<TaskId> = removed.iter().copied().collect();
            let kept: Vec<TaskId> = survivors
                .iter()
                .copied()
                .filter(|id| !removed_ids.contains(id))
                .collect();
            for (id, error) in explain_kept(self.ports.store.as_ref(), &kept, force)? {
                result.add_error(id, error);
            }
            warn!(expected = survivors.len(), deleted = removed.len(), "batched delete fell short");
        }
        info!(deleted = removed.len(), failed = result.len(), force, "deleted tasks");
        Ok(result)
    }
}

/// States a task may be deleted from.
const fn deletable_states(force: bool) -> Option<&'static [TaskState]> {
    if force {
        None
    } else {
        Some(&[TaskState::Completed])
    }
}

/// Why `task` may not be deleted, if it may not.
pub(super) fn deletion_error(task: &MinimalTask, force: bool) -> Option<TaskError> {
    if task.callback_state == CallbackState::CallbackProcessingRequired {
        return Some(TaskError::InvalidCallbackState {
            task_id: task.id,
            callback_state: task.callback_state,
            allowed: vec![
                CallbackState::None,
                CallbackState::Claimed,
                CallbackState::CallbackProcessingCompleted,
            ],
        });
    }
    if deletable_states(force).is_some_and(|states| !states.contains(&task.state)) {
        return Some(TaskError::InvalidState {
            task_id: task.id,
            state: task.state,
            allowed: vec![TaskState::Completed],
        });
    }
    None
}

/// Deletes the task rows that are still deletable, then the children of
/// exactly those rows. Returns the removed ids.
pub(super) fn delete_guarded(
    store: &dyn TaskStore,
    ids: &[TaskId],
    force: bool,
) -> TaskResult<Vec<TaskId>> {
    let removed = store.delete_many(
        ids,
        deletable_states(force),
        CallbackState::CallbackProcessingRequired,
    )?;
    if !removed.is_empty() {
        store.delete_attachments_of(&removed)?;
        store.delete_object_references_of(&removed)?;
    }
    Ok(removed)
}

/// Re-reads tasks a guarded delete kept and blames each one.
pub(super) fn explain_kept(
    store: &dyn TaskStore,
    kept: &[TaskId],
    force: bool,
) -> TaskResult<Vec<(TaskId, TaskError)>> {
    let rows: BTreeMap<TaskId, MinimalTask> = store
        .find_minimal(kept)?
        .into_iter()
        .map(|task| (task.id, task))
        .collect();
    Ok(kept
        .iter()
        .map(|id| {
            let error = match rows.get(id) {
                None => TaskError::NotFound(NotFoundTarget::Task(*id)),
                Some(row) => deletion_error(row, force).unwrap_or(TaskError::Concurrency(*id)),
            };
            (*id, error)
        })
        .collect())
}

fn parse_custom_fields(
    fields: &BTreeMap<String, Option<String>>,
) -> TaskResult<BTreeMap<CustomField, Option<String>>> {
    if fields.is_empty() {
        return Err(TaskError::InvalidArgument(
            "at least one custom field must be given".to_owned(),
        ));
    }
    fields
        .iter()
        .map(|(key, value)| -> TaskResult<(CustomField, Option<String>)> {
            Ok((key.parse::<CustomField>()?, value.clone()))
        })
        .collect()
}
