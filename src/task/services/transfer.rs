//! Moving tasks between workbaskets, on request or by routing.

use super::bulk::{record_batch_events, snapshot, write_batch};
use super::context::{TaskPorts, WorkbasketRef};
use super::error::{NotFoundTarget, TaskError, TaskResult};
use super::service_level::dedupe;
use crate::task::{
    domain::{AccessId, BulkResult, Task, TaskId, TaskState, TaskSummary, WorkbasketId},
    ports::{Caller, TaskEventKind, TaskPatch, Workbasket, WorkbasketPermission},
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Task transfer and reroute service.
#[derive(Clone)]
pub struct TaskTransferService {
    ports: TaskPorts,
}

/// Candidate of a bulk move: identifier, current state and workbasket.
struct Candidate {
    id: TaskId,
    state: TaskState,
    source: WorkbasketId,
}

impl TaskTransferService {
    /// Creates a transfer service over the shared ports.
    #[must_use]
    pub const fn new(ports: TaskPorts) -> Self {
        Self { ports }
    }

    /// Moves one task to `destination`.
    ///
    /// The owner is cleared unless `owner` is given. With
    /// `set_transfer_flag` unset the task keeps its transferred flag.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] for an unknown task or destination,
    /// [`TaskError::NotAuthorized`] without `Append` on the destination or
    /// `Transfer` on the source, and [`TaskError::InvalidState`] for a
    /// completed task.
    pub fn transfer(
        &self,
        task_id: TaskId,
        destination: &WorkbasketRef,
        owner: Option<AccessId>,
        set_transfer_flag: bool,
    ) -> TaskResult<Task> {
        let caller = self.ports.current_caller();
        let target = self.destination(&caller, destination)?;
        let task = self.load_movable(&caller, task_id)?;
        let moved = self.move_task(
            &caller,
            task,
            &target,
            owner,
            set_transfer_flag,
            TaskEventKind::Transferred,
        )?;
        info!(task_id = %task_id, destination = %target.summary.id, "transferred task");
        Ok(moved)
    }

    /// Moves the listed tasks to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] for an unknown destination and
    /// [`TaskError::NotAuthorized`] without `Append` on it; item failures
    /// are reported in the [`BulkResult`].
    pub fn transfer_tasks(
        &self,
        destination: &WorkbasketRef,
        requested: &[TaskId],
        owner: Option<AccessId>,
    ) -> TaskResult<BulkResult<TaskId, TaskError>> {
        let caller = self.ports.current_caller();
        let target = self.destination(&caller, destination)?;
        let mut result = BulkResult::new();
        let ids = dedupe(requested);
        if ids.is_empty() {
            return Ok(result);
        }

        let found: BTreeMap<TaskId, Candidate> = self
            .ports
            .store
            .find_minimal(&ids)?
            .into_iter()
            .map(|task| {
                (
                    task.id,
                    Candidate {
                        id: task.id,
                        state: task.state,
                        source: task.workbasket_id,
                    },
                )
            })
            .collect();
        let mut candidates = Vec::new();
        for id in &ids {
            match found.get(id) {
                None => result.add_error(*id, TaskError::NotFound(NotFoundTarget::Task(*id))),
                Some(candidate) => candidates.push(candidate),
            }
        }
        let movable = self.movable(&caller, candidates, &mut result)?;
        let written = self.write_moves(
            &caller,
            &movable,
            &target,
            owner,
            TaskEventKind::Transferred,
            &mut result,
        )?;
        info!(
            destination = %target.summary.id,
            transferred = written,
            failed = result.len(),
            "transferred tasks"
        );
        Ok(result)
    }

    /// Moves one task to the workbasket its routing rule names.
    ///
    /// A task without a route, or already in the routed workbasket, is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// As [`Self::transfer`].
    pub fn reroute(&self, task_id: TaskId) -> TaskResult<Task> {
        let caller = self.ports.current_caller();
        let task = self.load_movable(&caller, task_id)?;
        let Some(target) = self.ports.router.route(&task) else {
            debug!(task_id = %task_id, "no route for task");
            return Ok(task);
        };
        if target == task.workbasket().id {
            debug!(task_id = %task_id, "task already in routed workbasket");
            return Ok(task);
        }
        let destination = self.destination(&caller, &WorkbasketRef::Id(target))?;
        let moved = self.move_task(
            &caller,
            task,
            &destination,
            None,
            true,
            TaskEventKind::Rerouted,
        )?;
        info!(task_id = %task_id, destination = %destination.summary.id, "rerouted task");
        Ok(moved)
    }

    /// Moves each listed task to the workbasket its routing rule names.
    ///
    /// Tasks without a route or already in place are skipped silently. An
    /// unusable destination only fails the tasks routed to it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] only when a store or lookup call fails.
    pub fn reroute_tasks(&self, requested: &[TaskId]) -> TaskResult<BulkResult<TaskId, TaskError>> {
        let caller = self.ports.current_caller();
        let mut result = BulkResult::new();
        let ids = dedupe(requested);
        if ids.is_empty() {
            return Ok(result);
        }

        let mut routed: BTreeMap<WorkbasketId, Vec<Candidate>> = BTreeMap::new();
        for id in &ids {
            let Some(task) = self.ports.store.find_by_id(*id)? else {
                result.add_error(*id, TaskError::NotFound(NotFoundTarget::Task(*id)));
                continue;
            };
            let Some(target) = self.ports.router.route(&task) else {
                continue;
            };
            if target == task.workbasket().id {
                continue;
            }
            routed.entry(target).or_default().push(Candidate {
                id: task.id(),
                state: task.state(),
                source: task.workbasket().id.clone(),
            });
        }

        let mut written = 0;
        for (target, group) in routed {
            let destination = match self.destination(&caller, &WorkbasketRef::Id(target)) {
                Ok(destination) => destination,
                Err(err) => {
                    for candidate in &group {
                        result.add_error(candidate.id, err.clone());
                    }
                    continue;
                }
            };
            let movable = self.movable(&caller, group.iter().collect(), &mut result)?;
            written += self.write_moves(
                &caller,
                &movable,
                &destination,
                None,
                TaskEventKind::Rerouted,
                &mut result,
            )?;
        }
        info!(rerouted = written, failed = result.len(), "rerouted tasks");
        Ok(result)
    }

    /// Resolves a destination that exists, accepts tasks and grants
    /// `Append` to the caller.
    fn destination(&self, caller: &Caller, reference: &WorkbasketRef) -> TaskResult<Workbasket> {
        let workbasket = self.ports.resolve_workbasket(reference)?;
        if workbasket.marked_for_deletion {
            return Err(TaskError::NotFound(NotFoundTarget::Workbasket(
                reference.to_string(),
            )));
        }
        if !caller.is_task_admin() {
            self.ports
                .require_permission(caller, &workbasket.summary.id, WorkbasketPermission::Append)?;
        }
        Ok(workbasket)
    }

    /// Loads a task the caller may move out of its workbasket.
    fn load_movable(&self, caller: &Caller, task_id: TaskId) -> TaskResult<Task> {
        let task = self
            .ports
            .store
            .find_by_id(task_id)?
            .ok_or(TaskError::NotFound(NotFoundTarget::Task(task_id)))?;
        if !caller.is_task_admin() {
            self.ports.require_permission(
                caller,
                &task.workbasket().id,
                WorkbasketPermission::Transfer,
            )?;
        }
        Ok(task)
    }

    fn move_task(
        &self,
        caller: &Caller,
        mut task: Task,
        destination: &Workbasket,
        owner: Option<AccessId>,
        set_transfer_flag: bool,
        kind: TaskEventKind,
    ) -> TaskResult<Task> {
        let expected = task.version();
        let before = self.ports.history_enabled().then(|| TaskSummary::from(&task));
        task.transfer(
            destination.summary.clone(),
            owner,
            set_transfer_flag,
            self.ports.now(),
        )?;
        if !self.ports.store.update(&task, &expected)? {
            return Err(TaskError::Concurrency(task.id()));
        }
        self.ports.record_event(kind, caller.user_id(), before, &task);
        Ok(task)
    }

    /// Drops completed tasks and tasks whose workbasket denies `Transfer`,
    /// checking each distinct source workbasket once.
    fn movable<'a>(
        &self,
        caller: &Caller,
        candidates: Vec<&'a Candidate>,
        result: &mut BulkResult<TaskId, TaskError>,
    ) -> TaskResult<Vec<&'a Candidate>> {
        let mut open = Vec::new();
        for candidate in candidates {
            if candidate.state.is_final() {
                result.add_error(
                    candidate.id,
                    TaskError::InvalidState {
                        task_id: candidate.id,
                        state: candidate.state,
                        allowed: TaskState::NON_FINAL.to_vec(),
                    },
                );
            } else {
                open.push(candidate);
            }
        }
        if caller.is_task_admin() || open.is_empty() {
            return Ok(open);
        }
        let sources: Vec<WorkbasketId> = open
            .iter()
            .map(|candidate| candidate.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let permitted = self.ports.workbaskets.workbaskets_with_permission(
            &caller.access_ids(),
            &sources,
            WorkbasketPermission::Transfer,
        )?;
        let (allowed, denied): (Vec<_>, Vec<_>) = open
            .into_iter()
            .partition(|candidate| permitted.contains(&candidate.source));
        for candidate in denied {
            result.add_error(
                candidate.id,
                TaskError::not_authorized(
                    caller.user_id(),
                    format!("workbasket {}", candidate.source),
                    WorkbasketPermission::Transfer,
                ),
            );
        }
        Ok(allowed)
    }

    /// Writes one batched update per post-move state and records history.
    /// Returns the number of tasks moved.
    fn write_moves(
        &self,
        caller: &Caller,
        movable: &[&Candidate],
        destination: &Workbasket,
        owner: Option<AccessId>,
        kind: TaskEventKind,
        result: &mut BulkResult<TaskId, TaskError>,
    ) -> TaskResult<usize> {
        let mut groups: BTreeMap<TaskState, Vec<TaskId>> = BTreeMap::new();
        for candidate in movable {
            groups
                .entry(candidate.state.after_transfer())
                .or_default()
                .push(candidate.id);
        }
        let ids: Vec<TaskId> = movable.iter().map(|candidate| candidate.id).collect();
        let before = snapshot(&self.ports, &ids)?;

        let now = self.ports.now();
        let mut written = Vec::new();
        for (target, group) in groups {
            let sources: Vec<TaskState> = TaskState::NON_FINAL
                .into_iter()
                .filter(|state| state.after_transfer() == target)
                .collect();
            let patch = TaskPatch::new(now)
                .with_state(target)
                .with_workbasket(destination.summary.clone())
                .with_owner(owner.clone())
                .with_claimed(None)
                .with_read(false)
                .with_transferred(true);
            written.extend(write_batch(
                &self.ports,
                &group,
                &patch,
                Some(sources.as_slice()),
                result,
            )?);
        }
        record_batch_events(&self.ports, kind, caller.user_id(), before, &written)?;
        Ok(written.len())
    }
}
