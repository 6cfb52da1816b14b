//! Priority, planned and due date derivation from classifications.
//!
//! A task's service level is the shortest duration among its own
//! classification and the classifications of its attachments; its priority
//! is the highest of their priorities. The whole days of the service level
//! are counted as working days between planned and due.

use super::bulk::{existing_and_readable, write_batch};
use super::context::TaskPorts;
use super::error::{TaskError, TaskResult};
use crate::task::{
    domain::{
        Attachment, BulkResult, ClassificationId, ClassificationSummary, MinimalTask,
        ServiceLevel, Task, TaskId, TaskState,
    },
    ports::TaskPatch,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Service level and priority derived for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLevelResolution {
    /// Shortest contributing service level.
    pub service_level: ServiceLevel,
    /// Highest contributing priority.
    pub priority: i32,
}

impl ServiceLevelResolution {
    /// Returns the number of working days between planned and due.
    #[must_use]
    pub fn working_days(&self) -> i64 {
        self.service_level.whole_days()
    }
}

/// Computes priorities and planned/due dates.
#[derive(Clone)]
pub struct ServiceLevelResolver {
    ports: TaskPorts,
}

impl ServiceLevelResolver {
    /// Creates a resolver over the shared ports.
    #[must_use]
    pub const fn new(ports: TaskPorts) -> Self {
        Self { ports }
    }

    /// Resolves service level and priority for `task` with one batched
    /// classification lookup.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::System`] when the task classification cannot be
    /// resolved or when no classification defines a service level.
    pub fn resolve(&self, task: &Task) -> TaskResult<ServiceLevelResolution> {
        let task_classification = task.classification().id.clone().ok_or_else(|| {
            TaskError::System(format!("task {} has no resolved classification", task.id()))
        })?;
        let mut wanted = vec![task_classification.clone()];
        wanted.extend(
            task.attachments()
                .iter()
                .filter_map(|attachment| attachment.classification().id.clone()),
        );
        let known = self.load_classifications(&wanted)?;

        let own = known.get(&task_classification).ok_or_else(|| {
            TaskError::System(format!(
                "classification {task_classification} of task {} cannot be resolved",
                task.id()
            ))
        })?;
        let attachments = task.attachments().iter().map(|attachment| {
            attachment
                .classification()
                .id
                .as_ref()
                .and_then(|id| known.get(id))
                .unwrap_or_else(|| attachment.classification())
        });
        combine(task.id(), std::iter::once(own).chain(attachments))
    }

    /// Sets priority, planned and due on a created or updated task.
    ///
    /// `previous` is the persisted task on update and `None` on create.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidArgument`] when planned and due were both
    /// changed and disagree with the service level, or any error of
    /// [`Self::resolve`].
    pub fn apply(
        &self,
        task: &mut Task,
        previous: Option<&Task>,
        now: DateTime<Utc>,
    ) -> TaskResult<()> {
        let resolution = self.resolve(task)?;
        task.set_priority(resolution.priority);
        let days = resolution.working_days();
        let calendar = &self.ports.calendar;

        let planned_changed = previous.map_or(task.planned().is_some(), |old| {
            old.planned() != task.planned()
        });
        let due_changed =
            previous.map_or(task.due().is_some(), |old| old.due() != task.due());

        match (task.planned(), task.due()) {
            (Some(planned), Some(due)) if planned_changed && due_changed => {
                let expected = calendar.add_working_days(planned, days)?;
                if expected.date_naive() != due.date_naive() {
                    return Err(TaskError::InvalidArgument(format!(
                        "due {due} does not match planned {planned} plus service level {}",
                        resolution.service_level
                    )));
                }
            }
            (_, Some(due)) if due_changed => {
                task.set_planned(Some(calendar.subtract_working_days(due, days)?));
            }
            (current, _) => {
                let planned = current.unwrap_or(now);
                task.set_planned(Some(planned));
                task.set_due(Some(calendar.add_working_days(planned, days)?));
            }
        }
        debug!(
            task_id = %task.id(),
            priority = resolution.priority,
            service_level = %resolution.service_level,
            "applied service level"
        );
        Ok(())
    }

    /// Sets `planned` on every listed task and recomputes due dates, one
    /// batched write per distinct service level.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] only when a store or lookup call fails; item
    /// failures are reported in the [`BulkResult`].
    pub fn set_planned_of_tasks(
        &self,
        planned: DateTime<Utc>,
        ids: &[TaskId],
    ) -> TaskResult<BulkResult<TaskId, TaskError>> {
        let mut result = BulkResult::new();
        let candidates = self.eligible_tasks(ids, &mut result)?;
        if candidates.is_empty() {
            return Ok(result);
        }
        let levels = self.service_levels_of(&candidates, &mut result)?;

        let mut groups: BTreeMap<ServiceLevel, Vec<TaskId>> = BTreeMap::new();
        for (id, level) in levels {
            groups.entry(level).or_default().push(id);
        }
        let now = self.ports.now();
        for (level, group) in groups {
            let Some(due) = self.group_due(planned, level, &group, &mut result) else {
                continue;
            };
            let patch = TaskPatch::new(now)
                .with_planned(Some(planned))
                .with_due(Some(due));
            write_batch(
                &self.ports,
                &group,
                &patch,
                Some(TaskState::NON_FINAL.as_slice()),
                &mut result,
            )?;
        }
        info!(
            requested = ids.len(),
            failed = result.len(),
            "set planned date of tasks"
        );
        Ok(result)
    }

    /// Recomputes the due date of each listed task from its current planned
    /// date, one batched write per planned date and service level.
    ///
    /// Tasks without a planned date are planned for now.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] only when a store or lookup call fails.
    pub fn refresh_due_dates(&self, ids: &[TaskId]) -> TaskResult<BulkResult<TaskId, TaskError>> {
        let mut result = BulkResult::new();
        let candidates = self.eligible_tasks(ids, &mut result)?;
        if candidates.is_empty() {
            return Ok(result);
        }
        let now = self.ports.now();
        let planned_by_id: BTreeMap<TaskId, DateTime<Utc>> = candidates
            .iter()
            .map(|task| (task.id, task.planned.unwrap_or(now)))
            .collect();
        let levels = self.service_levels_of(&candidates, &mut result)?;

        let mut groups: BTreeMap<(DateTime<Utc>, ServiceLevel), Vec<TaskId>> = BTreeMap::new();
        for (id, level) in levels {
            if let Some(planned) = planned_by_id.get(&id) {
                groups.entry((*planned, level)).or_default().push(id);
            }
        }
        for ((planned, level), group) in groups {
            let Some(due) = self.group_due(planned, level, &group, &mut result) else {
                continue;
            };
            let patch = TaskPatch::new(now)
                .with_planned(Some(planned))
                .with_due(Some(due));
            write_batch(
                &self.ports,
                &group,
                &patch,
                Some(TaskState::NON_FINAL.as_slice()),
                &mut result,
            )?;
        }
        info!(
            requested = ids.len(),
            failed = result.len(),
            "refreshed due dates"
        );
        Ok(result)
    }

    /// Due date shared by a group planned for `planned` under `level`.
    /// A calendar failure is recorded against every member.
    fn group_due(
        &self,
        planned: DateTime<Utc>,
        level: ServiceLevel,
        group: &[TaskId],
        result: &mut BulkResult<TaskId, TaskError>,
    ) -> Option<DateTime<Utc>> {
        match self.ports.calendar.add_working_days(planned, level.whole_days()) {
            Ok(due) => Some(due),
            Err(err) => {
                warn!(tasks = group.len(), error = %err, "cannot compute due date");
                let error = TaskError::from(err);
                for id in group {
                    result.add_error(*id, error.clone());
                }
                None
            }
        }
    }

    /// Drops unknown, completed and unauthorised tasks, recording why.
    fn eligible_tasks(
        &self,
        requested: &[TaskId],
        result: &mut BulkResult<TaskId, TaskError>,
    ) -> TaskResult<Vec<MinimalTask>> {
        let ids = dedupe(requested);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let caller = self.ports.current_caller();
        let mut candidates = Vec::new();
        for task in existing_and_readable(&self.ports, &caller, &ids, result)? {
            if task.state.is_final() {
                result.add_error(
                    task.id,
                    TaskError::InvalidState {
                        task_id: task.id,
                        state: task.state,
                        allowed: TaskState::NON_FINAL.to_vec(),
                    },
                );
            } else {
                candidates.push(task);
            }
        }
        Ok(candidates)
    }

    /// Resolves the service level of each candidate with one classification
    /// lookup covering tasks and attachments.
    fn service_levels_of(
        &self,
        candidates: &[MinimalTask],
        result: &mut BulkResult<TaskId, TaskError>,
    ) -> TaskResult<Vec<(TaskId, ServiceLevel)>> {
        let ids: Vec<TaskId> = candidates.iter().map(|task| task.id).collect();
        let mut attachments: BTreeMap<TaskId, Vec<Attachment>> = BTreeMap::new();
        for attachment in self.ports.store.find_attachments(&ids)? {
            if let Some(task_id) = attachment.task_id() {
                attachments.entry(task_id).or_default().push(attachment);
            }
        }

        let mut wanted: Vec<ClassificationId> = candidates
            .iter()
            .filter_map(|task| task.classification_id.clone())
            .collect();
        wanted.extend(
            attachments
                .values()
                .flatten()
                .filter_map(|attachment| attachment.classification().id.clone()),
        );
        let known = self.load_classifications(&wanted)?;

        let mut levels = Vec::new();
        for task in candidates {
            let lookup = task
                .classification_id
                .as_ref()
                .and_then(|id| known.get(id))
                .ok_or_else(|| {
                    TaskError::System(format!("task {} has no resolvable classification", task.id))
                });
            let own = match lookup {
                Ok(own) => own,
                Err(err) => {
                    result.add_error(task.id, err);
                    continue;
                }
            };
            let children = attachments.get(&task.id).into_iter().flatten().map(|attachment| {
                attachment
                    .classification()
                    .id
                    .as_ref()
                    .and_then(|id| known.get(id))
                    .unwrap_or_else(|| attachment.classification())
            });
            match combine(task.id, std::iter::once(own).chain(children)) {
                Ok(resolution) => levels.push((task.id, resolution.service_level)),
                Err(err) => result.add_error(task.id, err),
            }
        }
        Ok(levels)
    }

    fn load_classifications(
        &self,
        ids: &[ClassificationId],
    ) -> TaskResult<BTreeMap<ClassificationId, ClassificationSummary>> {
        let unique: Vec<ClassificationId> = ids
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(self
            .ports
            .classifications
            .find_by_ids(&unique)?
            .into_iter()
            .filter_map(|classification| {
                classification
                    .id
                    .clone()
                    .map(|id| (id, classification))
            })
            .collect())
    }
}

/// Takes the minimum service level and maximum priority.
fn combine<'a>(
    task_id: TaskId,
    classifications: impl Iterator<Item = &'a ClassificationSummary>,
) -> TaskResult<ServiceLevelResolution> {
    let mut shortest: Option<ServiceLevel> = None;
    let mut priority = i32::MIN;
    for classification in classifications {
        priority = priority.max(classification.priority);
        if let Some(level) = classification.parsed_service_level()? {
            shortest = Some(shortest.map_or(level, |current| current.min(level)));
        }
    }
    let service_level = shortest.ok_or_else(|| {
        TaskError::System(format!("no service level resolvable for task {task_id}"))
    })?;
    Ok(ServiceLevelResolution {
        service_level,
        priority,
    })
}

/// Removes repeated ids, keeping the first occurrence.
pub(crate) fn dedupe<T: Ord + Copy>(ids: &[T]) -> Vec<T> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
