//! Single-task lifecycle operations: create, read, claim, complete,
//! update and delete.

use super::bulk::{delete_guarded, explain_kept};
use super::context::{TaskPorts, WorkbasketRef};
use super::error::{NotFoundTarget, TaskError, TaskResult};
use super::query::authorised_plan;
use super::service_level::ServiceLevelResolver;
use super::synchronizer::{
    AttachmentSynchronizer, ObjectReferenceSynchronizer, first_failure, plan_attachments,
    plan_object_references, resolve_attachment_classifications,
};
use crate::task::{
    domain::{
        AccessId, Attachment, BulkResult, CallbackState, ClassificationId, ClassificationSummary,
        CompletionOutcome, CustomField, CustomIntField, ExternalId, NewTaskData, ObjectReference,
        SecondaryObjectReference, Task, TaskId, TaskState, TaskSummary, TaskVersion,
    },
    ports::{Caller, Role, TaskEventKind, WorkbasketPermission},
    query::TaskQuery,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    workbasket: WorkbasketRef,
    classification_key: String,
    primary_object_reference: ObjectReference,
    external_id: Option<ExternalId>,
    business_process_id: Option<String>,
    parent_business_process_id: Option<String>,
    name: Option<String>,
    note: Option<String>,
    owner: Option<AccessId>,
    planned: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
    received: Option<DateTime<Utc>>,
    callback_state: CallbackState,
    callback_info: BTreeMap<String, String>,
    custom: BTreeMap<CustomField, String>,
    custom_int: BTreeMap<CustomIntField, i32>,
    custom_attributes: BTreeMap<String, String>,
    attachments: Vec<Attachment>,
    secondary_object_references: Vec<ObjectReference>,
}

impl CreateTaskRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(
        workbasket: impl Into<WorkbasketRef>,
        classification_key: impl Into<String>,
        primary_object_reference: ObjectReference,
    ) -> Self {
        Self {
            workbasket: workbasket.into(),
            classification_key: classification_key.into(),
            primary_object_reference,
            external_id: None,
            business_process_id: None,
            parent_business_process_id: None,
            name: None,
            note: None,
            owner: None,
            planned: None,
            due: None,
            received: None,
            callback_state: CallbackState::None,
            callback_info: BTreeMap::new(),
            custom: BTreeMap::new(),
            custom_int: BTreeMap::new(),
            custom_attributes: BTreeMap::new(),
            attachments: Vec::new(),
            secondary_object_references: Vec::new(),
        }
    }

    /// Sets the external identifier instead of generating one.
    #[must_use]
    pub fn with_external_id(mut self, external_id: ExternalId) -> Self {
        self.external_id = Some(external_id);
        self
    }

    /// Sets the business process identifier instead of generating one.
    #[must_use]
    pub fn with_business_process_id(mut self, id: impl Into<String>) -> Self {
        self.business_process_id = Some(id.into());
        self
    }

    /// Sets the parent business process identifier.
    #[must_use]
    pub fn with_parent_business_process_id(mut self, id: impl Into<String>) -> Self {
        self.parent_business_process_id = Some(id.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Sets the initial owner.
    #[must_use]
    pub fn with_owner(mut self, owner: AccessId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets the planned start.
    #[must_use]
    pub fn with_planned(mut self, planned: DateTime<Utc>) -> Self {
        self.planned = Some(planned);
        self
    }

    /// Sets the due date.
    #[must_use]
    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due = Some(due);
        self
    }

    /// Sets the receive timestamp.
    #[must_use]
    pub fn with_received(mut self, received: DateTime<Utc>) -> Self {
        self.received = Some(received);
        self
    }

    /// Sets the initial callback state.
    #[must_use]
    pub fn with_callback_state(mut self, callback_state: CallbackState) -> Self {
        self.callback_state = callback_state;
        self
    }

    /// Adds a callback routing entry.
    #[must_use]
    pub fn with_callback_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.callback_info.insert(key.into(), value.into());
        self
    }

    /// Sets a custom text field.
    #[must_use]
    pub fn with_custom_field(mut self, field: CustomField, value: impl Into<String>) -> Self {
        self.custom.insert(field, value.into());
        self
    }

    /// Sets a custom integer field.
    #[must_use]
    pub fn with_custom_int_field(mut self, field: CustomIntField, value: i32) -> Self {
        self.custom_int.insert(field, value);
        self
    }

    /// Adds a free-form attribute.
    #[must_use]
    pub fn with_custom_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Adds an attachment; only its classification key needs to be set.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Adds a secondary object reference.
    #[must_use]
    pub fn with_secondary_object_reference(mut self, reference: ObjectReference) -> Self {
        self.secondary_object_references.push(reference);
        self
    }
}

/// Task lifecycle orchestration service.
///
/// Bulk variants of the operations live in the `bulk` module and
/// transfers in [`super::TaskTransferService`].
#[derive(Clone)]
pub struct TaskLifecycleService {
    pub(super) ports: TaskPorts,
    pub(super) resolver: ServiceLevelResolver,
}

impl TaskLifecycleService {
    /// Creates a new task lifecycle service.
    #[must_use]
    pub fn new(ports: TaskPorts) -> Self {
        let resolver = ServiceLevelResolver::new(ports.clone());
        Self { ports, resolver }
    }

    /// Returns the service-level resolver backing this service.
    #[must_use]
    pub const fn resolver(&self) -> &ServiceLevelResolver {
        &self.resolver
    }

    /// Creates a task in state `Ready` together with its attachments and
    /// secondary references.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] for an unknown or retired workbasket
    /// or classification, [`TaskError::NotAuthorized`] without `Append` on
    /// the workbasket, [`TaskError::InvalidArgument`] for malformed input
    /// and [`TaskError::AlreadyExists`] for a taken external identifier.
    pub fn create_task(&self, request: CreateTaskRequest) -> TaskResult<Task> {
        let caller = self.ports.current_caller();
        let workbasket = self.ports.resolve_workbasket(&request.workbasket)?;
        if workbasket.marked_for_deletion {
            return Err(TaskError::NotFound(NotFoundTarget::Workbasket(
                request.workbasket.to_string(),
            )));
        }
        self.ports
            .require_permission(&caller, &workbasket.summary.id, WorkbasketPermission::Append)?;
        request
            .primary_object_reference
            .validate("primary object reference")?;

        let domain = workbasket.summary.domain.clone();
        let classification = self
            .ports
            .classifications
            .find_by_key(&request.classification_key, &domain)?
            .ok_or_else(|| {
                TaskError::NotFound(NotFoundTarget::Classification(format!(
                    "{}@{domain}",
                    request.classification_key
                )))
            })?;

        let config = &self.ports.config;
        let now = self.ports.now();
        let data = NewTaskData {
            external_id: request
                .external_id
                .unwrap_or_else(|| ExternalId::generate(&config.external_id_prefix)),
            workbasket: workbasket.summary,
            classification,
            primary_object_reference: request.primary_object_reference,
            business_process_id: request.business_process_id.unwrap_or_else(|| {
                format!("{}{}", config.business_process_id_prefix, Uuid::new_v4())
            }),
            parent_business_process_id: request.parent_business_process_id,
            name: request.name,
            note: request.note,
            owner: request.owner,
            creator: Some(caller.user_id().clone()),
            planned: request.planned,
            due: request.due,
            received: request.received,
            callback_state: request.callback_state,
            callback_info: request.callback_info,
            custom: request.custom,
            custom_int: request.custom_int,
            custom_attributes: request.custom_attributes,
            attachments: request.attachments,
            secondary_object_references: request
                .secondary_object_references
                .into_iter()
                .map(SecondaryObjectReference::new)
                .collect(),
        };
        let mut task = Task::new(data, now);
        resolve_attachment_classifications(
            self.ports.classifications.as_ref(),
            &config.master_domain,
            &mut task,
        )?;
        self.resolver.apply(&mut task, None, now)?;

        self.ports.store.insert(&task)?;
        if let Err(err) = self.insert_children(&task) {
            warn!(task_id = %task.id(), error = %err, "rolling back task creation");
            self.remove_task_rows(task.id())?;
            return Err(err);
        }

        info!(task_id = %task.id(), external_id = %task.external_id(), "created task");
        self.ports
            .record_event(TaskEventKind::Created, caller.user_id(), None, &task);
        Ok(task)
    }

    /// Loads a task with freshly resolved classifications.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] for an unknown task and
    /// [`TaskError::NotAuthorized`] without `Read` on its workbasket.
    pub fn get_task(&self, id: TaskId) -> TaskResult<Task> {
        let caller = self.ports.current_caller();
        let mut task = self.load_authorised(&caller, id)?;
        self.hydrate(&mut task)?;
        Ok(task)
    }

    /// Claims a task for the caller.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidOwner`] when someone else holds the
    /// claim, [`TaskError::InvalidState`] for a completed task and
    /// [`TaskError::Concurrency`] when the task changed meanwhile.
    pub fn claim(&self, id: TaskId) -> TaskResult<Task> {
        self.claim_task(id, false)
    }

    /// Claims a task for the caller, taking over any existing claim.
    ///
    /// # Errors
    ///
    /// See [`Self::claim`]; ownership conflicts do not apply.
    pub fn force_claim(&self, id: TaskId) -> TaskResult<Task> {
        self.claim_task(id, true)
    }

    /// Releases the caller's claim.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidOwner`] when the caller does not own the
    /// task and [`TaskError::InvalidState`] for a completed task.
    pub fn cancel_claim(&self, id: TaskId) -> TaskResult<Task> {
        self.cancel_claim_task(id, false)
    }

    /// Releases any claim on the task.
    ///
    /// # Errors
    ///
    /// See [`Self::cancel_claim`]; ownership conflicts do not apply.
    pub fn force_cancel_claim(&self, id: TaskId) -> TaskResult<Task> {
        self.cancel_claim_task(id, true)
    }

    /// Completes a task claimed by the caller. Completing a completed task
    /// returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidState`] for an unclaimed task and
    /// [`TaskError::InvalidOwner`] when the caller does not own it.
    pub fn complete(&self, id: TaskId) -> TaskResult<Task> {
        self.complete_task(id, false)
    }

    /// Completes a task regardless of ownership, claiming it first when
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] or [`TaskError::Concurrency`].
    pub fn force_complete(&self, id: TaskId) -> TaskResult<Task> {
        self.complete_task(id, true)
    }

    /// Marks a task as read or unread.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`], [`TaskError::NotAuthorized`] or
    /// [`TaskError::Concurrency`].
    pub fn set_task_read(&self, id: TaskId, read: bool) -> TaskResult<Task> {
        let caller = self.ports.current_caller();
        let mut task = self.load_authorised(&caller, id)?;
        let expected = task.version();
        task.set_read(read, self.ports.now());
        self.write(&task, &expected)?;
        debug!(task_id = %id, read, "updated read flag");
        Ok(task)
    }

    /// Persists changes made to a task the caller read earlier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Concurrency`] when `task` is stale,
    /// [`TaskError::InvalidArgument`] for a changed external identifier or
    /// workbasket, a malformed reference or inconsistent planned and due
    /// dates, and [`TaskError::InvalidState`] for an owner change outside
    /// state `Ready`.
    pub fn update_task(&self, mut task: Task) -> TaskResult<Task> {
        let caller = self.ports.current_caller();
        let persisted = self.load_authorised(&caller, task.id())?;
        if task.version() != persisted.version() {
            warn!(task_id = %task.id(), "rejected update of stale task");
            return Err(TaskError::Concurrency(task.id()));
        }
        if task.external_id() != persisted.external_id() {
            return Err(TaskError::InvalidArgument(format!(
                "external id of task {} cannot change",
                task.id()
            )));
        }
        if task.workbasket().id != persisted.workbasket().id {
            return Err(TaskError::InvalidArgument(format!(
                "task {} changes workbasket through transfer only",
                task.id()
            )));
        }
        task.primary_object_reference()
            .validate("primary object reference")?;
        if task.owner() != persisted.owner() && persisted.state() != TaskState::Ready {
            return Err(TaskError::InvalidState {
                task_id: task.id(),
                state: persisted.state(),
                allowed: vec![TaskState::Ready],
            });
        }

        let domain = task.workbasket().domain.clone();
        if !task
            .classification()
            .same_classification(persisted.classification())
        {
            let key = task.classification().key.clone();
            let classification = self
                .ports
                .classifications
                .find_by_key(&key, &domain)?
                .ok_or_else(|| {
                    TaskError::NotFound(NotFoundTarget::Classification(format!("{key}@{domain}")))
                })?;
            task.set_classification(classification);
        }
        resolve_attachment_classifications(
            self.ports.classifications.as_ref(),
            &self.ports.config.master_domain,
            &mut task,
        )?;

        let now = self.ports.now();
        self.resolver.apply(&mut task, Some(&persisted), now)?;
        task.touch(now);

        let attachment_diff = plan_attachments(persisted.attachments(), &mut task)?;
        let reference_diff =
            plan_object_references(persisted.secondary_object_references(), &mut task)?;

        self.write(&task, &persisted.version())?;

        let store = self.ports.store.as_ref();
        let attachments = AttachmentSynchronizer::new(store);
        let references = ObjectReferenceSynchronizer::new(store);
        let mut attachment_failures = BulkResult::new();
        let mut reference_failures = BulkResult::new();
        let failure = attachments
            .apply(&attachment_diff, &mut task, now, &mut attachment_failures)
            .and_then(|()| references.apply(&reference_diff, &task, &mut reference_failures))
            .err()
            .or_else(|| first_failure(&attachment_failures))
            .or_else(|| first_failure(&reference_failures));
        if let Some(err) = failure {
            warn!(task_id = %task.id(), error = %err, "reverting partial task update");
            let children = attachments
                .revert(&attachment_diff, persisted.attachments(), &attachment_failures)
                .and(references.revert(
                    &reference_diff,
                    persisted.secondary_object_references(),
                    &reference_failures,
                ));
            if let Err(undo) = children {
                warn!(task_id = %task.id(), error = %undo, "cannot restore task children");
            }
            if let Err(undo) = store.update(&persisted, &task.version()) {
                warn!(task_id = %task.id(), error = %undo, "cannot restore task row");
            }
            return Err(err);
        }

        info!(task_id = %task.id(), "updated task");
        let before = self
            .ports
            .history_enabled()
            .then(|| TaskSummary::from(&persisted));
        self.ports
            .record_event(TaskEventKind::Updated, caller.user_id(), before, &task);
        Ok(task)
    }

    /// Deletes a completed task with its children.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotAuthorized`] without the admin role,
    /// [`TaskError::InvalidState`] for a task that is not completed and
    /// [`TaskError::InvalidCallbackState`] while a callback is pending.
    pub fn delete_task(&self, id: TaskId) -> TaskResult<()> {
        self.delete_single(id, false)
    }

    /// Deletes a task in any state with its children.
    ///
    /// # Errors
    ///
    /// As [`Self::delete_task`], without the state check.
    pub fn force_delete_task(&self, id: TaskId) -> TaskResult<()> {
        self.delete_single(id, true)
    }

    /// Claims the first task matching `query` for the caller.
    ///
    /// The candidate row is locked while it is claimed, so concurrent
    /// callers never receive the same task. Returns `None` when nothing
    /// claimable matches.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidArgument`] for an invalid query and the
    /// authorisation errors of the query service.
    pub fn select_and_claim(&self, query: &TaskQuery) -> TaskResult<Option<Task>> {
        let caller = self.ports.current_caller();
        let plan = authorised_plan(&self.ports, &caller, query)?;
        let now = self.ports.now();
        let Some(task) = self.ports.store.claim_first(&plan, caller.user_id(), now)? else {
            debug!(user_id = %caller.user_id(), "no claimable task matched");
            return Ok(None);
        };
        info!(task_id = %task.id(), owner = %caller.user_id(), "selected and claimed task");
        if self.ports.history_enabled() {
            let mut before = TaskSummary::from(&task);
            before.state = task.state().after_cancel_claim();
            before.owner = None;
            before.claimed = None;
            self.ports
                .record_event(TaskEventKind::Claimed, caller.user_id(), Some(before), &task);
        }
        Ok(Some(task))
    }

    fn claim_task(&self, id: TaskId, force: bool) -> TaskResult<Task> {
        let caller = self.ports.current_caller();
        let mut task = self.load_authorised(&caller, id)?;
        let expected = task.version();
        let before = self.ports.history_enabled().then(|| TaskSummary::from(&task));
        task.claim(caller.user_id(), force, self.ports.now())?;
        self.write(&task, &expected)?;
        info!(task_id = %id, owner = %caller.user_id(), force, "claimed task");
        self.ports
            .record_event(TaskEventKind::Claimed, caller.user_id(), before, &task);
        Ok(task)
    }

    fn cancel_claim_task(&self, id: TaskId, force: bool) -> TaskResult<Task> {
        let caller = self.ports.current_caller();
        let mut task = self.load_authorised(&caller, id)?;
        let expected = task.version();
        let before = self.ports.history_enabled().then(|| TaskSummary::from(&task));
        task.cancel_claim(caller.user_id(), force, self.ports.now())?;
        self.write(&task, &expected)?;
        info!(task_id = %id, force, "cancelled claim");
        self.ports
            .record_event(TaskEventKind::ClaimCancelled, caller.user_id(), before, &task);
        Ok(task)
    }

    fn complete_task(&self, id: TaskId, force: bool) -> TaskResult<Task> {
        let caller = self.ports.current_caller();
        let mut task = self.load_authorised(&caller, id)?;
        let expected = task.version();
        let before = self.ports.history_enabled().then(|| TaskSummary::from(&task));
        let outcome = task.complete(
            caller.user_id(),
            &caller.access_ids(),
            force,
            self.ports.now(),
        )?;
        match outcome {
            CompletionOutcome::AlreadyCompleted => {
                debug!(task_id = %id, "task already completed");
            }
            CompletionOutcome::Completed { implicitly_claimed } => {
                self.write(&task, &expected)?;
                info!(task_id = %id, implicitly_claimed, "completed task");
                self.ports
                    .record_event(TaskEventKind::Completed, caller.user_id(), before, &task);
            }
        }
        Ok(task)
    }

    fn delete_single(&self, id: TaskId, force: bool) -> TaskResult<()> {
        let caller = self.ports.current_caller();
        require_admin(&caller)?;
        let task = self
            .ports
            .store
            .find_by_id(id)?
            .ok_or(TaskError::NotFound(NotFoundTarget::Task(id)))?;
        task.ensure_deletable(force)?;
        let store = self.ports.store.as_ref();
        if delete_guarded(store, &[id], force)?.is_empty() {
            let blamed = explain_kept(store, &[id], force)?.into_iter().next();
            warn!(task_id = %id, "task changed before deletion");
            return Err(blamed.map_or(TaskError::Concurrency(id), |(_, error)| error));
        }
        info!(task_id = %id, force, "deleted task");
        Ok(())
    }

    /// Loads a task the caller may read.
    pub(super) fn load_authorised(&self, caller: &Caller, id: TaskId) -> TaskResult<Task> {
        let task = self
            .ports
            .store
            .find_by_id(id)?
            .ok_or(TaskError::NotFound(NotFoundTarget::Task(id)))?;
        if !caller.is_task_admin() {
            self.ports
                .require_permission(caller, &task.workbasket().id, WorkbasketPermission::Read)?;
        }
        Ok(task)
    }

    /// Conditionally writes the task row, mapping a lost race to
    /// [`TaskError::Concurrency`].
    fn write(&self, task: &Task, expected: &TaskVersion) -> TaskResult<()> {
        if self.ports.store.update(task, expected)? {
            Ok(())
        } else {
            warn!(task_id = %task.id(), "task changed concurrently");
            Err(TaskError::Concurrency(task.id()))
        }
    }

    fn insert_children(&self, task: &Task) -> TaskResult<()> {
        let store = self.ports.store.as_ref();
        let attachment_failures = AttachmentSynchronizer::new(store).insert_all(task);
        let reference_failures = ObjectReferenceSynchronizer::new(store).insert_all(task);
        match first_failure(&attachment_failures).or_else(|| first_failure(&reference_failures)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Removes a freshly created task row and its children.
    fn remove_task_rows(&self, id: TaskId) -> TaskResult<()> {
        let store = self.ports.store.as_ref();
        store.delete_attachments_of(&[id])?;
        store.delete_object_references_of(&[id])?;
        store.delete(id)?;
        Ok(())
    }

    /// Replaces stored classification views with the current records.
    fn hydrate(&self, task: &mut Task) -> TaskResult<()> {
        let mut wanted: Vec<ClassificationId> = task.classification().id.iter().cloned().collect();
        wanted.extend(
            task.attachments()
                .iter()
                .filter_map(|attachment| attachment.classification().id.clone()),
        );
        wanted.sort();
        wanted.dedup();
        if wanted.is_empty() {
            return Ok(());
        }
        let known: BTreeMap<ClassificationId, ClassificationSummary> = self
            .ports
            .classifications
            .find_by_ids(&wanted)?
            .into_iter()
            .filter_map(|classification| classification.id.clone().map(|id| (id, classification)))
            .collect();
        if let Some(current) = task
            .classification()
            .id
            .as_ref()
            .and_then(|id| known.get(id))
        {
            task.set_classification(current.clone());
        }
        for attachment in task.attachments_mut() {
            if let Some(current) = attachment
                .classification()
                .id
                .as_ref()
                .and_then(|id| known.get(id))
            {
                attachment.set_classification(current.clone());
            }
        }
        Ok(())
    }
}

/// Rejects callers without the admin role.
pub(super) fn require_admin(caller: &Caller) -> TaskResult<()> {
    if caller.has_any_role(&[Role::Admin]) {
        Ok(())
    } else {
        Err(TaskError::not_authorized(caller.user_id(), "task deletion", "ADMIN"))
    }
}
