//! Task aggregate root and its lifecycle transitions.

use super::{
    AccessId, Attachment, AttachmentId, CallbackState, ClassificationSummary, CustomField,
    CustomIntField, ExternalId, ObjectReference, ObjectReferenceId, SecondaryObjectReference,
    TaskDomainError, TaskId, TaskState, WorkbasketSummary,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the fields guarding optimistic concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskVersion {
    /// Last modification timestamp.
    pub modified: DateTime<Utc>,
    /// Lifecycle state.
    pub state: TaskState,
    /// Claim timestamp, if claimed.
    pub claimed: Option<DateTime<Utc>>,
}

/// Result of a completion attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The task was already completed; nothing changed.
    AlreadyCompleted,
    /// The task moved to [`TaskState::Completed`].
    Completed {
        /// Whether a forced claim was performed first.
        implicitly_claimed: bool,
    },
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    external_id: ExternalId,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    claimed: Option<DateTime<Utc>>,
    completed: Option<DateTime<Utc>>,
    planned: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
    received: Option<DateTime<Utc>>,
    name: Option<String>,
    note: Option<String>,
    priority: i32,
    state: TaskState,
    callback_state: CallbackState,
    callback_info: BTreeMap<String, String>,
    classification: ClassificationSummary,
    workbasket: WorkbasketSummary,
    business_process_id: String,
    parent_business_process_id: Option<String>,
    owner: Option<AccessId>,
    creator: Option<AccessId>,
    primary_object_reference: ObjectReference,
    read: bool,
    transferred: bool,
    custom: BTreeMap<CustomField, String>,
    custom_int: BTreeMap<CustomIntField, i32>,
    custom_attributes: BTreeMap<String, String>,
    attachments: Vec<Attachment>,
    secondary_object_references: Vec<SecondaryObjectReference>,
}

/// Parameter object for creating a new task from resolved inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskData {
    /// Unique caller-visible identifier.
    pub external_id: ExternalId,
    /// Workbasket the task is created in.
    pub workbasket: WorkbasketSummary,
    /// Resolved task classification.
    pub classification: ClassificationSummary,
    /// Primary business object.
    pub primary_object_reference: ObjectReference,
    /// Business process identifier.
    pub business_process_id: String,
    /// Parent business process identifier.
    pub parent_business_process_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// Initial owner.
    pub owner: Option<AccessId>,
    /// Creating user.
    pub creator: Option<AccessId>,
    /// Planned start.
    pub planned: Option<DateTime<Utc>>,
    /// Due date.
    pub due: Option<DateTime<Utc>>,
    /// Time the underlying work arrived.
    pub received: Option<DateTime<Utc>>,
    /// Callback handshake state.
    pub callback_state: CallbackState,
    /// Callback routing data.
    pub callback_info: BTreeMap<String, String>,
    /// Custom text fields.
    pub custom: BTreeMap<CustomField, String>,
    /// Custom integer fields.
    pub custom_int: BTreeMap<CustomIntField, i32>,
    /// Free-form attributes.
    pub custom_attributes: BTreeMap<String, String>,
    /// Initial attachments.
    pub attachments: Vec<Attachment>,
    /// Initial secondary object references.
    pub secondary_object_references: Vec<SecondaryObjectReference>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted external identifier.
    pub external_id: ExternalId,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last modification timestamp.
    pub modified: DateTime<Utc>,
    /// Claim timestamp.
    pub claimed: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed: Option<DateTime<Utc>>,
    /// Planned start.
    pub planned: Option<DateTime<Utc>>,
    /// Due date.
    pub due: Option<DateTime<Utc>>,
    /// Receive timestamp.
    pub received: Option<DateTime<Utc>>,
    /// Display name.
    pub name: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// Priority.
    pub priority: i32,
    /// Lifecycle state.
    pub state: TaskState,
    /// Callback handshake state.
    pub callback_state: CallbackState,
    /// Callback routing data.
    pub callback_info: BTreeMap<String, String>,
    /// Stored classification view.
    pub classification: ClassificationSummary,
    /// Workbasket summary.
    pub workbasket: WorkbasketSummary,
    /// Business process identifier.
    pub business_process_id: String,
    /// Parent business process identifier.
    pub parent_business_process_id: Option<String>,
    /// Current owner.
    pub owner: Option<AccessId>,
    /// Creating user.
    pub creator: Option<AccessId>,
    /// Primary business object.
    pub primary_object_reference: ObjectReference,
    /// Read flag.
    pub read: bool,
    /// Transferred flag.
    pub transferred: bool,
    /// Custom text fields.
    pub custom: BTreeMap<CustomField, String>,
    /// Custom integer fields.
    pub custom_int: BTreeMap<CustomIntField, i32>,
    /// Free-form attributes.
    pub custom_attributes: BTreeMap<String, String>,
    /// Persisted attachments.
    pub attachments: Vec<Attachment>,
    /// Persisted secondary object references.
    pub secondary_object_references: Vec<SecondaryObjectReference>,
}

impl Task {
    /// Creates a task in state [`TaskState::Ready`].
    #[must_use]
    pub fn new(data: NewTaskData, now: DateTime<Utc>) -> Self {
        let id = TaskId::new();
        let mut task = Self {
            id,
            external_id: data.external_id,
            created: now,
            modified: now,
            claimed: None,
            completed: None,
            planned: data.planned,
            due: data.due,
            received: data.received,
            name: data.name,
            note: data.note,
            priority: data.classification.priority,
            state: TaskState::Ready,
            callback_state: data.callback_state,
            callback_info: data.callback_info,
            classification: data.classification,
            workbasket: data.workbasket,
            business_process_id: data.business_process_id,
            parent_business_process_id: data.parent_business_process_id,
            owner: data.owner,
            creator: data.creator,
            primary_object_reference: data.primary_object_reference,
            read: false,
            transferred: false,
            custom: data.custom,
            custom_int: data.custom_int,
            custom_attributes: data.custom_attributes,
            attachments: data.attachments,
            secondary_object_references: data.secondary_object_references,
        };
        task.adopt_children();
        task
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            external_id: data.external_id,
            created: data.created,
            modified: data.modified,
            claimed: data.claimed,
            completed: data.completed,
            planned: data.planned,
            due: data.due,
            received: data.received,
            name: data.name,
            note: data.note,
            priority: data.priority,
            state: data.state,
            callback_state: data.callback_state,
            callback_info: data.callback_info,
            classification: data.classification,
            workbasket: data.workbasket,
            business_process_id: data.business_process_id,
            parent_business_process_id: data.parent_business_process_id,
            owner: data.owner,
            creator: data.creator,
            primary_object_reference: data.primary_object_reference,
            read: data.read,
            transferred: data.transferred,
            custom: data.custom,
            custom_int: data.custom_int,
            custom_attributes: data.custom_attributes,
            attachments: data.attachments,
            secondary_object_references: data.secondary_object_references,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the external identifier.
    #[must_use]
    pub const fn external_id(&self) -> &ExternalId {
        &self.external_id
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Returns the last modification timestamp.
    #[must_use]
    pub const fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Returns the claim timestamp.
    #[must_use]
    pub const fn claimed(&self) -> Option<DateTime<Utc>> {
        self.claimed
    }

    /// Returns the completion timestamp.
    #[must_use]
    pub const fn completed(&self) -> Option<DateTime<Utc>> {
        self.completed
    }

    /// Returns the planned start.
    #[must_use]
    pub const fn planned(&self) -> Option<DateTime<Utc>> {
        self.planned
    }

    /// Returns the due date.
    #[must_use]
    pub const fn due(&self) -> Option<DateTime<Utc>> {
        self.due
    }

    /// Returns the receive timestamp.
    #[must_use]
    pub const fn received(&self) -> Option<DateTime<Utc>> {
        self.received
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the note.
    #[must_use]
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Returns the callback handshake state.
    #[must_use]
    pub const fn callback_state(&self) -> CallbackState {
        self.callback_state
    }

    /// Returns the callback routing data.
    #[must_use]
    pub const fn callback_info(&self) -> &BTreeMap<String, String> {
        &self.callback_info
    }

    /// Returns the classification.
    #[must_use]
    pub const fn classification(&self) -> &ClassificationSummary {
        &self.classification
    }

    /// Returns the workbasket.
    #[must_use]
    pub const fn workbasket(&self) -> &WorkbasketSummary {
        &self.workbasket
    }

    /// Returns the business process identifier.
    #[must_use]
    pub fn business_process_id(&self) -> &str {
        &self.business_process_id
    }

    /// Returns the parent business process identifier.
    #[must_use]
    pub fn parent_business_process_id(&self) -> Option<&str> {
        self.parent_business_process_id.as_deref()
    }

    /// Returns the owner.
    #[must_use]
    pub const fn owner(&self) -> Option<&AccessId> {
        self.owner.as_ref()
    }

    /// Returns the creator.
    #[must_use]
    pub const fn creator(&self) -> Option<&AccessId> {
        self.creator.as_ref()
    }

    /// Returns the primary object reference.
    #[must_use]
    pub const fn primary_object_reference(&self) -> &ObjectReference {
        &self.primary_object_reference
    }

    /// Returns `true` once the owner has opened the task.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.read
    }

    /// Returns `true` once the task has been moved between workbaskets.
    #[must_use]
    pub const fn is_transferred(&self) -> bool {
        self.transferred
    }

    /// Returns a custom text field.
    #[must_use]
    pub fn custom_field(&self, field: CustomField) -> Option<&str> {
        self.custom.get(&field).map(String::as_str)
    }

    /// Returns all set custom text fields.
    #[must_use]
    pub const fn custom_fields(&self) -> &BTreeMap<CustomField, String> {
        &self.custom
    }

    /// Returns a custom integer field.
    #[must_use]
    pub fn custom_int_field(&self, field: CustomIntField) -> Option<i32> {
        self.custom_int.get(&field).copied()
    }

    /// Returns all set custom integer fields.
    #[must_use]
    pub const fn custom_int_fields(&self) -> &BTreeMap<CustomIntField, i32> {
        &self.custom_int
    }

    /// Returns the free-form attributes.
    #[must_use]
    pub const fn custom_attributes(&self) -> &BTreeMap<String, String> {
        &self.custom_attributes
    }

    /// Returns the attachments.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Returns the secondary object references.
    #[must_use]
    pub fn secondary_object_references(&self) -> &[SecondaryObjectReference] {
        &self.secondary_object_references
    }

    /// Returns the optimistic-concurrency snapshot.
    #[must_use]
    pub const fn version(&self) -> TaskVersion {
        TaskVersion {
            modified: self.modified,
            state: self.state,
            claimed: self.claimed,
        }
    }

    /// Replaces the external identifier.
    ///
    /// `update_task` rejects a changed external identifier.
    pub fn set_external_id(&mut self, external_id: ExternalId) {
        self.external_id = external_id;
    }

    /// Replaces the workbasket.
    ///
    /// Moving a task between workbaskets goes through transfer;
    /// `update_task` rejects a changed workbasket.
    pub fn set_workbasket(&mut self, workbasket: WorkbasketSummary) {
        self.workbasket = workbasket;
    }

    /// Sets the display name.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Sets the note.
    pub fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }

    /// Sets the owner.
    pub fn set_owner(&mut self, owner: Option<AccessId>) {
        self.owner = owner;
    }

    /// Sets the planned start.
    pub const fn set_planned(&mut self, planned: Option<DateTime<Utc>>) {
        self.planned = planned;
    }

    /// Sets the due date.
    pub const fn set_due(&mut self, due: Option<DateTime<Utc>>) {
        self.due = due;
    }

    /// Sets the receive timestamp.
    pub const fn set_received(&mut self, received: Option<DateTime<Utc>>) {
        self.received = received;
    }

    /// Replaces the classification; only the key needs to be set.
    pub fn set_classification(&mut self, classification: ClassificationSummary) {
        self.classification = classification;
    }

    /// Replaces the primary object reference.
    pub fn set_primary_object_reference(&mut self, reference: ObjectReference) {
        self.primary_object_reference = reference;
    }

    /// Sets the business process identifier.
    pub fn set_business_process_id(&mut self, business_process_id: impl Into<String>) {
        self.business_process_id = business_process_id.into();
    }

    /// Sets the parent business process identifier.
    pub fn set_parent_business_process_id(&mut self, parent: Option<String>) {
        self.parent_business_process_id = parent;
    }

    /// Sets or clears a custom text field.
    pub fn set_custom_field(&mut self, field: CustomField, value: Option<String>) {
        match value {
            Some(text) => self.custom.insert(field, text),
            None => self.custom.remove(&field),
        };
    }

    /// Sets or clears a custom text field addressed by its storage key.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::UnknownCustomField`] when the key is not
    /// one of `custom_1` to `custom_16`.
    pub fn set_custom_field_by_key(
        &mut self,
        key: &str,
        value: Option<String>,
    ) -> Result<(), TaskDomainError> {
        let field = key.parse::<CustomField>()?;
        self.set_custom_field(field, value);
        Ok(())
    }

    /// Sets or clears a custom integer field.
    pub fn set_custom_int_field(&mut self, field: CustomIntField, value: Option<i32>) {
        match value {
            Some(number) => self.custom_int.insert(field, number),
            None => self.custom_int.remove(&field),
        };
    }

    /// Replaces the free-form attributes.
    pub fn set_custom_attributes(&mut self, attributes: BTreeMap<String, String>) {
        self.custom_attributes = attributes;
    }

    /// Replaces the callback routing data.
    pub fn set_callback_info(&mut self, info: BTreeMap<String, String>) {
        self.callback_info = info;
    }

    /// Adds an attachment, replacing one with the same identifier.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.retain(|existing| existing.id() != attachment.id());
        self.attachments.push(attachment);
    }

    /// Removes an attachment, returning it when present.
    pub fn remove_attachment(&mut self, id: AttachmentId) -> Option<Attachment> {
        let position = self.attachments.iter().position(|item| item.id() == id)?;
        Some(self.attachments.remove(position))
    }

    /// Returns a mutable attachment by identifier.
    pub fn attachment_mut(&mut self, id: AttachmentId) -> Option<&mut Attachment> {
        self.attachments.iter_mut().find(|item| item.id() == id)
    }

    /// Adds a secondary object reference, replacing one with the same
    /// identifier.
    pub fn add_secondary_object_reference(&mut self, reference: SecondaryObjectReference) {
        self.secondary_object_references
            .retain(|existing| existing.id() != reference.id());
        self.secondary_object_references.push(reference);
    }

    /// Removes a secondary object reference, returning it when present.
    pub fn remove_secondary_object_reference(
        &mut self,
        id: ObjectReferenceId,
    ) -> Option<SecondaryObjectReference> {
        let position = self
            .secondary_object_references
            .iter()
            .position(|item| item.id() == id)?;
        Some(self.secondary_object_references.remove(position))
    }

    /// Claims the task for `caller`.
    ///
    /// Claiming a task the caller already owns refreshes the claim.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidState`] for a completed task and
    /// [`TaskDomainError::InvalidOwner`] when another user holds the claim
    /// and `force` is not set.
    pub fn claim(
        &mut self,
        caller: &AccessId,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        self.ensure_not_final()?;
        if self.state.is_claimed() && !force && self.owner.as_ref() != Some(caller) {
            return Err(self.invalid_owner(caller));
        }
        self.state = self.state.after_claim();
        self.owner = Some(caller.clone());
        self.claimed = Some(now);
        self.read = true;
        self.modified = now;
        Ok(())
    }

    /// Releases the claim held on the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidState`] for a completed task and
    /// [`TaskDomainError::InvalidOwner`] when the task is claimed by someone
    /// other than `caller` and `force` is not set.
    pub fn cancel_claim(
        &mut self,
        caller: &AccessId,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        self.ensure_not_final()?;
        if self.state.is_claimed() && !force && self.owner.as_ref() != Some(caller) {
            return Err(self.invalid_owner(caller));
        }
        self.state = self.state.after_cancel_claim();
        self.owner = None;
        self.claimed = None;
        self.modified = now;
        Ok(())
    }

    /// Completes the task.
    ///
    /// Completing an already completed task is a no-op. A forced completion
    /// of an unclaimed task claims it for `caller` first.
    ///
    /// # Errors
    ///
    /// Without `force`, returns [`TaskDomainError::InvalidState`] when the
    /// task is not claimed and [`TaskDomainError::InvalidOwner`] when the
    /// owner is not among `access_ids`.
    pub fn complete(
        &mut self,
        caller: &AccessId,
        access_ids: &[AccessId],
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, TaskDomainError> {
        if self.state.is_final() {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }
        let mut implicitly_claimed = false;
        if force {
            if !self.state.is_claimed() {
                self.claim(caller, true, now)?;
                implicitly_claimed = true;
            }
        } else {
            if !self.state.is_claimed() {
                return Err(self.invalid_state(&TaskState::CLAIMED));
            }
            let owned = self
                .owner
                .as_ref()
                .is_some_and(|owner| access_ids.contains(owner));
            if !owned {
                return Err(self.invalid_owner(caller));
            }
        }
        self.state = TaskState::Completed;
        self.completed = Some(now);
        self.read = true;
        self.modified = now;
        Ok(CompletionOutcome::Completed { implicitly_claimed })
    }

    /// Moves the task to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidState`] for a completed task.
    pub fn transfer(
        &mut self,
        destination: WorkbasketSummary,
        owner: Option<AccessId>,
        set_transferred: bool,
        now: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        self.ensure_not_final()?;
        self.state = self.state.after_transfer();
        self.workbasket = destination;
        self.owner = owner;
        self.claimed = None;
        self.read = false;
        if set_transferred {
            self.transferred = true;
        }
        self.modified = now;
        Ok(())
    }

    /// Checks that the task may be deleted.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidCallbackState`] while a callback is
    /// pending and, unless forced, [`TaskDomainError::InvalidState`] for a
    /// task that is not completed.
    pub fn ensure_deletable(&self, force: bool) -> Result<(), TaskDomainError> {
        if self.callback_state == CallbackState::CallbackProcessingRequired {
            return Err(TaskDomainError::InvalidCallbackState {
                task_id: self.id,
                callback_state: self.callback_state,
                allowed: vec![
                    CallbackState::None,
                    CallbackState::Claimed,
                    CallbackState::CallbackProcessingCompleted,
                ],
            });
        }
        if !force && !self.state.is_final() {
            return Err(self.invalid_state(&[TaskState::Completed]));
        }
        Ok(())
    }

    /// Marks the task as read or unread.
    pub const fn set_read(&mut self, read: bool, now: DateTime<Utc>) {
        self.read = read;
        self.modified = now;
    }

    pub(crate) const fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub(crate) const fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub(crate) const fn set_claimed(&mut self, claimed: Option<DateTime<Utc>>) {
        self.claimed = claimed;
    }

    pub(crate) const fn set_completed(&mut self, completed: Option<DateTime<Utc>>) {
        self.completed = completed;
    }

    pub(crate) const fn set_transferred(&mut self, transferred: bool) {
        self.transferred = transferred;
    }

    pub(crate) const fn set_callback_state(&mut self, callback_state: CallbackState) {
        self.callback_state = callback_state;
    }

    pub(crate) const fn touch(&mut self, now: DateTime<Utc>) {
        self.modified = now;
    }

    /// Stamps children that do not yet belong to this task.
    pub(crate) fn adopt_children(&mut self) {
        let id = self.id;
        let modified = self.modified;
        for attachment in &mut self.attachments {
            attachment.attach_to(id, modified);
        }
        for reference in &mut self.secondary_object_references {
            reference.attach_to(id);
        }
    }

    pub(crate) fn attachments_mut(&mut self) -> &mut [Attachment] {
        &mut self.attachments
    }

    fn ensure_not_final(&self) -> Result<(), TaskDomainError> {
        if self.state.is_final() {
            return Err(self.invalid_state(&TaskState::NON_FINAL));
        }
        Ok(())
    }

    fn invalid_state(&self, allowed: &[TaskState]) -> TaskDomainError {
        TaskDomainError::InvalidState {
            task_id: self.id,
            state: self.state,
            allowed: allowed.to_vec(),
        }
    }

    fn invalid_owner(&self, caller: &AccessId) -> TaskDomainError {
        TaskDomainError::InvalidOwner {
            task_id: self.id,
            owner: self.owner.clone(),
            caller: caller.clone(),
        }
    }
}

/// Checks a callback-state change against the task state.
///
/// # Errors
///
/// Returns [`TaskDomainError::InvalidState`] when the task state does not
/// admit `target`, or [`TaskDomainError::InvalidCallbackState`] when the
/// current callback state does not.
pub fn check_callback_transition(
    task_id: TaskId,
    state: TaskState,
    current: CallbackState,
    target: CallbackState,
) -> Result<(), TaskDomainError> {
    let invalid_state = |allowed: &[TaskState]| TaskDomainError::InvalidState {
        task_id,
        state,
        allowed: allowed.to_vec(),
    };
    match target {
        CallbackState::None => Ok(()),
        CallbackState::CallbackProcessingCompleted if !state.is_final() => {
            Err(invalid_state(&[TaskState::Completed]))
        }
        CallbackState::CallbackProcessingRequired if state.is_final() => {
            Err(invalid_state(&TaskState::NON_FINAL))
        }
        CallbackState::Claimed if state != TaskState::Claimed => {
            Err(invalid_state(&[TaskState::Claimed]))
        }
        CallbackState::Claimed if current != CallbackState::CallbackProcessingRequired => {
            Err(TaskDomainError::InvalidCallbackState {
                task_id,
                callback_state: current,
                allowed: vec![CallbackState::CallbackProcessingRequired],
            })
        }
        CallbackState::CallbackProcessingCompleted
        | CallbackState::CallbackProcessingRequired
        | CallbackState::Claimed => Ok(()),
    }
}
