//! Read-only projections of a task.

use super::{
    AccessId, AttachmentId, CallbackState, ClassificationId, CustomField, CustomIntField,
    ExternalId, ObjectReference, ObjectReferenceId, Task, TaskId, TaskState, WorkbasketId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Serialisable view of a task returned by queries and carried in history
/// events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Task identifier.
    pub id: TaskId,
    /// External identifier.
    pub external_id: ExternalId,
    /// Lifecycle state.
    pub state: TaskState,
    /// Callback handshake state.
    pub callback_state: CallbackState,
    /// Owner, if claimed or assigned.
    pub owner: Option<AccessId>,
    /// Workbasket identifier.
    pub workbasket_id: WorkbasketId,
    /// Workbasket key.
    pub workbasket_key: String,
    /// Workbasket domain.
    pub domain: String,
    /// Classification key.
    pub classification_key: String,
    /// Classification category.
    pub classification_category: Option<String>,
    /// Priority.
    pub priority: i32,
    /// Display name.
    pub name: Option<String>,
    /// Note.
    pub note: Option<String>,
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
    /// Business process identifier.
    pub business_process_id: String,
    /// Parent business process identifier.
    pub parent_business_process_id: Option<String>,
    /// Creating user.
    pub creator: Option<AccessId>,
    /// Primary object reference.
    pub primary_object_reference: ObjectReference,
    /// Read flag.
    pub read: bool,
    /// Transferred flag.
    pub transferred: bool,
    /// Custom text fields.
    pub custom: BTreeMap<CustomField, String>,
    /// Custom integer fields.
    pub custom_int: BTreeMap<CustomIntField, i32>,
    /// Attachment identifiers.
    pub attachment_ids: Vec<AttachmentId>,
    /// Secondary object reference identifiers.
    pub secondary_object_reference_ids: Vec<ObjectReferenceId>,
}

/// One changed attribute between two task summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Attribute name.
    pub field: String,
    /// Value before the change.
    pub old: Value,
    /// Value after the change.
    pub new: Value,
}

impl TaskSummary {
    /// Lists the attributes that differ between `self` and `after`.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when either summary cannot be
    /// serialised.
    pub fn diff(&self, after: &Self) -> Result<Vec<FieldChange>, serde_json::Error> {
        let before_value = serde_json::to_value(self)?;
        let after_value = serde_json::to_value(after)?;
        let (Value::Object(before_fields), Value::Object(mut after_fields)) =
            (before_value, after_value)
        else {
            return Ok(Vec::new());
        };

        let mut changes = Vec::new();
        for (field, old) in before_fields {
            let new = after_fields.remove(&field).unwrap_or(Value::Null);
            if old != new {
                changes.push(FieldChange { field, old, new });
            }
        }
        changes.extend(after_fields.into_iter().map(|(field, new)| FieldChange {
            field,
            old: Value::Null,
            new,
        }));
        Ok(changes)
    }
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id(),
            external_id: task.external_id().clone(),
            state: task.state(),
            callback_state: task.callback_state(),
            owner: task.owner().cloned(),
            workbasket_id: task.workbasket().id.clone(),
            workbasket_key: task.workbasket().key.clone(),
            domain: task.workbasket().domain.clone(),
            classification_key: task.classification().key.clone(),
            classification_category: task.classification().category.clone(),
            priority: task.priority(),
            name: task.name().map(str::to_owned),
            note: task.note().map(str::to_owned),
            created: task.created(),
            modified: task.modified(),
            claimed: task.claimed(),
            completed: task.completed(),
            planned: task.planned(),
            due: task.due(),
            received: task.received(),
            business_process_id: task.business_process_id().to_owned(),
            parent_business_process_id: task.parent_business_process_id().map(str::to_owned),
            creator: task.creator().cloned(),
            primary_object_reference: task.primary_object_reference().clone(),
            read: task.is_read(),
            transferred: task.is_transferred(),
            custom: task.custom_fields().clone(),
            custom_int: task.custom_int_fields().clone(),
            attachment_ids: task.attachments().iter().map(|item| item.id()).collect(),
            secondary_object_reference_ids: task
                .secondary_object_references()
                .iter()
                .map(|item| item.id())
                .collect(),
        }
    }
}

/// Minimal projection used by bulk validation and write attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimalTask {
    /// Task identifier.
    pub id: TaskId,
    /// External identifier.
    pub external_id: ExternalId,
    /// Lifecycle state.
    pub state: TaskState,
    /// Callback handshake state.
    pub callback_state: CallbackState,
    /// Workbasket identifier.
    pub workbasket_id: WorkbasketId,
    /// Owner, if any.
    pub owner: Option<AccessId>,
    /// Last modification timestamp.
    pub modified: DateTime<Utc>,
    /// Claim timestamp.
    pub claimed: Option<DateTime<Utc>>,
    /// Planned start.
    pub planned: Option<DateTime<Utc>>,
    /// Due date.
    pub due: Option<DateTime<Utc>>,
    /// Classification identifier, if resolved.
    pub classification_id: Option<ClassificationId>,
}

impl From<&Task> for MinimalTask {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id(),
            external_id: task.external_id().clone(),
            state: task.state(),
            callback_state: task.callback_state(),
            workbasket_id: task.workbasket().id.clone(),
            owner: task.owner().cloned(),
            modified: task.modified(),
            claimed: task.claimed(),
            planned: task.planned(),
            due: task.due(),
            classification_id: task.classification().id.clone(),
        }
    }
}
