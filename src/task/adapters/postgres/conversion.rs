//! Mapping between domain values and Diesel rows.

use super::models::{AttachmentRow, ObjectReferenceRow, TaskRow};
use crate::task::{
    domain::{
        AccessId, Attachment, AttachmentId, CallbackState, ClassificationId,
        ClassificationSummary, ExternalId, ObjectReference, ObjectReferenceId,
        PersistedAttachmentData, PersistedTaskData, SecondaryObjectReference, Task, TaskId,
        TaskState, WorkbasketId, WorkbasketSummary,
    },
    ports::{TaskStoreError, TaskStoreResult},
};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Truncates an instant to the microsecond precision of `TIMESTAMPTZ`.
pub(super) fn stored_instant(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(6)
}

fn stored_optional(instant: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    instant.map(stored_instant)
}

fn to_json(value: &impl Serialize) -> TaskStoreResult<Value> {
    serde_json::to_value(value).map_err(TaskStoreError::invalid_data)
}

fn from_json<T: DeserializeOwned>(value: Value) -> TaskStoreResult<T> {
    serde_json::from_value(value).map_err(TaskStoreError::invalid_data)
}

fn access_id(value: Option<String>) -> TaskStoreResult<Option<AccessId>> {
    value
        .map(AccessId::new)
        .transpose()
        .map_err(TaskStoreError::invalid_data)
}

fn classification_id(value: Option<String>) -> TaskStoreResult<Option<ClassificationId>> {
    value
        .map(ClassificationId::new)
        .transpose()
        .map_err(TaskStoreError::invalid_data)
}

fn stored_classification(
    id: Option<ClassificationId>,
    key: String,
    category: Option<String>,
) -> ClassificationSummary {
    ClassificationSummary {
        id,
        key,
        category,
        ..ClassificationSummary::from_key(String::new())
    }
}

fn object_reference(
    company: String,
    system: Option<String>,
    system_instance: Option<String>,
    kind: String,
    value: String,
) -> ObjectReference {
    let mut reference = ObjectReference::new(company, kind, value);
    if let Some(name) = system {
        reference = reference.with_system(name);
    }
    if let Some(instance) = system_instance {
        reference = reference.with_system_instance(instance);
    }
    reference
}

/// Maps the task row columns; children are stored separately.
pub(super) fn task_to_row(task: &Task) -> TaskStoreResult<TaskRow> {
    let reference = task.primary_object_reference();
    let classification = task.classification();
    let workbasket = task.workbasket();
    Ok(TaskRow {
        id: task.id().into_inner(),
        external_id: task.external_id().as_str().to_owned(),
        created: stored_instant(task.created()),
        modified: stored_instant(task.modified()),
        claimed: stored_optional(task.claimed()),
        completed: stored_optional(task.completed()),
        planned: stored_optional(task.planned()),
        due: stored_optional(task.due()),
        received: stored_optional(task.received()),
        name: task.name().map(str::to_owned),
        note: task.note().map(str::to_owned),
        priority: task.priority(),
        state: task.state().as_str().to_owned(),
        callback_state: task.callback_state().as_str().to_owned(),
        callback_info: to_json(task.callback_info())?,
        classification_id: classification
            .id
            .as_ref()
            .map(|id| id.as_str().to_owned()),
        classification_key: classification.key.clone(),
        classification_category: classification.category.clone(),
        workbasket_id: workbasket.id.as_str().to_owned(),
        workbasket_key: workbasket.key.clone(),
        domain: workbasket.domain.clone(),
        business_process_id: task.business_process_id().to_owned(),
        parent_business_process_id: task.parent_business_process_id().map(str::to_owned),
        owner: task.owner().map(|owner| owner.as_str().to_owned()),
        creator: task.creator().map(|creator| creator.as_str().to_owned()),
        por_company: reference.company().to_owned(),
        por_system: reference.system().map(str::to_owned),
        por_system_instance: reference.system_instance().map(str::to_owned),
        por_type: reference.kind().to_owned(),
        por_value: reference.value().to_owned(),
        is_read: task.is_read(),
        is_transferred: task.is_transferred(),
        custom_fields: to_json(task.custom_fields())?,
        custom_int_fields: to_json(task.custom_int_fields())?,
        custom_attributes: to_json(task.custom_attributes())?,
    })
}

/// Rebuilds a task from its row and children.
pub(super) fn row_to_task(
    row: TaskRow,
    attachments: Vec<Attachment>,
    secondary_object_references: Vec<SecondaryObjectReference>,
) -> TaskStoreResult<Task> {
    let state = TaskState::try_from(row.state.as_str()).map_err(TaskStoreError::invalid_data)?;
    let callback_state = CallbackState::try_from(row.callback_state.as_str())
        .map_err(TaskStoreError::invalid_data)?;
    let workbasket = WorkbasketSummary {
        id: WorkbasketId::new(row.workbasket_id).map_err(TaskStoreError::invalid_data)?,
        key: row.workbasket_key,
        domain: row.domain,
        name: None,
    };
    let data = PersistedTaskData {
        id: TaskId::from_uuid(row.id),
        external_id: ExternalId::new(row.external_id).map_err(TaskStoreError::invalid_data)?,
        created: row.created,
        modified: row.modified,
        claimed: row.claimed,
        completed: row.completed,
        planned: row.planned,
        due: row.due,
        received: row.received,
        name: row.name,
        note: row.note,
        priority: row.priority,
        state,
        callback_state,
        callback_info: from_json(row.callback_info)?,
        classification: stored_classification(
            classification_id(row.classification_id)?,
            row.classification_key,
            row.classification_category,
        ),
        workbasket,
        business_process_id: row.business_process_id,
        parent_business_process_id: row.parent_business_process_id,
        owner: access_id(row.owner)?,
        creator: access_id(row.creator)?,
        primary_object_reference: object_reference(
            row.por_company,
            row.por_system,
            row.por_system_instance,
            row.por_type,
            row.por_value,
        ),
        read: row.is_read,
        transferred: row.is_transferred,
        custom: from_json(row.custom_fields)?,
        custom_int: from_json(row.custom_int_fields)?,
        custom_attributes: from_json(row.custom_attributes)?,
        attachments,
        secondary_object_references,
    };
    Ok(Task::from_persisted(data))
}

fn detached(kind: &str) -> TaskStoreError {
    TaskStoreError::invalid_data(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("{kind} is not attached to a task"),
    ))
}

pub(super) fn attachment_to_row(attachment: &Attachment) -> TaskStoreResult<AttachmentRow> {
    let task_id = attachment.task_id().ok_or_else(|| detached("attachment"))?;
    let created = attachment.created().ok_or_else(|| detached("attachment"))?;
    let modified = attachment.modified().ok_or_else(|| detached("attachment"))?;
    let classification = attachment.classification();
    let reference = attachment.object_reference();
    Ok(AttachmentRow {
        id: attachment.id().into_inner(),
        task_id: task_id.into_inner(),
        created: stored_instant(created),
        modified: stored_instant(modified),
        classification_id: classification
            .id
            .as_ref()
            .map(|id| id.as_str().to_owned()),
        classification_key: classification.key.clone(),
        classification_category: classification.category.clone(),
        ref_company: reference.map(|item| item.company().to_owned()),
        ref_system: reference.and_then(ObjectReference::system).map(str::to_owned),
        ref_system_instance: reference
            .and_then(ObjectReference::system_instance)
            .map(str::to_owned),
        ref_type: reference.map(|item| item.kind().to_owned()),
        ref_value: reference.map(|item| item.value().to_owned()),
        channel: attachment.channel().map(str::to_owned),
        received: stored_optional(attachment.received()),
        custom_attributes: to_json(attachment.custom_attributes())?,
    })
}

pub(super) fn row_to_attachment(row: AttachmentRow) -> TaskStoreResult<Attachment> {
    let object_reference = match (row.ref_company, row.ref_type, row.ref_value) {
        (Some(company), Some(kind), Some(value)) => Some(object_reference(
            company,
            row.ref_system,
            row.ref_system_instance,
            kind,
            value,
        )),
        _ => None,
    };
    Ok(Attachment::from_persisted(PersistedAttachmentData {
        id: AttachmentId::from_uuid(row.id),
        task_id: TaskId::from_uuid(row.task_id),
        created: row.created,
        modified: row.modified,
        classification: stored_classification(
            classification_id(row.classification_id)?,
            row.classification_key,
            row.classification_category,
        ),
        object_reference,
        channel: row.channel,
        received: row.received,
        custom_attributes: from_json(row.custom_attributes)?,
    }))
}

pub(super) fn reference_to_row(
    reference: &SecondaryObjectReference,
) -> TaskStoreResult<ObjectReferenceRow> {
    let task_id = reference
        .task_id()
        .ok_or_else(|| detached("object reference"))?;
    let object = reference.reference();
    Ok(ObjectReferenceRow {
        id: reference.id().into_inner(),
        task_id: task_id.into_inner(),
        company: object.company().to_owned(),
        system: object.system().map(str::to_owned),
        system_instance: object.system_instance().map(str::to_owned),
        kind: object.kind().to_owned(),
        value: object.value().to_owned(),
    })
}

pub(super) fn row_to_reference(row: ObjectReferenceRow) -> SecondaryObjectReference {
    SecondaryObjectReference::from_persisted(
        ObjectReferenceId::from_uuid(row.id),
        TaskId::from_uuid(row.task_id),
        object_reference(row.company, row.system, row.system_instance, row.kind, row.value),
    )
}
