//! Attachments owned by a task.

use super::{AttachmentId, ClassificationSummary, ObjectReference, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Link from a task to an external document, with its own classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    id: AttachmentId,
    task_id: Option<TaskId>,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    classification: ClassificationSummary,
    object_reference: Option<ObjectReference>,
    channel: Option<String>,
    received: Option<DateTime<Utc>>,
    custom_attributes: BTreeMap<String, String>,
}

/// Parameter object for reconstructing a persisted attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAttachmentData {
    /// Persisted attachment identifier.
    pub id: AttachmentId,
    /// Owning task.
    pub task_id: TaskId,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last modification timestamp.
    pub modified: DateTime<Utc>,
    /// Stored classification view.
    pub classification: ClassificationSummary,
    /// Referenced external object, if any.
    pub object_reference: Option<ObjectReference>,
    /// Channel through which the document arrived.
    pub channel: Option<String>,
    /// Time the document was received.
    pub received: Option<DateTime<Utc>>,
    /// Free-form attributes.
    pub custom_attributes: BTreeMap<String, String>,
}

impl Attachment {
    /// Creates a detached attachment with a fresh identifier.
    #[must_use]
    pub fn new(classification: ClassificationSummary) -> Self {
        Self {
            id: AttachmentId::new(),
            task_id: None,
            created: None,
            modified: None,
            classification,
            object_reference: None,
            channel: None,
            received: None,
            custom_attributes: BTreeMap::new(),
        }
    }

    /// Reconstructs an attachment from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedAttachmentData) -> Self {
        Self {
            id: data.id,
            task_id: Some(data.task_id),
            created: Some(data.created),
            modified: Some(data.modified),
            classification: data.classification,
            object_reference: data.object_reference,
            channel: data.channel,
            received: data.received,
            custom_attributes: data.custom_attributes,
        }
    }

    /// Sets the referenced external object.
    #[must_use]
    pub fn with_object_reference(mut self, reference: ObjectReference) -> Self {
        self.object_reference = Some(reference);
        self
    }

    /// Sets the arrival channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sets the receive timestamp.
    #[must_use]
    pub fn with_received(mut self, received: DateTime<Utc>) -> Self {
        self.received = Some(received);
        self
    }

    /// Adds a custom attribute.
    #[must_use]
    pub fn with_custom_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the attachment identifier.
    #[must_use]
    pub const fn id(&self) -> AttachmentId {
        self.id
    }

    /// Returns the owning task, once attached.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    /// Returns the creation timestamp, once persisted.
    #[must_use]
    pub const fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    /// Returns the modification timestamp, once persisted.
    #[must_use]
    pub const fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    /// Returns the attachment classification.
    #[must_use]
    pub const fn classification(&self) -> &ClassificationSummary {
        &self.classification
    }

    /// Returns the referenced external object, if any.
    #[must_use]
    pub const fn object_reference(&self) -> Option<&ObjectReference> {
        self.object_reference.as_ref()
    }

    /// Returns the arrival channel, if any.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Returns the receive timestamp, if any.
    #[must_use]
    pub const fn received(&self) -> Option<DateTime<Utc>> {
        self.received
    }

    /// Returns the custom attributes.
    #[must_use]
    pub const fn custom_attributes(&self) -> &BTreeMap<String, String> {
        &self.custom_attributes
    }

    /// Replaces the classification.
    pub fn set_classification(&mut self, classification: ClassificationSummary) {
        self.classification = classification;
    }

    /// Replaces the referenced external object.
    pub fn set_object_reference(&mut self, reference: Option<ObjectReference>) {
        self.object_reference = reference;
    }

    /// Replaces the arrival channel.
    pub fn set_channel(&mut self, channel: Option<String>) {
        self.channel = channel;
    }

    /// Replaces the custom attributes.
    pub fn set_custom_attributes(&mut self, attributes: BTreeMap<String, String>) {
        self.custom_attributes = attributes;
    }

    /// Returns `true` when persisted content differs, ignoring timestamps
    /// and classification details that are not stored.
    #[must_use]
    pub fn content_differs(&self, other: &Self) -> bool {
        !self.classification.same_classification(&other.classification)
            || self.object_reference != other.object_reference
            || self.channel != other.channel
            || self.received != other.received
            || self.custom_attributes != other.custom_attributes
    }

    /// Binds the attachment to its task, defaulting missing timestamps to
    /// the parent's modification time.
    pub(crate) fn attach_to(&mut self, task_id: TaskId, parent_modified: DateTime<Utc>) {
        self.task_id = Some(task_id);
        self.created.get_or_insert(parent_modified);
        self.modified.get_or_insert(parent_modified);
    }

    pub(crate) const fn touch(&mut self, now: DateTime<Utc>) {
        self.modified = Some(now);
    }
}
