//! References to external business objects associated with a task.

use super::{ObjectReferenceId, TaskDomainError, TaskId};
use serde::{Deserialize, Serialize};

/// Identifier tuple pointing to an object in an external business system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    company: String,
    system: Option<String>,
    system_instance: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

impl ObjectReference {
    /// Creates a reference from its mandatory components.
    ///
    /// Shape validation is deferred to [`ObjectReference::validate`] so that
    /// callers can assemble references incrementally.
    #[must_use]
    pub fn new(company: impl Into<String>, kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            system: None,
            system_instance: None,
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Sets the owning system.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the owning system instance.
    #[must_use]
    pub fn with_system_instance(mut self, system_instance: impl Into<String>) -> Self {
        self.system_instance = Some(system_instance.into());
        self
    }

    /// Returns the company component.
    #[must_use]
    pub fn company(&self) -> &str {
        &self.company
    }

    /// Returns the system component, if any.
    #[must_use]
    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    /// Returns the system instance component, if any.
    #[must_use]
    pub fn system_instance(&self) -> Option<&str> {
        self.system_instance.as_deref()
    }

    /// Returns the object type.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the object value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Checks that company, type and value are present.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidObjectReference`] naming the first
    /// blank component.
    pub fn validate(&self, context: &'static str) -> Result<(), TaskDomainError> {
        let missing = if self.company.trim().is_empty() {
            Some("company must not be blank")
        } else if self.kind.trim().is_empty() {
            Some("type must not be blank")
        } else if self.value.trim().is_empty() {
            Some("value must not be blank")
        } else {
            None
        };
        match missing {
            Some(reason) => Err(TaskDomainError::InvalidObjectReference { context, reason }),
            None => Ok(()),
        }
    }
}

/// Additional object reference owned by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryObjectReference {
    id: ObjectReferenceId,
    task_id: Option<TaskId>,
    reference: ObjectReference,
}

impl SecondaryObjectReference {
    /// Creates a secondary reference with a freshly generated identifier.
    #[must_use]
    pub fn new(reference: ObjectReference) -> Self {
        Self {
            id: ObjectReferenceId::new(),
            task_id: None,
            reference,
        }
    }

    /// Reconstructs a secondary reference from persisted storage.
    #[must_use]
    pub const fn from_persisted(
        id: ObjectReferenceId,
        task_id: TaskId,
        reference: ObjectReference,
    ) -> Self {
        Self {
            id,
            task_id: Some(task_id),
            reference,
        }
    }

    /// Returns the reference identifier.
    #[must_use]
    pub const fn id(&self) -> ObjectReferenceId {
        self.id
    }

    /// Returns the owning task, once attached.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    /// Returns the referenced object.
    #[must_use]
    pub const fn reference(&self) -> &ObjectReference {
        &self.reference
    }

    /// Replaces the referenced object.
    pub fn set_reference(&mut self, reference: ObjectReference) {
        self.reference = reference;
    }

    pub(crate) const fn attach_to(&mut self, task_id: TaskId) {
        self.task_id = Some(task_id);
    }
}
