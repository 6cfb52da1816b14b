//! Diff-based persistence of task child collections.
//!
//! Attachments and secondary object references are stored in their own
//! tables. On update the persisted collection is compared with the
//! in-memory one by identifier and the added children are validated before
//! anything is written. Applying the diff deletes removed children, inserts
//! added ones and rewrites changed ones, in that order. Insert failures are
//! collected per child so one bad attachment does not hide the others, and
//! an applied diff can be reverted to the persisted collection.

use super::error::{NotFoundTarget, TaskError, TaskResult};
use crate::task::{
    domain::{
        Attachment, AttachmentId, BulkResult, ClassificationSummary, ObjectReferenceId,
        SecondaryObjectReference, Task,
    },
    ports::{
        AttachmentRepository, ClassificationLookup, ObjectReferenceRepository, TaskStoreError,
    },
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Identifiers of children that were removed, added or changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDiff<I> {
    /// Present before, absent now. In old order.
    pub removed: Vec<I>,
    /// Absent before, present now. In new order.
    pub added: Vec<I>,
    /// Present in both with different content. In new order.
    pub modified: Vec<I>,
}

impl<I> ChildDiff<I> {
    /// Returns `true` when nothing needs to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.modified.is_empty()
    }
}

/// Compares two child collections by identifier.
pub fn diff_children<T, I, F, D>(old: &[T], new: &[T], id_of: F, differs: D) -> ChildDiff<I>
where
    I: Ord + Copy,
    F: Fn(&T) -> I,
    D: Fn(&T, &T) -> bool,
{
    let before: BTreeMap<I, &T> = old.iter().map(|item| (id_of(item), item)).collect();
    let after: BTreeMap<I, &T> = new.iter().map(|item| (id_of(item), item)).collect();

    let removed = old
        .iter()
        .map(&id_of)
        .filter(|id| !after.contains_key(id))
        .collect();
    let mut added = Vec::new();
    let mut modified = Vec::new();
    for item in new {
        let id = id_of(item);
        match before.get(&id) {
            None => added.push(id),
            Some(previous) if differs(previous, item) => modified.push(id),
            Some(_) => {}
        }
    }
    ChildDiff {
        removed,
        added,
        modified,
    }
}

/// Replaces each attachment classification with the full record from the
/// classification service.
///
/// Keys are looked up in the task's domain first and then in
/// `master_domain`.
///
/// # Errors
///
/// Returns [`TaskError::NotFound`] for a key known in neither domain.
pub fn resolve_attachment_classifications(
    lookup: &dyn ClassificationLookup,
    master_domain: &str,
    task: &mut Task,
) -> TaskResult<()> {
    let domain = task.workbasket().domain.clone();
    let mut resolved: BTreeMap<String, ClassificationSummary> = BTreeMap::new();
    for attachment in task.attachments_mut() {
        let key = attachment.classification().key.clone();
        if let Some(known) = resolved.get(&key) {
            attachment.set_classification(known.clone());
            continue;
        }
        let found = match lookup.find_by_key(&key, &domain)? {
            Some(classification) => Some(classification),
            None => lookup.find_by_key(&key, master_domain)?,
        };
        let classification = found.ok_or_else(|| {
            TaskError::NotFound(NotFoundTarget::Classification(format!("{key}@{domain}")))
        })?;
        attachment.set_classification(classification.clone());
        resolved.insert(key, classification);
    }
    Ok(())
}

/// Diffs the in-memory attachments of `task` against `persisted` and
/// validates every added one. Nothing is written.
///
/// # Errors
///
/// Returns [`TaskError::InvalidArgument`] for the first added attachment
/// with a malformed object reference.
pub fn plan_attachments(
    persisted: &[Attachment],
    task: &mut Task,
) -> TaskResult<ChildDiff<AttachmentId>> {
    task.adopt_children();
    let diff = diff_children(
        persisted,
        task.attachments(),
        Attachment::id,
        Attachment::content_differs,
    );
    for id in &diff.added {
        if let Some(reference) = task
            .attachments()
            .iter()
            .find(|item| item.id() == *id)
            .and_then(Attachment::object_reference)
        {
            reference.validate("attachment")?;
        }
    }
    Ok(diff)
}

/// Diffs the in-memory secondary references of `task` against
/// `persisted` and validates every added one. Nothing is written.
///
/// # Errors
///
/// Returns [`TaskError::InvalidArgument`] for the first malformed added
/// reference.
pub fn plan_object_references(
    persisted: &[SecondaryObjectReference],
    task: &mut Task,
) -> TaskResult<ChildDiff<ObjectReferenceId>> {
    task.adopt_children();
    let current = task.secondary_object_references();
    let diff = diff_children(
        persisted,
        current,
        SecondaryObjectReference::id,
        |old, new| old.reference() != new.reference(),
    );
    for id in &diff.added {
        if let Some(reference) = current.iter().find(|item| item.id() == *id) {
            reference.reference().validate("secondary object reference")?;
        }
    }
    Ok(diff)
}

/// Returns the first error of an insert pass, if any.
pub(crate) fn first_failure<K: Ord>(failures: &BulkResult<K, TaskError>) -> Option<TaskError> {
    failures.iter().map(|(_, error)| error.clone()).next()
}

/// Writes attachment changes through an [`AttachmentRepository`].
pub struct AttachmentSynchronizer<'a, R: AttachmentRepository + ?Sized> {
    repository: &'a R,
}

impl<'a, R: AttachmentRepository + ?Sized> AttachmentSynchronizer<'a, R> {
    /// Creates a synchroniser over `repository`.
    #[must_use]
    pub const fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    /// Inserts every attachment of a freshly stored task.
    #[must_use]
    pub fn insert_all(&self, task: &Task) -> BulkResult<AttachmentId, TaskError> {
        let mut failures = BulkResult::new();
        for attachment in task.attachments() {
            if let Err(err) = self.insert(attachment) {
                failures.add_error(attachment.id(), err);
            }
        }
        failures
    }

    /// Writes a planned diff.
    ///
    /// Insert failures are recorded in `failures`; delete and update
    /// failures abort.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] when a delete or update fails.
    pub fn apply(
        &self,
        diff: &ChildDiff<AttachmentId>,
        task: &mut Task,
        now: DateTime<Utc>,
        failures: &mut BulkResult<AttachmentId, TaskError>,
    ) -> TaskResult<()> {
        debug!(
            task_id = %task.id(),
            removed = diff.removed.len(),
            added = diff.added.len(),
            modified = diff.modified.len(),
            "synchronising attachments"
        );

        for id in &diff.removed {
            self.repository.delete_attachment(*id)?;
        }

        for id in &diff.added {
            let Some(attachment) = task.attachments().iter().find(|item| item.id() == *id) else {
                continue;
            };
            if let Err(err) = self.insert(attachment) {
                failures.add_error(*id, err);
            }
        }

        for id in &diff.modified {
            if let Some(attachment) = task.attachment_mut(*id) {
                attachment.touch(now);
                self.repository.update_attachment(attachment)?;
            }
        }
        Ok(())
    }

    /// Puts the stored attachments back to `persisted` after `diff` was
    /// applied in full or in part. Added attachments listed in
    /// `not_inserted` are left alone.
    ///
    /// # Errors
    ///
    /// Returns the first [`TaskError`] raised while restoring; every child
    /// is still attempted.
    pub fn revert(
        &self,
        diff: &ChildDiff<AttachmentId>,
        persisted: &[Attachment],
        not_inserted: &BulkResult<AttachmentId, TaskError>,
    ) -> TaskResult<()> {
        let mut first = None;
        for id in diff.added.iter().filter(|id| !not_inserted.contains(id)) {
            if let Err(err) = self.repository.delete_attachment(*id) {
                first.get_or_insert(TaskError::from(err));
            }
        }
        for attachment in persisted {
            let outcome = if diff.removed.contains(&attachment.id()) {
                match self.repository.insert_attachment(attachment) {
                    Err(TaskStoreError::DuplicateAttachment(_)) => Ok(()),
                    other => other,
                }
            } else if diff.modified.contains(&attachment.id()) {
                self.repository.update_attachment(attachment)
            } else {
                Ok(())
            };
            if let Err(err) = outcome {
                first.get_or_insert(TaskError::from(err));
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn insert(&self, attachment: &Attachment) -> TaskResult<()> {
        if let Some(reference) = attachment.object_reference() {
            reference.validate("attachment")?;
        }
        self.repository.insert_attachment(attachment)?;
        Ok(())
    }
}

/// Writes secondary object reference changes through an
/// [`ObjectReferenceRepository`].
pub struct ObjectReferenceSynchronizer<'a, R: ObjectReferenceRepository + ?Sized> {
    repository: &'a R,
}

impl<'a, R: ObjectReferenceRepository + ?Sized> ObjectReferenceSynchronizer<'a, R> {
    /// Creates a synchroniser over `repository`.
    #[must_use]
    pub const fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    /// Inserts every secondary reference of a freshly stored task.
    #[must_use]
    pub fn insert_all(&self, task: &Task) -> BulkResult<ObjectReferenceId, TaskError> {
        let mut failures = BulkResult::new();
        for reference in task.secondary_object_references() {
            if let Err(err) = self.insert(reference) {
                failures.add_error(reference.id(), err);
            }
        }
        failures
    }

    /// Writes a planned diff, recording insert failures in `failures`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] when a delete or update fails.
    pub fn apply(
        &self,
        diff: &ChildDiff<ObjectReferenceId>,
        task: &Task,
        failures: &mut BulkResult<ObjectReferenceId, TaskError>,
    ) -> TaskResult<()> {
        let current = task.secondary_object_references();
        debug!(
            task_id = %task.id(),
            removed = diff.removed.len(),
            added = diff.added.len(),
            modified = diff.modified.len(),
            "synchronising object references"
        );

        for id in &diff.removed {
            self.repository.delete_object_reference(*id)?;
        }

        for id in &diff.added {
            let Some(reference) = current.iter().find(|item| item.id() == *id) else {
                continue;
            };
            if let Err(err) = self.insert(reference) {
                failures.add_error(*id, err);
            }
        }

        for id in &diff.modified {
            if let Some(reference) = current.iter().find(|item| item.id() == *id) {
                self.repository.update_object_reference(reference)?;
            }
        }
        Ok(())
    }

    /// Puts the stored secondary references back to `persisted`, leaving
    /// the added references listed in `not_inserted` alone.
    ///
    /// # Errors
    ///
    /// Returns the first [`TaskError`] raised while restoring; every
    /// reference is still attempted.
    pub fn revert(
        &self,
        diff: &ChildDiff<ObjectReferenceId>,
        persisted: &[SecondaryObjectReference],
        not_inserted: &BulkResult<ObjectReferenceId, TaskError>,
    ) -> TaskResult<()> {
        let mut first = None;
        for id in diff.added.iter().filter(|id| !not_inserted.contains(id)) {
            if let Err(err) = self.repository.delete_object_reference(*id) {
                first.get_or_insert(TaskError::from(err));
            }
        }
        for reference in persisted {
            let outcome = if diff.removed.contains(&reference.id()) {
                match self.repository.insert_object_reference(reference) {
                    Err(TaskStoreError::DuplicateObjectReference(_)) => Ok(()),
                    other => other,
                }
            } else if diff.modified.contains(&reference.id()) {
                self.repository.update_object_reference(reference)
            } else {
                Ok(())
            };
            if let Err(err) = outcome {
                first.get_or_insert(TaskError::from(err));
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn insert(&self, reference: &SecondaryObjectReference) -> TaskResult<()> {
        reference.reference().validate("secondary object reference")?;
        self.repository.insert_object_reference(reference)?;
        Ok(())
    }
}
