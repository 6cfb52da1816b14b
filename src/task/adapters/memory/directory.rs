//! In-memory workbasket and classification directory.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use crate::task::{
    domain::{AccessId, ClassificationId, ClassificationSummary, WorkbasketId},
    ports::{
        ClassificationLookup, LookupError, LookupResult, Workbasket, WorkbasketLookup,
        WorkbasketPermission,
    },
};

/// Thread-safe directory of workbaskets, their access lists and
/// classifications.
///
/// The same directory backs the lookup ports and the read scoping of
/// [`super::InMemoryTaskStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

#[derive(Debug, Default)]
pub(super) struct DirectoryState {
    workbaskets: HashMap<WorkbasketId, Workbasket>,
    grants: HashMap<WorkbasketId, HashMap<AccessId, BTreeSet<WorkbasketPermission>>>,
    classifications: HashMap<ClassificationId, ClassificationSummary>,
}

impl DirectoryState {
    pub(super) fn workbasket(&self, id: &WorkbasketId) -> Option<&Workbasket> {
        self.workbaskets.get(id)
    }

    pub(super) fn classification(&self, id: &ClassificationId) -> Option<&ClassificationSummary> {
        self.classifications.get(id)
    }

    pub(super) fn permits(
        &self,
        access_ids: &[AccessId],
        id: &WorkbasketId,
        permission: WorkbasketPermission,
    ) -> bool {
        self.grants.get(id).is_some_and(|acl| {
            access_ids.iter().any(|access_id| {
                acl.get(access_id)
                    .is_some_and(|granted| granted.contains(&permission))
            })
        })
    }
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a workbasket.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the directory lock is poisoned.
    pub fn add_workbasket(&self, workbasket: Workbasket) -> LookupResult<()> {
        let mut state = self.write()?;
        state
            .workbaskets
            .insert(workbasket.summary.id.clone(), workbasket);
        Ok(())
    }

    /// Grants `permissions` on a workbasket to `access_id`, adding to any
    /// earlier grant.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the directory lock is poisoned.
    pub fn grant(
        &self,
        workbasket: &WorkbasketId,
        access_id: AccessId,
        permissions: impl IntoIterator<Item = WorkbasketPermission>,
    ) -> LookupResult<()> {
        let mut state = self.write()?;
        state
            .grants
            .entry(workbasket.clone())
            .or_default()
            .entry(access_id)
            .or_default()
            .extend(permissions);
        Ok(())
    }

    /// Flags a workbasket as marked for deletion. Returns `false` for an
    /// unknown workbasket.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the directory lock is poisoned.
    pub fn mark_for_deletion(&self, id: &WorkbasketId) -> LookupResult<bool> {
        let mut state = self.write()?;
        Ok(state.workbaskets.get_mut(id).is_some_and(|workbasket| {
            workbasket.marked_for_deletion = true;
            true
        }))
    }

    /// Registers or replaces a classification.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the classification carries no
    /// identifier or the directory lock is poisoned.
    pub fn add_classification(&self, classification: ClassificationSummary) -> LookupResult<()> {
        let Some(id) = classification.id.clone() else {
            return Err(LookupError::unavailable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("classification {} has no identifier", classification.key),
            )));
        };
        let mut state = self.write()?;
        state.classifications.insert(id, classification);
        Ok(())
    }

    pub(super) fn read(&self) -> std::io::Result<RwLockReadGuard<'_, DirectoryState>> {
        self.state
            .read()
            .map_err(|err| std::io::Error::other(err.to_string()))
    }

    fn write(&self) -> LookupResult<std::sync::RwLockWriteGuard<'_, DirectoryState>> {
        self.state
            .write()
            .map_err(|err| LookupError::unavailable(std::io::Error::other(err.to_string())))
    }

    fn read_lookup(&self) -> LookupResult<RwLockReadGuard<'_, DirectoryState>> {
        self.read().map_err(LookupError::unavailable)
    }
}

impl WorkbasketLookup for InMemoryDirectory {
    fn find_by_id(&self, id: &WorkbasketId) -> LookupResult<Option<Workbasket>> {
        Ok(self.read_lookup()?.workbasket(id).cloned())
    }

    fn find_by_key(&self, key: &str, domain: &str) -> LookupResult<Option<Workbasket>> {
        let state = self.read_lookup()?;
        Ok(state
            .workbaskets
            .values()
            .find(|workbasket| workbasket.summary.key == key && workbasket.summary.domain == domain)
            .cloned())
    }

    fn has_permission(
        &self,
        access_ids: &[AccessId],
        id: &WorkbasketId,
        permission: WorkbasketPermission,
    ) -> LookupResult<bool> {
        Ok(self.read_lookup()?.permits(access_ids, id, permission))
    }

    fn workbaskets_with_permission(
        &self,
        access_ids: &[AccessId],
        ids: &[WorkbasketId],
        permission: WorkbasketPermission,
    ) -> LookupResult<BTreeSet<WorkbasketId>> {
        let state = self.read_lookup()?;
        Ok(ids
            .iter()
            .filter(|id| state.permits(access_ids, id, permission))
            .cloned()
            .collect())
    }
}

impl ClassificationLookup for InMemoryDirectory {
    fn find_by_ids(&self, ids: &[ClassificationId]) -> LookupResult<Vec<ClassificationSummary>> {
        let state = self.read_lookup()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.classification(id))
            .cloned()
            .collect())
    }

    fn find_by_key(&self, key: &str, domain: &str) -> LookupResult<Option<ClassificationSummary>> {
        let state = self.read_lookup()?;
        Ok(state
            .classifications
            .values()
            .find(|classification| classification.key == key && classification.domain == domain)
            .cloned())
    }
}
