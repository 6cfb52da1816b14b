//! Read-only lookups into the workbasket and classification services.

use super::WorkbasketPermission;
use crate::task::domain::{AccessId, ClassificationId, ClassificationSummary, WorkbasketId, WorkbasketSummary};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Result type for lookup operations.
pub type LookupResult<T> = Result<T, LookupError>;

/// Workbasket as seen by the task engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workbasket {
    /// Identifying data copied onto tasks.
    pub summary: WorkbasketSummary,
    /// Workbaskets marked for deletion accept no new tasks.
    pub marked_for_deletion: bool,
}

/// Workbasket service contract.
pub trait WorkbasketLookup: Send + Sync {
    /// Finds a workbasket by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the workbasket service fails.
    fn find_by_id(&self, id: &WorkbasketId) -> LookupResult<Option<Workbasket>>;

    /// Finds a workbasket by key within a domain.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the workbasket service fails.
    fn find_by_key(&self, key: &str, domain: &str) -> LookupResult<Option<Workbasket>>;

    /// Returns `true` when any of `access_ids` holds `permission` on the
    /// workbasket.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the workbasket service fails.
    fn has_permission(
        &self,
        access_ids: &[AccessId],
        id: &WorkbasketId,
        permission: WorkbasketPermission,
    ) -> LookupResult<bool>;

    /// Returns the subset of `ids` on which any of `access_ids` holds
    /// `permission`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the workbasket service fails.
    fn workbaskets_with_permission(
        &self,
        access_ids: &[AccessId],
        ids: &[WorkbasketId],
        permission: WorkbasketPermission,
    ) -> LookupResult<BTreeSet<WorkbasketId>>;
}

/// Classification service contract.
pub trait ClassificationLookup: Send + Sync {
    /// Loads the classifications with the given identifiers in one call.
    ///
    /// Unknown identifiers are omitted from the result.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the classification service fails.
    fn find_by_ids(&self, ids: &[ClassificationId]) -> LookupResult<Vec<ClassificationSummary>>;

    /// Finds a classification by key within a domain.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the classification service fails.
    fn find_by_key(&self, key: &str, domain: &str) -> LookupResult<Option<ClassificationSummary>>;
}

/// Errors returned by lookup implementations.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// The backing service could not answer.
    #[error("lookup failed: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl LookupError {
    /// Wraps a backing-service error.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
