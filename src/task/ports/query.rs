//! Query execution port.

use super::TaskStoreResult;
use crate::task::domain::{AccessId, Task, TaskSummary};
use crate::task::query::{FilterValue, QueryField, QueryPlan};
use chrono::{DateTime, Utc};

/// Evaluates validated query plans against the store.
pub trait TaskQueryStore: Send + Sync {
    /// Returns the matching tasks in plan order, honouring the page window.
    ///
    /// # Errors
    ///
    /// Returns [`super::TaskStoreError`] when the store fails.
    fn select(&self, plan: &QueryPlan) -> TaskStoreResult<Vec<TaskSummary>>;

    /// Counts the matching tasks, ignoring the page window.
    ///
    /// # Errors
    ///
    /// Returns [`super::TaskStoreError`] when the store fails.
    fn count(&self, plan: &QueryPlan) -> TaskStoreResult<usize>;

    /// Returns the distinct values of `field` over the matching tasks, in
    /// the plan's sort order.
    ///
    /// # Errors
    ///
    /// Returns [`super::TaskStoreError`] when the store fails.
    fn select_values(&self, plan: &QueryPlan, field: QueryField) -> TaskStoreResult<Vec<FilterValue>>;

    /// Locks the first matching task that can still be claimed, claims it
    /// for `owner` and returns it. Concurrent callers never receive the same
    /// task.
    ///
    /// # Errors
    ///
    /// Returns [`super::TaskStoreError`] when the store fails.
    fn claim_first(
        &self,
        plan: &QueryPlan,
        owner: &AccessId,
        now: DateTime<Utc>,
    ) -> TaskStoreResult<Option<Task>>;
}
