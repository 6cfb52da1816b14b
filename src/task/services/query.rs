//! Execution of task queries with read scoping.

use super::context::TaskPorts;
use super::error::{NotFoundTarget, TaskError, TaskResult};
use crate::task::{
    domain::TaskSummary,
    ports::{Caller, WorkbasketPermission},
    query::{FilterValue, Page, QueryField, QueryPlan, SortDirection, TaskQuery},
};
use tracing::debug;

/// Runs [`TaskQuery`] values against the store on behalf of the caller.
#[derive(Clone)]
pub struct TaskQueryService {
    ports: TaskPorts,
}

impl TaskQueryService {
    /// Creates a query service over the shared ports.
    #[must_use]
    pub const fn new(ports: TaskPorts) -> Self {
        Self { ports }
    }

    /// Returns every matching task in query order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidArgument`] for an invalid query and
    /// [`TaskError::NotFound`] or [`TaskError::NotAuthorized`] for a named
    /// workbasket the caller may not read.
    pub fn list(&self, query: &TaskQuery) -> TaskResult<Vec<TaskSummary>> {
        let plan = self.plan(query)?;
        Ok(self.ports.store.select(&plan)?)
    }

    /// Returns one page of matching tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::PageOutOfRange`] when `offset` lies beyond the
    /// last match, and the errors of [`Self::list`].
    pub fn list_page(
        &self,
        query: &TaskQuery,
        offset: usize,
        limit: usize,
    ) -> TaskResult<Vec<TaskSummary>> {
        let plan = self.plan(query)?;
        let available = self.ports.store.count(&plan)?;
        if offset > 0 && offset >= available {
            return Err(TaskError::PageOutOfRange { offset, available });
        }
        let rows = self.ports.store.select(&plan.with_page(Page { offset, limit }))?;
        debug!(offset, limit, available, returned = rows.len(), "listed task page");
        Ok(rows)
    }

    /// Returns the first matching task, if any. Several matches are not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::list`].
    pub fn single(&self, query: &TaskQuery) -> TaskResult<Option<TaskSummary>> {
        let plan = self.plan(query)?.with_page(Page {
            offset: 0,
            limit: 1,
        });
        Ok(self.ports.store.select(&plan)?.into_iter().next())
    }

    /// Counts the matching tasks.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::list`].
    pub fn count(&self, query: &TaskQuery) -> TaskResult<usize> {
        let plan = self.plan(query)?;
        Ok(self.ports.store.count(&plan)?)
    }

    /// Returns the distinct values of `field` over the matching tasks.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::list`].
    pub fn list_values(
        &self,
        query: &TaskQuery,
        field: QueryField,
        direction: SortDirection,
    ) -> TaskResult<Vec<FilterValue>> {
        let caller = self.ports.current_caller();
        let values_plan = QueryPlan::build_for_values(query, field, direction)?;
        let plan = authorise(&self.ports, &caller, query, values_plan)?;
        Ok(self.ports.store.select_values(&plan, field)?)
    }

    fn plan(&self, query: &TaskQuery) -> TaskResult<QueryPlan> {
        authorised_plan(&self.ports, &self.ports.current_caller(), query)
    }
}

/// Builds the plan for `query` scoped to what `caller` may read.
pub(crate) fn authorised_plan(
    ports: &TaskPorts,
    caller: &Caller,
    query: &TaskQuery,
) -> TaskResult<QueryPlan> {
    let plan = QueryPlan::build(query)?;
    authorise(ports, caller, query, plan)
}

/// Admins see everything. Named workbaskets are checked up front;
/// otherwise the store filters by the caller's access ids.
fn authorise(
    ports: &TaskPorts,
    caller: &Caller,
    query: &TaskQuery,
    plan: QueryPlan,
) -> TaskResult<QueryPlan> {
    if caller.is_task_admin() {
        return Ok(plan);
    }
    let Some(named) = query.named_workbaskets() else {
        return Ok(plan.with_access_filter(caller.access_ids()));
    };
    for workbasket in &named {
        if ports.workbaskets.find_by_id(workbasket)?.is_none() {
            return Err(TaskError::NotFound(NotFoundTarget::Workbasket(
                workbasket.to_string(),
            )));
        }
        ports.require_permission(caller, workbasket, WorkbasketPermission::Read)?;
    }
    Ok(plan)
}
