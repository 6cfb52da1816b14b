//! Execution plans derived from task queries.

use super::{FilterClause, InvalidQueryError, QueryEntity, QueryField, TaskQuery};
use crate::task::domain::AccessId;
use std::collections::BTreeSet;

/// Entity joined to the task rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Join {
    /// Attachments of the task.
    Attachments,
    /// Secondary object references of the task.
    SecondaryReferences,
    /// Classification record of the task.
    Classification,
    /// Workbasket record of the task.
    Workbasket,
}

impl Join {
    const fn for_entity(entity: QueryEntity) -> Option<Self> {
        match entity {
            QueryEntity::Task => None,
            QueryEntity::Attachment => Some(Self::Attachments),
            QueryEntity::SecondaryReference => Some(Self::SecondaryReferences),
            QueryEntity::Classification => Some(Self::Classification),
            QueryEntity::Workbasket => Some(Self::Workbasket),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// One level of the compound sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    /// Sorted field.
    pub field: QueryField,
    /// Direction.
    pub direction: SortDirection,
}

/// Window of rows to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    /// Rows to skip.
    pub offset: usize,
    /// Maximum rows to return.
    pub limit: usize,
}

/// Validated query with its joins and scoping resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    clauses: Vec<FilterClause>,
    sort: Vec<SortKey>,
    joins: BTreeSet<Join>,
    distinct: bool,
    access_filter: Option<Vec<AccessId>>,
    page: Option<Page>,
}

impl QueryPlan {
    /// Validates `query` and derives the joins it needs.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidQueryError`] for an invalid clause or a sort key on
    /// a one-to-many field.
    pub fn build(query: &TaskQuery) -> Result<Self, InvalidQueryError> {
        for clause in query.clauses() {
            clause.validate()?;
        }
        if let Some(sort_key) = query
            .sort_keys()
            .iter()
            .find(|key| key.field.entity().is_one_to_many())
        {
            return Err(InvalidQueryError(format!(
                "cannot sort on {} because it may hold several values per task",
                sort_key.field
            )));
        }

        let fields = query
            .clauses()
            .iter()
            .map(|clause| clause.field)
            .chain(query.sort_keys().iter().map(|key| key.field));
        let joins: BTreeSet<Join> = fields
            .filter_map(|field| Join::for_entity(field.entity()))
            .collect();
        let distinct = joins
            .iter()
            .any(|join| matches!(join, Join::Attachments | Join::SecondaryReferences));

        Ok(Self {
            clauses: query.clauses().to_vec(),
            sort: query.sort_keys().to_vec(),
            joins,
            distinct,
            access_filter: None,
            page: None,
        })
    }

    /// Derives a plan selecting the distinct values of `field`, sorted in
    /// `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidQueryError`] for an invalid clause.
    pub fn build_for_values(
        query: &TaskQuery,
        field: QueryField,
        direction: SortDirection,
    ) -> Result<Self, InvalidQueryError> {
        let unsorted = TaskQuery::from_parts(query.clauses().to_vec(), Vec::new());
        let mut plan = Self::build(&unsorted)?;
        if let Some(join) = Join::for_entity(field.entity()) {
            plan.joins.insert(join);
        }
        plan.sort = vec![SortKey { field, direction }];
        plan.distinct = true;
        Ok(plan)
    }

    /// Restricts results to tasks whose workbasket grants read permission
    /// to one of `access_ids`.
    #[must_use]
    pub fn with_access_filter(mut self, access_ids: Vec<AccessId>) -> Self {
        self.access_filter = Some(access_ids);
        self
    }

    /// Limits results to a window.
    #[must_use]
    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Returns the AND-ed clauses.
    #[must_use]
    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// Returns the compound sort order.
    #[must_use]
    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    /// Returns the joins the plan needs.
    #[must_use]
    pub const fn joins(&self) -> &BTreeSet<Join> {
        &self.joins
    }

    /// Returns `true` when `join` is needed.
    #[must_use]
    pub fn requires(&self, join: Join) -> bool {
        self.joins.contains(&join)
    }

    /// Returns `true` when a one-to-many join requires duplicate elimination.
    #[must_use]
    pub const fn distinct(&self) -> bool {
        self.distinct
    }

    /// Returns the access ids used for read scoping, if any.
    #[must_use]
    pub fn access_filter(&self) -> Option<&[AccessId]> {
        self.access_filter.as_deref()
    }

    /// Returns the page window, if any.
    #[must_use]
    pub const fn page(&self) -> Option<Page> {
        self.page
    }
}
