//! Composable task queries.
//!
//! A [`TaskQuery`] is an immutable list of filter clauses plus a compound
//! sort order. Clauses are AND-ed; the values of one clause are OR-ed.
//! [`QueryPlan::build`] validates a query and works out which entities must
//! be joined, so adapters never inspect clauses to decide on joins.
//!
//! ```
//! use tasklane::task::domain::TaskState;
//! use tasklane::task::query::{QueryField, SortDirection, TaskQuery};
//!
//! let query = TaskQuery::new()
//!     .state_in([TaskState::Ready])
//!     .priority_in([5, 9])
//!     .order_by(QueryField::Due, SortDirection::Ascending);
//! assert_eq!(query.clauses().len(), 2);
//! ```

mod clause;
mod plan;

pub use clause::{
    Condition, FilterClause, FilterValue, Interval, InvalidQueryError, QueryEntity, QueryField,
    ValueKind,
};
pub use plan::{Join, Page, QueryPlan, SortDirection, SortKey};

use crate::task::domain::{
    AccessId, CallbackState, CustomField, ExternalId, ObjectReference, TaskId, TaskState,
    WorkbasketId,
};

/// Immutable task query built by chaining.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    clauses: Vec<FilterClause>,
    sort: Vec<SortKey>,
}

impl TaskQuery {
    /// Creates a query matching every task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) const fn from_parts(clauses: Vec<FilterClause>, sort: Vec<SortKey>) -> Self {
        Self { clauses, sort }
    }

    /// Adds a clause.
    #[must_use]
    pub fn filter(mut self, field: QueryField, condition: Condition) -> Self {
        self.clauses.push(FilterClause { field, condition });
        self
    }

    /// Keeps tasks whose `field` equals one of `values`.
    #[must_use]
    pub fn field_in<V: Into<FilterValue>>(
        self,
        field: QueryField,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(field, Condition::In(collect_values(values)))
    }

    /// Keeps tasks whose `field` equals none of `values`.
    #[must_use]
    pub fn field_not_in<V: Into<FilterValue>>(
        self,
        field: QueryField,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(field, Condition::NotIn(collect_values(values)))
    }

    /// Keeps tasks whose `field` matches one of the `%`/`_` patterns,
    /// ignoring case.
    #[must_use]
    pub fn field_like<P: Into<String>>(
        self,
        field: QueryField,
        patterns: impl IntoIterator<Item = P>,
    ) -> Self {
        self.filter(field, Condition::Like(patterns.into_iter().map(Into::into).collect()))
    }

    /// Keeps tasks whose `field` matches none of the patterns.
    #[must_use]
    pub fn field_not_like<P: Into<String>>(
        self,
        field: QueryField,
        patterns: impl IntoIterator<Item = P>,
    ) -> Self {
        self.filter(
            field,
            Condition::NotLike(patterns.into_iter().map(Into::into).collect()),
        )
    }

    /// Keeps tasks whose `field` lies within one of `intervals`.
    #[must_use]
    pub fn field_within(self, field: QueryField, intervals: impl IntoIterator<Item = Interval>) -> Self {
        self.filter(field, Condition::Within(intervals.into_iter().collect()))
    }

    /// Appends a sort level; earlier levels take precedence.
    #[must_use]
    pub fn order_by(mut self, field: QueryField, direction: SortDirection) -> Self {
        self.sort.push(SortKey { field, direction });
        self
    }

    /// Keeps tasks with one of the identifiers.
    #[must_use]
    pub fn task_id_in(self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.field_in(QueryField::TaskId, ids)
    }

    /// Keeps tasks with one of the external identifiers.
    #[must_use]
    pub fn external_id_in(self, ids: impl IntoIterator<Item = ExternalId>) -> Self {
        self.field_in(QueryField::ExternalId, ids)
    }

    /// Keeps tasks in one of the states.
    #[must_use]
    pub fn state_in(self, states: impl IntoIterator<Item = TaskState>) -> Self {
        self.field_in(QueryField::State, states)
    }

    /// Drops tasks in any of the states.
    #[must_use]
    pub fn state_not_in(self, states: impl IntoIterator<Item = TaskState>) -> Self {
        self.field_not_in(QueryField::State, states)
    }

    /// Keeps tasks in one of the callback states.
    #[must_use]
    pub fn callback_state_in(self, states: impl IntoIterator<Item = CallbackState>) -> Self {
        self.field_in(QueryField::CallbackState, states)
    }

    /// Keeps tasks with one of the priorities.
    #[must_use]
    pub fn priority_in(self, priorities: impl IntoIterator<Item = i32>) -> Self {
        self.field_in(QueryField::Priority, priorities)
    }

    /// Keeps tasks owned by one of the access ids; `None` selects unowned
    /// tasks.
    #[must_use]
    pub fn owner_in(self, owners: impl IntoIterator<Item = Option<AccessId>>) -> Self {
        self.field_in(QueryField::Owner, owners)
    }

    /// Keeps tasks in one of the workbaskets.
    #[must_use]
    pub fn workbasket_id_in(self, ids: impl IntoIterator<Item = WorkbasketId>) -> Self {
        self.field_in(QueryField::WorkbasketId, ids)
    }

    /// Keeps tasks with one of the classification keys.
    #[must_use]
    pub fn classification_key_in<V: Into<String>>(self, keys: impl IntoIterator<Item = V>) -> Self {
        self.field_in(QueryField::ClassificationKey, keys.into_iter().map(Into::into))
    }

    /// Keeps tasks whose name matches one of the patterns.
    #[must_use]
    pub fn name_like<P: Into<String>>(self, patterns: impl IntoIterator<Item = P>) -> Self {
        self.field_like(QueryField::Name, patterns)
    }

    /// Keeps tasks whose custom field equals one of `values`.
    #[must_use]
    pub fn custom_field_in<V: Into<FilterValue>>(
        self,
        field: CustomField,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.field_in(QueryField::Custom(field), values)
    }

    /// Keeps tasks whose custom field matches one of the patterns.
    #[must_use]
    pub fn custom_field_like<P: Into<String>>(
        self,
        field: CustomField,
        patterns: impl IntoIterator<Item = P>,
    ) -> Self {
        self.field_like(QueryField::Custom(field), patterns)
    }

    /// Keeps tasks whose primary object reference equals `reference`.
    ///
    /// System and system instance are only compared when set.
    #[must_use]
    pub fn primary_object_reference_is(self, reference: &ObjectReference) -> Self {
        let mut query = self
            .field_in(QueryField::PrimaryCompany, [reference.company()])
            .field_in(QueryField::PrimaryType, [reference.kind()])
            .field_in(QueryField::PrimaryValue, [reference.value()]);
        if let Some(system) = reference.system() {
            query = query.field_in(QueryField::PrimarySystem, [system]);
        }
        if let Some(instance) = reference.system_instance() {
            query = query.field_in(QueryField::PrimarySystemInstance, [instance]);
        }
        query
    }

    /// Keeps tasks with an attachment of one of the classification keys.
    #[must_use]
    pub fn attachment_classification_key_in<V: Into<String>>(
        self,
        keys: impl IntoIterator<Item = V>,
    ) -> Self {
        self.field_in(
            QueryField::AttachmentClassificationKey,
            keys.into_iter().map(Into::into),
        )
    }

    /// Keeps tasks with an attachment received through one of the channels.
    #[must_use]
    pub fn attachment_channel_in<V: Into<String>>(self, channels: impl IntoIterator<Item = V>) -> Self {
        self.field_in(QueryField::AttachmentChannel, channels.into_iter().map(Into::into))
    }

    /// Keeps tasks with a secondary reference holding one of the values.
    #[must_use]
    pub fn secondary_reference_value_in<V: Into<String>>(
        self,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.field_in(QueryField::SecondaryValue, values.into_iter().map(Into::into))
    }

    /// Keeps tasks planned within one of the intervals.
    #[must_use]
    pub fn planned_within(self, intervals: impl IntoIterator<Item = Interval>) -> Self {
        self.field_within(QueryField::Planned, intervals)
    }

    /// Keeps tasks due within one of the intervals.
    #[must_use]
    pub fn due_within(self, intervals: impl IntoIterator<Item = Interval>) -> Self {
        self.field_within(QueryField::Due, intervals)
    }

    /// Keeps tasks whose classification name matches one of the patterns.
    #[must_use]
    pub fn classification_name_like<P: Into<String>>(self, patterns: impl IntoIterator<Item = P>) -> Self {
        self.field_like(QueryField::ClassificationName, patterns)
    }

    /// Keeps tasks whose workbasket name matches one of the patterns.
    #[must_use]
    pub fn workbasket_name_like<P: Into<String>>(self, patterns: impl IntoIterator<Item = P>) -> Self {
        self.field_like(QueryField::WorkbasketName, patterns)
    }

    /// Returns the clauses.
    #[must_use]
    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// Returns the sort order.
    #[must_use]
    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    /// Workbaskets named by positive workbasket-id clauses, if any.
    #[must_use]
    pub fn named_workbaskets(&self) -> Option<Vec<WorkbasketId>> {
        let named: Vec<WorkbasketId> = self
            .clauses
            .iter()
            .filter(|clause| clause.field == QueryField::WorkbasketId)
            .filter_map(|clause| match &clause.condition {
                Condition::In(values) => Some(values),
                _ => None,
            })
            .flatten()
            .filter_map(|value| value.as_text().and_then(|text| WorkbasketId::new(text).ok()))
            .collect();
        (!named.is_empty()).then_some(named)
    }
}

fn collect_values<V: Into<FilterValue>>(values: impl IntoIterator<Item = V>) -> Vec<FilterValue> {
    values.into_iter().map(Into::into).collect()
}
