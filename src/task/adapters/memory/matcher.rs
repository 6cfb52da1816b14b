//! Evaluation of query plans over in-memory task rows.
//!
//! A task joined with attachments and secondary references expands into one
//! row per combination, like an SQL outer join. The task matches when any
//! row satisfies every clause.

use std::cmp::Ordering;

use regex::Regex;

use crate::task::{
    domain::{Attachment, ClassificationSummary, SecondaryObjectReference, Task},
    ports::Workbasket,
    query::{Condition, FilterValue, Interval, QueryField, QueryPlan, SortDirection, SortKey},
};

/// A task with the records its plan may join.
#[derive(Debug, Clone, Copy)]
pub(super) struct Candidate<'a> {
    pub(super) task: &'a Task,
    pub(super) attachments: &'a [Attachment],
    pub(super) references: &'a [SecondaryObjectReference],
    pub(super) classification: Option<&'a ClassificationSummary>,
    pub(super) workbasket: Option<&'a Workbasket>,
}

/// One joined row.
#[derive(Debug, Clone, Copy)]
pub(super) struct Row<'a> {
    task: &'a Task,
    attachment: Option<&'a Attachment>,
    reference: Option<&'a SecondaryObjectReference>,
    classification: Option<&'a ClassificationSummary>,
    workbasket: Option<&'a Workbasket>,
}

impl<'a> Candidate<'a> {
    pub(super) fn rows(&self) -> Vec<Row<'a>> {
        let attachments: Vec<Option<&'a Attachment>> = if self.attachments.is_empty() {
            vec![None]
        } else {
            self.attachments.iter().map(Some).collect()
        };
        let references: Vec<Option<&'a SecondaryObjectReference>> = if self.references.is_empty()
        {
            vec![None]
        } else {
            self.references.iter().map(Some).collect()
        };
        let mut rows = Vec::with_capacity(attachments.len() * references.len());
        for attachment in &attachments {
            for reference in &references {
                rows.push(Row {
                    task: self.task,
                    attachment: *attachment,
                    reference: *reference,
                    classification: self.classification,
                    workbasket: self.workbasket,
                });
            }
        }
        rows
    }

    /// Row used for task-level values such as sort keys.
    pub(super) const fn task_row(&self) -> Row<'a> {
        Row {
            task: self.task,
            attachment: None,
            reference: None,
            classification: self.classification,
            workbasket: self.workbasket,
        }
    }
}

enum Test {
    In(Vec<FilterValue>),
    NotIn(Vec<FilterValue>),
    Like(Vec<Regex>),
    NotLike(Vec<Regex>),
    Within(Vec<Interval>),
}

impl Test {
    fn passes(&self, value: &FilterValue) -> bool {
        match self {
            Self::In(values) => values.contains(value),
            Self::NotIn(values) => !values.contains(value),
            Self::Like(patterns) => value
                .as_text()
                .is_some_and(|text| patterns.iter().any(|pattern| pattern.is_match(text))),
            Self::NotLike(patterns) => value
                .as_text()
                .is_none_or(|text| !patterns.iter().any(|pattern| pattern.is_match(text))),
            Self::Within(intervals) => intervals.iter().any(|interval| interval.contains(value)),
        }
    }
}

/// Compiled clauses of a plan.
pub(super) struct Matcher {
    clauses: Vec<(QueryField, Test)>,
}

impl Matcher {
    /// Compiles the clauses of `plan`.
    pub(super) fn compile(plan: &QueryPlan) -> Result<Self, regex::Error> {
        let mut clauses = Vec::with_capacity(plan.clauses().len());
        for clause in plan.clauses() {
            let test = match &clause.condition {
                Condition::In(values) => Test::In(values.clone()),
                Condition::NotIn(values) => Test::NotIn(values.clone()),
                Condition::Like(patterns) => Test::Like(compile_patterns(patterns)?),
                Condition::NotLike(patterns) => Test::NotLike(compile_patterns(patterns)?),
                Condition::Within(intervals) => Test::Within(intervals.clone()),
            };
            clauses.push((clause.field, test));
        }
        Ok(Self { clauses })
    }

    /// Returns `true` when the row satisfies every clause.
    pub(super) fn row_matches(&self, row: &Row<'_>) -> bool {
        self.clauses
            .iter()
            .all(|(field, test)| test.passes(&value_of(*field, row)))
    }

    /// Returns `true` when any joined row of the candidate matches.
    pub(super) fn matches(&self, candidate: &Candidate<'_>) -> bool {
        if self.clauses.is_empty() {
            return true;
        }
        candidate.rows().iter().any(|row| self.row_matches(row))
    }
}

/// Translates a `%`/`_` pattern into an anchored case-insensitive regex.
pub(super) fn like_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expression = String::from("(?is)^");
    let mut literal = String::new();
    for symbol in pattern.chars() {
        match symbol {
            '%' | '_' => {
                expression.push_str(&regex::escape(&literal));
                literal.clear();
                expression.push_str(if symbol == '%' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    expression.push_str(&regex::escape(&literal));
    expression.push('$');
    Regex::new(&expression)
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|pattern| like_pattern(pattern)).collect()
}

/// Orders candidates by the compound sort, then by task identifier.
pub(super) fn compare_candidates(
    sort: &[SortKey],
    left: &Candidate<'_>,
    right: &Candidate<'_>,
) -> Ordering {
    let (left_row, right_row) = (left.task_row(), right.task_row());
    sort.iter()
        .map(|key| {
            let ordering = compare_values(
                &value_of(key.field, &left_row),
                &value_of(key.field, &right_row),
            );
            apply_direction(ordering, key.direction)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| left.task.id().cmp(&right.task.id()))
}

pub(super) fn compare_values(left: &FilterValue, right: &FilterValue) -> Ordering {
    left.compare(right).unwrap_or(Ordering::Equal)
}

pub(super) const fn apply_direction(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Reads `field` from a joined row.
pub(super) fn value_of(field: QueryField, row: &Row<'_>) -> FilterValue {
    let task = row.task;
    let primary = task.primary_object_reference();
    let attachment = row.attachment;
    let secondary = row.reference.map(SecondaryObjectReference::reference);
    match field {
        QueryField::TaskId => task.id().into(),
        QueryField::ExternalId => task.external_id().into(),
        QueryField::State => task.state().into(),
        QueryField::CallbackState => task.callback_state().into(),
        QueryField::Owner => task.owner().into(),
        QueryField::Creator => task.creator().into(),
        QueryField::WorkbasketId => (&task.workbasket().id).into(),
        QueryField::WorkbasketKey => task.workbasket().key.as_str().into(),
        QueryField::Domain => task.workbasket().domain.as_str().into(),
        QueryField::ClassificationId => task.classification().id.as_ref().into(),
        QueryField::ClassificationKey => task.classification().key.as_str().into(),
        QueryField::ClassificationCategory => task.classification().category.as_deref().into(),
        QueryField::Priority => task.priority().into(),
        QueryField::Name => task.name().into(),
        QueryField::Note => task.note().into(),
        QueryField::BusinessProcessId => task.business_process_id().into(),
        QueryField::ParentBusinessProcessId => task.parent_business_process_id().into(),
        QueryField::Created => task.created().into(),
        QueryField::Modified => task.modified().into(),
        QueryField::Claimed => task.claimed().into(),
        QueryField::Completed => task.completed().into(),
        QueryField::Planned => task.planned().into(),
        QueryField::Due => task.due().into(),
        QueryField::Received => task.received().into(),
        QueryField::Read => task.is_read().into(),
        QueryField::Transferred => task.is_transferred().into(),
        QueryField::Custom(custom) => task.custom_field(custom).into(),
        QueryField::CustomInt(custom) => task.custom_int_field(custom).into(),
        QueryField::PrimaryCompany => primary.company().into(),
        QueryField::PrimarySystem => primary.system().into(),
        QueryField::PrimarySystemInstance => primary.system_instance().into(),
        QueryField::PrimaryType => primary.kind().into(),
        QueryField::PrimaryValue => primary.value().into(),
        QueryField::AttachmentClassificationKey => attachment
            .map(|item| item.classification().key.as_str())
            .into(),
        QueryField::AttachmentClassificationId => attachment
            .and_then(|item| item.classification().id.as_ref())
            .into(),
        QueryField::AttachmentChannel => attachment.and_then(Attachment::channel).into(),
        QueryField::AttachmentReferenceValue => attachment
            .and_then(Attachment::object_reference)
            .map(|reference| reference.value())
            .into(),
        QueryField::AttachmentReceived => attachment.and_then(Attachment::received).into(),
        QueryField::SecondaryCompany => secondary.map(|reference| reference.company()).into(),
        QueryField::SecondarySystem => secondary.and_then(|reference| reference.system()).into(),
        QueryField::SecondarySystemInstance => secondary
            .and_then(|reference| reference.system_instance())
            .into(),
        QueryField::SecondaryType => secondary.map(|reference| reference.kind()).into(),
        QueryField::SecondaryValue => secondary.map(|reference| reference.value()).into(),
        QueryField::ClassificationName => row
            .classification
            .and_then(|classification| classification.name.as_deref())
            .into(),
        QueryField::WorkbasketName => row
            .workbasket
            .and_then(|workbasket| workbasket.summary.name.as_deref())
            .into(),
    }
}
