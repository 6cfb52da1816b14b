//! Filter clauses, fields and values of task queries.

use crate::task::domain::{
    AccessId, CallbackState, ClassificationId, CustomField, CustomIntField, ExternalId, TaskId,
    TaskState, WorkbasketId,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Error raised for a query that cannot be executed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid task query: {0}")]
pub struct InvalidQueryError(pub String);

/// Entity a query field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryEntity {
    /// The task row itself.
    Task,
    /// Task attachments, one-to-many.
    Attachment,
    /// Secondary object references, one-to-many.
    SecondaryReference,
    /// The task classification record.
    Classification,
    /// The task workbasket record.
    Workbasket,
}

impl QueryEntity {
    /// Returns `true` when joining the entity can multiply task rows.
    #[must_use]
    pub const fn is_one_to_many(self) -> bool {
        matches!(self, Self::Attachment | Self::SecondaryReference)
    }
}

/// Type of the values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Free text and identifiers.
    Text,
    /// Integers.
    Integer,
    /// Flags.
    Boolean,
    /// Instants.
    Timestamp,
}

/// Field a task query can filter or sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryField {
    /// Task identifier.
    TaskId,
    /// External identifier.
    ExternalId,
    /// Lifecycle state.
    State,
    /// Callback handshake state.
    CallbackState,
    /// Owner.
    Owner,
    /// Creator.
    Creator,
    /// Workbasket identifier.
    WorkbasketId,
    /// Workbasket key.
    WorkbasketKey,
    /// Workbasket domain.
    Domain,
    /// Classification identifier.
    ClassificationId,
    /// Classification key.
    ClassificationKey,
    /// Classification category.
    ClassificationCategory,
    /// Priority.
    Priority,
    /// Display name.
    Name,
    /// Note.
    Note,
    /// Business process identifier.
    BusinessProcessId,
    /// Parent business process identifier.
    ParentBusinessProcessId,
    /// Creation timestamp.
    Created,
    /// Modification timestamp.
    Modified,
    /// Claim timestamp.
    Claimed,
    /// Completion timestamp.
    Completed,
    /// Planned start.
    Planned,
    /// Due date.
    Due,
    /// Receive timestamp.
    Received,
    /// Read flag.
    Read,
    /// Transferred flag.
    Transferred,
    /// A custom text field.
    Custom(CustomField),
    /// A custom integer field.
    CustomInt(CustomIntField),
    /// Primary reference company.
    PrimaryCompany,
    /// Primary reference system.
    PrimarySystem,
    /// Primary reference system instance.
    PrimarySystemInstance,
    /// Primary reference type.
    PrimaryType,
    /// Primary reference value.
    PrimaryValue,
    /// Attachment classification key.
    AttachmentClassificationKey,
    /// Attachment classification identifier.
    AttachmentClassificationId,
    /// Attachment channel.
    AttachmentChannel,
    /// Attachment object reference value.
    AttachmentReferenceValue,
    /// Attachment receive timestamp.
    AttachmentReceived,
    /// Secondary reference company.
    SecondaryCompany,
    /// Secondary reference system.
    SecondarySystem,
    /// Secondary reference system instance.
    SecondarySystemInstance,
    /// Secondary reference type.
    SecondaryType,
    /// Secondary reference value.
    SecondaryValue,
    /// Name of the task classification.
    ClassificationName,
    /// Name of the task workbasket.
    WorkbasketName,
}

impl QueryField {
    /// Entity holding the field.
    #[must_use]
    pub const fn entity(self) -> QueryEntity {
        match self {
            Self::AttachmentClassificationKey
            | Self::AttachmentClassificationId
            | Self::AttachmentChannel
            | Self::AttachmentReferenceValue
            | Self::AttachmentReceived => QueryEntity::Attachment,
            Self::SecondaryCompany
            | Self::SecondarySystem
            | Self::SecondarySystemInstance
            | Self::SecondaryType
            | Self::SecondaryValue => QueryEntity::SecondaryReference,
            Self::ClassificationName => QueryEntity::Classification,
            Self::WorkbasketName => QueryEntity::Workbasket,
            _ => QueryEntity::Task,
        }
    }

    /// Kind of values stored in the field.
    #[must_use]
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::Priority | Self::CustomInt(_) => ValueKind::Integer,
            Self::Read | Self::Transferred => ValueKind::Boolean,
            Self::Created
            | Self::Modified
            | Self::Claimed
            | Self::Completed
            | Self::Planned
            | Self::Due
            | Self::Received
            | Self::AttachmentReceived => ValueKind::Timestamp,
            _ => ValueKind::Text,
        }
    }

    /// Stable name used in messages and as a column alias.
    #[must_use]
    pub fn name(self) -> String {
        let fixed = match self {
            Self::Custom(field) => return field.as_str().to_owned(),
            Self::CustomInt(field) => return field.as_str().to_owned(),
            Self::TaskId => "id",
            Self::ExternalId => "external_id",
            Self::State => "state",
            Self::CallbackState => "callback_state",
            Self::Owner => "owner",
            Self::Creator => "creator",
            Self::WorkbasketId => "workbasket_id",
            Self::WorkbasketKey => "workbasket_key",
            Self::Domain => "domain",
            Self::ClassificationId => "classification_id",
            Self::ClassificationKey => "classification_key",
            Self::ClassificationCategory => "classification_category",
            Self::Priority => "priority",
            Self::Name => "name",
            Self::Note => "note",
            Self::BusinessProcessId => "business_process_id",
            Self::ParentBusinessProcessId => "parent_business_process_id",
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
            Self::Planned => "planned",
            Self::Due => "due",
            Self::Received => "received",
            Self::Read => "is_read",
            Self::Transferred => "is_transferred",
            Self::PrimaryCompany => "por_company",
            Self::PrimarySystem => "por_system",
            Self::PrimarySystemInstance => "por_system_instance",
            Self::PrimaryType => "por_type",
            Self::PrimaryValue => "por_value",
            Self::AttachmentClassificationKey => "attachment_classification_key",
            Self::AttachmentClassificationId => "attachment_classification_id",
            Self::AttachmentChannel => "attachment_channel",
            Self::AttachmentReferenceValue => "attachment_reference_value",
            Self::AttachmentReceived => "attachment_received",
            Self::SecondaryCompany => "object_reference_company",
            Self::SecondarySystem => "object_reference_system",
            Self::SecondarySystemInstance => "object_reference_system_instance",
            Self::SecondaryType => "object_reference_type",
            Self::SecondaryValue => "object_reference_value",
            Self::ClassificationName => "classification_name",
            Self::WorkbasketName => "workbasket_name",
        };
        fixed.to_owned()
    }
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A value compared against a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterValue {
    /// Absent value.
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Flag value.
    Boolean(bool),
    /// Instant value.
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    /// Kind of the value; `None` for [`FilterValue::Null`].
    #[must_use]
    pub const fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Text(_) => Some(ValueKind::Text),
            Self::Integer(_) => Some(ValueKind::Integer),
            Self::Boolean(_) => Some(ValueKind::Boolean),
            Self::Timestamp(_) => Some(ValueKind::Timestamp),
        }
    }

    /// Returns `true` for [`FilterValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Orders two values of the same kind; `Null` sorts first.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) => Some(Ordering::Less),
            (_, Self::Null) => Some(Ordering::Greater),
            (Self::Text(left), Self::Text(right)) => Some(left.cmp(right)),
            (Self::Integer(left), Self::Integer(right)) => Some(left.cmp(right)),
            (Self::Boolean(left), Self::Boolean(right)) => Some(left.cmp(right)),
            (Self::Timestamp(left), Self::Timestamp(right)) => Some(left.cmp(right)),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<TaskState> for FilterValue {
    fn from(value: TaskState) -> Self {
        Self::Text(value.as_str().to_owned())
    }
}

impl From<CallbackState> for FilterValue {
    fn from(value: CallbackState) -> Self {
        Self::Text(value.as_str().to_owned())
    }
}

impl From<TaskId> for FilterValue {
    fn from(value: TaskId) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

macro_rules! text_filter_value {
    ($($name:ty),+) => {
        $(
            impl From<$name> for FilterValue {
                fn from(value: $name) -> Self {
                    Self::Text(value.as_str().to_owned())
                }
            }

            impl From<&$name> for FilterValue {
                fn from(value: &$name) -> Self {
                    Self::Text(value.as_str().to_owned())
                }
            }
        )+
    };
}

text_filter_value!(ExternalId, WorkbasketId, ClassificationId, AccessId);

/// Inclusive range; a missing bound leaves that side open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    /// Lower bound.
    pub lower: Option<FilterValue>,
    /// Upper bound.
    pub upper: Option<FilterValue>,
}

impl Interval {
    /// Range with both bounds.
    #[must_use]
    pub fn between(lower: impl Into<FilterValue>, upper: impl Into<FilterValue>) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: Some(upper.into()),
        }
    }

    /// Range open towards the future or larger values.
    #[must_use]
    pub fn at_least(lower: impl Into<FilterValue>) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: None,
        }
    }

    /// Range open towards the past or smaller values.
    #[must_use]
    pub fn at_most(upper: impl Into<FilterValue>) -> Self {
        Self {
            lower: None,
            upper: Some(upper.into()),
        }
    }

    /// Returns `true` when `value` lies inside the range.
    #[must_use]
    pub fn contains(&self, value: &FilterValue) -> bool {
        if value.is_null() {
            return false;
        }
        let above_lower = self.lower.as_ref().is_none_or(|lower| {
            matches!(value.compare(lower), Some(Ordering::Greater | Ordering::Equal))
        });
        let below_upper = self.upper.as_ref().is_none_or(|upper| {
            matches!(value.compare(upper), Some(Ordering::Less | Ordering::Equal))
        });
        above_lower && below_upper
    }

    fn validate(&self, field: QueryField) -> Result<(), InvalidQueryError> {
        let (lower, upper) = (self.lower.as_ref(), self.upper.as_ref());
        if lower.is_none_or(FilterValue::is_null) && upper.is_none_or(FilterValue::is_null) {
            return Err(InvalidQueryError(format!(
                "interval on {field} must have at least one bound"
            )));
        }
        for bound in [lower, upper].into_iter().flatten() {
            if bound.kind().is_some_and(|kind| kind != field.kind()) || bound.is_null() {
                return Err(InvalidQueryError(format!(
                    "interval bound {bound:?} does not match {field}"
                )));
            }
        }
        if let (Some(low), Some(high)) = (lower, upper) {
            if low.compare(high) == Some(Ordering::Greater) {
                return Err(InvalidQueryError(format!(
                    "interval on {field} has its lower bound after its upper bound"
                )));
            }
        }
        Ok(())
    }
}

/// Predicate applied to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Value equals one of the listed values; `Null` matches absent values.
    In(Vec<FilterValue>),
    /// Value equals none of the listed values; absent values pass unless
    /// `Null` is listed.
    NotIn(Vec<FilterValue>),
    /// Value matches one of the case-insensitive `%`/`_` patterns.
    Like(Vec<String>),
    /// Value matches none of the patterns; absent values pass.
    NotLike(Vec<String>),
    /// Value lies within one of the intervals.
    Within(Vec<Interval>),
}

/// One AND-ed clause of a task query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterClause {
    /// Filtered field.
    pub field: QueryField,
    /// Predicate on the field.
    pub condition: Condition,
}

impl FilterClause {
    /// Checks that the clause can be evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidQueryError`] for an empty value list, a value of the
    /// wrong type, a pattern on a non-text field, or a malformed interval.
    pub fn validate(&self) -> Result<(), InvalidQueryError> {
        let field = self.field;
        match &self.condition {
            Condition::In(values) | Condition::NotIn(values) => {
                if values.is_empty() {
                    return Err(InvalidQueryError(format!("no values given for {field}")));
                }
                if let Some(bad) = values
                    .iter()
                    .find(|value| value.kind().is_some_and(|kind| kind != field.kind()))
                {
                    return Err(InvalidQueryError(format!(
                        "value {bad:?} does not match {field}"
                    )));
                }
                Ok(())
            }
            Condition::Like(patterns) | Condition::NotLike(patterns) => {
                if patterns.is_empty() {
                    return Err(InvalidQueryError(format!("no patterns given for {field}")));
                }
                if field.kind() != ValueKind::Text {
                    return Err(InvalidQueryError(format!(
                        "pattern matching is only supported on text fields, not {field}"
                    )));
                }
                Ok(())
            }
            Condition::Within(intervals) => {
                if intervals.is_empty() {
                    return Err(InvalidQueryError(format!("no intervals given for {field}")));
                }
                if !matches!(field.kind(), ValueKind::Integer | ValueKind::Timestamp) {
                    return Err(InvalidQueryError(format!(
                        "intervals are only supported on integer and timestamp fields, not {field}"
                    )));
                }
                intervals
                    .iter()
                    .try_for_each(|interval| interval.validate(field))
            }
        }
    }
}
