//! Read-only summaries of collaborators owned by other services.

use super::{ClassificationId, TaskDomainError, WorkbasketId};
use chrono::TimeDelta;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static SERVICE_LEVEL_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^P(?:(?P<weeks>\d+)W)?(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+)(?:[.,](?P<fraction>\d{1,9}))?S)?)?$",
    )
});

/// Classification data relevant to task processing.
///
/// Only `id`, `key` and `category` are persisted with a task or attachment;
/// the remaining fields are looked up fresh for each operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    /// Classification identifier, once resolved.
    pub id: Option<ClassificationId>,
    /// Classification key, unique within a domain.
    pub key: String,
    /// Classification category.
    pub category: Option<String>,
    /// Domain the classification belongs to.
    pub domain: String,
    /// Display name.
    pub name: Option<String>,
    /// ISO-8601 service level, for example `P2D`.
    pub service_level: Option<String>,
    /// Priority contributed to the task.
    pub priority: i32,
}

impl ClassificationSummary {
    /// Creates an unresolved summary carrying only the key.
    #[must_use]
    pub fn from_key(key: impl Into<String>) -> Self {
        Self {
            id: None,
            key: key.into(),
            category: None,
            domain: String::new(),
            name: None,
            service_level: None,
            priority: 0,
        }
    }

    /// Returns the subset of fields kept in storage.
    #[must_use]
    pub fn stored_view(&self) -> Self {
        Self {
            id: self.id.clone(),
            key: self.key.clone(),
            category: self.category.clone(),
            domain: String::new(),
            name: None,
            service_level: None,
            priority: 0,
        }
    }

    /// Returns `true` when both summaries point at the same classification.
    #[must_use]
    pub fn same_classification(&self, other: &Self) -> bool {
        match (&self.id, &other.id) {
            (Some(left), Some(right)) => left == right,
            _ => self.key == other.key,
        }
    }

    /// Parses the service level, if the classification defines one.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidServiceLevel`] when the stored value
    /// is not an ISO-8601 duration.
    pub fn parsed_service_level(&self) -> Result<Option<ServiceLevel>, TaskDomainError> {
        self.service_level
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(ServiceLevel::parse)
            .transpose()
    }
}

/// Workbasket data carried by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbasketSummary {
    /// Workbasket identifier.
    pub id: WorkbasketId,
    /// Workbasket key, unique within a domain.
    pub key: String,
    /// Domain the workbasket belongs to.
    pub domain: String,
    /// Display name.
    pub name: Option<String>,
}

/// Target completion time of a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceLevel(TimeDelta);

impl ServiceLevel {
    /// Parses an ISO-8601 duration such as `P2D` or `PT36H`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidServiceLevel`] when the value does
    /// not match the duration grammar or overflows.
    pub fn parse(value: &str) -> Result<Self, TaskDomainError> {
        let invalid = || TaskDomainError::InvalidServiceLevel(value.to_owned());
        let pattern = SERVICE_LEVEL_PATTERN.as_ref().map_err(|_| invalid())?;
        let captures = pattern.captures(value.trim()).ok_or_else(invalid)?;
        let has_component = ["weeks", "days", "hours", "minutes", "seconds"]
            .iter()
            .any(|name| captures.name(name).is_some());
        if !has_component {
            return Err(invalid());
        }

        let component = |name: &str| -> Result<i64, TaskDomainError> {
            captures
                .name(name)
                .map_or(Ok(0), |found| found.as_str().parse::<i64>().map_err(|_| invalid()))
        };
        let nanos = captures.name("fraction").map_or(Ok(0), |found| {
            let digits = found.as_str();
            let padded = format!("{digits:0<9}");
            padded.parse::<i64>().map_err(|_| invalid())
        })?;

        let parts = [
            TimeDelta::try_weeks(component("weeks")?),
            TimeDelta::try_days(component("days")?),
            TimeDelta::try_hours(component("hours")?),
            TimeDelta::try_minutes(component("minutes")?),
            TimeDelta::try_seconds(component("seconds")?),
            Some(TimeDelta::nanoseconds(nanos)),
        ];
        parts
            .into_iter()
            .try_fold(TimeDelta::zero(), |total, part| {
                part.and_then(|delta| total.checked_add(&delta))
            })
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Creates a service level spanning whole days.
    #[must_use]
    pub fn from_days(days: i64) -> Option<Self> {
        TimeDelta::try_days(days).map(Self)
    }

    /// Returns the underlying duration.
    #[must_use]
    pub const fn duration(self) -> TimeDelta {
        self.0
    }

    /// Number of whole days, used as the working-day count.
    #[must_use]
    pub fn whole_days(self) -> i64 {
        self.0.num_days()
    }
}

impl fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
