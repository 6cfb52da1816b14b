//! Audit history sink port.

use crate::task::domain::{AccessId, FieldChange, TaskId, TaskSummary};
use chrono::{DateTime, Utc};

/// Significant transition recorded in the task history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskEventKind {
    /// Task created.
    Created,
    /// Task claimed.
    Claimed,
    /// Claim released.
    ClaimCancelled,
    /// Task completed.
    Completed,
    /// Task attributes updated.
    Updated,
    /// Task moved to another workbasket on request.
    Transferred,
    /// Task moved to another workbasket by routing.
    Rerouted,
}

/// One history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHistoryEvent {
    /// Kind of transition.
    pub kind: TaskEventKind,
    /// Affected task.
    pub task_id: TaskId,
    /// User that triggered the transition.
    pub user_id: AccessId,
    /// Time of the transition.
    pub occurred_at: DateTime<Utc>,
    /// Task before the transition, absent for creation.
    pub before: Option<TaskSummary>,
    /// Task after the transition.
    pub after: TaskSummary,
    /// Attributes that changed.
    pub changes: Vec<FieldChange>,
}

/// Receiver of task history events.
///
/// Failures inside the sink are the sink's concern; recording never fails
/// an engine operation.
pub trait TaskHistorySink: Send + Sync {
    /// Returns `true` when events should be produced at all.
    fn is_enabled(&self) -> bool;

    /// Records one event.
    fn record(&self, event: TaskHistoryEvent);
}

/// Sink used when history is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledHistorySink;

impl TaskHistorySink for DisabledHistorySink {
    fn is_enabled(&self) -> bool {
        false
    }

    fn record(&self, _event: TaskHistoryEvent) {}
}
