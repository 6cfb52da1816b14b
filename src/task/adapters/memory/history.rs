//! History sink that keeps events in memory.

use std::sync::{Arc, Mutex, PoisonError};

use crate::task::{
    domain::TaskId,
    ports::{TaskHistoryEvent, TaskHistorySink},
};

/// Sink collecting every recorded event in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingHistorySink {
    events: Arc<Mutex<Vec<TaskHistoryEvent>>>,
}

impl RecordingHistorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TaskHistoryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the events recorded for one task.
    #[must_use]
    pub fn events_for(&self, task_id: TaskId) -> Vec<TaskHistoryEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.task_id == task_id)
            .collect()
    }
}

impl TaskHistorySink for RecordingHistorySink {
    fn is_enabled(&self) -> bool {
        true
    }

    fn record(&self, event: TaskHistoryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
