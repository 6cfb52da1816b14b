//! Collaborators shared by the task services.

use super::error::{NotFoundTarget, TaskError, TaskResult};
use crate::task::{
    config::TaskEngineConfig,
    domain::{AccessId, Task, TaskSummary, WorkbasketId, WorkingDayCalendar},
    ports::{
        Caller, CallerContext, ClassificationLookup, DisabledHistorySink, NoRouting,
        TaskEventKind, TaskHistoryEvent, TaskHistorySink, TaskRouter, TaskStore, Workbasket,
        WorkbasketLookup, WorkbasketPermission,
    },
};
use chrono::{DateTime, SubsecRound, Utc};
use mockable::Clock;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Fractional-second digits kept by stored timestamps.
const STORED_SUBSEC_DIGITS: u16 = 6;

/// Workbasket addressed by identifier or by key within a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkbasketRef {
    /// Workbasket identifier.
    Id(WorkbasketId),
    /// Workbasket key and domain.
    KeyDomain {
        /// Workbasket key.
        key: String,
        /// Workbasket domain.
        domain: String,
    },
}

impl fmt::Display for WorkbasketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::KeyDomain { key, domain } => write!(f, "{key}@{domain}"),
        }
    }
}

impl From<WorkbasketId> for WorkbasketRef {
    fn from(id: WorkbasketId) -> Self {
        Self::Id(id)
    }
}

/// Ports and settings every task service works with.
#[derive(Clone)]
pub struct TaskPorts {
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) workbaskets: Arc<dyn WorkbasketLookup>,
    pub(crate) classifications: Arc<dyn ClassificationLookup>,
    pub(crate) caller: Arc<dyn CallerContext>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) history: Arc<dyn TaskHistorySink>,
    pub(crate) router: Arc<dyn TaskRouter>,
    pub(crate) calendar: WorkingDayCalendar,
    pub(crate) config: TaskEngineConfig,
}

impl TaskPorts {
    /// Creates the port set with history and routing disabled and the
    /// default configuration.
    #[must_use]
    pub fn new(
        store: Arc<dyn TaskStore>,
        workbaskets: Arc<dyn WorkbasketLookup>,
        classifications: Arc<dyn ClassificationLookup>,
        caller: Arc<dyn CallerContext>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let config = TaskEngineConfig::default();
        Self {
            store,
            workbaskets,
            classifications,
            caller,
            clock,
            history: Arc::new(DisabledHistorySink),
            router: Arc::new(NoRouting),
            calendar: config.working_days.calendar(),
            config,
        }
    }

    /// Sets the history sink.
    #[must_use]
    pub fn with_history(mut self, history: Arc<dyn TaskHistorySink>) -> Self {
        self.history = history;
        self
    }

    /// Sets the routing rule used by reroute.
    #[must_use]
    pub fn with_router(mut self, router: Arc<dyn TaskRouter>) -> Self {
        self.router = router;
        self
    }

    /// Sets the engine configuration and rebuilds the calendar from it.
    #[must_use]
    pub fn with_config(mut self, config: TaskEngineConfig) -> Self {
        self.calendar = config.working_days.calendar();
        self.config = config;
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &TaskEngineConfig {
        &self.config
    }

    /// Returns the working-day calendar.
    #[must_use]
    pub const fn calendar(&self) -> &WorkingDayCalendar {
        &self.calendar
    }

    /// Current instant, truncated to the precision stored rows keep.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.utc().trunc_subsecs(STORED_SUBSEC_DIGITS)
    }

    pub(crate) fn current_caller(&self) -> Caller {
        self.caller.current()
    }

    pub(crate) fn resolve_workbasket(&self, reference: &WorkbasketRef) -> TaskResult<Workbasket> {
        let found = match reference {
            WorkbasketRef::Id(id) => self.workbaskets.find_by_id(id)?,
            WorkbasketRef::KeyDomain { key, domain } => self.workbaskets.find_by_key(key, domain)?,
        };
        found.ok_or_else(|| TaskError::NotFound(NotFoundTarget::Workbasket(reference.to_string())))
    }

    pub(crate) fn require_permission(
        &self,
        caller: &Caller,
        workbasket: &WorkbasketId,
        permission: WorkbasketPermission,
    ) -> TaskResult<()> {
        let granted = self
            .workbaskets
            .has_permission(&caller.access_ids(), workbasket, permission)?;
        if granted {
            Ok(())
        } else {
            Err(TaskError::not_authorized(
                caller.user_id(),
                format!("workbasket {workbasket}"),
                permission,
            ))
        }
    }

    /// Records a history event when the sink is enabled.
    pub(crate) fn record_event(
        &self,
        kind: TaskEventKind,
        user_id: &AccessId,
        before: Option<TaskSummary>,
        after: &Task,
    ) {
        if !self.history.is_enabled() {
            return;
        }
        let after_summary = TaskSummary::from(after);
        let changes = match &before {
            Some(previous) => previous.diff(&after_summary).unwrap_or_else(|err| {
                warn!(task_id = %after.id(), error = %err, "failed to compute history diff");
                Vec::new()
            }),
            None => Vec::new(),
        };
        self.history.record(TaskHistoryEvent {
            kind,
            task_id: after.id(),
            user_id: user_id.clone(),
            occurred_at: after.modified(),
            before,
            after: after_summary,
            changes,
        });
    }

    pub(crate) fn history_enabled(&self) -> bool {
        self.history.is_enabled()
    }
}
