//! Routing rule port used by reroute.

use crate::task::domain::{Task, WorkbasketId};

/// Decides which workbasket a task belongs in.
pub trait TaskRouter: Send + Sync {
    /// Returns the destination for `task`, or `None` when no rule applies.
    fn route(&self, task: &Task) -> Option<WorkbasketId>;
}

/// Router that never proposes a destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRouting;

impl TaskRouter for NoRouting {
    fn route(&self, _task: &Task) -> Option<WorkbasketId> {
        None
    }
}
