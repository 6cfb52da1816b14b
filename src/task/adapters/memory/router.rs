//! Routing by classification key.

use std::collections::HashMap;

use crate::task::{
    domain::{Task, WorkbasketId},
    ports::TaskRouter,
};

/// Router sending tasks to a fixed workbasket per classification key.
#[derive(Debug, Clone, Default)]
pub struct StaticRouter {
    routes: HashMap<String, WorkbasketId>,
}

impl StaticRouter {
    /// Creates a router without routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes tasks classified as `classification_key` to `workbasket`.
    #[must_use]
    pub fn with_route(
        mut self,
        classification_key: impl Into<String>,
        workbasket: WorkbasketId,
    ) -> Self {
        self.routes.insert(classification_key.into(), workbasket);
        self
    }
}

impl TaskRouter for StaticRouter {
    fn route(&self, task: &Task) -> Option<WorkbasketId> {
        self.routes.get(&task.classification().key).cloned()
    }
}
