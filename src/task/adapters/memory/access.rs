//! Caller context with a replaceable caller.

use std::sync::{Arc, RwLock};

use crate::task::ports::{Caller, CallerContext};

/// Caller context returning whichever caller was set last.
#[derive(Debug, Clone)]
pub struct StaticCallerContext {
    caller: Arc<RwLock<Caller>>,
}

impl StaticCallerContext {
    /// Creates a context acting as `caller`.
    #[must_use]
    pub fn new(caller: Caller) -> Self {
        Self {
            caller: Arc::new(RwLock::new(caller)),
        }
    }

    /// Switches the acting caller for subsequent operations.
    pub fn act_as(&self, caller: Caller) {
        let mut current = self
            .caller
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *current = caller;
    }
}

impl CallerContext for StaticCallerContext {
    fn current(&self) -> Caller {
        self.caller
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}
