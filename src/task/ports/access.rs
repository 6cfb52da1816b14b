//! Caller identity and authorisation port.

use crate::task::domain::AccessId;
use std::fmt;

/// Role granted to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Ordinary user.
    User,
    /// Business administrator.
    BusinessAdmin,
    /// Technical administrator.
    Admin,
    /// Read-only monitor.
    Monitor,
    /// Task administrator, unrestricted on task queries.
    TaskAdmin,
    /// Automated routing component.
    TaskRouter,
}

/// Workbasket permission checked before task operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkbasketPermission {
    /// See tasks of the workbasket.
    Read,
    /// Open tasks of the workbasket.
    Open,
    /// Put tasks into the workbasket.
    Append,
    /// Move tasks out of the workbasket.
    Transfer,
    /// Distribute tasks from the workbasket.
    Distribute,
}

impl fmt::Display for WorkbasketPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "READ",
            Self::Open => "OPEN",
            Self::Append => "APPEND",
            Self::Transfer => "TRANSFER",
            Self::Distribute => "DISTRIBUTE",
        };
        f.write_str(name)
    }
}

/// Authenticated caller of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    user_id: AccessId,
    group_ids: Vec<AccessId>,
    roles: Vec<Role>,
}

impl Caller {
    /// Creates a caller with the [`Role::User`] role and no groups.
    #[must_use]
    pub fn new(user_id: AccessId) -> Self {
        Self {
            user_id,
            group_ids: Vec::new(),
            roles: vec![Role::User],
        }
    }

    /// Sets the groups the caller belongs to.
    #[must_use]
    pub fn with_groups(mut self, group_ids: impl IntoIterator<Item = AccessId>) -> Self {
        self.group_ids = group_ids.into_iter().collect();
        self
    }

    /// Sets the caller roles.
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    /// Returns the user identifier.
    #[must_use]
    pub const fn user_id(&self) -> &AccessId {
        &self.user_id
    }

    /// Returns the group identifiers.
    #[must_use]
    pub fn group_ids(&self) -> &[AccessId] {
        &self.group_ids
    }

    /// Returns the user id followed by the group ids.
    #[must_use]
    pub fn access_ids(&self) -> Vec<AccessId> {
        std::iter::once(self.user_id.clone())
            .chain(self.group_ids.iter().cloned())
            .collect()
    }

    /// Returns `true` when the caller has any of `roles`.
    #[must_use]
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.roles.iter().any(|role| roles.contains(role))
    }

    /// Returns `true` for callers whose task queries are unrestricted.
    #[must_use]
    pub fn is_task_admin(&self) -> bool {
        self.has_any_role(&[Role::Admin, Role::TaskAdmin])
    }
}

/// Source of the caller of the current operation.
pub trait CallerContext: Send + Sync {
    /// Returns the caller on whose behalf the engine acts.
    fn current(&self) -> Caller;
}
