//! Per-call accumulation of item failures for bulk operations.

use std::collections::BTreeMap;
use std::fmt;

/// Key under which a bulk failure is recorded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BulkKey<K> {
    /// Failure blamed on a specific input item.
    Item(K),
    /// Residual failure that could not be attributed to an input item.
    Unattributed(usize),
}

impl<K: fmt::Display> fmt::Display for BulkKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(key) => write!(f, "{key}"),
            Self::Unattributed(index) => write!(f, "<unattributed #{index}>"),
        }
    }
}

/// Map from failed input keys to the reason each one failed.
///
/// Success is implicit: any input key without an entry was processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkResult<K: Ord, E> {
    errors: BTreeMap<BulkKey<K>, E>,
}

impl<K: Ord, E> Default for BulkResult<K, E> {
    fn default() -> Self {
        Self {
            errors: BTreeMap::new(),
        }
    }
}

impl<K: Ord, E> BulkResult<K, E> {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for `key`, keeping the first error recorded.
    pub fn add_error(&mut self, key: K, error: E) {
        self.errors.entry(BulkKey::Item(key)).or_insert(error);
    }

    /// Records a failure under a synthetic key.
    pub fn add_unattributed(&mut self, error: E) {
        let next = self
            .errors
            .keys()
            .filter(|key| matches!(key, BulkKey::Unattributed(_)))
            .count();
        self.errors.insert(BulkKey::Unattributed(next), error);
    }

    /// Returns the error recorded for `key`.
    #[must_use]
    pub fn error_for(&self, key: &K) -> Option<&E>
    where
        K: Clone,
    {
        self.errors.get(&BulkKey::Item(key.clone()))
    }

    /// Returns `true` when `key` has a recorded failure.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool
    where
        K: Clone,
    {
        self.error_for(key).is_some()
    }

    /// Returns the attributed keys that failed.
    pub fn failed_ids(&self) -> impl Iterator<Item = &K> {
        self.errors.keys().filter_map(|key| match key {
            BulkKey::Item(item) => Some(item),
            BulkKey::Unattributed(_) => None,
        })
    }

    /// Returns every recorded failure.
    pub fn iter(&self) -> impl Iterator<Item = (&BulkKey<K>, &E)> {
        self.errors.iter()
    }

    /// Returns the number of failures whose key is synthetic.
    #[must_use]
    pub fn unattributed_count(&self) -> usize {
        self.errors
            .keys()
            .filter(|key| matches!(key, BulkKey::Unattributed(_)))
            .count()
    }

    /// Returns `true` when at least one failure was recorded.
    #[must_use]
    pub fn contains_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` when no failure was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Folds `other` into `self`; attributed keys already present keep their
    /// first error and synthetic keys are renumbered.
    pub fn merge(&mut self, other: Self) {
        for (key, error) in other.errors {
            match key {
                BulkKey::Item(item) => self.add_error(item, error),
                BulkKey::Unattributed(_) => self.add_unattributed(error),
            }
        }
    }

    /// Converts the errors into another type, keeping the keys.
    #[must_use]
    pub fn map_errors<F, T>(self, mut convert: F) -> BulkResult<K, T>
    where
        F: FnMut(E) -> T,
    {
        BulkResult {
            errors: self
                .errors
                .into_iter()
                .map(|(key, error)| (key, convert(error)))
                .collect(),
        }
    }
}

impl<K: Ord, E> IntoIterator for BulkResult<K, E> {
    type Item = (BulkKey<K>, E);
    type IntoIter = std::collections::btree_map::IntoIter<BulkKey<K>, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
