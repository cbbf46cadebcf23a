// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named advisory locks gating playback writes.

use crate::element::ElementId;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

/// Lock name used when none (or an unusable one) is supplied
pub const DEFAULT_LOCK: &str = "Default";

/// Lock name normalization
pub struct LockName;

impl LockName {
    /// Whether `name` can identify a lock on its own
    pub fn is_valid(name: &str) -> bool {
        !name.trim().is_empty()
    }

    /// Resolve a caller-supplied lock name, falling back to [`DEFAULT_LOCK`]
    pub fn normalize(name: Option<&str>) -> &str {
        match name {
            Some(name) if Self::is_valid(name) => name,
            _ => DEFAULT_LOCK,
        }
    }
}

/// Per-element sets of named locks.
///
/// An element is locked while its set is non-empty.
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    locks: HashMap<ElementId, IndexSet<String>>,
}

impl LockTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lock. Returns true if the element holds the lock afterwards.
    pub fn lock(&mut self, element: ElementId, name: Option<&str>) -> bool {
        let name = LockName::normalize(name);
        let added = self.locks.entry(element).or_default().insert(name.to_string());
        if added {
            tracing::debug!("Locked element {} with {:?}", element, name);
        }
        true
    }

    /// Remove a lock. Returns true if the element no longer holds it.
    pub fn unlock(&mut self, element: ElementId, name: Option<&str>) -> bool {
        let name = LockName::normalize(name);
        if let Some(names) = self.locks.get_mut(&element) {
            if names.shift_remove(name) {
                tracing::debug!("Unlocked element {} from {:?}", element, name);
            }
            if names.is_empty() {
                self.locks.remove(&element);
            }
        }
        true
    }

    /// Whether the element holds any lock
    pub fn is_locked(&self, element: ElementId) -> bool {
        self.locks.get(&element).is_some_and(|names| !names.is_empty())
    }

    /// Lock names held by the element, in acquisition order
    pub fn locks_for(&self, element: ElementId) -> impl Iterator<Item = &str> {
        self.locks
            .get(&element)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    /// Elements locked right now
    pub fn snapshot(&self) -> HashSet<ElementId> {
        self.locks
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_normalization() {
        assert_eq!(LockName::normalize(None), DEFAULT_LOCK);
        assert_eq!(LockName::normalize(Some("")), DEFAULT_LOCK);
        assert_eq!(LockName::normalize(Some("   ")), DEFAULT_LOCK);
        assert_eq!(LockName::normalize(Some("Cutscene")), "Cutscene");
    }

    #[test]
    fn test_named_locks_coexist() {
        let mut table = LockTable::new();
        let door = ElementId::new();

        assert!(!table.is_locked(door));
        assert!(table.lock(door, None));
        assert!(table.lock(door, Some("Cutscene")));
        assert_eq!(table.locks_for(door).collect::<Vec<_>>(), vec![DEFAULT_LOCK, "Cutscene"]);

        assert!(table.unlock(door, Some("Cutscene")));
        assert!(table.is_locked(door));
        assert!(table.unlock(door, Some("")));
        assert!(!table.is_locked(door));
    }

    #[test]
    fn test_unlock_of_missing_lock_succeeds() {
        let mut table = LockTable::new();
        let door = ElementId::new();
        table.lock(door, Some("A"));

        assert!(table.unlock(door, Some("B")));
        assert!(table.is_locked(door));
        assert!(table.unlock(ElementId::new(), None));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut table = LockTable::new();
        let door = ElementId::new();
        let window = ElementId::new();
        table.lock(door, None);

        let snapshot = table.snapshot();
        table.lock(window, None);
        table.unlock(door, None);

        assert!(snapshot.contains(&door));
        assert!(!snapshot.contains(&window));
        table.unlock(window, None);
        assert!(table.snapshot().is_empty());
    }
}
