use std::collections::BTreeSet;

use crate::site::SiteId;

/// Deterministic multi-select set of site ids.
///
/// Ordering contract:
/// - Iteration yields ids in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<SiteId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.ids.is_empty();
        self.ids.clear();
        changed
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &SiteId) -> bool {
        self.ids.contains(id)
    }

    /// Inserts `id`. Returns `true` if the set changed.
    pub fn insert(&mut self, id: SiteId) -> bool {
        self.ids.insert(id)
    }

    /// Removes `id`. Returns `true` if the set changed.
    pub fn remove(&mut self, id: &SiteId) -> bool {
        self.ids.remove(id)
    }

    /// Adds `id` if absent, removes it if present. Returns the new membership.
    pub fn toggle(&mut self, id: SiteId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Replaces the whole selection with `id` alone.
    pub fn select_only(&mut self, id: SiteId) -> bool {
        if self.ids.len() == 1 && self.ids.contains(&id) {
            return false;
        }
        self.ids.clear();
        self.ids.insert(id);
        true
    }

    /// Drops ids rejected by `keep`. Returns `true` if anything was removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&SiteId) -> bool) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| keep(id));
        self.ids.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteId> + '_ {
        self.ids.iter()
    }
}
