use std::collections::BTreeSet;

use crate::frame::Frame;

/// Deduplicating set of pending recompute requests.
///
/// State mutations `mark` the specific recompute they require; the frame
/// loop `drain`s the set once per tick. Iteration follows `K`'s `Ord`, so
/// the processing order is deterministic regardless of the order in which
/// marks arrived.
#[derive(Debug, Clone)]
pub struct DirtySet<K: Ord> {
    pending: BTreeSet<K>,
    last_marked_frame: Option<u64>,
}

impl<K: Ord> Default for DirtySet<K> {
    fn default() -> Self {
        Self {
            pending: BTreeSet::new(),
            last_marked_frame: None,
        }
    }
}

impl<K: Ord + Clone> DirtySet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` dirty. Returns `true` if it was not already pending.
    pub fn mark(&mut self, key: K) -> bool {
        self.pending.insert(key)
    }

    /// Same as [`mark`](Self::mark), recording the frame for traceability.
    pub fn mark_in(&mut self, frame: Frame, key: K) -> bool {
        self.last_marked_frame = Some(frame.index);
        self.mark(key)
    }

    pub fn mark_all(&mut self, keys: impl IntoIterator<Item = K>) {
        self.pending.extend(keys);
    }

    pub fn is_dirty(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn last_marked_frame(&self) -> Option<u64> {
        self.last_marked_frame
    }

    /// Removes `key` without processing it.
    pub fn clear(&mut self, key: &K) -> bool {
        self.pending.remove(key)
    }

    /// Takes every pending key in deterministic order.
    pub fn drain(&mut self) -> Vec<K> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::DirtySet;
    use crate::frame::Frame;
    use foundation::time::Time;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Work {
        Camera,
        Markers,
        Labels,
    }

    #[test]
    fn deduplicates_and_drains_in_key_order() {
        let mut dirty = DirtySet::new();
        assert!(dirty.mark(Work::Labels));
        assert!(dirty.mark(Work::Camera));
        assert!(!dirty.mark(Work::Labels));
        dirty.mark(Work::Markers);

        assert_eq!(dirty.drain(), vec![Work::Camera, Work::Markers, Work::Labels]);
        assert!(dirty.is_empty());
    }

    #[test]
    fn records_frame_of_last_mark() {
        let mut dirty = DirtySet::new();
        let f = Frame::first(Time::ZERO).advance(Time(0.016));
        dirty.mark_in(f, Work::Camera);
        assert_eq!(dirty.last_marked_frame(), Some(1));
        assert!(dirty.clear(&Work::Camera));
        assert!(!dirty.is_dirty(&Work::Camera));
    }
}
