//! Skip list
//!
//! Ordered, probabilistically balanced in-memory index. The list owns all of
//! its nodes in an arena; forward links are arena indices, with a header
//! sentinel owning the top-level links. At every level the reachable entries
//! are strictly ordered by key; at level 0 every live entry is reachable.

use parking_lot::{RwLock, RwLockReadGuard};
use rand::Rng;

use crate::entry::{Entry, Lookup};

/// Height cap for any node
const MAX_HEIGHT: usize = 16;

/// Probability of a node extending one more level
const P_NEXT_LEVEL: f64 = 0.25;

struct Node {
    entry: Entry,
    /// Forward links, one per level this node participates in
    next: Vec<Option<usize>>,
}

/// Either the header sentinel or a node in the arena
#[derive(Clone, Copy)]
enum Pred {
    Head,
    Node(usize),
}

struct Inner {
    nodes: Vec<Node>,
    /// Header sentinel's forward links
    head: [Option<usize>; MAX_HEIGHT],
}

/// Ordered in-memory index of entries.
///
/// One reader/writer lock over the whole structure: writers exclude all other
/// access, readers run concurrently. Iterators hold the read guard for their
/// lifetime, so the list cannot be mutated out from under them.
pub struct SkipList {
    inner: RwLock<Inner>,
}

impl SkipList {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                nodes: Vec::new(),
                head: [None; MAX_HEIGHT],
            }),
        }
    }

    /// Insert or update an entry.
    ///
    /// An exact key match updates the existing node in place; no duplicate
    /// nodes per key ever exist. Tombstones take this same path, overwriting
    /// the prior value in place.
    pub fn insert(&self, entry: Entry) {
        let mut inner = self.inner.write();
        let mut preds = [Pred::Head; MAX_HEIGHT];
        let mut prev = Pred::Head;

        for lvl in (0..MAX_HEIGHT).rev() {
            while let Some(nxt) = inner.next_of(prev, lvl) {
                match inner.nodes[nxt].entry.key.as_slice().cmp(entry.key.as_slice()) {
                    std::cmp::Ordering::Less => prev = Pred::Node(nxt),
                    std::cmp::Ordering::Equal => {
                        inner.nodes[nxt].entry = entry;
                        return;
                    }
                    std::cmp::Ordering::Greater => break,
                }
            }
            preds[lvl] = prev;
        }

        let height = random_height();
        let idx = inner.nodes.len();
        inner.nodes.push(Node {
            entry,
            next: vec![None; height],
        });
        for (lvl, pred) in preds.iter().enumerate().take(height) {
            let after = inner.next_of(*pred, lvl);
            inner.nodes[idx].next[lvl] = after;
            inner.set_next(*pred, lvl, Some(idx));
        }
    }

    /// Mark a key deleted.
    ///
    /// Always materializes a tombstone: an existing node is overwritten in
    /// place, an absent key gets a fresh tombstone node so the delete stays
    /// visible to flushing and compaction.
    pub fn delete(&self, key: impl Into<Vec<u8>>, version: u64) {
        self.insert(Entry::tombstone(key, version));
    }

    /// Point lookup with tombstone discrimination.
    pub fn search(&self, key: &[u8]) -> Lookup {
        let inner = self.inner.read();
        let mut prev = Pred::Head;

        for lvl in (0..MAX_HEIGHT).rev() {
            while let Some(nxt) = inner.next_of(prev, lvl) {
                match inner.nodes[nxt].entry.key.as_slice().cmp(key) {
                    std::cmp::Ordering::Less => prev = Pred::Node(nxt),
                    std::cmp::Ordering::Equal => {
                        let entry = &inner.nodes[nxt].entry;
                        return if entry.deleted {
                            Lookup::Deleted
                        } else {
                            Lookup::Found(entry.value.clone())
                        };
                    }
                    std::cmp::Ordering::Greater => break,
                }
            }
        }
        Lookup::NotFound
    }

    /// Number of nodes (distinct keys, tombstones included).
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forward iterator over all entries in ascending key order.
    pub fn iter(&self) -> SkipListIter<'_> {
        let guard = self.inner.read();
        let cur = guard.head[0];
        SkipListIter {
            guard,
            cur,
            end: None,
        }
    }

    /// Forward iterator starting at the first key `>= key`.
    pub fn iter_from(&self, key: &[u8]) -> SkipListIter<'_> {
        let guard = self.inner.read();
        let cur = guard.seek(key);
        SkipListIter {
            guard,
            cur,
            end: None,
        }
    }

    /// Range scan over `[start, end)` in ascending key order.
    pub fn range(&self, start: &[u8], end: &[u8]) -> SkipListIter<'_> {
        let guard = self.inner.read();
        let cur = guard.seek(start);
        SkipListIter {
            guard,
            cur,
            end: Some(end.to_vec()),
        }
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn next_of(&self, pred: Pred, lvl: usize) -> Option<usize> {
        match pred {
            Pred::Head => self.head[lvl],
            Pred::Node(i) => self.nodes[i].next.get(lvl).copied().flatten(),
        }
    }

    /// First node with key `>= key`, if any.
    fn seek(&self, key: &[u8]) -> Option<usize> {
        let mut prev = Pred::Head;
        for lvl in (0..MAX_HEIGHT).rev() {
            while let Some(nxt) = self.next_of(prev, lvl) {
                if self.nodes[nxt].entry.key.as_slice() < key {
                    prev = Pred::Node(nxt);
                } else {
                    break;
                }
            }
        }
        self.next_of(prev, 0)
    }

    fn set_next(&mut self, pred: Pred, lvl: usize, to: Option<usize>) {
        match pred {
            Pred::Head => self.head[lvl] = to,
            Pred::Node(i) => self.nodes[i].next[lvl] = to,
        }
    }
}

fn random_height() -> usize {
    let mut rng = rand::thread_rng();
    let mut height = 1;
    while height < MAX_HEIGHT && rng.gen::<f64>() < P_NEXT_LEVEL {
        height += 1;
    }
    height
}

/// Iterator over level-0 links, yielding entries in ascending key order.
///
/// Holds the list's read guard: mutation is excluded until the iterator is
/// dropped.
pub struct SkipListIter<'a> {
    guard: RwLockReadGuard<'a, Inner>,
    cur: Option<usize>,
    /// Exclusive upper bound for range scans
    end: Option<Vec<u8>>,
}

impl Iterator for SkipListIter<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        let node = &self.guard.nodes[idx];
        if let Some(end) = &self.end {
            if node.entry.key.as_slice() >= end.as_slice() {
                self.cur = None;
                return None;
            }
        }
        self.cur = node.next[0];
        Some(node.entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn iteration_is_sorted_after_random_inserts() {
        let list = SkipList::new();
        let mut keys: Vec<u32> = (0..500).collect();
        keys.shuffle(&mut rand::thread_rng());

        for k in &keys {
            list.insert(Entry::new(format!("key{:05}", k), b"v".to_vec(), *k as u64));
        }

        let collected: Vec<Vec<u8>> = list.iter().map(|e| e.key).collect();
        assert_eq!(collected.len(), 500);
        for window in collected.windows(2) {
            assert!(window[0] < window[1], "keys out of order");
        }
    }

    #[test]
    fn update_in_place_keeps_single_node() {
        let list = SkipList::new();
        list.insert(Entry::new("k", "v1", 1));
        list.insert(Entry::new("k", "v2", 2));

        assert_eq!(list.len(), 1);
        assert_eq!(list.search(b"k"), Lookup::Found(b"v2".to_vec()));
    }

    #[test]
    fn tombstone_reads_as_deleted() {
        let list = SkipList::new();
        list.insert(Entry::new("k", "v", 1));
        list.delete("k", 2);

        assert_eq!(list.search(b"k"), Lookup::Deleted);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn delete_of_absent_key_creates_tombstone() {
        let list = SkipList::new();
        list.delete("ghost", 1);

        assert_eq!(list.search(b"ghost"), Lookup::Deleted);
        assert_eq!(list.len(), 1);

        let entries: Vec<Entry> = list.iter().collect();
        assert!(entries[0].deleted);
    }

    #[test]
    fn search_misses_cleanly() {
        let list = SkipList::new();
        list.insert(Entry::new("b", "v", 1));
        assert_eq!(list.search(b"a"), Lookup::NotFound);
        assert_eq!(list.search(b"c"), Lookup::NotFound);
    }

    #[test]
    fn range_scan_respects_bounds() {
        let list = SkipList::new();
        for k in ["a", "b", "c", "d", "e"] {
            list.insert(Entry::new(k, "v", 1));
        }

        let keys: Vec<Vec<u8>> = list.range(b"b", b"e").map(|e| e.key).collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);

        assert_eq!(list.range(b"x", b"z").count(), 0);
    }

    #[test]
    fn iter_from_seeks_to_key() {
        let list = SkipList::new();
        for k in ["a", "c", "e", "g"] {
            list.insert(Entry::new(k, "v", 1));
        }

        let keys: Vec<Vec<u8>> = list.iter_from(b"c").map(|e| e.key).collect();
        assert_eq!(keys, vec![b"c".to_vec(), b"e".to_vec(), b"g".to_vec()]);

        let keys: Vec<Vec<u8>> = list.iter_from(b"d").map(|e| e.key).collect();
        assert_eq!(keys, vec![b"e".to_vec(), b"g".to_vec()]);
    }
}
