// nestdb-core/src/skiplist.rs
// ============================================================================
// Module: Concurrent Ordered Map
// Description: Lock-based lazy skip list with linearizable point operations.
// Purpose: Back every collection with a sorted, concurrently writable map.
// Dependencies: arc-swap, parking_lot, rand, tokio
// ============================================================================

//! ## Overview
//! The skip list is the only shared mutable structure between request tasks.
//! Point operations (`find`, `upsert`, `remove`) are linearizable; `query`
//! returns a range snapshot validated by an operation counter and retries
//! when a writer interferes. Traversal is lock-free: forward pointers are
//! atomic [`Arc`] cells, so readers never take a lock and unlinked nodes are
//! reclaimed by reference counting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use parking_lot::MutexGuard;
use parking_lot::RwLock;
use rand::Rng;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of forward-pointer levels in every list.
///
/// Level draws are geometric with p = 0.5, so this comfortably covers maps
/// far larger than any realistic collection.
pub const MAX_LEVEL: usize = 24;

// ============================================================================
// SECTION: Node Representation
// ============================================================================

/// Node key with head/tail sentinels ordered below and above every entry.
enum NodeKey<K> {
    /// Head sentinel, smaller than every entry.
    Min,
    /// A stored key.
    Entry(K),
    /// Tail sentinel, larger than every entry.
    Max,
}

impl<K: Ord> NodeKey<K> {
    /// Returns true when this key sorts strictly before `key`.
    fn is_before(&self, key: &K) -> bool {
        match self {
            Self::Min => true,
            Self::Entry(k) => k < key,
            Self::Max => false,
        }
    }

    /// Returns true when this key equals `key`.
    fn is_entry(&self, key: &K) -> bool {
        match self {
            Self::Entry(k) => k == key,
            Self::Min | Self::Max => false,
        }
    }

    /// Returns true when this key sorts strictly before the lower bound.
    /// An absent bound is unbounded, so nothing sorts before it.
    fn below_bound(&self, lo: Option<&K>) -> bool {
        match (self, lo) {
            (Self::Min, _) => true,
            (Self::Entry(k), Some(lo)) => k < lo,
            (Self::Entry(_), None) | (Self::Max, _) => false,
        }
    }
}

/// A skip-list node.
///
/// # Invariants
/// - `next` has exactly `top_level + 1` slots (sentinels aside).
/// - A node is live once `fully_linked` is set and until `marked` is set.
/// - `value` is `Some` for every entry node and `None` only for sentinels.
struct Node<K, V> {
    /// Node key, sentinel-aware.
    key: NodeKey<K>,
    /// Stored value; replaced in place under `lock` on update.
    value: RwLock<Option<V>>,
    /// Highest level this node participates in.
    top_level: usize,
    /// Node lock serializing in-place updates, marking, and linking.
    lock: Mutex<()>,
    /// Logical-removal flag; set before physical unlink.
    marked: AtomicBool,
    /// Set once every predecessor references this node.
    fully_linked: AtomicBool,
    /// Forward pointers, slot per level.
    next: Vec<ArcSwap<Node<K, V>>>,
}

impl<K, V> Node<K, V> {
    /// Returns true when the node is fully linked and not marked.
    fn is_live(&self) -> bool {
        self.fully_linked.load(Ordering::Acquire) && !self.marked.load(Ordering::Acquire)
    }
}

// ============================================================================
// SECTION: Skip List
// ============================================================================

/// Concurrent ordered map from `K` to `V`.
///
/// # Invariants
/// - Successful `upsert`/`remove` increments the operation counter exactly
///   once; failed operations leave the map and the counter untouched.
/// - A key reachable from the head is reachable at every level up to its
///   node's `top_level` once the node is fully linked.
pub struct SkipList<K, V> {
    /// Head sentinel; owns a forward pointer at every level.
    head: Arc<Node<K, V>>,
    /// Count of committed writes, used to validate range scans.
    ops: AtomicU64,
}

/// Traversal outcome: predecessor and successor at every level, plus the
/// highest level at which the key itself was found.
struct Search<K, V> {
    /// Highest level whose successor carries the key, if any.
    level_found: Option<usize>,
    /// Last node before the key at each level.
    preds: Vec<Arc<Node<K, V>>>,
    /// First node at-or-after the key at each level.
    succs: Vec<Arc<Node<K, V>>>,
}

impl<K, V> Default for SkipList<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SkipList<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Creates an empty list with both sentinels linked.
    #[must_use]
    pub fn new() -> Self {
        let tail = Arc::new(Node {
            key: NodeKey::Max,
            value: RwLock::new(None),
            top_level: 0,
            lock: Mutex::new(()),
            marked: AtomicBool::new(false),
            fully_linked: AtomicBool::new(true),
            next: Vec::new(),
        });
        let head = Arc::new(Node {
            key: NodeKey::Min,
            value: RwLock::new(None),
            top_level: MAX_LEVEL - 1,
            lock: Mutex::new(()),
            marked: AtomicBool::new(false),
            fully_linked: AtomicBool::new(true),
            next: (0..MAX_LEVEL).map(|_| ArcSwap::from(Arc::clone(&tail))).collect(),
        });
        Self {
            head,
            ops: AtomicU64::new(0),
        }
    }

    /// Descends from the top level recording predecessors and successors.
    ///
    /// Lock-free; observes any linearization of concurrent writers.
    fn search(&self, key: &K) -> Search<K, V> {
        let mut preds = vec![Arc::clone(&self.head); MAX_LEVEL];
        let mut succs = vec![Arc::clone(&self.head); MAX_LEVEL];
        let mut level_found = None;

        let mut pred = Arc::clone(&self.head);
        for level in (0..MAX_LEVEL).rev() {
            let mut curr = pred.next[level].load_full();
            while curr.key.is_before(key) {
                pred = Arc::clone(&curr);
                curr = pred.next[level].load_full();
            }
            if level_found.is_none() && curr.key.is_entry(key) {
                level_found = Some(level);
            }
            preds[level] = Arc::clone(&pred);
            succs[level] = curr;
        }

        Search {
            level_found,
            preds,
            succs,
        }
    }

    /// Returns the value stored under `key` if a live node carries it.
    #[must_use]
    pub fn find(&self, key: &K) -> Option<V> {
        let search = self.search(key);
        let level = search.level_found?;
        let node = &search.succs[level];
        if node.is_live() {
            node.value.read().clone()
        } else {
            None
        }
    }

    /// Creates or updates the entry for `key`, driven by `decider`.
    ///
    /// The decider receives the key and the current value (`None` when the
    /// key is absent) and returns the replacement value or an error. On an
    /// error the map is left untouched and the error is surfaced. Returns
    /// `true` when an existing value was replaced in place, `false` when a
    /// new node was spliced in.
    ///
    /// The decider may run more than once: the optimistic insert path
    /// revalidates its predecessors and retries from scratch when a
    /// concurrent writer interferes.
    pub fn upsert<E, F>(&self, key: K, mut decider: F) -> Result<bool, E>
    where
        F: FnMut(&K, Option<&V>) -> Result<V, E>,
    {
        let top_level = random_level();
        loop {
            let search = self.search(&key);
            if let Some(level) = search.level_found {
                let found = Arc::clone(&search.succs[level]);
                if found.marked.load(Ordering::Acquire) {
                    // Mid-removal; wait for the unlink and retry.
                    continue;
                }
                while !found.fully_linked.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                let guard = found.lock.lock();
                if found.marked.load(Ordering::Acquire) {
                    drop(guard);
                    continue;
                }
                let current = found.value.read().clone();
                let updated = decider(&key, current.as_ref())?;
                *found.value.write() = Some(updated);
                drop(guard);
                self.ops.fetch_add(1, Ordering::AcqRel);
                return Ok(true);
            }

            // Absent: ask the decider before taking any lock.
            let value = decider(&key, None)?;

            let mut guards: Vec<MutexGuard<'_, ()>> = Vec::with_capacity(top_level + 1);
            let mut last_locked: Option<&Arc<Node<K, V>>> = None;
            let mut valid = true;
            for level in 0..=top_level {
                let pred = &search.preds[level];
                let succ = &search.succs[level];
                if !last_locked.is_some_and(|locked| Arc::ptr_eq(locked, pred)) {
                    guards.push(pred.lock.lock());
                    last_locked = Some(pred);
                }
                let unmarked = !pred.marked.load(Ordering::Acquire)
                    && !succ.marked.load(Ordering::Acquire);
                let connected = Arc::ptr_eq(&pred.next[level].load_full(), succ);
                if !unmarked || !connected {
                    valid = false;
                    break;
                }
            }
            if !valid {
                drop(guards);
                continue;
            }

            let node = Arc::new(Node {
                key: NodeKey::Entry(key.clone()),
                value: RwLock::new(Some(value)),
                top_level,
                lock: Mutex::new(()),
                marked: AtomicBool::new(false),
                fully_linked: AtomicBool::new(false),
                next: (0..=top_level)
                    .map(|level| ArcSwap::from(Arc::clone(&search.succs[level])))
                    .collect(),
            });
            // Link bottom-up so lower levels are reachable first.
            for level in 0..=top_level {
                search.preds[level].next[level].store(Arc::clone(&node));
            }
            node.fully_linked.store(true, Ordering::Release);
            drop(guards);
            self.ops.fetch_add(1, Ordering::AcqRel);
            return Ok(false);
        }
    }

    /// Removes the entry for `key`, returning its value.
    ///
    /// Marks the victim under its own lock (logical removal), then unlinks
    /// it top-down under the predecessor locks. Returns `None` when no live,
    /// fully linked node carries the key.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut victim: Option<Arc<Node<K, V>>> = None;
        loop {
            let search = self.search(key);
            let node = if let Some(marked) = victim.clone() {
                marked
            } else {
                let level = search.level_found?;
                let candidate = Arc::clone(&search.succs[level]);
                if !candidate.fully_linked.load(Ordering::Acquire)
                    || candidate.marked.load(Ordering::Acquire)
                    || candidate.top_level != level
                {
                    return None;
                }
                let guard = candidate.lock.lock();
                if candidate.marked.load(Ordering::Acquire) {
                    // Another remover won the race.
                    drop(guard);
                    return None;
                }
                candidate.marked.store(true, Ordering::Release);
                drop(guard);
                victim = Some(Arc::clone(&candidate));
                candidate
            };

            let top_level = node.top_level;
            let mut guards: Vec<MutexGuard<'_, ()>> = Vec::with_capacity(top_level + 1);
            let mut last_locked: Option<&Arc<Node<K, V>>> = None;
            let mut valid = true;
            for level in 0..=top_level {
                let pred = &search.preds[level];
                if !last_locked.is_some_and(|locked| Arc::ptr_eq(locked, pred)) {
                    guards.push(pred.lock.lock());
                    last_locked = Some(pred);
                }
                let connected = Arc::ptr_eq(&pred.next[level].load_full(), &node);
                if pred.marked.load(Ordering::Acquire) || !connected {
                    valid = false;
                    break;
                }
            }
            if !valid {
                drop(guards);
                continue;
            }

            // Unlink top-down; the victim stays intact for readers mid-walk.
            for level in (0..=top_level).rev() {
                let succ = node.next[level].load_full();
                search.preds[level].next[level].store(succ);
            }
            drop(guards);
            self.ops.fetch_add(1, Ordering::AcqRel);
            return node.value.read().clone();
        }
    }

    /// Returns every live `(key, value)` with `lo <= key <= hi` in key
    /// order. `None` bounds are unbounded.
    ///
    /// The scan is validated against the operation counter: when a write
    /// commits during the walk the result is discarded and the scan retried
    /// after yielding to the scheduler. Cancelling the caller (dropping the
    /// future) aborts the retry loop.
    pub async fn query(&self, lo: Option<&K>, hi: Option<&K>) -> Vec<(K, V)> {
        loop {
            let before = self.ops.load(Ordering::Acquire);
            let pairs = self.scan(lo, hi);
            if self.ops.load(Ordering::Acquire) == before {
                return pairs;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Single level-0 pass collecting live pairs within the bounds.
    fn scan(&self, lo: Option<&K>, hi: Option<&K>) -> Vec<(K, V)> {
        // Descend toward the lower bound before walking level 0.
        let mut pred = Arc::clone(&self.head);
        for level in (0..MAX_LEVEL).rev() {
            let mut curr = pred.next[level].load_full();
            while curr.key.below_bound(lo) {
                pred = Arc::clone(&curr);
                curr = pred.next[level].load_full();
            }
        }

        let mut pairs = Vec::new();
        let mut curr = pred.next[0].load_full();
        loop {
            match &curr.key {
                NodeKey::Max => break,
                NodeKey::Min | NodeKey::Entry(_) if curr.key.below_bound(lo) => {}
                NodeKey::Entry(key) => {
                    if hi.is_some_and(|hi| key > hi) {
                        break;
                    }
                    if curr.is_live() {
                        if let Some(value) = curr.value.read().clone() {
                            pairs.push((key.clone(), value));
                        }
                    }
                }
                NodeKey::Min => {}
            }
            let next = curr.next[0].load_full();
            curr = next;
        }
        pairs
    }

    /// Number of committed writes so far. Exposed for tests.
    #[must_use]
    pub fn op_count(&self) -> u64 {
        self.ops.load(Ordering::Acquire)
    }
}

impl<K, V> std::fmt::Debug for SkipList<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipList")
            .field("ops", &self.ops.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Level Generator
// ============================================================================

/// Draws a top level with geometric distribution (p = 0.5).
fn random_level() -> usize {
    let mut rng = rand::thread_rng();
    let mut level = 0;
    while level + 1 < MAX_LEVEL && rng.gen_bool(0.5) {
        level += 1;
    }
    level
}
