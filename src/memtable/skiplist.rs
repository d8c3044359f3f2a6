//! Lock-free-for-readers skip list.
//!
//! # Thread safety
//!
//! Writes require external synchronization: at most one thread may be
//! inside [`SkipList::insert`] at a time. Reads need no locking at all and
//! may run concurrently with that writer, because:
//!
//! 1. Nodes are never removed or freed until the list itself is dropped.
//! 2. A node's key never changes after it is linked in. Only `insert`
//!    touches the links, and it publishes a node with a release store after
//!    the node's own forward pointers are initialized. Readers load links
//!    with acquire, so a reader that sees a node sees all of it.
//!
//! ```text
//! Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
//! Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
//! Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
//! Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use rand::Rng;

/// Maximum height of the skip list. LevelDB uses 12.
pub const MAX_HEIGHT: usize = 12;

/// Each extra level is taken with probability 1 / BRANCHING.
const BRANCHING: u32 = 4;

/// Total order over keys.
pub trait Comparator<K>: Send + Sync {
    fn compare(&self, a: &K, b: &K) -> CmpOrdering;
}

/// Orders keys by their `Ord` impl.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdComparator;

impl<K: Ord> Comparator<K> for OrdComparator {
    fn compare(&self, a: &K, b: &K) -> CmpOrdering {
        a.cmp(b)
    }
}

struct Node<K> {
    key: K,
    /// One forward link per level; `next.len()` is the node's height.
    next: Box<[AtomicPtr<Node<K>>]>,
}

impl<K> Node<K> {
    fn alloc(key: K, height: usize) -> *mut Node<K> {
        let next = (0..height)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect();
        Box::into_raw(Box::new(Node { key, next }))
    }
}

/// Sorted set of unique keys with single-writer insert and lock-free reads.
///
/// There is no removal: the list is a staging buffer that is discarded as a
/// whole.
pub struct SkipList<K, C> {
    compare: C,
    /// Forward links of the sentinel head node. The head has no key; a null
    /// cursor below stands for the head.
    head: [AtomicPtr<Node<K>>; MAX_HEIGHT],
    /// Height of the tallest node. Only `insert` writes it; readers may see
    /// a stale (smaller) value, which only costs them extra steps.
    max_height: AtomicUsize,
    len: AtomicUsize,
    _owns: PhantomData<Box<Node<K>>>,
}

// Readers on other threads only ever take `&K`; dropping the list drops keys
// on whichever thread owns it last.
unsafe impl<K: Send + Sync, C: Send> Send for SkipList<K, C> {}
unsafe impl<K: Send + Sync, C: Sync> Sync for SkipList<K, C> {}

impl<K, C: Comparator<K>> SkipList<K, C> {
    /// Create a new empty skip list ordered by `compare`.
    pub fn new(compare: C) -> Self {
        SkipList {
            compare,
            head: std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            max_height: AtomicUsize::new(1),
            len: AtomicUsize::new(0),
            _owns: PhantomData,
        }
    }

    /// Insert `key`.
    ///
    /// Algorithm:
    ///   1. Find the insertion point at each level (track predecessors)
    ///   2. Pick a random height for the new node
    ///   3. Splice it in bottom-up: point the node at its successor, then
    ///      publish it from the predecessor with a release store
    ///
    /// # Safety
    ///
    /// No other thread may call `insert` on this list concurrently. Readers
    /// are fine. `key` must not already be present.
    pub unsafe fn insert(&self, key: K) {
        let mut prev: [*mut Node<K>; MAX_HEIGHT] = [ptr::null_mut(); MAX_HEIGHT];
        let found = self.find_greater_or_equal(&key, Some(&mut prev));
        debug_assert!(
            found.is_null() || !self.equal(&key, unsafe { &(*found).key }),
            "duplicate key inserted into skip list"
        );

        let height = random_height();
        let max_height = self.max_height();
        if height > max_height {
            for slot in prev.iter_mut().take(height).skip(max_height) {
                *slot = ptr::null_mut();
            }
            // No ordering needed: a reader that sees the new height before
            // the new links finds null at the head and drops a level; one that
            // sees the old height just starts lower.
            self.max_height.store(height, Ordering::Relaxed);
        }

        let node = Node::alloc(key, height);
        for (level, &pred) in prev.iter().enumerate().take(height) {
            // Relaxed is enough for the node's own link: the release store on
            // `pred` below publishes it.
            let succ = self.link(pred, level).load(Ordering::Relaxed);
            unsafe { (*node).next[level].store(succ, Ordering::Relaxed) };
            self.link(pred, level).store(node, Ordering::Release);
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Is an entry equal to `key` in the list?
    pub fn contains(&self, key: &K) -> bool {
        let x = self.find_greater_or_equal(key, None);
        !x.is_null() && self.equal(key, unsafe { &(*x).key })
    }

    /// First key that is `>= key`, if any.
    pub fn seek(&self, key: &K) -> Option<&K> {
        let x = self.find_greater_or_equal(key, None);
        unsafe { x.as_ref() }.map(|node| &node.key)
    }

    /// Number of entries in the skip list.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether the skip list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all keys in sorted order by walking level 0.
    pub fn iter(&self) -> Iter<'_, K, C> {
        Iter {
            node: self.head[0].load(Ordering::Acquire),
            _list: PhantomData,
        }
    }

    /// Iterate in sorted order starting at the first key `>= key`.
    pub fn iter_from(&self, key: &K) -> Iter<'_, K, C> {
        Iter {
            node: self.find_greater_or_equal(key, None),
            _list: PhantomData,
        }
    }

    fn max_height(&self) -> usize {
        self.max_height.load(Ordering::Relaxed)
    }

    fn equal(&self, a: &K, b: &K) -> bool {
        self.compare.compare(a, b) == CmpOrdering::Equal
    }

    /// The level-`level` link out of `node`, where null means the head.
    fn link(&self, node: *mut Node<K>, level: usize) -> &AtomicPtr<Node<K>> {
        if node.is_null() {
            &self.head[level]
        } else {
            unsafe { &(*node).next[level] }
        }
    }

    fn key_is_after_node(&self, key: &K, node: *mut Node<K>) -> bool {
        !node.is_null() && self.compare.compare(unsafe { &(*node).key }, key) == CmpOrdering::Less
    }

    /// First node with key `>= key`, or null. When `prev` is given, it is
    /// filled with the last node before `key` at each level searched (null
    /// meaning the head).
    fn find_greater_or_equal(
        &self,
        key: &K,
        mut prev: Option<&mut [*mut Node<K>; MAX_HEIGHT]>,
    ) -> *mut Node<K> {
        let mut x: *mut Node<K> = ptr::null_mut();
        let mut level = self.max_height() - 1;
        loop {
            let next = self.link(x, level).load(Ordering::Acquire);
            if self.key_is_after_node(key, next) {
                // Keep searching in this list
                x = next;
            } else {
                if let Some(prev) = prev.as_deref_mut() {
                    prev[level] = x;
                }
                if level == 0 {
                    return next;
                }
                // Switch to next list
                level -= 1;
            }
        }
    }
}

impl<K, C> Drop for SkipList<K, C> {
    fn drop(&mut self) {
        // Every node is on level 0.
        let mut node = *self.head[0].get_mut();
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next[0].load(Ordering::Relaxed);
        }
    }
}

/// Height for a new node: 1, plus one more level with probability 1/4 each
/// time, capped at `MAX_HEIGHT`.
fn random_height() -> usize {
    let mut rng = rand::thread_rng();
    let mut height = 1;
    while height < MAX_HEIGHT && rng.gen_ratio(1, BRANCHING) {
        height += 1;
    }
    height
}

/// Iterator over skip list keys in sorted order.
///
/// Follows level 0 forward pointers. Keys inserted after the iterator was
/// created may or may not be observed, depending on where they land.
pub struct Iter<'a, K, C> {
    node: *mut Node<K>,
    _list: PhantomData<&'a SkipList<K, C>>,
}

impl<'a, K, C> Iterator for Iter<'a, K, C> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = unsafe { self.node.as_ref() }?;
        self.node = node.next[0].load(Ordering::Acquire);
        Some(&node.key)
    }
}
