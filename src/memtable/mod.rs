pub mod skiplist;

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::types::{InternalKey, SequenceNumber, ValueType};
use skiplist::{Comparator, SkipList};

/// One versioned entry: internal key plus the value (empty for deletions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemEntry {
    pub key: InternalKey,
    pub value: Vec<u8>,
}

/// Orders entries by internal key only.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntryComparator;

impl Comparator<MemEntry> for EntryComparator {
    fn compare(&self, a: &MemEntry, b: &MemEntry) -> CmpOrdering {
        a.key.cmp(&b.key)
    }
}

/// Outcome of a memtable lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// Newest visible version is a put.
    Found(Vec<u8>),
    /// Newest visible version is a tombstone.
    Deleted,
    /// No visible version of the key.
    Missing,
}

/// In-memory sorted buffer for writes. Wraps a SkipList.
///
/// Every committed operation lands here as its own entry, keyed by
/// `(user_key, sequence, type)`, so there are never duplicate keys in the
/// skip list. Deletes are tombstones: older versions may exist elsewhere, so
/// the key is marked rather than removed.
///
/// Reads never lock. Writes go through a mutex that the write scheduler
/// never contends: only the current group-commit leader inserts.
pub struct MemTable {
    table: SkipList<MemEntry, EntryComparator>,
    insert_lock: Mutex<()>,
    memory_usage: AtomicUsize,
}

impl Default for MemTable {
    fn default() -> Self {
        MemTable::new()
    }
}

impl MemTable {
    /// Create a new empty memtable.
    pub fn new() -> Self {
        MemTable {
            table: SkipList::new(EntryComparator),
            insert_lock: Mutex::new(()),
            memory_usage: AtomicUsize::new(0),
        }
    }

    /// Record one operation. `sequence` must be unique across the table.
    pub fn add(&self, sequence: SequenceNumber, value_type: ValueType, key: &[u8], value: &[u8]) {
        let entry = MemEntry {
            key: InternalKey::new(key, sequence, value_type),
            value: value.to_vec(),
        };
        let charge = key.len() + value.len() + std::mem::size_of::<MemEntry>();

        let _writer = self.insert_lock.lock();
        // SAFETY: `insert_lock` makes this the only inserter.
        unsafe { self.table.insert(entry) };
        self.memory_usage.fetch_add(charge, Ordering::Relaxed);
    }

    /// Look up the newest version of `key` with sequence `<= snapshot`.
    pub fn get(&self, key: &[u8], snapshot: SequenceNumber) -> LookupResult {
        let probe = MemEntry {
            key: InternalKey::new(key, snapshot, ValueType::Value),
            value: Vec::new(),
        };
        match self.table.seek(&probe) {
            Some(entry) if entry.key.user_key == key => match entry.key.value_type {
                ValueType::Value => LookupResult::Found(entry.value.clone()),
                ValueType::Deletion => LookupResult::Deleted,
            },
            _ => LookupResult::Missing,
        }
    }

    /// Is this exact version present?
    pub fn contains(&self, key: &InternalKey) -> bool {
        let probe = MemEntry {
            key: key.clone(),
            value: Vec::new(),
        };
        self.table.contains(&probe)
    }

    /// All entries in internal-key order (tombstones included).
    pub fn iter(&self) -> skiplist::Iter<'_, MemEntry, EntryComparator> {
        self.table.iter()
    }

    /// Number of entries (every version counts).
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Approximate memory usage in bytes.
    pub fn approximate_memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }
}
