use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of write-path counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Write requests admitted to the queue (barriers included).
    pub writes: u64,
    /// Groups committed by a leader, successful or not.
    pub groups: u64,
    /// Requests completed by another thread's group.
    pub merged_writes: u64,
    /// Logical record bytes written to the log by successful groups.
    pub bytes_logged: u64,
    /// Log syncs completed.
    pub syncs: u64,
    /// Groups whose append or sync failed.
    pub failed_groups: u64,
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    writes: AtomicU64,
    groups: AtomicU64,
    merged_writes: AtomicU64,
    bytes_logged: AtomicU64,
    syncs: AtomicU64,
    failed_groups: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Bytes and syncs only count for groups that made it to the log.
    pub(crate) fn record_group(&self, followers: usize, bytes: usize, synced: bool, ok: bool) {
        self.groups.fetch_add(1, Ordering::Relaxed);
        self.merged_writes.fetch_add(followers as u64, Ordering::Relaxed);
        if !ok {
            self.failed_groups.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.bytes_logged.fetch_add(bytes as u64, Ordering::Relaxed);
        if synced {
            self.syncs.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            writes: self.writes.load(Ordering::Relaxed),
            groups: self.groups.load(Ordering::Relaxed),
            merged_writes: self.merged_writes.load(Ordering::Relaxed),
            bytes_logged: self.bytes_logged.load(Ordering::Relaxed),
            syncs: self.syncs.load(Ordering::Relaxed),
            failed_groups: self.failed_groups.load(Ordering::Relaxed),
        }
    }
}
