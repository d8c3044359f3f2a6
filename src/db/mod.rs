//! The write path: group commit over a block-framed log and a lock-free
//! memtable.
//!
//! ```text
//! caller ─► enqueue ─► wait until head or done
//!                         │ head: leader
//!                         ▼
//!               plan group, stamp sequence      (lock held)
//!                         ▼
//!               log append [+ sync] ─► memtable (lock released)
//!                         ▼
//!               pop group, complete members,    (lock held)
//!               wake next head
//! ```

mod group;
mod options;
mod stats;

pub use options::{Options, WriteOptions};
pub use stats::Stats;

use std::collections::VecDeque;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::batch::{BatchOp, WriteBatch};
use crate::env::{AppendFile, WritableFile};
use crate::error::{Error, Result};
use crate::memtable::{LookupResult, MemTable};
use crate::types::SequenceNumber;
use crate::wal::{LogReader, LogWriter};
use group::{merge_into, plan_group, GroupLimits, GroupPlan, PendingWrite, Signal};
use stats::StatsCounters;

/// Name of the log file inside the database directory.
pub const WAL_FILE_NAME: &str = "wal.log";

type Log = LogWriter<Box<dyn WritableFile>>;

/// State guarded by the scheduler mutex.
struct WriteState {
    /// FIFO of in-flight writes; the head is the only one allowed to lead.
    queue: VecDeque<PendingWrite>,
    /// Last sequence number handed out. Numbers are never reused, even when
    /// the group that got them fails.
    last_sequence: SequenceNumber,
    /// Reused buffer for merged groups. Moved out by the leader while the
    /// lock is released and put back afterwards.
    scratch: WriteBatch,
    /// First failure of the log. Once set, the log's tail is unknown, so
    /// every later write fails with it instead of appending after garbage.
    bg_error: Option<Error>,
}

/// An embedded key-value store's write path.
///
/// `DB` is safe to share across threads (`Arc<DB>`); every method takes
/// `&self` and needs no external locking.
pub struct DB {
    state: Mutex<WriteState>,
    /// Only the current leader touches the log, so this lock is never
    /// contended; it exists to hand the leader `&mut` access.
    log: Mutex<Log>,
    mem: MemTable,
    /// Highest sequence number whose group is fully applied to the memtable.
    /// Reads use it as their snapshot so a group is visible all at once.
    visible_sequence: AtomicU64,
    limits: GroupLimits,
    stats: StatsCounters,
    path: Option<PathBuf>,
}

impl DB {
    /// Open (or create) the database in `dir`, replaying any existing log
    /// into the memtable.
    pub fn open(dir: impl AsRef<Path>, options: Options) -> Result<DB> {
        let dir = dir.as_ref();
        if !dir.exists() {
            if !options.create_if_missing {
                return Err(Error::InvalidArgument(format!(
                    "{}: does not exist (create_if_missing is false)",
                    dir.display()
                )));
            }
            fs::create_dir_all(dir)?;
        }

        let path = dir.join(WAL_FILE_NAME);
        let mem = MemTable::new();
        let mut last_sequence = 0;

        if path.exists() {
            let replayed = replay_log(&path, &mem, options.paranoid_checks)?;
            last_sequence = replayed.last_sequence;

            let file_len = fs::metadata(&path)?.len();
            if replayed.valid_len < file_len {
                warn!(
                    path = %path.display(),
                    valid_len = replayed.valid_len,
                    file_len,
                    "truncating unreadable log tail"
                );
                fs::OpenOptions::new()
                    .write(true)
                    .open(&path)?
                    .set_len(replayed.valid_len)?;
            }
            info!(
                path = %path.display(),
                batches = replayed.batches,
                dropped = replayed.dropped,
                last_sequence,
                "replayed write-ahead log"
            );
        }

        let (file, len) = AppendFile::open(&path)?;
        let log = LogWriter::with_offset(Box::new(file) as Box<dyn WritableFile>, len);
        info!(path = %path.display(), len, "opened write-ahead log");

        Ok(DB::from_parts(log, mem, last_sequence, &options, Some(path)))
    }

    /// Run on an arbitrary log stream, starting empty.
    pub fn with_writer(dest: impl WritableFile + 'static, options: Options) -> DB {
        let log = LogWriter::new(Box::new(dest) as Box<dyn WritableFile>);
        DB::from_parts(log, MemTable::new(), 0, &options, None)
    }

    fn from_parts(
        log: Log,
        mem: MemTable,
        last_sequence: SequenceNumber,
        options: &Options,
        path: Option<PathBuf>,
    ) -> DB {
        DB {
            state: Mutex::new(WriteState {
                queue: VecDeque::new(),
                last_sequence,
                scratch: WriteBatch::new(),
                bg_error: None,
            }),
            log: Mutex::new(log),
            mem,
            visible_sequence: AtomicU64::new(last_sequence),
            limits: GroupLimits::from_options(options),
            stats: StatsCounters::default(),
            path,
        }
    }

    /// Set `key` to `value`.
    pub fn put(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(options, batch)
    }

    /// Remove `key`.
    pub fn delete(&self, options: &WriteOptions, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(options, batch)
    }

    /// Apply every operation in `batch` atomically.
    ///
    /// An empty batch is a barrier: it returns once every write admitted
    /// before it has committed, and syncs the log if `options.sync` is set.
    ///
    /// If a log append or sync fails, that error is returned to every member
    /// of the failed group and to every write after it. Reopen the database
    /// to recover from the log.
    pub fn write(&self, options: &WriteOptions, batch: WriteBatch) -> Result<()> {
        let batch = if batch.is_empty() { None } else { Some(batch) };
        self.submit(batch, options.sync)
    }

    /// Barrier that forces everything logged so far to stable storage.
    pub fn sync_wal(&self) -> Result<()> {
        self.submit(None, true)
    }

    /// Value of `key` as of the last fully committed group.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let snapshot = self.visible_sequence.load(Ordering::Acquire);
        match self.mem.get(key, snapshot) {
            LookupResult::Found(value) => Ok(value),
            LookupResult::Deleted | LookupResult::Missing => Err(Error::NotFound),
        }
    }

    /// Sequence number of the last operation visible to readers.
    pub fn last_sequence(&self) -> SequenceNumber {
        self.visible_sequence.load(Ordering::Acquire)
    }

    /// The memtable holding every committed operation.
    pub fn memtable(&self) -> &MemTable {
        &self.mem
    }

    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    /// Path of the log file, if the database lives on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Sync and close the log.
    pub fn close(self) -> Result<()> {
        let mut log = self.log.into_inner();
        log.sync()?;
        log.close()?;
        info!("closed database");
        Ok(())
    }

    fn submit(&self, batch: Option<WriteBatch>, sync: bool) -> Result<()> {
        let pending = PendingWrite::new(batch, sync);
        let signal = Arc::clone(&pending.signal);

        let mut state = self.state.lock();
        state.queue.push_back(pending);
        self.stats.record_write();

        while signal.outcome().is_none() && !is_head(&state, &signal) {
            signal.condvar().wait(&mut state);
        }

        if let Some(result) = signal.outcome() {
            // Committed as part of an earlier leader's group.
            return result.clone();
        }

        self.lead(&mut state, &signal)
    }

    /// Commit a group as its leader. Called with the lock held and this
    /// thread's request at the head of the queue.
    fn lead(&self, state: &mut MutexGuard<'_, WriteState>, me: &Arc<Signal>) -> Result<()> {
        let plan = plan_group(&state.queue, &self.limits);

        let result = match state.bg_error.clone() {
            Some(e) => Err(e),
            None => self.commit_group(state, &plan),
        };
        self.stats.record_group(plan.members - 1, plan.bytes, plan.sync, result.is_ok());

        for _ in 0..plan.members {
            if let Some(done) = state.queue.pop_front() {
                if !Arc::ptr_eq(&done.signal, me) {
                    done.signal.complete(result.clone());
                }
            }
        }

        if let Some(next) = state.queue.front() {
            next.signal.condvar().notify_one();
        }

        result
    }

    /// Stamp, log and apply the group described by `plan`. The lock is
    /// released for the log append and the memtable update.
    fn commit_group(&self, state: &mut MutexGuard<'_, WriteState>, plan: &GroupPlan) -> Result<()> {
        // The leader's own batch moves out of the queue; merged groups are
        // copied into the scratch buffer so follower batches stay intact.
        let mut group = if state.queue[0].batch.is_none() {
            None
        } else if plan.members == 1 {
            state.queue[0].batch.take()
        } else {
            let mut scratch = mem::take(&mut state.scratch);
            merge_into(&state.queue, plan, &mut scratch);
            Some(scratch)
        };

        let first_sequence = state.last_sequence + 1;
        if let Some(batch) = group.as_mut() {
            batch.set_sequence(first_sequence);
            state.last_sequence += u64::from(batch.count());
        }
        let last_sequence = state.last_sequence;

        // Only the leader can be here, so the log and the memtable's single
        // writer slot are ours while other threads keep enqueueing.
        let result = MutexGuard::unlocked_fair(state, || self.commit(group.as_ref(), plan));

        match &result {
            Ok(()) => debug!(
                members = plan.members,
                first_sequence,
                last_sequence,
                bytes = plan.bytes,
                sync = plan.sync,
                "committed write group"
            ),
            Err(e) => {
                warn!(members = plan.members, error = %e, "write group failed, refusing further writes");
                state.bg_error = Some(e.clone());
            }
        }

        if plan.members > 1 {
            if let Some(scratch) = group {
                state.scratch = scratch;
            }
        }
        result
    }

    /// Log the group and apply it to the memtable. Runs without the
    /// scheduler lock.
    fn commit(&self, group: Option<&WriteBatch>, plan: &GroupPlan) -> Result<()> {
        let mut log = self.log.lock();

        let Some(batch) = group else {
            // Barrier: nothing to write, but honour its durability.
            if plan.sync {
                log.sync()?;
            }
            return Ok(());
        };

        log.add_record(batch.contents())?;
        if plan.sync {
            log.sync()?;
        }
        drop(log);

        let last = apply_to_memtable(&self.mem, batch)?;
        self.visible_sequence.store(last, Ordering::Release);
        Ok(())
    }
}

fn is_head(state: &WriteState, signal: &Arc<Signal>) -> bool {
    state
        .queue
        .front()
        .is_some_and(|head| Arc::ptr_eq(&head.signal, signal))
}

/// Insert every operation of `batch` into `mem`, numbering them from the
/// batch's sequence. Returns the last sequence number used.
fn apply_to_memtable(mem: &MemTable, batch: &WriteBatch) -> Result<SequenceNumber> {
    let mut sequence = batch.sequence();
    for op in batch.iter() {
        let op = op?;
        let value: &[u8] = match op {
            BatchOp::Put { value, .. } => value,
            BatchOp::Delete { .. } => &[],
        };
        mem.add(sequence, op.value_type(), op.key(), value);
        sequence += 1;
    }
    Ok(sequence - 1)
}

struct Replayed {
    last_sequence: SequenceNumber,
    batches: usize,
    /// Corrupted records skipped.
    dropped: usize,
    /// End of the last valid record. Anything after it is a torn or damaged
    /// tail.
    valid_len: u64,
}

/// Rebuild the memtable from the log at `path`.
///
/// Stops at a truncated tail. On corruption, fails if `paranoid`, otherwise
/// skips the damaged record and keeps replaying what follows it.
fn replay_log(path: &Path, mem: &MemTable, paranoid: bool) -> Result<Replayed> {
    let reader = LogReader::open(path)?;
    let mut records = reader.iter();
    let mut replayed = Replayed {
        last_sequence: 0,
        batches: 0,
        dropped: 0,
        valid_len: 0,
    };

    while let Some(record) = records.next() {
        let batch = match record.and_then(WriteBatch::from_contents) {
            Ok(batch) => batch,
            Err(e) if !paranoid => {
                warn!(path = %path.display(), error = %e, "skipping corrupted log record");
                replayed.dropped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        if !batch.is_empty() {
            let last = apply_to_memtable(mem, &batch)?;
            replayed.last_sequence = replayed.last_sequence.max(last);
        }
        replayed.batches += 1;
        replayed.valid_len = records.offset() as u64;
    }

    if records.hit_truncated_tail() {
        warn!(path = %path.display(), "log ends with an incomplete record");
    }
    Ok(replayed)
}
