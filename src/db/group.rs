//! Pending-writer queue entries and the group-commit merge policy.

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};

use parking_lot::Condvar;

use crate::batch::WriteBatch;
use crate::db::options::Options;
use crate::error::Result;

/// Wake handle and result cell of one in-flight write.
///
/// The condvar is only ever waited on with the scheduler mutex held, and the
/// outcome is only set while holding it, so one mutex guards both.
#[derive(Default)]
pub(crate) struct Signal {
    ready: Condvar,
    outcome: OnceLock<Result<()>>,
}

impl Signal {
    pub(crate) fn condvar(&self) -> &Condvar {
        &self.ready
    }

    pub(crate) fn outcome(&self) -> Option<&Result<()>> {
        self.outcome.get()
    }

    /// Mark the write done with `result` and wake its thread.
    pub(crate) fn complete(&self, result: Result<()>) {
        let _ = self.outcome.set(result);
        self.ready.notify_one();
    }
}

/// One queued write request. Lives in the scheduler queue from admission
/// until the leader that commits it pops it.
pub(crate) struct PendingWrite {
    /// `None` is a barrier: nothing to log, but it still waits its turn and
    /// may ask for a sync.
    pub(crate) batch: Option<WriteBatch>,
    pub(crate) sync: bool,
    pub(crate) signal: Arc<Signal>,
}

impl PendingWrite {
    pub(crate) fn new(batch: Option<WriteBatch>, sync: bool) -> Self {
        PendingWrite {
            batch,
            sync,
            signal: Arc::new(Signal::default()),
        }
    }

    fn size(&self) -> usize {
        self.batch.as_ref().map_or(0, WriteBatch::approximate_size)
    }
}

/// Size bounds for one group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupLimits {
    pub(crate) max_bytes: usize,
    pub(crate) small_write_threshold: usize,
    pub(crate) small_write_slack: usize,
}

impl GroupLimits {
    pub(crate) fn from_options(options: &Options) -> Self {
        GroupLimits {
            max_bytes: options.max_group_bytes,
            small_write_threshold: options.small_write_threshold,
            small_write_slack: options.small_write_slack,
        }
    }

    /// Cap for a group led by a batch of `leader_size` bytes. A small write
    /// only takes on a bounded amount of other work so its own latency
    /// stays low.
    pub(crate) fn cap_for(&self, leader_size: usize) -> usize {
        if leader_size <= self.small_write_threshold {
            leader_size + self.small_write_slack
        } else {
            self.max_bytes
        }
    }
}

/// Which queue prefix the leader commits together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GroupPlan {
    /// Number of requests from the head of the queue in the group.
    pub(crate) members: usize,
    /// Encoded bytes of all member batches.
    pub(crate) bytes: usize,
    /// Whether any member asked for a sync.
    pub(crate) sync: bool,
}

/// Decide how far from the head of `queue` the leader merges.
///
/// Starting at the head, following requests are absorbed in order until:
/// - a sync request would sit behind a non-sync head (it must not have its
///   durability silently downgraded);
/// - the next batch would push the group past its size cap;
/// - a barrier is reached, which joins the group as its last member.
///
/// A barrier at the head leads alone. `queue` must not be empty.
pub(crate) fn plan_group(queue: &VecDeque<PendingWrite>, limits: &GroupLimits) -> GroupPlan {
    let head = &queue[0];
    let mut plan = GroupPlan {
        members: 1,
        bytes: head.size(),
        sync: head.sync,
    };
    if head.batch.is_none() {
        return plan;
    }

    let cap = limits.cap_for(plan.bytes);
    for w in queue.iter().skip(1) {
        if w.sync && !head.sync {
            break;
        }

        match &w.batch {
            None => {
                plan.members += 1;
                plan.sync |= w.sync;
                break;
            }
            Some(batch) => {
                let size = batch.approximate_size();
                if plan.bytes + size > cap {
                    break;
                }
                plan.bytes += size;
                plan.members += 1;
                plan.sync |= w.sync;
            }
        }
    }
    plan
}

/// Concatenate the member batches of `plan` into `scratch`. The queued
/// batches are left untouched.
pub(crate) fn merge_into(queue: &VecDeque<PendingWrite>, plan: &GroupPlan, scratch: &mut WriteBatch) {
    scratch.clear();
    for w in queue.iter().take(plan.members) {
        if let Some(batch) = &w.batch {
            scratch.append(batch);
        }
    }
}
