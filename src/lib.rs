//! # LSM write path
//!
//! The part of a Log-Structured Merge-Tree store that takes writes:
//! concurrent callers hand in batches of puts and deletes, one of them is
//! elected leader and commits everyone queued behind it as a single group,
//! the group is appended to a block-framed write-ahead log, and only then
//! applied to an in-memory skip list that readers search without locks.
//!
//! ## Core idea
//! A log append (and especially an fsync) costs the same whether it carries
//! one small batch or fifty. Group commit lets writers that arrive while a
//! leader is busy share the leader's next append.

pub mod batch;
pub mod coding;
pub mod crc;
pub mod db;
pub mod env;
pub mod error;
pub mod memtable;
pub mod types;
pub mod wal;

// Public re-exports for the top-level API
pub use batch::{BatchOp, WriteBatch};
pub use db::{DB, Options, Stats, WriteOptions};
pub use error::{Error, Result};
