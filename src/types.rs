use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Raw key bytes.
pub type Key = Vec<u8>;

/// Global write-ordering counter. Every operation gets its own number.
pub type SequenceNumber = u64;

/// Largest sequence number a lookup can ask for.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = u64::MAX;

/// Distinguishes puts from deletes in the storage engine.
/// A Delete writes a tombstone: the key isn't removed, it's marked as deleted.
///
/// The discriminants are the tag bytes of the batch wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// A delete (tombstone marker).
    Deletion = 0x00,
    /// A normal put operation.
    Value = 0x01,
}

impl ValueType {
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(ValueType::Deletion),
            0x01 => Ok(ValueType::Value),
            _ => Err(Error::Corruption(format!("unknown operation tag: {byte:#04x}"))),
        }
    }
}

/// Internal key format: user key + sequence number + value type.
///
/// Ordering: (user_key ASC, sequence DESC).
/// The newest version of a key always comes first, so a seek to
/// `(key, snapshot)` lands on the newest version visible at `snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey {
    pub user_key: Key,
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl InternalKey {
    pub fn new(user_key: impl Into<Key>, sequence: SequenceNumber, value_type: ValueType) -> Self {
        InternalKey {
            user_key: user_key.into(),
            sequence,
            value_type,
        }
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
            // Sequence numbers are unique per operation; the tag only breaks
            // ties between lookup probes and real entries.
            .then_with(|| (other.value_type as u8).cmp(&(self.value_type as u8)))
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
