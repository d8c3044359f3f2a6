//! Atomic group of updates.
//!
//! ```text
//! rep     := sequence: fixed64 | count: fixed32 | record*
//! record  := 0x01 varstring(key) varstring(value)     (Put)
//!          | 0x00 varstring(key)                      (Delete)
//! varstring := len: varint32 | bytes[len]
//! ```
//!
//! The encoded form is exactly what goes into one WAL record, so a batch is
//! built by appending to that buffer and never re-serialized. The sequence
//! number is stamped by the write scheduler at commit time.

use crate::coding::{
    decode_fixed32, decode_fixed64, encode_fixed32, encode_fixed64, get_length_prefixed_slice,
    put_length_prefixed_slice,
};
use crate::error::{Error, Result};
use crate::types::{SequenceNumber, ValueType};

/// Sequence (8 bytes) + count (4 bytes).
pub const BATCH_HEADER_SIZE: usize = 12;

/// One decoded operation, borrowing from the batch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp<'a> {
    Put { key: &'a [u8], value: &'a [u8] },
    Delete { key: &'a [u8] },
}

impl<'a> BatchOp<'a> {
    pub fn key(&self) -> &'a [u8] {
        match *self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            BatchOp::Put { .. } => ValueType::Value,
            BatchOp::Delete { .. } => ValueType::Deletion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    rep: Vec<u8>,
}

impl Default for WriteBatch {
    fn default() -> Self {
        WriteBatch::new()
    }
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch {
            rep: vec![0u8; BATCH_HEADER_SIZE],
        }
    }

    /// Store the mapping `key -> value`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(ValueType::Value as u8);
        put_length_prefixed_slice(&mut self.rep, key);
        put_length_prefixed_slice(&mut self.rep, value);
    }

    /// Erase the mapping for `key`, if any.
    pub fn delete(&mut self, key: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(ValueType::Deletion as u8);
        put_length_prefixed_slice(&mut self.rep, key);
    }

    /// Copy the operations of `source` onto the end of this batch.
    pub fn append(&mut self, source: &WriteBatch) {
        self.set_count(self.count() + source.count());
        self.rep.extend_from_slice(&source.rep[BATCH_HEADER_SIZE..]);
    }

    /// Drop every operation. The buffer's capacity is kept.
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.resize(BATCH_HEADER_SIZE, 0);
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Encoded size in bytes, header included. Used to bound group commits.
    pub fn approximate_size(&self) -> usize {
        self.rep.len()
    }

    /// Sequence number of the first operation, as stamped at commit time.
    pub fn sequence(&self) -> SequenceNumber {
        decode_fixed64(&self.rep[..8])
    }

    /// Encoded bytes, exactly as they are written to the log.
    pub fn contents(&self) -> &[u8] {
        &self.rep
    }

    /// Rebuild a batch from bytes produced by [`WriteBatch::contents`],
    /// e.g. a record read back from the log. The operation stream is
    /// validated against the header count.
    pub fn from_contents(contents: Vec<u8>) -> Result<Self> {
        if contents.len() < BATCH_HEADER_SIZE {
            return Err(Error::Corruption(format!(
                "batch too small: {} bytes",
                contents.len()
            )));
        }
        let batch = WriteBatch { rep: contents };
        for op in batch.iter() {
            op?;
        }
        Ok(batch)
    }

    /// Decode the operations in insertion order.
    pub fn iter(&self) -> BatchIter<'_> {
        BatchIter {
            input: &self.rep[BATCH_HEADER_SIZE..],
            expected: self.count(),
            found: 0,
            failed: false,
        }
    }

    pub(crate) fn count(&self) -> u32 {
        decode_fixed32(&self.rep[8..BATCH_HEADER_SIZE])
    }

    pub(crate) fn set_count(&mut self, count: u32) {
        encode_fixed32(&mut self.rep[8..BATCH_HEADER_SIZE], count);
    }

    pub(crate) fn set_sequence(&mut self, sequence: SequenceNumber) {
        encode_fixed64(&mut self.rep[..8], sequence);
    }
}

impl<'a> IntoIterator for &'a WriteBatch {
    type Item = Result<BatchOp<'a>>;
    type IntoIter = BatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the operations of a [`WriteBatch`].
///
/// Yields one `Err` and then stops if the stream is malformed or the number
/// of operations disagrees with the header count.
pub struct BatchIter<'a> {
    input: &'a [u8],
    expected: u32,
    found: u32,
    failed: bool,
}

impl<'a> BatchIter<'a> {
    fn decode_one(&mut self) -> Result<BatchOp<'a>> {
        let tag = self.input[0];
        self.input = &self.input[1..];
        let value_type = ValueType::from_u8(tag)?;
        let key = get_length_prefixed_slice(&mut self.input)
            .map_err(|_| Error::Corruption("bad WriteBatch key".into()))?;
        match value_type {
            ValueType::Value => {
                let value = get_length_prefixed_slice(&mut self.input)
                    .map_err(|_| Error::Corruption("bad WriteBatch Put".into()))?;
                Ok(BatchOp::Put { key, value })
            }
            ValueType::Deletion => Ok(BatchOp::Delete { key }),
        }
    }
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = Result<BatchOp<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if self.input.is_empty() {
            if self.found != self.expected {
                self.failed = true;
                return Some(Err(Error::Corruption(format!(
                    "WriteBatch has wrong count: header says {}, found {}",
                    self.expected, self.found
                ))));
            }
            return None;
        }

        match self.decode_one() {
            Ok(op) => {
                self.found += 1;
                Some(Ok(op))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
