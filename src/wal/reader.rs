use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::wal::record::{RecordHeader, RecordType};
use crate::wal::{BLOCK_SIZE, HEADER_SIZE};

/// Reads logical records back out of a log file for crash recovery.
///
/// Loads the entire file into memory, then reassembles fragments record by
/// record. A tail that ends in the middle of a header, a payload, or a
/// fragmented record is a write that never completed: iteration stops there
/// without an error.
///
/// Damage inside the file is yielded as `Corruption` and reading carries on
/// past it. A physical record that fails its checksum costs the rest of its
/// block, because its length field cannot be trusted; the next block starts
/// clean. Fragments whose record start was lost are reported and dropped.
pub struct LogReader {
    data: Vec<u8>,
}

impl LogReader {
    /// Open a log file for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(LogReader { data })
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        LogReader { data }
    }

    /// Iterate over the logical records in the log.
    pub fn iter(&self) -> LogRecords<'_> {
        LogRecords {
            data: &self.data,
            offset: 0,
            truncated_tail: false,
        }
    }
}

/// Iterator over logical records. Stops at EOF or a truncated tail and
/// resynchronizes after corruption.
pub struct LogRecords<'a> {
    data: &'a [u8],
    offset: usize,
    truncated_tail: bool,
}

impl<'a> LogRecords<'a> {
    /// True once iteration stopped at an incomplete trailing record.
    pub fn hit_truncated_tail(&self) -> bool {
        self.truncated_tail
    }

    /// Byte offset of the first unread byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Next physical record, or `None` at EOF / truncated tail.
    fn read_physical(&mut self) -> Option<Result<(RecordType, &'a [u8])>> {
        let data: &'a [u8] = self.data;
        loop {
            if self.offset >= data.len() {
                return None;
            }

            let block_left = BLOCK_SIZE - self.offset % BLOCK_SIZE;
            if block_left < HEADER_SIZE {
                // Trailer.
                self.offset += block_left;
                continue;
            }

            let remaining = &data[self.offset..];
            if remaining.len() < HEADER_SIZE {
                self.truncated_tail = true;
                self.offset = data.len();
                return None;
            }

            let header = match RecordHeader::decode(remaining) {
                Ok(header) => header,
                Err(e) => return Some(Err(e)),
            };
            let length = header.length as usize;

            if header.record_type == RecordType::Zero as u8 && length == 0 {
                // Zero-filled space; nothing more in this block.
                self.offset += block_left;
                continue;
            }

            if HEADER_SIZE + length > block_left {
                let err = Error::Corruption(format!(
                    "record of {length} bytes at offset {} crosses a block boundary",
                    self.offset
                ));
                self.offset += block_left;
                return Some(Err(err));
            }

            // Only the last block of the file can be short.
            if remaining.len() < HEADER_SIZE + length {
                self.truncated_tail = true;
                self.offset = data.len();
                return None;
            }

            let payload = &remaining[HEADER_SIZE..HEADER_SIZE + length];
            if !header.verify(payload) {
                let err = Error::Corruption(format!("checksum mismatch at offset {}", self.offset));
                self.offset += block_left;
                return Some(Err(err));
            }
            self.offset += HEADER_SIZE + length;

            return Some(RecordType::from_u8(header.record_type).map(|t| (t, payload)));
        }
    }
}

fn corruption(msg: &str, offset: usize) -> Option<Result<Vec<u8>>> {
    Some(Err(Error::Corruption(format!("{msg} at offset {offset}"))))
}

impl<'a> Iterator for LogRecords<'a> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut scratch: Option<Vec<u8>> = None;
        loop {
            let start = self.offset;
            let (record_type, payload) = match self.read_physical() {
                None => {
                    if scratch.is_some() {
                        self.truncated_tail = true;
                    }
                    return None;
                }
                // A partial record in `scratch` is dropped with it.
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(physical)) => physical,
            };

            match record_type {
                RecordType::Full | RecordType::First if scratch.is_some() => {
                    // Report the unfinished record, then read this one again
                    // on the next call with an empty buffer.
                    self.offset = start;
                    return corruption("partial record without end", start);
                }
                RecordType::Full => return Some(Ok(payload.to_vec())),
                RecordType::First => scratch = Some(payload.to_vec()),
                RecordType::Middle | RecordType::Last => {
                    let Some(buf) = scratch.as_mut() else {
                        return corruption("missing start of fragmented record", start);
                    };
                    buf.extend_from_slice(payload);
                    if record_type == RecordType::Last {
                        return scratch.map(Ok);
                    }
                }
                RecordType::Zero => {
                    return corruption("unexpected zero-type record", start);
                }
            }
        }
    }
}
