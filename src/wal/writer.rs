use tracing::trace;

use crate::crc;
use crate::env::WritableFile;
use crate::error::Result;
use crate::wal::record::{type_crc_table, RecordHeader, RecordType};
use crate::wal::{BLOCK_SIZE, HEADER_SIZE};

/// Appends logical records to a log stream, fragmenting them into
/// block-aligned physical records.
///
/// Each physical record is flushed to the stream as soon as it is written.
/// Flushing is not durability: call [`LogWriter::sync`] for that.
pub struct LogWriter<W: WritableFile> {
    dest: W,
    /// Current offset inside the block being filled.
    block_offset: usize,
    /// CRC of each record type byte, precomputed to save work per record.
    type_crc: [u32; RecordType::MAX + 1],
}

impl<W: WritableFile> LogWriter<W> {
    /// Writer for an empty destination.
    pub fn new(dest: W) -> Self {
        Self::with_offset(dest, 0)
    }

    /// Writer that resumes appending to a destination that already holds
    /// `dest_len` bytes.
    pub fn with_offset(dest: W, dest_len: u64) -> Self {
        LogWriter {
            dest,
            block_offset: (dest_len % BLOCK_SIZE as u64) as usize,
            type_crc: type_crc_table(),
        }
    }

    /// Append one logical record.
    ///
    /// An empty record still produces one zero-length physical record so the
    /// framing stays self-describing.
    pub fn add_record(&mut self, record: &[u8]) -> Result<()> {
        let mut left = record;
        let mut begin = true;

        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_SIZE {
                // Switch to a new block, zero-filling the trailer.
                if leftover > 0 {
                    trace!(leftover, "padding block trailer");
                    self.dest.append(&[0u8; HEADER_SIZE - 1][..leftover])?;
                }
                self.block_offset = 0;
            }

            // Invariant: never leave fewer than HEADER_SIZE bytes in a block.
            debug_assert!(BLOCK_SIZE - self.block_offset >= HEADER_SIZE);

            let avail = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let fragment_length = left.len().min(avail);
            let (fragment, rest) = left.split_at(fragment_length);
            let end = rest.is_empty();

            self.emit_physical_record(RecordType::for_fragment(begin, end), fragment)?;
            left = rest;
            begin = false;

            if end {
                return Ok(());
            }
        }
    }

    fn emit_physical_record(&mut self, record_type: RecordType, payload: &[u8]) -> Result<()> {
        debug_assert!(payload.len() <= 0xffff);
        debug_assert!(self.block_offset + HEADER_SIZE + payload.len() <= BLOCK_SIZE);

        let checksum = crc::extend(self.type_crc[record_type as usize], payload);
        let header = RecordHeader {
            checksum: crc::mask(checksum),
            length: payload.len() as u16,
            record_type: record_type as u8,
        };

        // The block offset advances even if the stream fails part-way; the
        // stream's tail is unspecified after an error either way.
        self.block_offset += HEADER_SIZE + payload.len();

        self.dest.append(&header.encode())?;
        self.dest.append(payload)?;
        self.dest.flush()
    }

    /// Force everything appended so far to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.dest.sync()
    }

    pub fn close(&mut self) -> Result<()> {
        self.dest.close()
    }

    /// Offset inside the current block.
    pub fn block_offset(&self) -> usize {
        self.block_offset
    }
}
