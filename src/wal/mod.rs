//! Write-ahead log: block-framed records with per-fragment checksums.
//!
//! The file is a sequence of 32 KiB blocks. A logical record (one encoded
//! write batch) is split into fragments so that no physical record crosses
//! a block boundary:
//!
//! ```text
//! block := physical_record* trailer?
//! physical_record := checksum: u32le | length: u16le | type: u8 | payload[length]
//! trailer := 0x00{0..6}            (block tail too small for a header)
//! ```
//!
//! `checksum` is the masked CRC of the type byte followed by the payload.
//! These constants are the on-disk format and must not vary between writers
//! of the same file.

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::LogReader;
pub use record::{RecordHeader, RecordType};
pub use writer::LogWriter;

/// Size of every block in the log file.
pub const BLOCK_SIZE: usize = 32768;

/// checksum (4) + length (2) + type (1).
pub const HEADER_SIZE: usize = 4 + 2 + 1;
