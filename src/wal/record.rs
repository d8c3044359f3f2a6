use crate::coding::{decode_fixed32, encode_fixed32};
use crate::crc;
use crate::error::{Error, Result};
use crate::wal::HEADER_SIZE;

/// Fragment type of a physical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// Reserved for preallocated (zeroed) space.
    Zero = 0,
    /// The whole logical record.
    Full = 1,
    First = 2,
    Middle = 3,
    Last = 4,
}

impl RecordType {
    pub const MAX: usize = RecordType::Last as usize;

    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(RecordType::Zero),
            1 => Ok(RecordType::Full),
            2 => Ok(RecordType::First),
            3 => Ok(RecordType::Middle),
            4 => Ok(RecordType::Last),
            _ => Err(Error::Corruption(format!("unknown record type {byte}"))),
        }
    }

    /// Classify a fragment by its position in the logical record.
    pub fn for_fragment(begin: bool, end: bool) -> Self {
        match (begin, end) {
            (true, true) => RecordType::Full,
            (true, false) => RecordType::First,
            (false, true) => RecordType::Last,
            (false, false) => RecordType::Middle,
        }
    }
}

/// Checksum seed for each record type: the CRC of the single type byte.
/// The payload CRC is then an extension of the seed.
pub fn type_crc_table() -> [u32; RecordType::MAX + 1] {
    let mut table = [0u32; RecordType::MAX + 1];
    for (t, slot) in table.iter_mut().enumerate() {
        *slot = crc::value(&[t as u8]);
    }
    table
}

/// Fixed-width header in front of every physical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Masked CRC of type byte + payload, as stored.
    pub checksum: u32,
    pub length: u16,
    pub record_type: u8,
}

impl RecordHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        encode_fixed32(&mut buf[..4], self.checksum);
        buf[4..6].copy_from_slice(&self.length.to_le_bytes());
        buf[6] = self.record_type;
        buf
    }

    /// Parse a header from the first `HEADER_SIZE` bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Corruption("record header truncated".into()));
        }
        Ok(RecordHeader {
            checksum: decode_fixed32(&data[..4]),
            length: u16::from_le_bytes([data[4], data[5]]),
            record_type: data[6],
        })
    }

    /// Does the stored checksum match `payload`?
    pub fn verify(&self, payload: &[u8]) -> bool {
        let expected = crc::unmask(self.checksum);
        let actual = crc::extend(crc::value(&[self.record_type]), payload);
        expected == actual
    }
}
