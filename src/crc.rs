//! CRC-32 checksum primitive used by the log format.
//!
//! The algorithm is part of the on-disk format: changing it invalidates every
//! existing log file.

const MASK_DELTA: u32 = 0xa282_ead8;

/// Checksum of `data`.
pub fn value(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Continue a checksum: `extend(value(a), b) == value(a ++ b)`.
pub fn extend(init: u32, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(init);
    hasher.update(data);
    hasher.finalize()
}

/// Masked form of `crc` for storage.
///
/// Computing the CRC of a string that itself contains embedded CRCs is
/// problematic, and an all-zero region would otherwise carry a checksum of
/// zero. Rotate and add a constant.
pub fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Inverse of [`mask`].
pub fn unmask(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}
