//! Little-endian fixed-width and base-128 varint encodings.
//!
//! These are part of the on-disk formats (batch header, record lengths), so
//! they must stay bit-exact.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// Longest varint32 encoding: ceil(32 / 7) bytes.
pub const MAX_VARINT32_LEN: usize = 5;

pub fn encode_fixed32(dst: &mut [u8], value: u32) {
    dst[..4].copy_from_slice(&value.to_le_bytes());
}

pub fn encode_fixed64(dst: &mut [u8], value: u64) {
    dst[..8].copy_from_slice(&value.to_le_bytes());
}

pub fn decode_fixed32(mut src: &[u8]) -> u32 {
    src.get_u32_le()
}

pub fn decode_fixed64(mut src: &[u8]) -> u64 {
    src.get_u64_le()
}

/// Append `value` as a varint: 7 data bits per byte, low group first,
/// high bit set on every byte except the last.
pub fn put_varint32(dst: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        dst.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Decode a varint32 from the front of `input`, advancing it past the
/// consumed bytes.
pub fn get_varint32(input: &mut &[u8]) -> Result<u32> {
    let mut result: u32 = 0;
    for (i, &byte) in input.iter().enumerate().take(MAX_VARINT32_LEN) {
        let shift = 7 * i as u32;
        if i == MAX_VARINT32_LEN - 1 && byte > 0x0F {
            return Err(Error::Corruption("varint32 overflow".into()));
        }
        result |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            *input = &input[i + 1..];
            return Ok(result);
        }
    }
    Err(Error::Corruption("truncated varint32".into()))
}

pub fn put_length_prefixed_slice(dst: &mut Vec<u8>, value: &[u8]) {
    put_varint32(dst, value.len() as u32);
    dst.put_slice(value);
}

/// Split a varint32-length-prefixed slice off the front of `input`.
pub fn get_length_prefixed_slice<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = get_varint32(input)? as usize;
    if input.len() < len {
        return Err(Error::Corruption(format!(
            "length-prefixed slice wants {len} bytes, {} left",
            input.len()
        )));
    }
    let (value, rest) = input.split_at(len);
    *input = rest;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for (value, len) in [(0u32, 1), (127, 1), (128, 2), (16_383, 2), (16_384, 3), (u32::MAX, 5)] {
            let mut buf = Vec::new();
            put_varint32(&mut buf, value);
            assert_eq!(buf.len(), len, "value {value}");

            let mut input = buf.as_slice();
            assert_eq!(get_varint32(&mut input).unwrap(), value);
            assert!(input.is_empty());
        }
    }

    #[test]
    fn varint_wire_bytes() {
        let mut buf = Vec::new();
        put_varint32(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
    }

    #[test]
    fn truncated_varint_is_corruption() {
        let mut input: &[u8] = &[0x80, 0x80];
        assert!(get_varint32(&mut input).unwrap_err().is_corruption());
    }

    #[test]
    fn overlong_varint_is_corruption() {
        let mut input: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert!(get_varint32(&mut input).is_err());
    }

    #[test]
    fn fixed_is_little_endian() {
        let mut buf = [0u8; 12];
        encode_fixed32(&mut buf, 0x0403_0201);
        encode_fixed64(&mut buf[4..], 0x0C0B_0A09_0807_0605);
        assert_eq!(buf.to_vec(), (1..=12).collect::<Vec<u8>>());
        assert_eq!(decode_fixed32(&buf), 0x0403_0201);
        assert_eq!(decode_fixed64(&buf[4..]), 0x0C0B_0A09_0807_0605);
    }

    #[test]
    fn length_prefixed_slice_short_input() {
        let mut buf = Vec::new();
        put_length_prefixed_slice(&mut buf, b"hello");
        buf.truncate(4);
        let mut input = buf.as_slice();
        assert!(get_length_prefixed_slice(&mut input).is_err());
    }
}
