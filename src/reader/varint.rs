//! Shared varint encoding and decoding utilities.
//!
//! Avro `int` and `long` values use the Protocol Buffers varint layout:
//! - Each byte carries 7 data bits and 1 continuation bit (MSB)
//! - Groups are little-endian
//!
//! Signed values are zig-zag mapped before encoding:
//! - 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
//! - Encoding formula: (n << 1) ^ (n >> 63)
//! - Decoding formula: (n >> 1) ^ -(n & 1)
//!
//! Decoding accepts over-long (non-minimal) encodings. Encoding is always minimal.

use crate::error::DecodeError;

/// Longest legal varint for a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

// ============================================================================
// Decoding Functions
// ============================================================================

/// Core varint loop over a byte supplier.
///
/// `next` yields the following input byte, or `UnexpectedEof`.
#[inline]
pub(crate) fn decode_varint_with<F>(mut next: F) -> Result<u64, DecodeError>
where
    F: FnMut() -> Result<u8, DecodeError>,
{
    let mut result: u64 = 0;

    for index in 0..MAX_VARINT_LEN {
        let byte = next()?;
        let bits = (byte & 0x7F) as u64;

        // The tenth group only has room for the top bit of a u64
        if index == MAX_VARINT_LEN - 1 && bits > 1 {
            return Err(DecodeError::MalformedVarint(
                "value exceeds 64 bits".to_string(),
            ));
        }

        result |= bits << (7 * index);

        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }

    Err(DecodeError::MalformedVarint(format!(
        "no terminating byte within {} bytes",
        MAX_VARINT_LEN
    )))
}

/// Decode an unsigned variable-length integer.
///
/// # Errors
/// - `DecodeError::UnexpectedEof` if the input is truncated
/// - `DecodeError::MalformedVarint` if the varint exceeds 10 bytes or 64 bits
#[inline]
pub fn decode_varint(data: &mut &[u8]) -> Result<u64, DecodeError> {
    decode_varint_with(|| match data.split_first() {
        Some((&byte, rest)) => {
            *data = rest;
            Ok(byte)
        }
        None => Err(DecodeError::UnexpectedEof),
    })
}

/// Decode a zig-zag encoded `long`.
///
/// # Errors
/// Same as [`decode_varint`].
#[inline]
pub fn decode_zigzag(data: &mut &[u8]) -> Result<i64, DecodeError> {
    decode_varint(data).map(zigzag_to_i64)
}

/// Decode a zig-zag encoded `int`.
///
/// # Errors
/// - `DecodeError::MalformedVarint` if the value does not fit in 32 bits
#[inline]
pub fn decode_zigzag_i32(data: &mut &[u8]) -> Result<i32, DecodeError> {
    let value = decode_zigzag(data)?;
    i32::try_from(value).map_err(|_| {
        DecodeError::MalformedVarint(format!("value {} out of range for int", value))
    })
}

/// Map a zig-zag encoded unsigned value back to its signed form.
#[inline]
pub fn zigzag_to_i64(unsigned: u64) -> i64 {
    ((unsigned >> 1) as i64) ^ (-((unsigned & 1) as i64))
}

/// Skip over a varint without decoding its value.
///
/// # Errors
/// - `DecodeError::UnexpectedEof` if the input is truncated
/// - `DecodeError::MalformedVarint` if no terminator appears within 10 bytes
#[inline]
pub fn skip_varint(data: &mut &[u8]) -> Result<(), DecodeError> {
    for (index, &byte) in data.iter().enumerate().take(MAX_VARINT_LEN) {
        if byte & 0x80 == 0 {
            *data = &data[index + 1..];
            return Ok(());
        }
    }
    if data.len() >= MAX_VARINT_LEN {
        Err(DecodeError::MalformedVarint(format!(
            "no terminating byte within {} bytes",
            MAX_VARINT_LEN
        )))
    } else {
        Err(DecodeError::UnexpectedEof)
    }
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Append the minimal varint encoding of `value` to `buf`.
#[inline]
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Append the zig-zag varint encoding of `value` to `buf`.
#[inline]
pub fn write_zigzag(buf: &mut Vec<u8>, value: i64) {
    write_varint(buf, ((value << 1) ^ (value >> 63)) as u64);
}

/// Encode an unsigned integer as a variable-length integer.
#[inline]
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_VARINT_LEN);
    write_varint(&mut buf, value);
    buf
}

/// Encode a signed integer as a zig-zag variable-length integer.
#[inline]
pub fn encode_zigzag(value: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_VARINT_LEN);
    write_zigzag(&mut buf, value);
    buf
}
