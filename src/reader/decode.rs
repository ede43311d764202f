//! Avro binary decoder.
//!
//! Decoding is driven by the schema: each node reads exactly its own bytes
//! from the cursor and nothing else. The rules:
//! - `int`/`long` are zig-zag varints, `float`/`double` little-endian IEEE 754
//! - `bytes`/`string` are a `long` length followed by the payload
//! - records are their fields in order, with no framing
//! - enums are an `int` index, unions a `long` branch index plus the branch value
//! - arrays and maps are a sequence of counted blocks ending with a zero count;
//!   a negative count is followed by the block's byte size
//! - fixed is exactly `size` raw bytes
//!
//! Logical types are decoded as their base type and then reinterpreted by
//! [`crate::logical::apply`].

use std::collections::HashMap;

use crate::error::DecodeError;
use crate::logical;
use crate::schema::{AvroSchema, EnumSchema, SchemaResolutionContext};
use crate::value::AvroValue;

use super::varint::{decode_zigzag, decode_zigzag_i32, skip_varint};

/// Maximum nesting of values, bounding recursion on corrupt input.
pub const MAX_DEPTH: usize = 512;

// ============================================================================
// Primitive decoders
// ============================================================================

/// Decode a boolean (one byte, 0 or 1).
#[inline]
pub fn decode_boolean(data: &mut &[u8]) -> Result<bool, DecodeError> {
    match take(data, 1)?[0] {
        0 => Ok(false),
        1 => Ok(true),
        byte => Err(DecodeError::InvalidData(format!(
            "Invalid boolean value: {}, expected 0 or 1",
            byte
        ))),
    }
}

/// Decode an `int`.
#[inline]
pub fn decode_int(data: &mut &[u8]) -> Result<i32, DecodeError> {
    decode_zigzag_i32(data)
}

/// Decode a `long`.
#[inline]
pub fn decode_long(data: &mut &[u8]) -> Result<i64, DecodeError> {
    decode_zigzag(data)
}

/// Decode a little-endian `float`.
#[inline]
pub fn decode_float(data: &mut &[u8]) -> Result<f32, DecodeError> {
    let bytes = take(data, 4)?;
    Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a little-endian `double`.
#[inline]
pub fn decode_double(data: &mut &[u8]) -> Result<f64, DecodeError> {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(take(data, 8)?);
    Ok(f64::from_le_bytes(raw))
}

/// Decode a length prefix for `bytes`/`string`.
#[inline]
fn decode_len(data: &mut &[u8]) -> Result<usize, DecodeError> {
    let len = decode_long(data)?;
    if len < 0 {
        return Err(DecodeError::NegativeLength(len));
    }
    usize::try_from(len).map_err(|_| DecodeError::UnexpectedEof)
}

/// Borrow length-prefixed bytes without copying.
#[inline]
pub fn decode_bytes_ref<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = decode_len(data)?;
    take(data, len)
}

/// Decode length-prefixed bytes.
#[inline]
pub fn decode_bytes(data: &mut &[u8]) -> Result<Vec<u8>, DecodeError> {
    decode_bytes_ref(data).map(<[u8]>::to_vec)
}

/// Decode a length-prefixed UTF-8 string.
#[inline]
pub fn decode_string(data: &mut &[u8]) -> Result<String, DecodeError> {
    Ok(String::from_utf8(decode_bytes(data)?)?)
}

/// Decode exactly `size` raw bytes.
#[inline]
pub fn decode_fixed(data: &mut &[u8], size: usize) -> Result<Vec<u8>, DecodeError> {
    take(data, size).map(<[u8]>::to_vec)
}

/// Decode an enum index and look up its symbol.
pub fn decode_enum(data: &mut &[u8], schema: &EnumSchema) -> Result<(i32, String), DecodeError> {
    let index = decode_int(data)?;
    let symbol = usize::try_from(index)
        .ok()
        .and_then(|i| schema.symbols.get(i))
        .ok_or(DecodeError::EnumIndexOutOfRange {
            index: index as i64,
            symbols: schema.symbols.len(),
        })?;
    Ok((index, symbol.clone()))
}

/// Decode a union branch index, checked against the branch count.
pub fn decode_union_index(data: &mut &[u8], branches: usize) -> Result<usize, DecodeError> {
    let index = decode_long(data)?;
    match usize::try_from(index) {
        Ok(i) if i < branches => Ok(i),
        _ => Err(DecodeError::UnionIndexOutOfRange { index, branches }),
    }
}

#[inline]
fn take<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], DecodeError> {
    if data.len() < len {
        return Err(DecodeError::UnexpectedEof);
    }
    let (head, rest) = data.split_at(len);
    *data = rest;
    Ok(head)
}

/// Item count of the next array/map block; `None` at the terminating zero.
///
/// The byte size that follows a negative count is read and discarded.
fn next_block_count(data: &mut &[u8]) -> Result<Option<usize>, DecodeError> {
    let count = decode_long(data)?;
    if count == 0 {
        return Ok(None);
    }
    if count < 0 {
        let _byte_size = decode_long(data)?;
    }
    usize::try_from(count.unsigned_abs())
        .map(Some)
        .map_err(|_| DecodeError::InvalidData(format!("Block count {} too large", count)))
}

/// Guard against counts that cannot be backed by the remaining input.
///
/// `min_size` is the fewest bytes one item can take, see [`min_encoded_size`].
pub(crate) fn check_count(data: &[u8], count: usize, min_size: usize) -> Result<(), DecodeError> {
    if count.saturating_mul(min_size) > data.len() {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(())
}

/// Items to reserve up front for a block of `count` items.
///
/// Zero-width items are not bounded by the input, so their reservation is capped.
pub(crate) fn reserve_hint(count: usize, min_size: usize) -> usize {
    if min_size == 0 {
        count.min(ZERO_WIDTH_RESERVE)
    } else {
        count
    }
}

const ZERO_WIDTH_RESERVE: usize = 1024;

/// Fewest bytes any value of `schema` can occupy on the wire.
///
/// Zero for `null`, for `fixed(0)` and for records made only of those.
pub(crate) fn min_encoded_size(schema: &AvroSchema, names: &SchemaResolutionContext) -> usize {
    min_size_nested(schema, names, &mut HashMap::new())
}

/// `sized` memoizes named types; `None` marks a type still being sized.
fn min_size_nested<'a>(
    schema: &'a AvroSchema,
    names: &'a SchemaResolutionContext,
    sized: &mut HashMap<&'a str, Option<usize>>,
) -> usize {
    match schema {
        AvroSchema::Null => 0,
        AvroSchema::Float => 4,
        AvroSchema::Double => 8,
        AvroSchema::Fixed(f) => f.size,
        AvroSchema::Record(record) => record.fields.iter().fold(0, |total, field| {
            total.saturating_add(min_size_nested(&field.schema, names, sized))
        }),
        AvroSchema::Named(name) => match sized.get(name.as_str()) {
            Some(Some(size)) => *size,
            // A type that contains itself without a union or collection in between
            Some(None) => 1,
            None => {
                sized.insert(name.as_str(), None);
                // Decoding reports a missing name
                let size = names
                    .get(name)
                    .map_or(0, |resolved| min_size_nested(resolved, names, sized));
                sized.insert(name.as_str(), Some(size));
                size
            }
        },
        AvroSchema::Logical(lt) => min_size_nested(&lt.base, names, sized),
        AvroSchema::Boolean
        | AvroSchema::Int
        | AvroSchema::Long
        | AvroSchema::Bytes
        | AvroSchema::String
        | AvroSchema::Enum(_)
        | AvroSchema::Array(_)
        | AvroSchema::Map(_)
        | AvroSchema::Union(_) => 1,
    }
}

// ============================================================================
// Schema-directed decoding
// ============================================================================

/// Decode one value of `schema` from the cursor.
///
/// # Errors
/// Any [`DecodeError`]; the cursor position is unspecified after a failure.
pub fn decode_value(
    data: &mut &[u8],
    schema: &AvroSchema,
    names: &SchemaResolutionContext,
) -> Result<AvroValue, DecodeError> {
    decode_nested(data, schema, names, 0)
}

fn decode_nested(
    data: &mut &[u8],
    schema: &AvroSchema,
    names: &SchemaResolutionContext,
    depth: usize,
) -> Result<AvroValue, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::InvalidData(format!(
            "Value nesting exceeds {} levels",
            MAX_DEPTH
        )));
    }
    let depth = depth + 1;

    Ok(match schema {
        AvroSchema::Null => AvroValue::Null,
        AvroSchema::Boolean => AvroValue::Boolean(decode_boolean(data)?),
        AvroSchema::Int => AvroValue::Int(decode_int(data)?),
        AvroSchema::Long => AvroValue::Long(decode_long(data)?),
        AvroSchema::Float => AvroValue::Float(decode_float(data)?),
        AvroSchema::Double => AvroValue::Double(decode_double(data)?),
        AvroSchema::Bytes => AvroValue::Bytes(decode_bytes(data)?),
        AvroSchema::String => AvroValue::String(decode_string(data)?),
        AvroSchema::Fixed(f) => AvroValue::Fixed(decode_fixed(data, f.size)?),
        AvroSchema::Enum(e) => {
            let (index, symbol) = decode_enum(data, e)?;
            AvroValue::Enum(index, symbol)
        }
        AvroSchema::Record(record) => {
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let value = decode_nested(data, &field.schema, names, depth)?;
                fields.push((field.name.clone(), value));
            }
            AvroValue::Record(fields)
        }
        AvroSchema::Array(item) => {
            let mut items = Vec::new();
            while let Some(count) = next_block_count(data)? {
                let min_size = min_encoded_size(item, names);
                check_count(data, count, min_size)?;
                items.reserve(reserve_hint(count, min_size));
                for _ in 0..count {
                    items.push(decode_nested(data, item, names, depth)?);
                }
            }
            AvroValue::Array(items)
        }
        AvroSchema::Map(values) => {
            let mut entries = Vec::new();
            while let Some(count) = next_block_count(data)? {
                // Every entry carries at least its key length
                let min_size = min_encoded_size(values, names).saturating_add(1);
                check_count(data, count, min_size)?;
                entries.reserve(count);
                for _ in 0..count {
                    let key = decode_string(data)?;
                    let value = decode_nested(data, values, names, depth)?;
                    entries.push((key, value));
                }
            }
            AvroValue::Map(entries)
        }
        AvroSchema::Union(branches) => {
            let index = decode_union_index(data, branches.len())?;
            let value = decode_nested(data, &branches[index], names, depth)?;
            AvroValue::Union(index as i32, Box::new(value))
        }
        AvroSchema::Named(name) => {
            let resolved = names
                .get(name)
                .ok_or_else(|| DecodeError::UnresolvedName(name.clone()))?;
            return decode_nested(data, resolved, names, depth);
        }
        AvroSchema::Logical(lt) => {
            let raw = decode_nested(data, &lt.base, names, depth)?;
            logical::apply(raw, &lt.logical_type)
        }
    })
}

// ============================================================================
// Skipping
// ============================================================================

/// Advance the cursor past one value of `schema` without building it.
pub fn skip_value(
    data: &mut &[u8],
    schema: &AvroSchema,
    names: &SchemaResolutionContext,
) -> Result<(), DecodeError> {
    skip_nested(data, schema, names, 0)
}

fn skip_nested(
    data: &mut &[u8],
    schema: &AvroSchema,
    names: &SchemaResolutionContext,
    depth: usize,
) -> Result<(), DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::InvalidData(format!(
            "Value nesting exceeds {} levels",
            MAX_DEPTH
        )));
    }
    let depth = depth + 1;

    match schema {
        AvroSchema::Null => Ok(()),
        AvroSchema::Boolean => take(data, 1).map(drop),
        AvroSchema::Int | AvroSchema::Long | AvroSchema::Enum(_) => skip_varint(data),
        AvroSchema::Float => take(data, 4).map(drop),
        AvroSchema::Double => take(data, 8).map(drop),
        AvroSchema::Bytes | AvroSchema::String => decode_bytes_ref(data).map(drop),
        AvroSchema::Fixed(f) => take(data, f.size).map(drop),
        AvroSchema::Record(record) => record
            .fields
            .iter()
            .try_for_each(|f| skip_nested(data, &f.schema, names, depth)),
        AvroSchema::Array(item) => skip_blocks(data, |d| skip_nested(d, item, names, depth)),
        AvroSchema::Map(values) => skip_blocks(data, |d| {
            decode_bytes_ref(d)?;
            skip_nested(d, values, names, depth)
        }),
        AvroSchema::Union(branches) => {
            let index = decode_union_index(data, branches.len())?;
            skip_nested(data, &branches[index], names, depth)
        }
        AvroSchema::Named(name) => {
            let resolved = names
                .get(name)
                .ok_or_else(|| DecodeError::UnresolvedName(name.clone()))?;
            skip_nested(data, resolved, names, depth)
        }
        AvroSchema::Logical(lt) => skip_nested(data, &lt.base, names, depth),
    }
}

/// Skip array/map blocks, jumping over sized blocks in one step.
fn skip_blocks<F>(data: &mut &[u8], mut skip_item: F) -> Result<(), DecodeError>
where
    F: FnMut(&mut &[u8]) -> Result<(), DecodeError>,
{
    loop {
        let count = decode_long(data)?;
        if count == 0 {
            return Ok(());
        }
        if count < 0 {
            let size = decode_long(data)?;
            let size = usize::try_from(size).map_err(|_| DecodeError::NegativeLength(size))?;
            take(data, size)?;
            continue;
        }
        for _ in 0..count {
            skip_item(data)?;
        }
    }
}
