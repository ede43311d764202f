//! Logical type layer.
//!
//! Logical types are decorations over a base type. The binary codec always
//! reads and writes the base type; this module converts between the raw base
//! value and its logical form.
//!
//! Reading is lenient: a raw value that is not a valid instance of its
//! logical type is returned unchanged. Writing accepts either the logical
//! value or the raw base value.

use std::borrow::Cow;

use tracing::trace;
use uuid::Uuid;

use crate::error::EncodeError;
use crate::schema::{AvroSchema, LogicalTypeName};
use crate::value::{minimal_twos_complement, twos_complement_to_i128, AvroValue};

const MILLIS_PER_DAY: i64 = 86_400_000;
const MICROS_PER_DAY: i64 = 86_400_000_000;
const DURATION_SIZE: usize = 12;
const UUID_SIZE: usize = 16;

/// Reinterpret a decoded base value as its logical form.
pub fn apply(raw: AvroValue, logical: &LogicalTypeName) -> AvroValue {
    let converted = match (logical, &raw) {
        (LogicalTypeName::Decimal { precision, scale }, AvroValue::Bytes(b))
        | (LogicalTypeName::Decimal { precision, scale }, AvroValue::Fixed(b)) => {
            if fits_precision(b, *precision) {
                // Stored in minimal form, without the sign extension of a fixed base
                let unscaled = twos_complement_to_i128(b)
                    .map_or_else(|| b.clone(), minimal_twos_complement);
                Some(AvroValue::Decimal {
                    unscaled,
                    precision: *precision,
                    scale: *scale,
                })
            } else {
                None
            }
        }
        (LogicalTypeName::Uuid, AvroValue::String(s)) => {
            Uuid::parse_str(s).ok().map(|_| AvroValue::Uuid(s.clone()))
        }
        (LogicalTypeName::Uuid, AvroValue::Fixed(b)) if b.len() == UUID_SIZE => Uuid::from_slice(b)
            .ok()
            .map(|u| AvroValue::Uuid(u.hyphenated().to_string())),
        (LogicalTypeName::Date, AvroValue::Int(days)) => Some(AvroValue::Date(*days)),
        (LogicalTypeName::TimeMillis, AvroValue::Int(ms))
            if (0..MILLIS_PER_DAY).contains(&(*ms as i64)) =>
        {
            Some(AvroValue::TimeMillis(*ms))
        }
        (LogicalTypeName::TimeMicros, AvroValue::Long(us)) if (0..MICROS_PER_DAY).contains(us) => {
            Some(AvroValue::TimeMicros(*us))
        }
        (LogicalTypeName::TimestampMillis, AvroValue::Long(v)) => {
            Some(AvroValue::TimestampMillis(*v))
        }
        (LogicalTypeName::TimestampMicros, AvroValue::Long(v)) => {
            Some(AvroValue::TimestampMicros(*v))
        }
        (LogicalTypeName::LocalTimestampMillis, AvroValue::Long(v)) => {
            Some(AvroValue::LocalTimestampMillis(*v))
        }
        (LogicalTypeName::LocalTimestampMicros, AvroValue::Long(v)) => {
            Some(AvroValue::LocalTimestampMicros(*v))
        }
        (LogicalTypeName::Duration, AvroValue::Fixed(b)) if b.len() == DURATION_SIZE => {
            let word = |i: usize| u32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]);
            Some(AvroValue::Duration {
                months: word(0),
                days: word(4),
                milliseconds: word(8),
            })
        }
        _ => None,
    };

    match converted {
        Some(value) => value,
        None => {
            trace!(
                logical_type = logical.name(),
                raw_kind = raw.kind(),
                "logical value out of range, keeping raw value"
            );
            raw
        }
    }
}

/// Whether an unscaled decimal has at most `precision` digits.
///
/// Values wider than 128 bits are not checked.
fn fits_precision(unscaled: &[u8], precision: u32) -> bool {
    match twos_complement_to_i128(unscaled) {
        Some(v) => {
            let digits = v.unsigned_abs().checked_ilog10().map_or(1, |d| d + 1);
            digits <= precision
        }
        None => true,
    }
}

/// Lower a value for a logical schema node to its base representation.
///
/// `base` must already be resolved (not a `Named` reference). Raw base
/// values are passed through untouched.
pub fn lower<'a>(
    value: &'a AvroValue,
    logical: &LogicalTypeName,
    base: &AvroSchema,
) -> Result<Cow<'a, AvroValue>, EncodeError> {
    let lowered = match (logical, value) {
        (
            LogicalTypeName::Decimal { scale, .. },
            AvroValue::Decimal {
                unscaled,
                scale: value_scale,
                ..
            },
        ) => {
            if value_scale != scale {
                return Err(EncodeError::InvalidLogical(format!(
                    "decimal scale {} does not match schema scale {}",
                    value_scale, scale
                )));
            }
            match base {
                AvroSchema::Bytes => AvroValue::Bytes(unscaled.clone()),
                AvroSchema::Fixed(f) => AvroValue::Fixed(sign_extend(unscaled, f.size, &f.name)?),
                other => return Err(mismatch(other, value)),
            }
        }
        (LogicalTypeName::Uuid, AvroValue::Uuid(text)) => {
            let parsed = Uuid::parse_str(text)
                .map_err(|e| EncodeError::InvalidLogical(format!("invalid uuid '{}': {}", text, e)))?;
            match base {
                AvroSchema::String => AvroValue::String(text.clone()),
                AvroSchema::Fixed(f) if f.size == UUID_SIZE => {
                    AvroValue::Fixed(parsed.as_bytes().to_vec())
                }
                other => return Err(mismatch(other, value)),
            }
        }
        (LogicalTypeName::Date, AvroValue::Date(d)) => AvroValue::Int(*d),
        (LogicalTypeName::TimeMillis, AvroValue::TimeMillis(t)) => AvroValue::Int(*t),
        (LogicalTypeName::TimeMicros, AvroValue::TimeMicros(t)) => AvroValue::Long(*t),
        (LogicalTypeName::TimestampMillis, AvroValue::TimestampMillis(t))
        | (LogicalTypeName::TimestampMicros, AvroValue::TimestampMicros(t))
        | (LogicalTypeName::LocalTimestampMillis, AvroValue::LocalTimestampMillis(t))
        | (LogicalTypeName::LocalTimestampMicros, AvroValue::LocalTimestampMicros(t)) => {
            AvroValue::Long(*t)
        }
        (
            LogicalTypeName::Duration,
            AvroValue::Duration {
                months,
                days,
                milliseconds,
            },
        ) => {
            let mut bytes = Vec::with_capacity(DURATION_SIZE);
            for word in [months, days, milliseconds] {
                bytes.extend_from_slice(&word.to_le_bytes());
            }
            AvroValue::Fixed(bytes)
        }
        _ => return Ok(Cow::Borrowed(value)),
    };
    Ok(Cow::Owned(lowered))
}

fn mismatch(base: &AvroSchema, value: &AvroValue) -> EncodeError {
    EncodeError::TypeMismatch {
        expected: base.type_key(),
        found: value.kind().to_string(),
    }
}

/// Widen or narrow a two's complement integer to exactly `size` bytes.
fn sign_extend(unscaled: &[u8], size: usize, name: &str) -> Result<Vec<u8>, EncodeError> {
    let minimal = match twos_complement_to_i128(unscaled) {
        Some(v) => minimal_twos_complement(v),
        None => unscaled.to_vec(),
    };
    if minimal.len() > size {
        return Err(EncodeError::FixedSizeMismatch {
            name: name.to_string(),
            expected: size,
            actual: minimal.len(),
        });
    }
    let fill = if minimal.first().is_some_and(|b| b & 0x80 != 0) {
        0xFF
    } else {
        0x00
    };
    let mut out = vec![fill; size - minimal.len()];
    out.extend_from_slice(&minimal);
    Ok(out)
}
