//! Avro binary encoder.
//!
//! The mirror image of [`crate::reader::decode`]. Values are checked against
//! the schema while they are written:
//! - record values are matched to fields by name; missing fields use the
//!   field default
//! - a bare value under a union picks the first branch that accepts it
//!   (exact kind first, then numeric and text promotions)
//! - arrays and maps are written as one counted block plus the terminator
//!
//! On failure `buf` may hold a partial value; callers that need atomic
//! appends truncate back to the starting length.

use serde_json::Value as Json;

use crate::error::EncodeError;
use crate::logical;
use crate::reader::varint::write_zigzag;
use crate::schema::{AvroSchema, FieldSchema, RecordSchema, SchemaResolutionContext};
use crate::value::AvroValue;

/// Append the binary encoding of `value` under `schema` to `buf`.
pub fn encode_value(
    value: &AvroValue,
    schema: &AvroSchema,
    names: &SchemaResolutionContext,
    buf: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    let schema = resolve(schema, names)?;

    match (schema, value) {
        (AvroSchema::Null, AvroValue::Null) => {}
        (AvroSchema::Boolean, AvroValue::Boolean(b)) => buf.push(*b as u8),
        (AvroSchema::Int, AvroValue::Int(i)) => write_zigzag(buf, *i as i64),
        (AvroSchema::Long, AvroValue::Int(i)) => write_zigzag(buf, *i as i64),
        (AvroSchema::Long, AvroValue::Long(l)) => write_zigzag(buf, *l),
        (AvroSchema::Float, AvroValue::Float(f)) => buf.extend_from_slice(&f.to_le_bytes()),
        (AvroSchema::Float, AvroValue::Int(i)) => {
            buf.extend_from_slice(&(*i as f32).to_le_bytes())
        }
        (AvroSchema::Float, AvroValue::Long(l)) => {
            buf.extend_from_slice(&(*l as f32).to_le_bytes())
        }
        (AvroSchema::Double, AvroValue::Double(d)) => buf.extend_from_slice(&d.to_le_bytes()),
        (AvroSchema::Double, AvroValue::Float(f)) => {
            buf.extend_from_slice(&(*f as f64).to_le_bytes())
        }
        (AvroSchema::Double, AvroValue::Int(i)) => {
            buf.extend_from_slice(&(*i as f64).to_le_bytes())
        }
        (AvroSchema::Double, AvroValue::Long(l)) => {
            buf.extend_from_slice(&(*l as f64).to_le_bytes())
        }
        (AvroSchema::Bytes, AvroValue::Bytes(b)) => write_bytes(buf, b),
        (AvroSchema::Bytes, AvroValue::String(s)) => write_bytes(buf, s.as_bytes()),
        (AvroSchema::String, AvroValue::String(s)) => write_bytes(buf, s.as_bytes()),
        (AvroSchema::String, AvroValue::Bytes(b)) if std::str::from_utf8(b).is_ok() => {
            write_bytes(buf, b)
        }
        (AvroSchema::Fixed(f), AvroValue::Fixed(b)) | (AvroSchema::Fixed(f), AvroValue::Bytes(b)) => {
            if b.len() != f.size {
                return Err(EncodeError::FixedSizeMismatch {
                    name: f.fullname(),
                    expected: f.size,
                    actual: b.len(),
                });
            }
            buf.extend_from_slice(b);
        }
        (AvroSchema::Enum(e), AvroValue::Enum(_, symbol))
        | (AvroSchema::Enum(e), AvroValue::String(symbol)) => {
            let index = e
                .symbol_index(symbol)
                .ok_or_else(|| EncodeError::UnknownEnumSymbol {
                    name: e.fullname(),
                    symbol: symbol.clone(),
                })?;
            write_zigzag(buf, index as i64);
        }
        (AvroSchema::Record(record), AvroValue::Record(fields)) => {
            encode_record(record, fields, names, buf)?
        }
        (AvroSchema::Array(item), AvroValue::Array(items)) => {
            if !items.is_empty() {
                write_zigzag(buf, items.len() as i64);
                for value in items {
                    encode_value(value, item, names, buf)?;
                }
            }
            buf.push(0);
        }
        (AvroSchema::Map(values), AvroValue::Map(entries)) => {
            if !entries.is_empty() {
                write_zigzag(buf, entries.len() as i64);
                for (key, value) in entries {
                    write_bytes(buf, key.as_bytes());
                    encode_value(value, values, names, buf)?;
                }
            }
            buf.push(0);
        }
        (AvroSchema::Union(branches), AvroValue::Union(index, inner)) => {
            let branch = usize::try_from(*index)
                .ok()
                .and_then(|i| branches.get(i))
                .ok_or_else(|| {
                    EncodeError::UnionBranchNotFound(format!(
                        "branch index {} of {}",
                        index,
                        branches.len()
                    ))
                })?;
            write_zigzag(buf, *index as i64);
            encode_value(inner, branch, names, buf)?;
        }
        (AvroSchema::Union(branches), bare) => {
            let index = select_branch(bare, branches, names)
                .ok_or_else(|| EncodeError::UnionBranchNotFound(bare.kind().to_string()))?;
            write_zigzag(buf, index as i64);
            encode_value(bare, &branches[index], names, buf)?;
        }
        (AvroSchema::Logical(lt), value) => {
            let base = resolve(&lt.base, names)?;
            let lowered = logical::lower(value, &lt.logical_type, base)?;
            encode_value(&lowered, base, names, buf)?;
        }
        // A single-branch union is not needed to write an explicitly tagged value
        (schema, AvroValue::Union(_, inner)) => encode_value(inner, schema, names, buf)?,
        (schema, value) => {
            return Err(EncodeError::TypeMismatch {
                expected: schema.type_key(),
                found: value.kind().to_string(),
            })
        }
    }
    Ok(())
}

/// Encode `value` into a fresh buffer.
pub fn to_avro_bytes(
    value: &AvroValue,
    schema: &AvroSchema,
    names: &SchemaResolutionContext,
) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    encode_value(value, schema, names, &mut buf)?;
    Ok(buf)
}

#[inline]
fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_zigzag(buf, bytes.len() as i64);
    buf.extend_from_slice(bytes);
}

fn resolve<'a>(
    schema: &'a AvroSchema,
    names: &'a SchemaResolutionContext,
) -> Result<&'a AvroSchema, EncodeError> {
    names.resolve(schema).ok_or_else(|| {
        EncodeError::UnresolvedName(schema.fullname().unwrap_or_else(|| schema.type_key()))
    })
}

fn encode_record(
    record: &RecordSchema,
    fields: &[(String, AvroValue)],
    names: &SchemaResolutionContext,
    buf: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    if let Some((unknown, _)) = fields.iter().find(|(n, _)| record.field(n).is_none()) {
        return Err(EncodeError::TypeMismatch {
            expected: record.fullname(),
            found: format!("record with unknown field '{}'", unknown),
        });
    }

    for (position, field) in record.fields.iter().enumerate() {
        // Values built from the same schema line up positionally
        let value = match fields.get(position) {
            Some((name, value)) if *name == field.name => Some(value),
            _ => fields.iter().find(|(n, _)| *n == field.name).map(|(_, v)| v),
        };

        match value {
            Some(value) => encode_value(value, &field.schema, names, buf)?,
            None => {
                let default = default_value(record, field, names)?;
                encode_value(&default, &field.schema, names, buf)?;
            }
        }
    }
    Ok(())
}

/// Build the value of a field's JSON default.
fn default_value(
    record: &RecordSchema,
    field: &FieldSchema,
    names: &SchemaResolutionContext,
) -> Result<AvroValue, EncodeError> {
    let missing = || EncodeError::MissingField {
        record: record.fullname(),
        field: field.name.clone(),
    };
    let default = field.default.as_ref().ok_or_else(missing)?;
    json_to_value(default, &field.schema, names).ok_or_else(missing)
}

/// Convert a JSON default to a value of `schema`.
///
/// A union default applies to the union's first branch.
pub fn json_to_value(
    json: &Json,
    schema: &AvroSchema,
    names: &SchemaResolutionContext,
) -> Option<AvroValue> {
    let schema = names.resolve(schema)?;
    Some(match (schema, json) {
        (AvroSchema::Null, Json::Null) => AvroValue::Null,
        (AvroSchema::Boolean, Json::Bool(b)) => AvroValue::Boolean(*b),
        (AvroSchema::Int, Json::Number(n)) => AvroValue::Int(i32::try_from(n.as_i64()?).ok()?),
        (AvroSchema::Long, Json::Number(n)) => AvroValue::Long(n.as_i64()?),
        (AvroSchema::Float, Json::Number(n)) => AvroValue::Float(n.as_f64()? as f32),
        (AvroSchema::Double, Json::Number(n)) => AvroValue::Double(n.as_f64()?),
        (AvroSchema::String, Json::String(s)) => AvroValue::String(s.clone()),
        // Bytes and fixed defaults map each code point 0-255 to one byte
        (AvroSchema::Bytes, Json::String(s)) => AvroValue::Bytes(latin1(s)?),
        (AvroSchema::Fixed(_), Json::String(s)) => AvroValue::Fixed(latin1(s)?),
        (AvroSchema::Enum(e), Json::String(s)) => {
            AvroValue::Enum(e.symbol_index(s)? as i32, s.clone())
        }
        (AvroSchema::Array(item), Json::Array(items)) => AvroValue::Array(
            items
                .iter()
                .map(|j| json_to_value(j, item, names))
                .collect::<Option<_>>()?,
        ),
        (AvroSchema::Map(values), Json::Object(entries)) => AvroValue::Map(
            entries
                .iter()
                .map(|(k, j)| Some((k.clone(), json_to_value(j, values, names)?)))
                .collect::<Option<_>>()?,
        ),
        (AvroSchema::Record(r), Json::Object(entries)) => AvroValue::Record(
            r.fields
                .iter()
                .map(|f| {
                    let j = entries.get(&f.name).or(f.default.as_ref())?;
                    Some((f.name.clone(), json_to_value(j, &f.schema, names)?))
                })
                .collect::<Option<_>>()?,
        ),
        (AvroSchema::Union(branches), j) => {
            AvroValue::Union(0, Box::new(json_to_value(j, branches.first()?, names)?))
        }
        (AvroSchema::Logical(lt), j) => json_to_value(j, &lt.base, names)?,
        _ => return None,
    })
}

fn latin1(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(c as u32).ok()).collect()
}

// ============================================================================
// Union branch selection
// ============================================================================

/// Index of the first union branch that accepts `value`.
pub fn select_branch(
    value: &AvroValue,
    branches: &[AvroSchema],
    names: &SchemaResolutionContext,
) -> Option<usize> {
    branches
        .iter()
        .position(|b| accepts(value, b, names, false))
        .or_else(|| branches.iter().position(|b| accepts(value, b, names, true)))
}

fn accepts(
    value: &AvroValue,
    schema: &AvroSchema,
    names: &SchemaResolutionContext,
    promote: bool,
) -> bool {
    let Some(schema) = names.resolve(schema) else {
        return false;
    };

    match (schema, value) {
        (AvroSchema::Null, AvroValue::Null)
        | (AvroSchema::Boolean, AvroValue::Boolean(_))
        | (AvroSchema::Int, AvroValue::Int(_))
        | (AvroSchema::Long, AvroValue::Long(_))
        | (AvroSchema::Float, AvroValue::Float(_))
        | (AvroSchema::Double, AvroValue::Double(_))
        | (AvroSchema::Bytes, AvroValue::Bytes(_))
        | (AvroSchema::String, AvroValue::String(_))
        | (AvroSchema::Array(_), AvroValue::Array(_))
        | (AvroSchema::Map(_), AvroValue::Map(_)) => true,
        (AvroSchema::Fixed(f), AvroValue::Fixed(b)) => b.len() == f.size,
        (AvroSchema::Enum(e), AvroValue::Enum(_, s)) => e.symbol_index(s).is_some(),
        (AvroSchema::Record(r), AvroValue::Record(fields)) => record_fits(r, fields),
        (AvroSchema::Logical(lt), value) => {
            logical_kind_matches(&lt.logical_type, value)
                || (promote && accepts(value, &lt.base, names, true))
        }
        _ if !promote => false,
        (AvroSchema::Long, AvroValue::Int(_))
        | (AvroSchema::Float, AvroValue::Int(_) | AvroValue::Long(_))
        | (AvroSchema::Double, AvroValue::Int(_) | AvroValue::Long(_) | AvroValue::Float(_))
        | (AvroSchema::Bytes, AvroValue::String(_)) => true,
        (AvroSchema::String, AvroValue::Bytes(b)) => std::str::from_utf8(b).is_ok(),
        (AvroSchema::Fixed(f), AvroValue::Bytes(b)) => b.len() == f.size,
        (AvroSchema::Enum(e), AvroValue::String(s)) => e.symbol_index(s).is_some(),
        _ => false,
    }
}

fn record_fits(record: &RecordSchema, fields: &[(String, AvroValue)]) -> bool {
    fields.iter().all(|(n, _)| record.field(n).is_some())
        && record
            .fields
            .iter()
            .all(|f| f.default.is_some() || fields.iter().any(|(n, _)| *n == f.name))
}

fn logical_kind_matches(logical: &crate::schema::LogicalTypeName, value: &AvroValue) -> bool {
    use crate::schema::LogicalTypeName as L;
    matches!(
        (logical, value),
        (L::Decimal { .. }, AvroValue::Decimal { .. })
            | (L::Uuid, AvroValue::Uuid(_))
            | (L::Date, AvroValue::Date(_))
            | (L::TimeMillis, AvroValue::TimeMillis(_))
            | (L::TimeMicros, AvroValue::TimeMicros(_))
            | (L::TimestampMillis, AvroValue::TimestampMillis(_))
            | (L::TimestampMicros, AvroValue::TimestampMicros(_))
            | (L::LocalTimestampMillis, AvroValue::LocalTimestampMillis(_))
            | (L::LocalTimestampMicros, AvroValue::LocalTimestampMicros(_))
            | (L::Duration, AvroValue::Duration { .. })
    )
}
