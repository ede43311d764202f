//! Read functions: single values and whole tables.

use std::io::Read;
use std::path::Path;

use crate::error::{DecodeError, ReaderError};
use crate::reader::{decode_value, ReaderConfig};
use crate::schema::{AvroSchema, SchemaResolutionContext};
use crate::source::LocalSource;
use crate::table::Table;
use crate::value::AvroValue;

/// Decode exactly one value of `schema` from `bytes`.
///
/// Bytes left over after the value are an error.
///
/// # Example
/// ```
/// use tarmac::api::from_bytes;
/// use tarmac::schema::AvroSchema;
/// use tarmac::value::AvroValue;
///
/// assert_eq!(from_bytes(&[0x06, b'f', b'o', b'o'], &AvroSchema::String)?, AvroValue::from("foo"));
/// assert!(from_bytes(&[0x02, 0x00], &AvroSchema::Long).is_err());
/// # Ok::<(), tarmac::error::DecodeError>(())
/// ```
pub fn from_bytes(bytes: &[u8], schema: &AvroSchema) -> Result<AvroValue, DecodeError> {
    let names = SchemaResolutionContext::build_from_schema(schema);
    let mut cursor = bytes;
    let value = decode_value(&mut cursor, schema, &names)?;
    if !cursor.is_empty() {
        return Err(DecodeError::InvalidData(format!(
            "{} bytes left after the value",
            cursor.len()
        )));
    }
    Ok(value)
}

/// Read `source` to its end and decode it as one value.
pub fn read_value<R: Read>(mut source: R, schema: &AvroSchema) -> Result<AvroValue, DecodeError> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    from_bytes(&bytes, schema)
}

/// Decode the file at `path` as one value.
pub fn read_value_file<P: AsRef<Path>>(path: P, schema: &AvroSchema) -> Result<AvroValue, DecodeError> {
    from_bytes(&std::fs::read(path)?, schema)
}

/// Open a container file from any reader as a table (strict mode).
pub fn read_table<R: Read>(source: R) -> Result<Table<R>, ReaderError> {
    Table::new(source)
}

/// Open a container file as a table with explicit reader settings.
pub fn read_table_with_config<R: Read>(
    source: R,
    config: ReaderConfig,
) -> Result<Table<R>, ReaderError> {
    Table::with_config(source, config)
}

/// Open the container file at `path` as a table (strict mode).
pub fn read_table_file<P: AsRef<Path>>(path: P) -> Result<Table<LocalSource>, ReaderError> {
    Table::new(LocalSource::open(path)?)
}
