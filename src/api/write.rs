//! Write functions: single values and whole tables.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{EncodeError, SchemaError, WriterError};
use crate::schema::{
    infer_schema, AvroSchema, FieldSchema, RecordSchema, SchemaResolutionContext, ROW_RECORD_NAME,
};
use crate::source::LocalSink;
use crate::table::RowSource;
use crate::value::AvroValue;
use crate::writer::{to_avro_bytes, AvroWriter};

use super::options::WriteOptions;

/// Encode one value to bytes (no container framing).
///
/// # Example
/// ```
/// use tarmac::api::to_bytes;
/// use tarmac::schema::AvroSchema;
/// use tarmac::value::AvroValue;
///
/// let bytes = to_bytes(&AvroValue::Long(-1), &AvroSchema::Long)?;
/// assert_eq!(bytes, vec![0x01]);
/// # Ok::<(), tarmac::error::EncodeError>(())
/// ```
pub fn to_bytes(value: &AvroValue, schema: &AvroSchema) -> Result<Vec<u8>, EncodeError> {
    let names = SchemaResolutionContext::build_from_schema(schema);
    to_avro_bytes(value, schema, &names)
}

/// Encode one value and write it to `sink`.
///
/// Nothing is written if encoding fails.
pub fn write_value<W: Write>(
    sink: &mut W,
    value: &AvroValue,
    schema: &AvroSchema,
) -> Result<(), EncodeError> {
    let bytes = to_bytes(value, schema)?;
    sink.write_all(&bytes)?;
    Ok(())
}

/// Pick the schema a row source is written with.
///
/// Order of preference: explicit option, the source's record schema, its
/// column schemas, inference over every row.
fn resolve_table_schema<S: RowSource + ?Sized>(
    source: &S,
    options: &WriteOptions,
    columns: &[String],
) -> Result<AvroSchema, WriterError> {
    let schema = if let Some(schema) = options.schema.clone().or_else(|| source.schema()) {
        schema
    } else if let Some(schemas) = source.column_schemas() {
        if schemas.len() != columns.len() {
            return Err(WriterError::Configuration(format!(
                "{} column schemas for {} columns",
                schemas.len(),
                columns.len()
            )));
        }
        let fields = columns
            .iter()
            .zip(schemas)
            .map(|(name, schema)| FieldSchema::new(name.clone(), schema))
            .collect();
        AvroSchema::Record(RecordSchema::new(ROW_RECORD_NAME, fields))
    } else {
        debug!(columns = columns.len(), "Inferring table schema from rows");
        infer_schema(columns, source.rows())
    };

    if schema.as_record().is_none() {
        return Err(SchemaError::InvalidSchema(format!(
            "Tables are written with a record schema, got {}",
            schema.type_key()
        ))
        .into());
    }
    Ok(schema)
}

/// Write a row source as a container file to `sink` and return the sink.
///
/// One block is written per source partition; without partitions every row
/// goes into a single block (unless `block_size_bytes` splits it).
pub fn write_table<W, S>(sink: W, source: &S, options: &WriteOptions) -> Result<W, WriterError>
where
    W: Write,
    S: RowSource + ?Sized,
{
    let columns = source.column_names();
    let schema = resolve_table_schema(source, options, &columns)?;
    let mut writer = AvroWriter::new(sink, schema, options.writer_config())?;

    let partition_ends: HashSet<usize> = source
        .partitions()
        .unwrap_or_default()
        .into_iter()
        .map(|range| range.end)
        .collect();

    let mut count = 0usize;
    for row in source.rows() {
        let record = AvroValue::Record(columns.iter().cloned().zip(row.iter().cloned()).collect());
        writer.append(&record)?;
        count += 1;
        if partition_ends.contains(&count) {
            writer.flush_block()?;
        }
    }

    debug!(
        rows = count,
        blocks = writer.blocks_written() + usize::from(writer.pending_records() > 0),
        codec = options.compress.name(),
        "Wrote table"
    );
    writer.close()
}

/// Write a row source as a container file at `path`.
pub fn write_table_file<P, S>(path: P, source: &S, options: &WriteOptions) -> Result<(), WriterError>
where
    P: AsRef<Path>,
    S: RowSource + ?Sized,
{
    let sink = LocalSink::create(path)?;
    let mut sink = write_table(sink, source, options)?;
    sink.sync()?;
    Ok(())
}

/// Write a row source as a container file into memory.
pub fn to_buffer<S: RowSource + ?Sized>(
    source: &S,
    options: &WriteOptions,
) -> Result<Vec<u8>, WriterError> {
    write_table(Vec::new(), source, options)
}
