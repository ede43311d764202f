//! Avro binary encoding and object container files
//!
//! This library encodes and decodes Avro values against a schema, reads and
//! writes object container files with optional block compression, exposes
//! container files as tables of rows, and infers a schema from rows when the
//! caller has none.

pub mod api;
pub mod codec;
pub mod error;
pub mod logical;
pub mod reader;
pub mod schema;
pub mod source;
pub mod table;
pub mod value;
pub mod writer;

// Re-export main types
pub use api::{
    from_bytes, read_table, read_table_file, read_table_with_config, read_value, read_value_file,
    to_buffer, to_bytes, write_table, write_table_file, write_value, WriteOptions,
};
pub use codec::Codec;
pub use error::{
    CodecError, DecodeError, EncodeError, ReadError, ReadErrorKind, ReaderError, SchemaError,
    SourceError, WriterError,
};
pub use reader::{
    decode_value, skip_value, AvroBlock, AvroHeader, BlockReader, DecompressedBlock, ErrorMode,
    ReaderConfig, RecordReader,
};
pub use schema::{
    infer_schema, parse_schema, parse_schema_file, AvroSchema, EnumSchema, FieldSchema,
    FixedSchema, LogicalType, LogicalTypeName, RecordSchema, SchemaParser,
    SchemaResolutionContext,
};
pub use source::{LocalSink, LocalSource};
pub use table::{Columns, MemoryTable, Row, RowSource, Table};
pub use value::AvroValue;
pub use writer::{encode_value, AvroWriter, WriterConfig};
