//! Avro file reader components
//!
//! This module provides the core reading functionality for Avro files,
//! including header parsing, block reading, record streaming, and binary
//! decoding.

mod block;
pub mod buffer;
pub mod decode;
pub mod header;
pub mod stream;
pub mod varint;

pub use block::{AvroBlock, BlockReader, DecompressedBlock};
pub use buffer::SourceBuffer;
pub use decode::{
    // Primitive type decoders
    decode_boolean,
    decode_bytes,
    decode_bytes_ref,
    decode_double,
    decode_enum,
    decode_fixed,
    decode_float,
    decode_int,
    decode_long,
    decode_string,
    decode_union_index,
    // Schema-directed decoding
    decode_value,
    skip_value,
};
pub use header::{AvroHeader, AVRO_MAGIC};
pub use stream::{ErrorMode, ReaderConfig, RecordReader};
// Re-export varint encoding functions for convenience
pub use varint::{encode_varint, encode_zigzag};
