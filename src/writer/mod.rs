//! Avro file writer components
//!
//! Binary encoding of values, header serialization and the container
//! writer that frames encoded records into blocks.

mod container;
pub mod encode;
mod header;

pub use container::{AvroWriter, WriterConfig};
pub use encode::{encode_value, json_to_value, select_branch, to_avro_bytes};
pub use header::encode_header;
