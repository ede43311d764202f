//! Avro schema types and parsing.
//!
//! This module defines the Avro schema type system including primitives,
//! complex types, logical types, JSON parsing, named type resolution and
//! schema inference from values.

mod infer;
mod parser;
mod resolution;
mod types;

pub use infer::{infer_schema, ROW_RECORD_NAME};
pub use parser::{parse_schema, parse_schema_file, parse_schema_with_options, SchemaParser};
pub use resolution::SchemaResolutionContext;
pub use types::*;
