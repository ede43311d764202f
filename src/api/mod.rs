//! Public entry points.
//!
//! Single values are encoded with [`to_bytes`]/[`write_value`] and decoded
//! with [`from_bytes`]/[`read_value`]; these carry no framing and the
//! caller supplies the schema. Whole tables go through container files:
//! [`write_table`] and [`read_table`] and their path and buffer variants.
//!
//! # Example
//! ```
//! use tarmac::api::{read_table, to_buffer, WriteOptions};
//! use tarmac::table::MemoryTable;
//! use tarmac::value::AvroValue;
//!
//! let mut table = MemoryTable::new(["id", "name"]);
//! table.push_row(vec![AvroValue::Long(1), AvroValue::from("ann")])?;
//! table.push_row(vec![AvroValue::Long(2), AvroValue::Null])?;
//!
//! let bytes = to_buffer(&table, &WriteOptions::new())?;
//! let rows = read_table(&bytes[..])?.collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(rows[1].get_by_name("id"), Some(&AvroValue::Long(2)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod options;
pub mod read;
pub mod write;

pub use options::WriteOptions;
pub use read::{from_bytes, read_table, read_table_file, read_table_with_config, read_value, read_value_file};
pub use write::{to_buffer, to_bytes, write_table, write_table_file, write_value};

pub use crate::schema::{parse_schema, parse_schema_file};
