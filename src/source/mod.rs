//! Data sources and sinks for the path-based entry points
//!
//! Readers and writers are generic over `Read`/`Write`; this module only
//! adds file handles with source-specific error reporting.

mod local;

pub use local::{LocalSink, LocalSource};
