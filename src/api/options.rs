//! Options for writing tables.
//!
//! `WriteOptions` is the configuration surface of the table writers: an
//! optional explicit schema and the block codec, plus header metadata and
//! an optional block size threshold.

use crate::codec::Codec;
use crate::error::CodecError;
use crate::schema::AvroSchema;
use crate::writer::WriterConfig;

/// Options for [`write_table`](super::write_table) and friends.
///
/// # Example
/// ```
/// use tarmac::api::WriteOptions;
/// use tarmac::codec::Codec;
///
/// let opts = WriteOptions::new().with_compress_name("deflate")?;
/// assert_eq!(opts.compress, Codec::Deflate);
/// assert!(WriteOptions::new().with_compress_name("snappy").is_err());
/// # Ok::<(), tarmac::error::CodecError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteOptions {
    /// Schema to write with (default: taken from the source, else inferred).
    pub schema: Option<AvroSchema>,

    /// Block codec (default: null).
    pub compress: Codec,

    /// User metadata for the file header.
    pub metadata: Vec<(String, Vec<u8>)>,

    /// Flush a block whenever this many encoded bytes are pending.
    ///
    /// Without it a block is written per source partition, or one block
    /// holds every row.
    pub block_size_bytes: Option<usize>,
}

impl WriteOptions {
    /// Create a new `WriteOptions` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write with an explicit schema.
    pub fn with_schema(mut self, schema: AvroSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_compress(mut self, codec: Codec) -> Self {
        self.compress = codec;
        self
    }

    /// Select the codec by name.
    ///
    /// Unknown and disabled codecs fail here rather than at write time.
    pub fn with_compress_name(mut self, name: &str) -> Result<Self, CodecError> {
        let codec = Codec::from_name(name)?;
        codec.ensure_enabled()?;
        self.compress = codec;
        Ok(self)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn with_block_size_bytes(mut self, bytes: usize) -> Self {
        self.block_size_bytes = Some(bytes);
        self
    }

    /// The container writer configuration these options describe.
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            codec: self.compress,
            metadata: self.metadata.clone(),
            block_size_bytes: self.block_size_bytes,
        }
    }
}
