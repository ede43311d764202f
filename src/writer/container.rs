//! Object container file writer
//!
//! `AvroWriter` writes the header up front, buffers encoded records and
//! emits them as blocks on `flush_block`, when the buffer grows past the
//! configured threshold, or on `close`.

use std::borrow::Borrow;
use std::io::Write;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec::Codec;
use crate::error::WriterError;
use crate::reader::varint::write_zigzag;
use crate::schema::{AvroSchema, SchemaResolutionContext};
use crate::value::AvroValue;

use super::encode::encode_value;
use super::header::encode_header;

/// Configuration for the [`AvroWriter`].
#[derive(Debug, Clone, Default)]
pub struct WriterConfig {
    /// Codec for block payloads (default: null).
    pub codec: Codec,
    /// User metadata written after the reserved header entries.
    pub metadata: Vec<(String, Vec<u8>)>,
    /// Flush a block automatically once this many encoded bytes are pending.
    pub block_size_bytes: Option<usize>,
}

impl WriterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Add one user metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn with_block_size_bytes(mut self, bytes: usize) -> Self {
        self.block_size_bytes = Some(bytes);
        self
    }

    /// Reject reserved, empty or repeated metadata keys.
    fn validate(&self) -> Result<(), WriterError> {
        for (i, (key, _)) in self.metadata.iter().enumerate() {
            if key.is_empty() {
                return Err(WriterError::Configuration(
                    "Metadata keys must not be empty".to_string(),
                ));
            }
            if key.starts_with("avro.") {
                return Err(WriterError::Configuration(format!(
                    "Metadata key '{}' uses the reserved 'avro.' prefix",
                    key
                )));
            }
            if self.metadata[..i].iter().any(|(k, _)| k == key) {
                return Err(WriterError::Configuration(format!(
                    "Duplicate metadata key '{}'",
                    key
                )));
            }
        }
        if self.block_size_bytes == Some(0) {
            return Err(WriterError::Configuration(
                "block_size_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Writer for Avro object container files.
///
/// # Example
/// ```
/// use tarmac::schema::parse_schema;
/// use tarmac::value::AvroValue;
/// use tarmac::writer::{AvroWriter, WriterConfig};
///
/// let schema = parse_schema(r#""long""#)?;
/// let mut writer = AvroWriter::new(Vec::new(), schema, WriterConfig::new())?;
/// writer.append(&AvroValue::Long(1))?;
/// writer.append(&AvroValue::Long(2))?;
/// let bytes = writer.close()?;
/// assert_eq!(&bytes[..4], b"Obj\x01");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct AvroWriter<W: Write> {
    /// `None` once closed
    sink: Option<W>,
    schema: AvroSchema,
    names: SchemaResolutionContext,
    codec: Codec,
    sync_marker: [u8; 16],
    block_size_bytes: Option<usize>,
    buffer: Vec<u8>,
    pending_records: u64,
    blocks_written: usize,
    records_written: u64,
}

impl<W: Write> AvroWriter<W> {
    /// Validate the configuration and write the header to `sink`.
    ///
    /// Nothing is written when validation fails.
    pub fn new(mut sink: W, schema: AvroSchema, config: WriterConfig) -> Result<Self, WriterError> {
        config.codec.ensure_enabled()?;
        config.validate()?;
        let names = SchemaResolutionContext::build_checked(&schema)?;

        let sync_marker = *Uuid::new_v4().as_bytes();
        let header = encode_header(&schema, config.codec, &config.metadata, &sync_marker);
        sink.write_all(&header)?;
        debug!(
            codec = config.codec.name(),
            metadata_entries = config.metadata.len(),
            header_size = header.len(),
            "Wrote container header"
        );

        Ok(Self {
            sink: Some(sink),
            schema,
            names,
            codec: config.codec,
            sync_marker,
            block_size_bytes: config.block_size_bytes,
            buffer: Vec::new(),
            pending_records: 0,
            blocks_written: 0,
            records_written: 0,
        })
    }

    /// Encode one record into the pending block.
    ///
    /// A value that fails to encode leaves the pending block unchanged.
    pub fn append(&mut self, value: &AvroValue) -> Result<(), WriterError> {
        if self.sink.is_none() {
            return Err(WriterError::Closed);
        }

        let start = self.buffer.len();
        if let Err(e) = encode_value(value, &self.schema, &self.names, &mut self.buffer) {
            self.buffer.truncate(start);
            return Err(e.into());
        }
        self.pending_records += 1;

        if let Some(threshold) = self.block_size_bytes {
            if self.buffer.len() >= threshold {
                self.flush_block()?;
            }
        }
        Ok(())
    }

    /// Append every value, then flush them as one block.
    ///
    /// Values appended before a failing one stay pending.
    pub fn append_block<I>(&mut self, values: I) -> Result<(), WriterError>
    where
        I: IntoIterator,
        I::Item: Borrow<AvroValue>,
    {
        for value in values {
            self.append(value.borrow())?;
        }
        self.flush_block()
    }

    /// Write the pending records as one block. Does nothing if none are pending.
    pub fn flush_block(&mut self) -> Result<(), WriterError> {
        let sink = self.sink.as_mut().ok_or(WriterError::Closed)?;
        if self.pending_records == 0 {
            return Ok(());
        }

        let compressed;
        let payload: &[u8] = match self.codec {
            Codec::Null => &self.buffer,
            codec => {
                compressed = codec.compress(&self.buffer)?;
                &compressed
            }
        };

        let mut framing = Vec::with_capacity(20);
        write_zigzag(&mut framing, self.pending_records as i64);
        write_zigzag(&mut framing, payload.len() as i64);
        sink.write_all(&framing)?;
        sink.write_all(payload)?;
        sink.write_all(&self.sync_marker)?;

        debug!(
            block_index = self.blocks_written,
            record_count = self.pending_records,
            uncompressed_size = self.buffer.len(),
            compressed_size = payload.len(),
            codec = self.codec.name(),
            "Wrote block"
        );

        self.blocks_written += 1;
        self.records_written += self.pending_records;
        self.pending_records = 0;
        self.buffer.clear();
        Ok(())
    }

    /// Flush pending records and the sink, and return the sink.
    ///
    /// Every later call on this writer fails with `WriterError::Closed`.
    pub fn close(&mut self) -> Result<W, WriterError> {
        self.flush_block()?;
        let mut sink = self.sink.take().ok_or(WriterError::Closed)?;
        sink.flush()?;
        Ok(sink)
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    pub fn schema(&self) -> &AvroSchema {
        &self.schema
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// The 16-byte marker written after the header and every block.
    pub fn sync_marker(&self) -> &[u8; 16] {
        &self.sync_marker
    }

    /// Records appended but not yet written as a block.
    pub fn pending_records(&self) -> u64 {
        self.pending_records
    }

    pub fn blocks_written(&self) -> usize {
        self.blocks_written
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

impl<W: Write> Drop for AvroWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_none() {
            return;
        }
        if let Err(e) = self.flush_block() {
            warn!(error = %e, "Failed to flush pending records on drop");
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.flush() {
                warn!(error = %e, "Failed to flush sink on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, EncodeError};
    use crate::reader::header::AvroHeader;
    use crate::reader::{BlockReader, RecordReader};

    fn long_writer(config: WriterConfig) -> AvroWriter<Vec<u8>> {
        AvroWriter::new(Vec::new(), AvroSchema::Long, config).unwrap()
    }

    fn read_all(bytes: &[u8]) -> Vec<AvroValue> {
        RecordReader::new(bytes)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_header_only_when_no_records() {
        let mut writer = long_writer(WriterConfig::new());
        writer.flush_block().unwrap();
        let sync = *writer.sync_marker();
        let bytes = writer.close().unwrap();

        let header = AvroHeader::parse(&bytes).unwrap();
        assert_eq!(header.header_size, bytes.len() as u64);
        assert_eq!(header.sync_marker, sync);
        assert!(read_all(&bytes).is_empty());
    }

    #[test]
    fn test_append_and_flush_blocks() {
        let mut writer = long_writer(WriterConfig::new());
        writer.append_block([AvroValue::Long(1), AvroValue::Long(2)]).unwrap();
        writer.append(&AvroValue::Long(3)).unwrap();
        assert_eq!(writer.pending_records(), 1);
        let bytes = writer.close().unwrap();

        let mut blocks = BlockReader::new(&bytes[..]).unwrap();
        assert_eq!(blocks.next_block().unwrap().unwrap().record_count, 2);
        assert_eq!(blocks.next_block().unwrap().unwrap().record_count, 1);
        assert!(blocks.next_block().unwrap().is_none());

        assert_eq!(
            read_all(&bytes),
            vec![AvroValue::Long(1), AvroValue::Long(2), AvroValue::Long(3)]
        );
    }

    #[test]
    fn test_block_layout() {
        let mut writer = long_writer(WriterConfig::new());
        writer.append_block(&[AvroValue::Long(1)]).unwrap();
        let sync = *writer.sync_marker();
        let bytes = writer.close().unwrap();

        let tail = &bytes[bytes.len() - 19..];
        assert_eq!(&tail[..3], &[0x02, 0x02, 0x02]);
        assert_eq!(&tail[3..], &sync);
    }

    #[test]
    fn test_failed_append_leaves_block_unchanged() {
        let mut writer = long_writer(WriterConfig::new());
        writer.append(&AvroValue::Long(4)).unwrap();
        let err = writer.append(&AvroValue::from("nope")).unwrap_err();
        assert!(matches!(err, WriterError::Encode(EncodeError::TypeMismatch { .. })));
        assert_eq!(writer.pending_records(), 1);
        let bytes = writer.close().unwrap();
        assert_eq!(read_all(&bytes), vec![AvroValue::Long(4)]);
    }

    #[test]
    fn test_closed_writer_rejects_calls() {
        let mut writer = long_writer(WriterConfig::new());
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(matches!(writer.append(&AvroValue::Long(1)), Err(WriterError::Closed)));
        assert!(matches!(writer.flush_block(), Err(WriterError::Closed)));
        assert!(matches!(writer.close(), Err(WriterError::Closed)));
    }

    #[test]
    fn test_block_size_threshold_flushes() {
        let mut writer = long_writer(WriterConfig::new().with_block_size_bytes(2));
        for i in 0..5 {
            writer.append(&AvroValue::Long(i)).unwrap();
        }
        // Each long here is one byte, so every second append flushes
        assert_eq!(writer.blocks_written(), 2);
        assert_eq!(writer.pending_records(), 1);
        assert_eq!(writer.records_written(), 4);
        let bytes = writer.close().unwrap();
        assert_eq!(read_all(&bytes).len(), 5);
    }

    #[test]
    fn test_reserved_metadata_key_rejected() {
        let mut sink = Vec::new();
        let result = AvroWriter::new(
            &mut sink,
            AvroSchema::Long,
            WriterConfig::new().with_metadata("avro.custom", "x"),
        );
        assert!(matches!(result, Err(WriterError::Configuration(_))));
        drop(result);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_user_metadata_round_trip() {
        let mut writer = long_writer(WriterConfig::new().with_metadata("origin", "test"));
        let bytes = writer.close().unwrap();
        let header = AvroHeader::parse(&bytes).unwrap();
        assert_eq!(header.get_metadata_string("origin"), Some("test"));
    }

    #[test]
    fn test_unresolved_schema_rejected_before_writing() {
        let mut sink = Vec::new();
        let schema = AvroSchema::Array(Box::new(AvroSchema::Named("Missing".into())));
        let result = AvroWriter::new(&mut sink, schema, WriterConfig::new());
        assert!(matches!(result, Err(WriterError::Schema(_))));
        drop(result);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_drop_flushes_pending_records() {
        let mut sink = Vec::new();
        {
            let mut writer = AvroWriter::new(&mut sink, AvroSchema::Long, WriterConfig::new()).unwrap();
            writer.append(&AvroValue::Long(9)).unwrap();
        }
        assert_eq!(read_all(&sink), vec![AvroValue::Long(9)]);
    }

    #[test]
    fn test_codec_round_trips() {
        for codec in Codec::ALL.into_iter().filter(Codec::is_enabled) {
            let mut writer = long_writer(WriterConfig::new().with_codec(codec));
            writer
                .append_block((0..100).map(AvroValue::Long).collect::<Vec<_>>())
                .unwrap();
            let bytes = writer.close().unwrap();
            let header = AvroHeader::parse(&bytes).unwrap();
            assert_eq!(header.codec, codec);
            assert_eq!(read_all(&bytes).len(), 100, "codec {}", codec);
        }
    }

    #[test]
    fn test_disabled_codec_fails_before_writing() {
        if let Some(codec) = Codec::ALL.into_iter().find(|c| !c.is_enabled()) {
            let mut sink = Vec::new();
            let result = AvroWriter::new(&mut sink, AvroSchema::Long, WriterConfig::new().with_codec(codec));
            assert!(matches!(
                result,
                Err(WriterError::Codec(CodecError::UnsupportedCodec(_)))
            ));
            drop(result);
            assert!(sink.is_empty());
        }
    }
}
