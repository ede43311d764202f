//! Avro file header parsing
//!
//! Parses the Avro Object Container File header which contains:
//! - Magic bytes ("Obj\x01")
//! - Metadata map (including schema and codec)
//! - 16-byte sync marker

use std::collections::HashMap;
use std::io::Read;

use tracing::debug;

use crate::codec::Codec;
use crate::error::{DecodeError, ReaderError};
use crate::schema::{parse_schema, AvroSchema, SchemaResolutionContext};

use super::buffer::SourceBuffer;

/// The Avro magic bytes that identify an Object Container File.
pub const AVRO_MAGIC: [u8; 4] = [b'O', b'b', b'j', 0x01];

/// Size of the sync marker in bytes.
pub const SYNC_MARKER_SIZE: usize = 16;

/// Metadata key holding the writer schema JSON.
pub const SCHEMA_KEY: &str = "avro.schema";

/// Metadata key holding the codec name.
pub const CODEC_KEY: &str = "avro.codec";

/// Parsed Avro file header containing schema and metadata.
#[derive(Debug, Clone)]
pub struct AvroHeader {
    /// Metadata key-value pairs from the header
    pub metadata: HashMap<String, Vec<u8>>,
    /// 16-byte sync marker used to identify block boundaries
    pub sync_marker: [u8; 16],
    /// Parsed Avro schema from metadata
    pub schema: AvroSchema,
    /// Named types defined by `schema`
    pub names: SchemaResolutionContext,
    /// Compression codec from metadata
    pub codec: Codec,
    /// Total size of the header in bytes (offset where blocks begin)
    pub header_size: u64,
}

impl AvroHeader {
    /// Parse an Avro header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ReaderError> {
        Self::read_from(&mut SourceBuffer::new(bytes))
    }

    /// Read the header from the current position of `src`.
    ///
    /// # Errors
    /// - `ReaderError::InvalidMagic` if magic bytes don't match
    /// - `ReaderError::Parse` if metadata or sync marker cannot be read
    /// - `ReaderError::MissingSchema` if `avro.schema` is absent
    /// - `ReaderError::Schema` if the schema JSON is invalid
    /// - `ReaderError::Codec` if the codec is unknown
    pub fn read_from<R: Read>(src: &mut SourceBuffer<R>) -> Result<Self, ReaderError> {
        let magic = src.read_bytes(AVRO_MAGIC.len())?;
        if magic != AVRO_MAGIC {
            return Err(ReaderError::InvalidMagic(magic));
        }

        let metadata = Self::read_metadata(src)?;
        let sync_marker = Self::read_sync_marker(src)?;

        let schema = Self::extract_schema(&metadata)?;
        let names = SchemaResolutionContext::build_checked(&schema)?;
        let codec = Self::extract_codec(&metadata)?;

        let header = Self {
            metadata,
            sync_marker,
            schema,
            names,
            codec,
            header_size: src.offset(),
        };
        debug!(
            codec = header.codec.name(),
            metadata_entries = header.metadata.len(),
            header_size = header.header_size,
            "Parsed container header"
        );
        Ok(header)
    }

    /// Read the metadata map (string keys, bytes values).
    fn read_metadata<R: Read>(
        src: &mut SourceBuffer<R>,
    ) -> Result<HashMap<String, Vec<u8>>, ReaderError> {
        let mut metadata = HashMap::new();

        loop {
            let count = Self::read_long(src, "metadata block count")?;
            if count == 0 {
                break;
            }
            // A negative count is followed by the block size in bytes
            if count < 0 {
                Self::read_long(src, "metadata block size")?;
            }

            for _ in 0..count.unsigned_abs() {
                let key = Self::read_bytes(src, "metadata key")?;
                let key = String::from_utf8(key).map_err(|e| ReaderError::Parse {
                    offset: src.offset(),
                    message: format!("Metadata key is not valid UTF-8: {}", e),
                })?;
                let value = Self::read_bytes(src, "metadata value")?;
                metadata.insert(key, value);
            }
        }

        Ok(metadata)
    }

    fn read_sync_marker<R: Read>(src: &mut SourceBuffer<R>) -> Result<[u8; 16], ReaderError> {
        let bytes = src.read_bytes(SYNC_MARKER_SIZE)?;
        <[u8; 16]>::try_from(bytes.as_slice()).map_err(|_| ReaderError::Parse {
            offset: src.offset(),
            message: format!(
                "Not enough bytes for sync marker: expected 16, got {}",
                bytes.len()
            ),
        })
    }

    fn read_long<R: Read>(src: &mut SourceBuffer<R>, what: &str) -> Result<i64, ReaderError> {
        let offset = src.offset();
        match src.read_long() {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(DecodeError::UnexpectedEof),
            Err(e) => Err(e),
        }
        .map_err(|e| ReaderError::Parse {
            offset,
            message: format!("Failed to decode {}: {}", what, e),
        })
    }

    fn read_bytes<R: Read>(src: &mut SourceBuffer<R>, what: &str) -> Result<Vec<u8>, ReaderError> {
        let len = Self::read_long(src, what)?;
        if len < 0 {
            return Err(ReaderError::Parse {
                offset: src.offset(),
                message: format!("Negative length for {}: {}", what, len),
            });
        }
        let offset = src.offset();
        let bytes = src.read_bytes(len as usize)?;
        if bytes.len() as i64 != len {
            return Err(ReaderError::Parse {
                offset,
                message: format!("Unexpected end of input in {}", what),
            });
        }
        Ok(bytes)
    }

    /// Extract and parse the schema from metadata.
    fn extract_schema(metadata: &HashMap<String, Vec<u8>>) -> Result<AvroSchema, ReaderError> {
        let schema_bytes = metadata.get(SCHEMA_KEY).ok_or(ReaderError::MissingSchema)?;

        let schema_json = std::str::from_utf8(schema_bytes).map_err(|e| ReaderError::Parse {
            offset: 0,
            message: format!("Schema is not valid UTF-8: {}", e),
        })?;

        Ok(parse_schema(schema_json)?)
    }

    /// Extract the codec from metadata (absent means null).
    fn extract_codec(metadata: &HashMap<String, Vec<u8>>) -> Result<Codec, ReaderError> {
        match metadata.get(CODEC_KEY) {
            Some(codec_bytes) => {
                let codec_name =
                    std::str::from_utf8(codec_bytes).map_err(|e| ReaderError::Parse {
                        offset: 0,
                        message: format!("Codec name is not valid UTF-8: {}", e),
                    })?;
                let codec = Codec::from_name(codec_name)?;
                codec.ensure_enabled()?;
                Ok(codec)
            }
            None => Ok(Codec::Null),
        }
    }

    /// Get the schema as a JSON string.
    pub fn schema_json(&self) -> String {
        self.schema.to_json()
    }

    /// Get a metadata value by key.
    pub fn get_metadata(&self, key: &str) -> Option<&[u8]> {
        self.metadata.get(key).map(|v| v.as_slice())
    }

    /// Get a metadata value as a string.
    pub fn get_metadata_string(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| std::str::from_utf8(v).ok())
    }

    /// User metadata, without the reserved `avro.` entries.
    pub fn user_metadata(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.metadata
            .iter()
            .filter(|(k, _)| !k.starts_with("avro."))
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::reader::varint::encode_zigzag;

    fn header_bytes(entries: &[(&str, &[u8])], sync: [u8; 16]) -> Vec<u8> {
        let mut out = AVRO_MAGIC.to_vec();
        if !entries.is_empty() {
            out.extend(encode_zigzag(entries.len() as i64));
            for (k, v) in entries {
                out.extend(encode_zigzag(k.len() as i64));
                out.extend_from_slice(k.as_bytes());
                out.extend(encode_zigzag(v.len() as i64));
                out.extend_from_slice(v);
            }
        }
        out.push(0);
        out.extend_from_slice(&sync);
        out
    }

    #[test]
    fn test_parse_minimal_header() {
        let bytes = header_bytes(&[("avro.schema", b"\"long\"")], [7; 16]);
        let header = AvroHeader::parse(&bytes).unwrap();
        assert_eq!(header.schema, AvroSchema::Long);
        assert_eq!(header.codec, Codec::Null);
        assert_eq!(header.sync_marker, [7; 16]);
        assert_eq!(header.header_size, bytes.len() as u64);
        assert_eq!(header.get_metadata_string("avro.schema"), Some("\"long\""));
        assert_eq!(header.user_metadata().count(), 0);
    }

    #[test]
    fn test_parse_negative_block_count() {
        let mut bytes = AVRO_MAGIC.to_vec();
        let mut entry = Vec::new();
        entry.extend(encode_zigzag(11));
        entry.extend_from_slice(b"avro.schema");
        entry.extend(encode_zigzag(6));
        entry.extend_from_slice(b"\"null\"");
        bytes.extend(encode_zigzag(-1));
        bytes.extend(encode_zigzag(entry.len() as i64));
        bytes.extend(entry);
        bytes.push(0);
        bytes.extend_from_slice(&[1; 16]);

        let header = AvroHeader::parse(&bytes).unwrap();
        assert_eq!(header.schema, AvroSchema::Null);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = header_bytes(&[("avro.schema", b"\"int\"")], [0; 16]);
        bytes[3] = 0x02;
        assert!(matches!(
            AvroHeader::parse(&bytes),
            Err(ReaderError::InvalidMagic(m)) if m == b"Obj\x02"
        ));
    }

    #[test]
    fn test_missing_schema() {
        let bytes = header_bytes(&[("user.key", b"v")], [0; 16]);
        assert!(matches!(
            AvroHeader::parse(&bytes),
            Err(ReaderError::MissingSchema)
        ));
    }

    #[test]
    fn test_bad_schema_json() {
        let bytes = header_bytes(&[("avro.schema", b"{not json")], [0; 16]);
        assert!(matches!(
            AvroHeader::parse(&bytes),
            Err(ReaderError::Schema(_))
        ));
    }

    #[test]
    fn test_unknown_codec() {
        let bytes = header_bytes(
            &[("avro.schema", b"\"int\""), ("avro.codec", b"snappy")],
            [0; 16],
        );
        assert!(matches!(
            AvroHeader::parse(&bytes),
            Err(ReaderError::Codec(CodecError::UnsupportedCodec(_)))
        ));
    }

    #[test]
    fn test_truncated_sync_marker() {
        let mut bytes = header_bytes(&[("avro.schema", b"\"int\"")], [0; 16]);
        bytes.truncate(bytes.len() - 5);
        assert!(matches!(
            AvroHeader::parse(&bytes),
            Err(ReaderError::Parse { .. })
        ));
    }

    #[test]
    fn test_user_metadata_preserved() {
        let bytes = header_bytes(
            &[("avro.schema", b"\"int\""), ("origin", b"\x00\xff")],
            [0; 16],
        );
        let header = AvroHeader::parse(&bytes).unwrap();
        let user: Vec<_> = header.user_metadata().collect();
        assert_eq!(user, vec![("origin", &b"\x00\xff"[..])]);
    }
}
