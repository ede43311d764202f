//! Error types for the Avro codec and container layers

use std::io;
use thiserror::Error;

/// Errors that can occur while parsing or building schemas
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Structurally invalid schema
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// Unsupported schema type
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// Schema text is not valid JSON
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Reference to a named type that is never defined
    #[error("Unresolved named type: {0}")]
    UnresolvedName(String),
    /// Union with two branches of the same type identity
    #[error("Duplicate union branch: {0}")]
    DuplicateUnionBranch(String),
    /// Schema file could not be read
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that can occur during codec operations
#[derive(Debug, Error)]
pub enum CodecError {
    /// Codec name not supported by this build
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
    /// Compression error
    #[error("Compression error: {0}")]
    CompressionError(String),
    /// Decompression error
    #[error("Decompression error: {0}")]
    DecompressionError(String),
}

/// Errors that can occur while decoding binary Avro data
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Varint without terminator within 10 bytes, or out of range for its type
    #[error("Malformed varint: {0}")]
    MalformedVarint(String),
    /// Negative length prefix for bytes or string
    #[error("Negative length: {0}")]
    NegativeLength(i64),
    /// String payload is not valid UTF-8
    #[error("Invalid text: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
    /// Enum index outside the symbol list
    #[error("Enum index {index} out of range for {symbols} symbols")]
    EnumIndexOutOfRange { index: i64, symbols: usize },
    /// Union index outside the branch list
    #[error("Union index {index} out of range for {branches} branches")]
    UnionIndexOutOfRange { index: i64, branches: usize },
    /// Input ended in the middle of a value
    #[error("Unexpected end of data")]
    UnexpectedEof,
    /// Other invalid Avro data
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Named reference without a definition
    #[error("Unresolved named type: {0}")]
    UnresolvedName(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that can occur while encoding values
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Value does not fit the schema node
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    /// No union branch accepts the value
    #[error("No union branch matches value of type {0}")]
    UnionBranchNotFound(String),
    /// Enum symbol not declared in the schema
    #[error("Unknown enum symbol '{symbol}' for enum {name}")]
    UnknownEnumSymbol { name: String, symbol: String },
    /// Record value lacks a field that has no default
    #[error("Missing field '{field}' in record {record}")]
    MissingField { record: String, field: String },
    /// Fixed value has the wrong length
    #[error("Fixed size mismatch for {name}: expected {expected} bytes, found {actual}")]
    FixedSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    /// Logical value that cannot be lowered to its base type
    #[error("Invalid logical value: {0}")]
    InvalidLogical(String),
    /// Named reference without a definition
    #[error("Unresolved named type: {0}")]
    UnresolvedName(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that can occur with data sources
#[derive(Debug, Error)]
pub enum SourceError {
    /// File system error
    #[error("File system error: {0}")]
    FileSystemError(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Path not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Top-level reader error type
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Source error
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Malformed header or block framing at a specific offset
    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: u64, message: String },

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Decode error in block/record
    #[error("Decode error in block {block_index}, record {record_index}: {source}")]
    Decode {
        block_index: usize,
        record_index: usize,
        #[source]
        source: DecodeError,
    },

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid magic bytes
    #[error("Invalid magic bytes: expected 'Obj\\x01', found {0:?}")]
    InvalidMagic(Vec<u8>),

    /// Header metadata without `avro.schema`
    #[error("Missing avro.schema in file header")]
    MissingSchema,

    /// Sync marker after a block does not match the header's
    #[error("Sync marker mismatch at block {block_index}, offset {offset}")]
    SyncMismatch {
        block_index: usize,
        offset: u64,
        expected: [u8; 16],
        actual: [u8; 16],
    },

    /// Block shorter than declared, or payload not consumed by its records
    #[error("Truncated block {block_index} at offset {offset}: {message}")]
    TruncatedBlock {
        block_index: usize,
        offset: u64,
        message: String,
    },
}

impl From<io::Error> for ReaderError {
    fn from(err: io::Error) -> Self {
        ReaderError::Source(SourceError::Io(err))
    }
}

/// Top-level writer error type
#[derive(Debug, Error)]
pub enum WriterError {
    /// Writer used after `close`
    #[error("Writer is closed")]
    Closed,

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Record could not be encoded
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Sink error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<SourceError> for WriterError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Io(e) => WriterError::Io(e),
            other => WriterError::Configuration(other.to_string()),
        }
    }
}

/// Recoverable error that occurred during reading (for skip mode)
#[derive(Debug, Clone)]
pub struct ReadError {
    /// The kind of error that occurred
    pub kind: ReadErrorKind,
    /// Block index where error occurred
    pub block_index: usize,
    /// Record index within block (if applicable)
    pub record_index: Option<usize>,
    /// File offset where error occurred
    pub offset: u64,
    /// Human-readable error message
    pub message: String,
}

impl ReadError {
    /// Create a new ReadError
    pub fn new(
        kind: ReadErrorKind,
        block_index: usize,
        record_index: Option<usize>,
        offset: u64,
        message: String,
    ) -> Self {
        Self {
            kind,
            block_index,
            record_index,
            offset,
            message,
        }
    }

    /// Classify a reader error for the skip-mode error log
    pub(crate) fn from_reader_error(err: &ReaderError, block_index: usize, offset: u64) -> Self {
        let (kind, record_index) = match err {
            ReaderError::SyncMismatch { .. } => (ReadErrorKind::SyncMismatch, None),
            ReaderError::TruncatedBlock { .. } => (ReadErrorKind::TruncatedBlock, None),
            ReaderError::Codec(_) => (ReadErrorKind::DecompressionFailed, None),
            ReaderError::Decode { record_index, .. } => {
                (ReadErrorKind::RecordDecodeFailed, Some(*record_index))
            }
            _ => (ReadErrorKind::Framing, None),
        };
        Self::new(kind, block_index, record_index, offset, err.to_string())
    }
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.record_index {
            Some(record_idx) => write!(
                f,
                "{:?} at block {}, record {}, offset {}: {}",
                self.kind, self.block_index, record_idx, self.offset, self.message
            ),
            None => write!(
                f,
                "{:?} at block {}, offset {}: {}",
                self.kind, self.block_index, self.offset, self.message
            ),
        }
    }
}

/// Types of recoverable errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadErrorKind {
    /// Sync marker doesn't match expected value
    SyncMismatch,
    /// Block ended early or had trailing bytes
    TruncatedBlock,
    /// Block decompression failed
    DecompressionFailed,
    /// Record decoding failed
    RecordDecodeFailed,
    /// Block header (count or length) was unreadable
    Framing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_in_reader_error_keeps_position() {
        let err = ReaderError::Decode {
            block_index: 2,
            record_index: 7,
            source: DecodeError::NegativeLength(-3),
        };
        let msg = err.to_string();
        assert!(msg.contains("block 2"));
        assert!(msg.contains("record 7"));
        assert!(msg.contains("-3"));
    }

    #[test]
    fn test_read_error_classification() {
        let err = ReaderError::SyncMismatch {
            block_index: 1,
            offset: 40,
            expected: [0; 16],
            actual: [1; 16],
        };
        let read_err = ReadError::from_reader_error(&err, 1, 40);
        assert_eq!(read_err.kind, ReadErrorKind::SyncMismatch);
        assert_eq!(read_err.record_index, None);
        assert!(read_err.to_string().starts_with("SyncMismatch at block 1"));

        let err = ReaderError::Decode {
            block_index: 0,
            record_index: 3,
            source: DecodeError::UnexpectedEof,
        };
        let read_err = ReadError::from_reader_error(&err, 0, 12);
        assert_eq!(read_err.kind, ReadErrorKind::RecordDecodeFailed);
        assert_eq!(read_err.record_index, Some(3));
    }

    #[test]
    fn test_invalid_magic_message() {
        let err = ReaderError::InvalidMagic(b"PAR1".to_vec());
        assert!(err.to_string().contains("Invalid magic"));
    }
}
