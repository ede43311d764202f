//! Avro block parsing and reading
//!
//! Parses Avro data blocks which contain:
//! - Record count (varint)
//! - Compressed data size (varint)
//! - Compressed data bytes
//! - 16-byte sync marker
//!
//! `BlockReader` reads the header once and then yields one block per call,
//! checking each trailing sync marker against the header's. After a failure
//! `skip_to_next_sync` scans forward for the next marker so reading can
//! resume at the following block.

use std::collections::VecDeque;
use std::io::Read;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::{DecodeError, ReaderError};
use crate::schema::{AvroSchema, SchemaResolutionContext};

use super::buffer::SourceBuffer;
use super::header::{AvroHeader, SYNC_MARKER_SIZE};

/// A single data block from an Avro file.
///
/// Each block contains a batch of records that have been serialized
/// and optionally compressed together.
#[derive(Debug, Clone)]
pub struct AvroBlock {
    /// Number of records in this block
    pub record_count: u64,
    /// The compressed block data
    pub data: Bytes,
    /// Position of this block in the file (for error reporting)
    pub file_offset: u64,
    /// Sequential block number (0-indexed)
    pub block_index: usize,
}

/// A decompressed block ready for record decoding.
#[derive(Debug, Clone)]
pub struct DecompressedBlock {
    pub record_count: u64,
    /// The serialized records
    pub data: Bytes,
    pub file_offset: u64,
    pub block_index: usize,
}

impl AvroBlock {
    /// Check if this block is empty (contains no records).
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Decompress the payload with `codec`.
    pub fn decompress(self, codec: Codec) -> Result<DecompressedBlock, ReaderError> {
        let data = match codec {
            Codec::Null => self.data,
            _ => Bytes::from(codec.decompress(&self.data)?),
        };
        Ok(DecompressedBlock {
            record_count: self.record_count,
            data,
            file_offset: self.file_offset,
            block_index: self.block_index,
        })
    }
}

/// The raw bytes consumed by the last block read, kept for resync.
struct LastBlock {
    raw: Vec<u8>,
    failed: bool,
}

/// Reads and parses Avro blocks from any `Read` handle.
///
/// # Example
/// ```no_run
/// use tarmac::reader::BlockReader;
/// use tarmac::source::LocalSource;
///
/// let source = LocalSource::open("data.avro")?;
/// let mut reader = BlockReader::new(source)?;
///
/// while let Some(block) = reader.next_block()? {
///     println!("Block {} has {} records", block.block_index, block.record_count);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct BlockReader<R> {
    src: SourceBuffer<R>,
    header: AvroHeader,
    /// Index of the next block to read
    block_index: usize,
    last_block: Option<LastBlock>,
}

impl<R: Read> BlockReader<R> {
    /// Read the file header and position the reader at the first block.
    ///
    /// # Errors
    /// - `ReaderError::Source` if reading fails
    /// - `ReaderError::InvalidMagic` if magic bytes don't match
    /// - `ReaderError::MissingSchema` / `ReaderError::Schema` for schema problems
    /// - `ReaderError::Codec` if codec is unknown
    pub fn new(reader: R) -> Result<Self, ReaderError> {
        let mut src = SourceBuffer::new(reader);
        let header = AvroHeader::read_from(&mut src)?;
        Ok(Self {
            src,
            header,
            block_index: 0,
            last_block: None,
        })
    }

    /// Read the next block.
    ///
    /// Returns `None` when input ends exactly at a block boundary.
    ///
    /// # Errors
    /// - `ReaderError::TruncatedBlock` if input ends inside the block
    /// - `ReaderError::SyncMismatch` if the trailing marker differs from the header's
    /// - `ReaderError::Parse` if the count or size is malformed
    pub fn next_block(&mut self) -> Result<Option<AvroBlock>, ReaderError> {
        let file_offset = self.src.offset();
        self.src.begin_capture();
        let result = self.read_block(file_offset);
        let raw = self.src.end_capture();

        match &result {
            Ok(Some(block)) => {
                debug!(
                    block_index = block.block_index,
                    record_count = block.record_count,
                    compressed_size = block.data.len(),
                    codec = self.header.codec.name(),
                    "Read block"
                );
                self.block_index += 1;
                self.last_block = Some(LastBlock { raw, failed: false });
            }
            Ok(None) => self.last_block = None,
            Err(_) => self.last_block = Some(LastBlock { raw, failed: true }),
        }
        result
    }

    fn read_block(&mut self, file_offset: u64) -> Result<Option<AvroBlock>, ReaderError> {
        let block_index = self.block_index;

        let record_count = match self.read_long("record count")? {
            Some(count) => count,
            None => return Ok(None),
        };
        if record_count < 0 {
            return Err(ReaderError::Parse {
                offset: file_offset,
                message: format!("Invalid negative record count: {}", record_count),
            });
        }

        let size_offset = self.src.offset();
        let compressed_size = self
            .read_long("compressed size")?
            .ok_or_else(|| self.truncated("missing compressed size"))?;
        if compressed_size < 0 {
            return Err(ReaderError::Parse {
                offset: size_offset,
                message: format!("Invalid negative compressed size: {}", compressed_size),
            });
        }

        let data = self.src.read_bytes(compressed_size as usize)?;
        if (data.len() as u64) < compressed_size as u64 {
            return Err(self.truncated(&format!(
                "expected {} payload bytes, found {}",
                compressed_size,
                data.len()
            )));
        }

        let sync_offset = self.src.offset();
        let sync = self.src.read_bytes(SYNC_MARKER_SIZE)?;
        let actual = <[u8; 16]>::try_from(sync.as_slice()).map_err(|_| {
            self.truncated(&format!("sync marker cut short at {} bytes", sync.len()))
        })?;
        if actual != self.header.sync_marker {
            return Err(ReaderError::SyncMismatch {
                block_index,
                offset: sync_offset,
                expected: self.header.sync_marker,
                actual,
            });
        }

        Ok(Some(AvroBlock {
            record_count: record_count as u64,
            data: Bytes::from(data),
            file_offset,
            block_index,
        }))
    }

    /// Read a block-level varint, mapping a cut-off varint to `TruncatedBlock`.
    fn read_long(&mut self, what: &str) -> Result<Option<i64>, ReaderError> {
        let offset = self.src.offset();
        self.src.read_long().map_err(|e| match e {
            DecodeError::UnexpectedEof => self.truncated(&format!("{} cut short", what)),
            DecodeError::Io(io) => ReaderError::from(io),
            other => ReaderError::Parse {
                offset,
                message: format!("Failed to decode block {}: {}", what, other),
            },
        })
    }

    fn truncated(&self, message: &str) -> ReaderError {
        ReaderError::TruncatedBlock {
            block_index: self.block_index,
            offset: self.src.offset(),
            message: message.to_string(),
        }
    }

    /// Scan forward for the next sync marker and position the reader after it.
    ///
    /// Scanning starts one byte past the start of the last block read, so
    /// after a block whose records failed to decode the reader lands on the
    /// following block. Returns whether a marker was found and the number of
    /// bytes skipped before it.
    pub fn skip_to_next_sync(&mut self) -> Result<(bool, u64), ReaderError> {
        let mut skipped = 0u64;
        if let Some(last) = self.last_block.take() {
            if last.failed {
                self.block_index += 1;
            }
            if !last.raw.is_empty() {
                self.src.unread(&last.raw[1..]);
                skipped = 1;
            }
        }

        let sync = self.header.sync_marker;
        let mut window: VecDeque<u8> = VecDeque::with_capacity(SYNC_MARKER_SIZE);
        while let Some(byte) = self.src.read_byte()? {
            if window.len() == SYNC_MARKER_SIZE {
                window.pop_front();
                skipped += 1;
            }
            window.push_back(byte);
            if window.len() == SYNC_MARKER_SIZE && window.iter().eq(sync.iter()) {
                warn!(
                    skipped_bytes = skipped,
                    offset = self.src.offset(),
                    "Resynchronized on sync marker"
                );
                return Ok((true, skipped));
            }
        }

        skipped += window.len() as u64;
        warn!(skipped_bytes = skipped, "No further sync marker before end of input");
        Ok((false, skipped))
    }

    /// Get a reference to the parsed header.
    pub fn header(&self) -> &AvroHeader {
        &self.header
    }

    pub fn schema(&self) -> &AvroSchema {
        &self.header.schema
    }

    /// Named types of the file schema.
    pub fn names(&self) -> &SchemaResolutionContext {
        &self.header.names
    }

    /// Get the codec used for block compression.
    pub fn codec(&self) -> Codec {
        self.header.codec
    }

    /// Index of the next block to be read.
    pub fn block_index(&self) -> usize {
        self.block_index
    }

    /// Number of bytes consumed from the input.
    pub fn offset(&self) -> u64 {
        self.src.offset()
    }

    /// Consume the reader and return the underlying handle.
    pub fn into_inner(self) -> R {
        self.src.into_inner()
    }
}
