//! Pull-based record reader over an object container file
//!
//! `RecordReader` pulls one block at a time from a [`BlockReader`],
//! decompresses it, decodes every record in it and hands them out one by
//! one. Only the current block is held in memory.

use std::collections::VecDeque;
use std::io::Read;

use tracing::warn;

use crate::error::{DecodeError, ReadError, ReaderError};
use crate::schema::{AvroSchema, SchemaResolutionContext};
use crate::value::AvroValue;

use super::block::{BlockReader, DecompressedBlock};
use super::decode::{check_count, decode_value, min_encoded_size, reserve_hint};
use super::header::AvroHeader;

/// How the reader reacts to a corrupt block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Surface the first error and stop.
    #[default]
    Strict,
    /// Drop the bad block, remember the error and resume at the next sync marker.
    Skip,
}

/// Configuration for the [`RecordReader`].
#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    /// Error handling mode (strict or skip).
    pub error_mode: ErrorMode,
}

impl ReaderConfig {
    /// Create a new ReaderConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable strict error mode (fail on first error).
    pub fn strict(mut self) -> Self {
        self.error_mode = ErrorMode::Strict;
        self
    }

    /// Enable skip error mode (continue on errors).
    pub fn skip_errors(mut self) -> Self {
        self.error_mode = ErrorMode::Skip;
        self
    }
}

/// A block that failed part way: the records decoded before the failure
/// and the failure itself.
struct BlockFailure {
    records: Vec<AvroValue>,
    error: ReaderError,
    block_index: usize,
    offset: u64,
}

impl BlockFailure {
    fn framing(error: ReaderError, block_index: usize, offset: u64) -> Self {
        Self {
            records: Vec::new(),
            error,
            block_index,
            offset,
        }
    }
}

/// Iterator over the records of a container file.
///
/// In skip mode errors never reach the iterator; they are collected and
/// available through [`RecordReader::errors`].
///
/// # Example
/// ```no_run
/// use tarmac::reader::{ReaderConfig, RecordReader};
/// use tarmac::source::LocalSource;
///
/// let source = LocalSource::open("data.avro")?;
/// let mut reader = RecordReader::with_config(source, ReaderConfig::new().skip_errors())?;
///
/// for record in reader.by_ref() {
///     println!("{:?}", record?);
/// }
/// for error in reader.errors() {
///     eprintln!("Skipped: {}", error);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RecordReader<R> {
    blocks: BlockReader<R>,
    config: ReaderConfig,
    pending: VecDeque<Result<AvroValue, ReaderError>>,
    errors: Vec<ReadError>,
    finished: bool,
}

impl<R: Read> RecordReader<R> {
    /// Open a reader in strict mode.
    pub fn new(reader: R) -> Result<Self, ReaderError> {
        Self::with_config(reader, ReaderConfig::default())
    }

    pub fn with_config(reader: R, config: ReaderConfig) -> Result<Self, ReaderError> {
        Ok(Self::from_blocks(BlockReader::new(reader)?, config))
    }

    /// Read records from an already opened block reader.
    pub fn from_blocks(blocks: BlockReader<R>, config: ReaderConfig) -> Self {
        Self {
            blocks,
            config,
            pending: VecDeque::new(),
            errors: Vec::new(),
            finished: false,
        }
    }

    /// The writer schema from the file header.
    pub fn schema(&self) -> &AvroSchema {
        self.blocks.schema()
    }

    pub fn header(&self) -> &AvroHeader {
        self.blocks.header()
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.config.error_mode
    }

    /// Errors skipped so far (skip mode only).
    pub fn errors(&self) -> &[ReadError] {
        &self.errors
    }

    /// Consume the reader and return the skipped errors.
    pub fn into_errors(self) -> Vec<ReadError> {
        self.errors
    }

    /// Load the next block into `pending`. Returns `false` at end of input.
    fn load_block(&mut self) -> Result<bool, BlockFailure> {
        let block_index = self.blocks.block_index();
        let offset = self.blocks.offset();

        let block = match self.blocks.next_block() {
            Ok(Some(block)) => block,
            Ok(None) => return Ok(false),
            Err(e) => return Err(BlockFailure::framing(e, block_index, offset)),
        };
        let block = block
            .decompress(self.blocks.codec())
            .map_err(|e| BlockFailure::framing(e, block_index, offset))?;

        let records = decode_block(&block, self.blocks.schema(), self.blocks.names())?;
        self.pending.extend(records.into_iter().map(Ok));
        Ok(true)
    }

    fn handle_failure(&mut self, failure: BlockFailure) {
        match self.config.error_mode {
            ErrorMode::Strict => {
                self.pending.extend(failure.records.into_iter().map(Ok));
                self.pending.push_back(Err(failure.error));
            }
            ErrorMode::Skip => {
                let error =
                    ReadError::from_reader_error(&failure.error, failure.block_index, failure.offset);
                warn!(
                    block_index = failure.block_index,
                    offset = failure.offset,
                    dropped_records = failure.records.len(),
                    error = %error,
                    "Skipping corrupt block"
                );
                self.errors.push(error);

                match self.blocks.skip_to_next_sync() {
                    Ok((true, _)) => {}
                    Ok((false, _)) => self.finished = true,
                    Err(e) => {
                        self.errors
                            .push(ReadError::from_reader_error(&e, failure.block_index, failure.offset));
                        self.finished = true;
                    }
                }
            }
        }
    }
}

/// Decode exactly `record_count` records from a decompressed block.
fn decode_block(
    block: &DecompressedBlock,
    schema: &AvroSchema,
    names: &SchemaResolutionContext,
) -> Result<Vec<AvroValue>, BlockFailure> {
    let mut cursor = &block.data[..];
    let fail = |records, error| BlockFailure {
        records,
        error,
        block_index: block.block_index,
        offset: block.file_offset,
    };
    let truncated = |message: String| ReaderError::TruncatedBlock {
        block_index: block.block_index,
        offset: block.file_offset,
        message,
    };

    let count = usize::try_from(block.record_count).unwrap_or(usize::MAX);
    let min_size = min_encoded_size(schema, names);
    if check_count(cursor, count, min_size).is_err() {
        return Err(fail(
            Vec::new(),
            truncated(format!(
                "{} records cannot fit in {} payload bytes",
                count,
                cursor.len()
            )),
        ));
    }

    let mut records = Vec::with_capacity(reserve_hint(count, min_size));
    for record_index in 0..count {
        match decode_value(&mut cursor, schema, names) {
            Ok(value) => records.push(value),
            Err(DecodeError::UnexpectedEof) => {
                let message = format!(
                    "payload ended after {} of {} records",
                    record_index, count
                );
                return Err(fail(records, truncated(message)));
            }
            Err(source) => {
                let error = ReaderError::Decode {
                    block_index: block.block_index,
                    record_index,
                    source,
                };
                return Err(fail(records, error));
            }
        }
    }

    if !cursor.is_empty() {
        let message = format!(
            "{} bytes left after the last of {} records",
            cursor.len(),
            count
        );
        return Err(fail(records, truncated(message)));
    }
    Ok(records)
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<AvroValue, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_err() {
                    self.pending.clear();
                    self.finished = true;
                }
                return Some(item);
            }
            if self.finished {
                return None;
            }
            match self.load_block() {
                Ok(true) => {}
                Ok(false) => self.finished = true,
                Err(failure) => self.handle_failure(failure),
            }
        }
    }
}
