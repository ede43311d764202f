//! Buffered byte source with position tracking and replay.
//!
//! The block reader pulls bytes one varint or payload at a time, so the
//! underlying handle is wrapped in a `BufReader`. Two extras support
//! recovery after a corrupt block:
//! - capture: a copy of every byte consumed since `begin_capture`
//! - replay: bytes handed back with `unread` are served again before new input

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};

use crate::error::DecodeError;
use crate::reader::varint::{decode_varint_with, zigzag_to_i64};

/// Default size of the internal read buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// A forward-only byte source over any `Read` handle.
pub struct SourceBuffer<R> {
    reader: BufReader<R>,
    replay: VecDeque<u8>,
    offset: u64,
    capture: Option<Vec<u8>>,
}

impl<R: Read> SourceBuffer<R> {
    /// Wrap `reader` with the default buffer size.
    pub fn new(reader: R) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, reader)
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            replay: VecDeque::new(),
            offset: 0,
            capture: None,
        }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read one byte, or `None` at end of input.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = match self.replay.pop_front() {
            Some(b) => Some(b),
            None => {
                let buf = self.reader.fill_buf()?;
                match buf.first().copied() {
                    Some(b) => {
                        self.reader.consume(1);
                        Some(b)
                    }
                    None => None,
                }
            }
        };
        if let Some(b) = byte {
            self.offset += 1;
            if let Some(capture) = self.capture.as_mut() {
                capture.push(b);
            }
        }
        Ok(byte)
    }

    /// Read up to `len` bytes. A shorter result means end of input.
    ///
    /// Never allocates more than the input actually holds, so a corrupt
    /// length prefix cannot trigger a huge allocation.
    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let from_replay = len.min(self.replay.len());
        let mut out: Vec<u8> = self.replay.drain(..from_replay).collect();
        if out.len() < len {
            (&mut self.reader)
                .take((len - out.len()) as u64)
                .read_to_end(&mut out)?;
        }
        self.offset += out.len() as u64;
        if let Some(capture) = self.capture.as_mut() {
            capture.extend_from_slice(&out);
        }
        Ok(out)
    }

    /// Whether the source has no more bytes.
    pub fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.replay.is_empty() && self.reader.fill_buf()?.is_empty())
    }

    /// Read a zig-zag encoded long.
    ///
    /// End of input before the first byte is `Ok(None)`; end of input in
    /// the middle of the varint is `UnexpectedEof`.
    pub fn read_long(&mut self) -> Result<Option<i64>, DecodeError> {
        let first = match self.read_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let mut pending = Some(first);
        let raw = decode_varint_with(|| match pending.take() {
            Some(b) => Ok(b),
            None => self.read_byte()?.ok_or(DecodeError::UnexpectedEof),
        })?;
        Ok(Some(zigzag_to_i64(raw)))
    }

    /// Start recording consumed bytes, discarding any previous capture.
    pub fn begin_capture(&mut self) {
        self.capture = Some(Vec::new());
    }

    /// Stop recording and return the captured bytes.
    pub fn end_capture(&mut self) -> Vec<u8> {
        self.capture.take().unwrap_or_default()
    }

    /// Push `bytes` back so they are read again before any new input.
    pub fn unread(&mut self, bytes: &[u8]) {
        for &b in bytes.iter().rev() {
            self.replay.push_front(b);
        }
        self.offset = self.offset.saturating_sub(bytes.len() as u64);
    }

    /// Consume the buffer and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bytes_tracks_offset() {
        let mut src = SourceBuffer::new(&[1u8, 2, 3, 4, 5][..]);
        assert_eq!(src.read_bytes(2).unwrap(), vec![1, 2]);
        assert_eq!(src.offset(), 2);
        assert_eq!(src.read_byte().unwrap(), Some(3));
        assert_eq!(src.read_bytes(10).unwrap(), vec![4, 5]);
        assert_eq!(src.offset(), 5);
        assert!(src.at_eof().unwrap());
        assert_eq!(src.read_byte().unwrap(), None);
    }

    #[test]
    fn test_unread_replays_before_input() {
        let mut src = SourceBuffer::new(&[1u8, 2, 3][..]);
        let first = src.read_bytes(2).unwrap();
        src.unread(&first[1..]);
        assert_eq!(src.offset(), 1);
        assert_eq!(src.read_bytes(3).unwrap(), vec![2, 3]);
        assert_eq!(src.offset(), 3);
    }

    #[test]
    fn test_capture_records_consumed_bytes() {
        let mut src = SourceBuffer::new(&[9u8, 8, 7, 6][..]);
        src.read_byte().unwrap();
        src.begin_capture();
        src.read_byte().unwrap();
        src.read_bytes(2).unwrap();
        assert_eq!(src.end_capture(), vec![8, 7, 6]);
        assert!(src.end_capture().is_empty());
    }

    #[test]
    fn test_read_long() {
        let mut src = SourceBuffer::new(&[0x03u8, 0x80, 0x01, 0x80][..]);
        assert_eq!(src.read_long().unwrap(), Some(-2));
        assert_eq!(src.read_long().unwrap(), Some(64));
        assert!(matches!(src.read_long(), Err(DecodeError::UnexpectedEof)));
        assert_eq!(src.read_long().unwrap(), None);
    }

    #[test]
    fn test_small_capacity_spans_refills() {
        let data: Vec<u8> = (0..=255).collect();
        let mut src = SourceBuffer::with_capacity(7, &data[..]);
        assert_eq!(src.read_bytes(100).unwrap(), data[..100].to_vec());
        assert_eq!(src.read_byte().unwrap(), Some(100));
    }
}
