//! Input records and the record framer.
//!
//! The MIME parser consumes *records*, not raw bytes. A record is either a
//! complete logical line (without its line ending), a fragment of a line
//! that continues in the next record, or a non-text terminator that marks
//! end of input. [`RecordReader`] frames a byte stream into that record
//! stream, splitting over-long physical lines into continued fragments so
//! that memory use stays bounded no matter what the input looks like.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error::{Result, SieveError};

/// Default maximum record length before a physical line is split into
/// continued fragments.
pub const DEFAULT_MAX_RECORD_LEN: usize = 1024;

/// The kind of an input (or body output) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A complete logical line, line ending stripped.
    Complete,
    /// A line fragment; the logical line continues in the next record.
    Continued,
    /// End of input (or an out-of-band marker). Forces a final flush.
    NonText,
}

impl RecordKind {
    /// `true` for the two text-carrying kinds.
    pub fn is_text(self) -> bool {
        matches!(self, Self::Complete | Self::Continued)
    }
}

/// Frames raw bytes from a reader into the record stream the parser
/// consumes.
///
/// - splits input on `\n` and strips the line ending (`\n` or `\r\n`)
/// - emits [`RecordKind::Continued`] fragments when a physical line exceeds
///   the maximum record length
/// - treats end of file as a hard line break for any pending data
/// - emits exactly one [`RecordKind::NonText`] record at end of input
pub struct RecordReader<R: BufRead> {
    inner: R,
    path: PathBuf,
    max_record_len: usize,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    /// Create a reader with the default maximum record length.
    ///
    /// `path` is only used for error context.
    pub fn new(inner: R, path: impl AsRef<Path>) -> Self {
        Self::with_max_record_len(inner, path, DEFAULT_MAX_RECORD_LEN)
    }

    /// Create a reader with an explicit maximum record length.
    pub fn with_max_record_len(inner: R, path: impl AsRef<Path>, max_record_len: usize) -> Self {
        Self {
            inner,
            path: path.as_ref().to_path_buf(),
            max_record_len: max_record_len.max(1),
            done: false,
        }
    }

    /// Read the next record into `buf` (cleared first) and return its kind.
    ///
    /// Returns `Ok(None)` once the terminal [`RecordKind::NonText`] record
    /// has already been delivered.
    pub fn next_record(&mut self, buf: &mut Vec<u8>) -> Result<Option<RecordKind>> {
        buf.clear();
        if self.done {
            return Ok(None);
        }
        loop {
            let chunk = self
                .inner
                .fill_buf()
                .map_err(|e| SieveError::io(&self.path, e))?;
            if chunk.is_empty() {
                if buf.is_empty() {
                    self.done = true;
                    return Ok(Some(RecordKind::NonText));
                }
                // EOF in the middle of a line: treat as a hard line break.
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                return Ok(Some(RecordKind::Complete));
            }

            let budget = self.max_record_len - buf.len();
            let limit = chunk.len().min(budget);
            if let Some(pos) = chunk[..limit].iter().position(|&b| b == b'\n') {
                buf.extend_from_slice(&chunk[..pos]);
                self.inner.consume(pos + 1);
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                return Ok(Some(RecordKind::Complete));
            }

            buf.extend_from_slice(&chunk[..limit]);
            self.inner.consume(limit);
            if buf.len() >= self.max_record_len {
                return Ok(Some(RecordKind::Continued));
            }
        }
    }
}
