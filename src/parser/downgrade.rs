//! 8-bit to quoted-printable conversion for leaf bodies.
//!
//! Converts one logical input line at a time into one or more
//! quoted-printable output lines, inserting soft line breaks before the
//! output reaches the RFC 2045 length limit and protecting trailing
//! whitespace at hard line breaks. The output buffer persists across calls
//! so a logical line may arrive split over several continued records.

use super::record::RecordKind;

/// Output length after which the next byte forces a soft line break.
/// The flushed line is at most 73 bytes plus a trailing `=`, leaving room
/// for the worst-case trailing-whitespace fix (73 → 75) under the 76-byte
/// RFC limit.
const SOFT_BREAK_AT: usize = 72;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Streaming quoted-printable encoder for body lines.
#[derive(Debug, Default)]
pub struct Downgrader {
    buf: Vec<u8>,
}

impl Downgrader {
    /// Create an encoder with an empty output buffer.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(100),
        }
    }

    /// Convert one input record, invoking `out` for every complete output
    /// line produced.
    ///
    /// On a [`RecordKind::Complete`] record the buffered line is flushed
    /// (with the trailing space/tab fix); on [`RecordKind::Continued`] the
    /// buffer is carried over to the next call.
    pub fn convert<F>(&mut self, kind: RecordKind, bytes: &[u8], mut out: F)
    where
        F: FnMut(RecordKind, &[u8]),
    {
        let mut last = 0u8;
        for &b in bytes {
            // Soft break before the output line grows past the safe length.
            if self.buf.len() > SOFT_BREAK_AT {
                self.buf.push(b'=');
                out(RecordKind::Complete, &self.buf);
                self.buf.clear();
            }
            last = b;
            if b == b'\t' || ((32..=126).contains(&b) && b != b'=') {
                self.buf.push(b);
            } else {
                self.encode(b);
            }
        }

        if kind == RecordKind::Complete {
            // Trailing whitespace before a hard line break must be encoded
            // (RFC 2045 §6.7 rule 3). Worst case the line grows by 2 bytes.
            if last == b' ' || last == b'\t' {
                self.buf.pop();
                self.encode(last);
            }
            out(RecordKind::Complete, &self.buf);
            self.buf.clear();
        }
    }

    fn encode(&mut self, b: u8) {
        self.buf.push(b'=');
        self.buf.push(HEX[(b >> 4) as usize]);
        self.buf.push(HEX[(b & 0xf) as usize]);
    }
}
