//! Centralized error types for mimesieve.
//!
//! Two kinds of failure live here: hard errors from the I/O layer
//! ([`SieveError`]) and the cumulative structural-anomaly flags the parser
//! reports while it keeps going ([`ErrorFlags`]).

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;

use thiserror::Error;

/// All hard errors produced by the mimesieve library.
#[derive(Error, Debug)]
pub enum SieveError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for `Result<T, SieveError>`.
pub type Result<T> = std::result::Result<T, SieveError>;

impl SieveError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `SieveError`
/// when no path context is available (rare — prefer `SieveError::io`).
impl From<std::io::Error> for SieveError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

/// Cumulative structural-anomaly flags.
///
/// Every call to [`crate::parser::mime::MimeParser::update`] returns the
/// bit-wise OR of all anomalies seen so far; flags are never cleared during
/// the lifetime of a parser. An anomaly never aborts parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorFlags(u32);

impl ErrorFlags {
    /// No anomaly.
    pub const NONE: Self = Self(0);
    /// A single message header exceeded the header length limit and was
    /// truncated.
    pub const TRUNC_HEADER: Self = Self(1 << 0);
    /// The multipart structure was nested deeper than the safety limit;
    /// the deepest boundaries were ignored.
    pub const NESTING: Self = Self(1 << 1);
    /// A message header contains a byte with the high bit set.
    pub const EIGHT_BIT_IN_HEADER: Self = Self(1 << 2);
    /// A body that declares (or defaults to) 7-bit content contains a byte
    /// with the high bit set.
    pub const EIGHT_BIT_IN_7BIT_BODY: Self = Self(1 << 3);
    /// A message/* or multipart/* entity declares a transformation, or the
    /// wrong content transfer encoding domain.
    pub const ENCODING_DOMAIN: Self = Self(1 << 4);

    /// `true` when no flag is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` when every flag in `other` is also set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set every flag in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Human-readable message for the most serious flag that is set.
    ///
    /// # Panics
    ///
    /// Panics when no flag is set. Calling this on an empty flag set is a
    /// programming error; it cannot arise from message input.
    pub fn error_text(self) -> &'static str {
        if self.is_empty() {
            panic!("error_text: no anomaly flag is set");
        }
        if self.contains(Self::NESTING) {
            return "MIME nesting exceeds safety limit";
        }
        if self.contains(Self::TRUNC_HEADER) {
            return "message header was truncated";
        }
        if self.contains(Self::EIGHT_BIT_IN_HEADER) {
            return "improper use of 8-bit data in message header";
        }
        if self.contains(Self::EIGHT_BIT_IN_7BIT_BODY) {
            return "improper use of 8-bit data in message body";
        }
        "invalid message/* or multipart/* encoding domain"
    }

    /// All messages for the flags that are set, most serious first.
    pub fn messages(self) -> Vec<&'static str> {
        let order = [
            Self::NESTING,
            Self::TRUNC_HEADER,
            Self::EIGHT_BIT_IN_HEADER,
            Self::EIGHT_BIT_IN_7BIT_BODY,
            Self::ENCODING_DOMAIN,
        ];
        order
            .into_iter()
            .filter(|f| self.contains(*f))
            .map(|f| f.error_text())
            .collect()
    }
}

impl BitOr for ErrorFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ErrorFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", self.messages().join("; "))
    }
}
