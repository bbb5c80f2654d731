//! Content classification: media types, transfer encodings, and encoding
//! domains.
//!
//! Only the types and subtypes the parser has to act on are distinguished;
//! everything else is `Other`. This mirrors the processing model: structure
//! comes from `multipart/*` and `message/*`, and the downgrade decision only
//! needs to know whether an entity is composite or a leaf.

use std::fmt;

/// Top-level media type from a `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorType {
    /// Any type the parser does not act on.
    Other,
    /// `text/*`
    Text,
    /// `message/*` — body parts start with another header block.
    Message,
    /// `multipart/*` — body parts are delimited by a boundary string.
    Multipart,
}

/// Media subtype from a `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinorType {
    /// Any subtype the parser does not act on.
    Other,
    /// `text/plain`
    Plain,
    /// `message/rfc822`
    Rfc822,
    /// `message/partial` — must never be converted to 7-bit.
    Partial,
    /// `message/external-body` — must never be converted to 7-bit.
    ExternalBody,
}

/// Content transfer encoding (RFC 2045 §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `7bit` — an encoding domain.
    SevenBit,
    /// `8bit` — an encoding domain.
    EightBit,
    /// `binary` — an encoding domain.
    Binary,
    /// `quoted-printable` — a transformation within the 7-bit domain.
    QuotedPrintable,
    /// `base64` — a transformation within the 7-bit domain.
    Base64,
}

/// The 7/8/binary projection of an encoding.
///
/// Transformations (quoted-printable, base64) produce 7-bit data, so their
/// domain is [`Domain::SevenBit`]. Composite entities (`message/*`,
/// `multipart/*`) may only declare a domain, never a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// 7-bit data.
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Binary data (no line-length guarantee).
    Binary,
}

impl Encoding {
    /// Parse an RFC 2045 transfer-encoding name, case-insensitively.
    ///
    /// Returns `None` for anything unrecognized; callers must leave their
    /// state untouched in that case so the encoding domain is never
    /// polluted with a value outside {7bit, 8bit, binary}.
    pub fn parse(name: &[u8]) -> Option<Self> {
        const NAMES: [(&[u8], Encoding); 5] = [
            (b"7bit", Encoding::SevenBit),
            (b"8bit", Encoding::EightBit),
            (b"binary", Encoding::Binary),
            (b"quoted-printable", Encoding::QuotedPrintable),
            (b"base64", Encoding::Base64),
        ];
        NAMES
            .into_iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, e)| e)
    }

    /// The domain this encoding carries.
    pub fn domain(self) -> Domain {
        match self {
            Self::SevenBit | Self::QuotedPrintable | Self::Base64 => Domain::SevenBit,
            Self::EightBit => Domain::EightBit,
            Self::Binary => Domain::Binary,
        }
    }

    /// `true` when the encoding is itself a domain (7bit, 8bit, binary)
    /// rather than a transformation.
    pub fn is_domain(self) -> bool {
        matches!(self, Self::SevenBit | Self::EightBit | Self::Binary)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

/// Where a message header was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClass {
    /// In the primary message header section.
    Primary,
    /// In the header section after a multipart boundary.
    Multipart,
    /// At the start of a nested (e.g. `message/rfc822`) message.
    Nested,
}

impl HeaderClass {
    /// Short label used in annotated scan output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Primary => "MAIN",
            Self::Multipart => "MULT",
            Self::Nested => "NEST",
        }
    }
}
