//! Header field-name detection and recognition.
//!
//! [`is_header`] decides whether a line begins a message header and how
//! long its field name is, accepting the obsolete RFC 822 `Name :` form.
//! [`lookup`] maps an accumulated header to a descriptor so the state
//! machine can pick out the `Content-*` headers it acts on.

/// What the parser does with a recognized header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// `Content-Type` — drives type/subtype state and boundary pushes.
    ContentType,
    /// `Content-Transfer-Encoding` — drives encoding/domain state.
    ContentTransferEncoding,
    /// Recognized but passed through unchanged.
    Other,
}

/// Descriptor for a recognized header name.
#[derive(Debug)]
pub struct HeaderInfo {
    /// Canonical header name.
    pub name: &'static str,
    /// How the parser treats this header.
    pub kind: HeaderKind,
}

/// Headers the recognizer knows about. Lookup is case-insensitive; anything
/// not listed here yields no descriptor and is passed through untouched.
static KNOWN_HEADERS: &[HeaderInfo] = &[
    HeaderInfo {
        name: "Bcc",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Cc",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Content-Description",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Content-Disposition",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Content-Id",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Content-Transfer-Encoding",
        kind: HeaderKind::ContentTransferEncoding,
    },
    HeaderInfo {
        name: "Content-Type",
        kind: HeaderKind::ContentType,
    },
    HeaderInfo {
        name: "Date",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "From",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Message-Id",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Mime-Version",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Received",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Reply-To",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Return-Path",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "Subject",
        kind: HeaderKind::Other,
    },
    HeaderInfo {
        name: "To",
        kind: HeaderKind::Other,
    },
];

/// Length of the header field name at the start of `line`, or 0.
///
/// A header field name is one or more printable ASCII bytes other than
/// space and `:`, optionally followed by ASCII whitespace (the obsolete
/// RFC 822 form), then `:`. The returned length excludes the whitespace
/// and the colon.
pub fn is_header(line: &[u8]) -> usize {
    let mut len = 0usize;
    let mut after_name = false;
    for &b in line {
        if b == b':' {
            return if len > 0 { len } else { 0 };
        }
        if b.is_ascii_whitespace() {
            if len == 0 {
                return 0;
            }
            after_name = true;
        } else if b.is_ascii_graphic() {
            if after_name {
                return 0;
            }
            len += 1;
        } else {
            return 0;
        }
    }
    0
}

/// Look up the descriptor for the header name leading `header`.
///
/// `header` is an accumulated logical header in the normalized
/// `Name: value` form. Returns `None` when the line has no valid field
/// name or the name is not in the table.
pub fn lookup(header: &[u8]) -> Option<&'static HeaderInfo> {
    let len = is_header(header);
    if len == 0 {
        return None;
    }
    let name = &header[..len];
    KNOWN_HEADERS
        .iter()
        .find(|info| info.name.as_bytes().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_header_plain() {
        assert_eq!(is_header(b"Subject: hi"), 7);
        assert_eq!(is_header(b"To:"), 2);
        assert_eq!(is_header(b"X-Custom-Header: v"), 15);
    }

    #[test]
    fn test_is_header_obsolete_space_form() {
        assert_eq!(is_header(b"Subject : hi"), 7);
        assert_eq!(is_header(b"Subject\t: hi"), 7);
    }

    #[test]
    fn test_is_header_rejects_non_headers() {
        assert_eq!(is_header(b""), 0);
        assert_eq!(is_header(b"no colon here"), 0);
        assert_eq!(is_header(b" Leading: space"), 0);
        assert_eq!(is_header(b": empty name"), 0);
        assert_eq!(is_header(b"Two words: x"), 0);
        assert_eq!(is_header(b"Bin\x01ary: x"), 0);
        assert_eq!(is_header(b"Acc\xe9nt: x"), 0);
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let info = lookup(b"content-type: text/plain").expect("known header");
        assert_eq!(info.kind, HeaderKind::ContentType);
        assert_eq!(info.name, "Content-Type");

        let info = lookup(b"CONTENT-TRANSFER-ENCODING: 8bit").expect("known header");
        assert_eq!(info.kind, HeaderKind::ContentTransferEncoding);
    }

    #[test]
    fn test_lookup_unknown_header() {
        assert!(lookup(b"X-Mailer: foo").is_none());
        assert!(lookup(b"not a header at all").is_none());
    }

    #[test]
    fn test_lookup_other_headers() {
        assert_eq!(lookup(b"Subject: x").unwrap().kind, HeaderKind::Other);
        assert_eq!(lookup(b"Mime-Version: 1.0").unwrap().kind, HeaderKind::Other);
    }
}
