//! The MIME state machine.
//!
//! A one-pass processor that classifies input records as message headers or
//! body content at the correct multipart nesting level, with optional
//! 8-bit to quoted-printable conversion. The machine is deliberately
//! simple: it knows about headers and bodies, understands that
//! `multipart/*` has multiple body parts each with a header section, and
//! that `message/*` starts with another block of message headers.
//! Everything else passes through.
//!
//! To fend off denial of service, a single logical header is truncated at
//! the header length limit, stored boundary strings are truncated at the
//! boundary length limit, and multipart nesting beyond the depth limit is
//! ignored. All three limits are captured at construction from
//! [`Limits`](crate::config::Limits).

use std::ops::{BitOr, BitOrAssign};

use crate::config::Limits;
use crate::error::ErrorFlags;
use crate::model::entity::{Domain, Encoding, HeaderClass, MajorType, MinorType};

use super::boundary::BoundaryStack;
use super::downgrade::Downgrader;
use super::header::{self, HeaderInfo, HeaderKind};
use super::record::RecordKind;
use super::token::{self, Token};

/// RFC 2045 tspecials, the delimiter set for `Content-Type` values.
const RFC2045_TSPECIALS: &[u8] = b"()<>@,;:\\\"/[]?=";

/// Tokens examined per attribute: `name`, `=` (or `/`), `value`.
const MAX_TOKENS: usize = 3;

/// Processing options, combined with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options(u32);

impl Options {
    /// No special processing.
    pub const NONE: Self = Self(0);
    /// Pay no attention to `Content-*` headers; switch to body state at the
    /// end of the primary headers regardless of content type.
    pub const DISABLE_MIME: Self = Self(1 << 0);
    /// Raise [`ErrorFlags::TRUNC_HEADER`] when a header overflows the limit.
    pub const REPORT_TRUNC_HEADER: Self = Self(1 << 1);
    /// Raise [`ErrorFlags::EIGHT_BIT_IN_HEADER`] when a header contains a
    /// byte with the high bit set.
    pub const REPORT_8BIT_IN_HEADER: Self = Self(1 << 2);
    /// Raise [`ErrorFlags::EIGHT_BIT_IN_7BIT_BODY`] when a nominally 7-bit
    /// body contains a byte with the high bit set.
    pub const REPORT_8BIT_IN_7BIT_BODY: Self = Self(1 << 3);
    /// Raise [`ErrorFlags::ENCODING_DOMAIN`] for composite entities with an
    /// inconsistent content transfer encoding.
    pub const REPORT_ENCODING_DOMAIN: Self = Self(1 << 4);
    /// Recurse into any `message/*`, not just `message/rfc822`. Must not be
    /// combined with [`Options::DOWNGRADE`].
    pub const RECURSE_ALL_MESSAGE: Self = Self(1 << 5);
    /// Convert 8-bit leaf bodies to quoted-printable and rewrite the
    /// affected `Content-Transfer-Encoding` headers.
    pub const DOWNGRADE: Self = Self(1 << 6);

    /// `true` when every flag in `other` is also set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Options {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Options {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Receiver for parser output.
///
/// Buffers handed to these methods are only valid for the duration of the
/// call; their storage is reused. The header buffer may be mutated in
/// place (e.g. to rewrite a header) but must not be retained.
pub trait MimeSink {
    /// A completed logical header, folded fragments joined with embedded
    /// `\n`. `info` is `None` for unrecognized headers and for the
    /// synthesized replacement `Content-Transfer-Encoding` header emitted
    /// while downgrading.
    fn header(&mut self, class: HeaderClass, info: Option<&'static HeaderInfo>, buf: &mut Vec<u8>);

    /// The primary header block has ended. Called exactly once per message.
    fn header_end(&mut self) {}

    /// A body record: unmodified input, or quoted-printable output while
    /// downgrading.
    fn body(&mut self, kind: RecordKind, line: &[u8]);

    /// End of input was reached in body state.
    fn body_end(&mut self) {}
}

/// Parser phase. The three header phases share one code path; only the
/// class reported to the sink differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    PrimaryHeaders,
    MultipartHeaders,
    NestedHeaders,
    Body,
}

impl Phase {
    fn header_class(self) -> HeaderClass {
        match self {
            Self::PrimaryHeaders => HeaderClass::Primary,
            Self::MultipartHeaders => HeaderClass::Multipart,
            Self::NestedHeaders => HeaderClass::Nested,
            Self::Body => unreachable!("no header class in body state"),
        }
    }
}

/// Streaming MIME structure parser.
///
/// Create one per message, feed it records in order, and finish with a
/// [`RecordKind::NonText`] record. A parser is exclusively owned by its
/// driver; all processing happens synchronously inside [`update`].
///
/// [`update`]: MimeParser::update
pub struct MimeParser<S: MimeSink> {
    phase: Phase,
    curr_ctype: MajorType,
    curr_stype: MinorType,
    curr_encoding: Encoding,
    curr_domain: Domain,
    header_buf: Vec<u8>,
    stack: BoundaryStack,
    prev_kind: Option<RecordKind>,
    err_flags: ErrorFlags,
    options: Options,
    limits: Limits,
    downgrader: Downgrader,
    tokens: Vec<Token>,
    sink: S,
}

impl<S: MimeSink> MimeParser<S> {
    /// Create a parser in its initial state: primary headers, content type
    /// `text/plain`, 7-bit encoding.
    pub fn new(options: Options, limits: Limits, sink: S) -> Self {
        debug_assert!(
            !(options.contains(Options::RECURSE_ALL_MESSAGE)
                && options.contains(Options::DOWNGRADE)),
            "RECURSE_ALL_MESSAGE must not be combined with DOWNGRADE"
        );
        Self {
            phase: Phase::PrimaryHeaders,
            curr_ctype: MajorType::Text,
            curr_stype: MinorType::Plain,
            curr_encoding: Encoding::SevenBit,
            curr_domain: Domain::SevenBit,
            header_buf: Vec::with_capacity(100),
            stack: BoundaryStack::new(limits.max_depth, limits.max_boundary_len),
            prev_kind: None,
            err_flags: ErrorFlags::NONE,
            options,
            limits,
            downgrader: Downgrader::new(),
            tokens: Vec::with_capacity(MAX_TOKENS),
            sink,
        }
    }

    /// Feed one record. Returns the cumulative anomaly flags.
    pub fn update(&mut self, kind: RecordKind, bytes: &[u8]) -> ErrorFlags {
        // Flush any partial logical line still buffered up before taking
        // end-of-input actions, so no line straddles the end of the stream.
        if kind == RecordKind::NonText && self.prev_kind == Some(RecordKind::Continued) {
            self.step(RecordKind::Complete, b"");
        }
        self.step(kind, bytes)
    }

    /// Cumulative anomaly flags seen so far.
    pub fn error_flags(&self) -> ErrorFlags {
        self.err_flags
    }

    /// Current multipart nesting depth.
    pub fn nesting_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Shared access to the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Exclusive access to the sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Tear the parser down and recover its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn step(&mut self, kind: RecordKind, bytes: &[u8]) -> ErrorFlags {
        let handled = match self.phase {
            Phase::Body => false,
            _ => self.process_headers(kind, bytes),
        };
        if !handled {
            self.process_body(kind, bytes);
        }
        self.prev_kind = Some(kind);
        self.err_flags
    }

    /// Header-phase handling. Returns `true` when the record was fully
    /// consumed; `false` when it must fall through to body processing.
    fn process_headers(&mut self, kind: RecordKind, bytes: &[u8]) -> bool {
        let is_text = kind.is_text();

        // First, deal with header text accumulated from previous records.
        if !self.header_buf.is_empty() {
            if is_text {
                if self.prev_kind == Some(RecordKind::Continued) {
                    self.append_header(bytes);
                    return true;
                }
                if bytes.first().is_some_and(|b| b.is_ascii_whitespace()) {
                    // Folded continuation line.
                    self.append_header(b"\n");
                    self.append_header(bytes);
                    return true;
                }
            }
            // No more input belongs to the saved header.
            self.flush_header();
        }

        if is_text {
            let name_len = header::is_header(bytes);
            if name_len > 0 {
                // The beginning of a new logical header. Normalize the
                // obsolete "name space colon" form to "name colon".
                self.append_header(&bytes[..name_len]);
                let mut rest = &bytes[name_len..];
                while let Some((&b, tail)) = rest.split_first() {
                    if !b.is_ascii_whitespace() {
                        break;
                    }
                    rest = tail;
                }
                self.append_header(rest);
                return true;
            }
        }

        // This record terminates the header block.
        self.finish_header_block();

        if is_text {
            if bytes.is_empty() {
                self.enter_body_after_blank();
                return true;
            }
            // Invalid input: text that is neither a header nor the blank
            // separator. Force one blank body line and continue in body
            // state, leaving type and encoding alone.
            self.sink.body(RecordKind::Complete, b"");
            self.phase = Phase::Body;
            return false;
        }

        // Non-text input: go to body state unconditionally and let the
        // body path deliver the end-of-input notification.
        self.phase = Phase::Body;
        false
    }

    /// Output processing for a completed logical header.
    fn flush_header(&mut self) {
        let info = header::lookup(&self.header_buf);
        if !self.options.contains(Options::DISABLE_MIME) {
            if let Some(info) = info {
                match info.kind {
                    HeaderKind::ContentType => self.interpret_content_type(info),
                    HeaderKind::ContentTransferEncoding => {
                        self.interpret_content_encoding(info)
                    }
                    HeaderKind::Other => {}
                }
            }
        }

        if self.options.contains(Options::REPORT_8BIT_IN_HEADER)
            && !self.err_flags.contains(ErrorFlags::EIGHT_BIT_IN_HEADER)
            && self.header_buf.iter().any(|&b| b & 0x80 != 0)
        {
            self.err_flags.insert(ErrorFlags::EIGHT_BIT_IN_HEADER);
        }

        // Hold back the content transfer encoding header when a downgrade
        // will change its value; the replacement is emitted at the end of
        // the header block, where the content type is known.
        let suppress = info.is_some_and(|i| i.kind == HeaderKind::ContentTransferEncoding)
            && self.options.contains(Options::DOWNGRADE)
            && self.curr_domain != Domain::SevenBit;
        if !suppress {
            let class = self.phase.header_class();
            self.sink.header(class, info, &mut self.header_buf);
        }
        self.prev_kind = None;
        self.header_buf.clear();
    }

    /// Actions taken once at the end of every header block.
    fn finish_header_block(&mut self) {
        if self.options.contains(Options::DOWNGRADE) && self.curr_domain != Domain::SevenBit {
            // Composites must carry a domain; leaf entities carry the
            // transformation the body is about to be converted to.
            let value: &[u8] = match self.curr_ctype {
                MajorType::Message | MajorType::Multipart => b"7bit",
                _ => b"quoted-printable",
            };
            self.header_buf.clear();
            self.header_buf
                .extend_from_slice(b"Content-Transfer-Encoding: ");
            self.header_buf.extend_from_slice(value);
            let class = self.phase.header_class();
            self.sink.header(class, None, &mut self.header_buf);
            self.header_buf.clear();
        }

        if self.phase == Phase::PrimaryHeaders {
            self.sink.header_end();
        }

        // message/* and multipart/* must declare an identity encoding
        // (7bit, 8bit, binary); partial and external-body must stay 7-bit.
        if self.options.contains(Options::REPORT_ENCODING_DOMAIN) {
            let wrong = match self.curr_ctype {
                MajorType::Message => {
                    if matches!(
                        self.curr_stype,
                        MinorType::Partial | MinorType::ExternalBody
                    ) {
                        self.curr_domain != Domain::SevenBit
                    } else {
                        !self.curr_encoding.is_domain()
                    }
                }
                MajorType::Multipart => !self.curr_encoding.is_domain(),
                _ => false,
            };
            if wrong {
                self.err_flags.insert(ErrorFlags::ENCODING_DOMAIN);
            }
        }
    }

    /// Phase transition for the blank line that closes a header block.
    fn enter_body_after_blank(&mut self) {
        match self.curr_ctype {
            MajorType::Message => {
                if self.curr_stype == MinorType::Rfc822
                    || self.options.contains(Options::RECURSE_ALL_MESSAGE)
                {
                    self.set_state(
                        Phase::NestedHeaders,
                        MajorType::Text,
                        MinorType::Plain,
                        Encoding::SevenBit,
                        Domain::SevenBit,
                    );
                } else {
                    self.phase = Phase::Body;
                }
            }
            MajorType::Multipart => {
                // The multipart prolog is body text with no meaningful
                // type of its own.
                self.set_state(
                    Phase::Body,
                    MajorType::Other,
                    MinorType::Other,
                    Encoding::SevenBit,
                    Domain::SevenBit,
                );
            }
            _ => self.phase = Phase::Body,
        }
    }

    /// Body-phase handling: 8-bit scan, boundary matching, output routing.
    fn process_body(&mut self, kind: RecordKind, bytes: &[u8]) {
        if kind.is_text() {
            if self.options.contains(Options::REPORT_8BIT_IN_7BIT_BODY)
                && self.curr_encoding == Encoding::SevenBit
                && !self.err_flags.contains(ErrorFlags::EIGHT_BIT_IN_7BIT_BODY)
                && bytes.iter().any(|&b| b & 0x80 != 0)
            {
                self.err_flags.insert(ErrorFlags::EIGHT_BIT_IN_7BIT_BODY);
            }

            // Boundary matching. Never at the start of a continued record,
            // and non-space cruft after the delimiter is ignored — our
            // stored boundary may have been truncated anyway.
            if !self.stack.is_empty()
                && self.prev_kind != Some(RecordKind::Continued)
                && bytes.starts_with(b"--")
            {
                let tail = &bytes[2..];
                if let Some(from_top) = self.stack.find(tail) {
                    for _ in 0..from_top {
                        self.stack.pop();
                    }
                    let bound_len = self.stack.peek(0).expect("matched entry").boundary().len();
                    if tail[bound_len..].starts_with(b"--") {
                        // Close delimiter: this multipart is done.
                        self.stack.pop();
                        self.set_state(
                            Phase::Body,
                            MajorType::Other,
                            MinorType::Other,
                            Encoding::SevenBit,
                            Domain::SevenBit,
                        );
                    } else {
                        let entry = self.stack.peek(0).expect("matched entry");
                        let (ctype, stype) = (entry.child_type, entry.child_subtype);
                        self.set_state(
                            Phase::MultipartHeaders,
                            ctype,
                            stype,
                            Encoding::SevenBit,
                            Domain::SevenBit,
                        );
                    }
                }
            }

            // Put last, so that boundary lines are never encoded.
            if self.options.contains(Options::DOWNGRADE) && self.curr_domain != Domain::SevenBit
            {
                let Self {
                    downgrader, sink, ..
                } = self;
                downgrader.convert(kind, bytes, |k, line| sink.body(k, line));
            } else {
                self.sink.body(kind, bytes);
            }
        } else {
            // Last opportunity for the application to send pending output.
            self.sink.body_end();
        }
    }

    /// Interpret a `Content-Type` header.
    fn interpret_content_type(&mut self, info: &'static HeaderInfo) {
        let mut tokens = std::mem::take(&mut self.tokens);
        let mut cursor = &self.header_buf[info.name.len() + 1..];

        let count = token::scan(&mut cursor, MAX_TOKENS, RFC2045_TSPECIALS, b';', &mut tokens)
            .unwrap_or(0);
        if count == 0 {
            self.curr_ctype = MajorType::Other;
            self.tokens = tokens;
            return;
        }

        if tokens[0].is_atom(b"text") {
            self.curr_ctype = MajorType::Text;
            self.curr_stype =
                if count >= 3 && tokens[1].is_special(b'/') && tokens[2].is_atom(b"plain") {
                    MinorType::Plain
                } else {
                    MinorType::Other
                };
        } else if tokens[0].is_atom(b"message") {
            // The partial and external-body subtypes can never be subjected
            // to 8-bit conversion, so they must be recognized here.
            self.curr_ctype = MajorType::Message;
            self.curr_stype = MinorType::Other;
            if count >= 3 && tokens[1].is_special(b'/') {
                if tokens[2].is_atom(b"rfc822") {
                    self.curr_stype = MinorType::Rfc822;
                } else if tokens[2].is_atom(b"partial") {
                    self.curr_stype = MinorType::Partial;
                } else if tokens[2].is_atom(b"external-body") {
                    self.curr_stype = MinorType::ExternalBody;
                }
            }
        } else if tokens[0].is_atom(b"multipart") {
            self.curr_ctype = MajorType::Multipart;
            // multipart/digest parts default to message/rfc822, everything
            // else defaults to text/plain.
            let (def_ctype, def_stype) =
                if count >= 3 && tokens[1].is_special(b'/') && tokens[2].is_atom(b"digest") {
                    (MajorType::Message, MinorType::Rfc822)
                } else {
                    (MajorType::Text, MinorType::Plain)
                };

            // Walk the remaining ";"-separated attributes. Multiple
            // boundary attributes are all pushed: they are illegal, but
            // pushing each one still finds the embedded headers as long as
            // the sender sticks to one of them.
            while let Some(count) =
                token::scan(&mut cursor, MAX_TOKENS, RFC2045_TSPECIALS, b';', &mut tokens)
            {
                if count >= 3
                    && tokens[0].is_atom(b"boundary")
                    && tokens[1].is_special(b'=')
                {
                    if let Some(value) = tokens[2].value() {
                        if !self.stack.push(def_ctype, def_stype, value) {
                            self.err_flags.insert(ErrorFlags::NESTING);
                        }
                    }
                }
            }
        } else {
            self.curr_ctype = MajorType::Other;
        }
        self.tokens = tokens;
    }

    /// Interpret a `Content-Transfer-Encoding` header. Unrecognized values
    /// leave the state alone so the encoding domain is never set to
    /// anything but 7bit, 8bit or binary.
    fn interpret_content_encoding(&mut self, info: &'static HeaderInfo) {
        let mut tokens = std::mem::take(&mut self.tokens);
        let mut cursor = &self.header_buf[info.name.len() + 1..];

        if let Some(count) = token::scan(&mut cursor, 1, &[], 0, &mut tokens) {
            if count > 0 {
                if let Token::Atom(value) = &tokens[0] {
                    if let Some(encoding) = Encoding::parse(value) {
                        self.curr_encoding = encoding;
                        self.curr_domain = encoding.domain();
                    }
                }
            }
        }
        self.tokens = tokens;
    }

    /// Append to the pending header, never growing past the header limit.
    fn append_header(&mut self, bytes: &[u8]) {
        let room = self.limits.header_limit.saturating_sub(self.header_buf.len());
        if bytes.len() > room {
            self.header_buf.extend_from_slice(&bytes[..room]);
            if self.options.contains(Options::REPORT_TRUNC_HEADER) {
                self.err_flags.insert(ErrorFlags::TRUNC_HEADER);
            }
        } else {
            self.header_buf.extend_from_slice(bytes);
        }
    }

    fn set_state(
        &mut self,
        phase: Phase,
        ctype: MajorType,
        stype: MinorType,
        encoding: Encoding,
        domain: Domain,
    ) {
        self.phase = phase;
        self.curr_ctype = ctype;
        self.curr_stype = stype;
        self.curr_encoding = encoding;
        self.curr_domain = domain;
    }
}
