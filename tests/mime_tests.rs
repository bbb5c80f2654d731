//! Integration tests for the MIME state machine, record framer, and
//! downgrade path.

use std::io::Cursor;
use std::path::Path;

use mimesieve::config::Limits;
use mimesieve::error::ErrorFlags;
use mimesieve::model::entity::HeaderClass;
use mimesieve::parser::header::HeaderInfo;
use mimesieve::parser::mime::{MimeParser, MimeSink, Options};
use mimesieve::parser::record::{RecordKind, RecordReader};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Sink that records every callback for later inspection.
#[derive(Debug, Default)]
struct Events {
    headers: Vec<(HeaderClass, Option<&'static str>, Vec<u8>)>,
    header_ends: usize,
    body: Vec<(RecordKind, Vec<u8>)>,
    body_ends: usize,
}

impl Events {
    fn body_lines(&self) -> Vec<&[u8]> {
        self.body
            .iter()
            .filter(|(kind, _)| *kind == RecordKind::Complete)
            .map(|(_, line)| line.as_slice())
            .collect()
    }
}

impl MimeSink for Events {
    fn header(&mut self, class: HeaderClass, info: Option<&'static HeaderInfo>, buf: &mut Vec<u8>) {
        self.headers.push((class, info.map(|i| i.name), buf.clone()));
    }

    fn header_end(&mut self) {
        self.header_ends += 1;
    }

    fn body(&mut self, kind: RecordKind, line: &[u8]) {
        self.body.push((kind, line.to_vec()));
    }

    fn body_end(&mut self) {
        self.body_ends += 1;
    }
}

/// Run a whole fixture file through the framer and parser.
fn parse_file(name: &str, options: Options, limits: Limits) -> (Events, ErrorFlags) {
    let path = fixture(name);
    let data = std::fs::read(&path).expect("fixture readable");
    parse_bytes(&data, options, limits)
}

fn parse_bytes(data: &[u8], options: Options, limits: Limits) -> (Events, ErrorFlags) {
    let mut records = RecordReader::new(Cursor::new(data), "<test>");
    let mut parser = MimeParser::new(options, limits, Events::default());
    let mut buf = Vec::new();
    let mut flags = ErrorFlags::NONE;
    while let Some(kind) = records.next_record(&mut buf).expect("no I/O error") {
        flags = parser.update(kind, &buf);
    }
    (parser.into_sink(), flags)
}

// ─── Test 1: Plain text message ─────────────────────────────────────

#[test]
fn test_plain_message_event_sequence() {
    let (events, flags) = parse_file("simple.eml", Options::NONE, Limits::default());
    assert!(flags.is_empty());

    assert_eq!(events.headers.len(), 4);
    assert!(events
        .headers
        .iter()
        .all(|(class, _, _)| *class == HeaderClass::Primary));
    assert_eq!(events.headers[0].1, Some("From"));
    assert_eq!(events.headers[2].2, b"Subject: Hello World");
    assert_eq!(events.header_ends, 1);

    assert_eq!(
        events.body_lines(),
        vec![b"Hello from a plain message." as &[u8], b"Second line."]
    );
    assert_eq!(events.body_ends, 1);
}

// ─── Test 2: Multipart with nested boundary ─────────────────────────

#[test]
fn test_multipart_nested_structure() {
    let (events, flags) = parse_file("multipart.eml", Options::NONE, Limits::default());
    assert!(flags.is_empty());

    let primary = events
        .headers
        .iter()
        .filter(|(class, _, _)| *class == HeaderClass::Primary)
        .count();
    let part = events
        .headers
        .iter()
        .filter(|(class, _, _)| *class == HeaderClass::Multipart)
        .count();
    assert_eq!(primary, 5);
    assert_eq!(part, 3);
    assert_eq!(events.header_ends, 1);
    assert_eq!(events.body_ends, 1);

    // Boundary delimiter lines pass through as body content; part content
    // is attributed to the right level.
    let body = events.body_lines();
    assert!(body.iter().any(|l| *l == b"This is the preamble."));
    assert!(body.iter().any(|l| *l == b"First part."));
    assert!(body.iter().any(|l| *l == b"Inner alternative."));
    assert!(body.iter().any(|l| *l == b"--inner--"));
    assert!(body.iter().any(|l| *l == b"Epilogue."));
}

#[test]
fn test_multipart_body_bytes_are_conserved() {
    // Every body line of the fixture must come back exactly once.
    let (events, _) = parse_file("multipart.eml", Options::NONE, Limits::default());
    let expected: Vec<&[u8]> = vec![
        b"This is the preamble.",
        b"--outer",
        b"First part.",
        b"--outer",
        b"--inner",
        b"Inner alternative.",
        b"--inner--",
        b"--outer--",
        b"Epilogue.",
    ];
    assert_eq!(events.body_lines(), expected);
}

#[test]
fn test_nesting_depth_never_exceeds_limit() {
    let data = std::fs::read(fixture("multipart.eml")).unwrap();
    let limits = Limits {
        max_depth: 1,
        ..Limits::default()
    };
    let mut records = RecordReader::new(Cursor::new(&data[..]), "<test>");
    let mut parser = MimeParser::new(Options::NONE, limits, Events::default());
    let mut buf = Vec::new();
    let mut flags = ErrorFlags::NONE;
    while let Some(kind) = records.next_record(&mut buf).unwrap() {
        flags = parser.update(kind, &buf);
        assert!(parser.nesting_depth() <= limits.max_depth);
    }
    // The inner multipart did not fit.
    assert!(flags.contains(ErrorFlags::NESTING));
}

// ─── Test 3: Header continuation and truncation ─────────────────────

#[test]
fn test_folded_header_embedded_newline() {
    let data = b"Subject: first\n\tsecond\n\nbody\n";
    let (events, flags) = parse_bytes(data, Options::NONE, Limits::default());
    assert!(flags.is_empty());
    assert_eq!(events.headers.len(), 1);
    assert_eq!(events.headers[0].2, b"Subject: first\n\tsecond");
}

#[test]
fn test_header_truncated_at_exact_limit() {
    let limits = Limits {
        header_limit: 20,
        ..Limits::default()
    };
    let data = b"Subject: something much too long for the cap\n\nbody\n";
    let (events, flags) = parse_bytes(data, Options::REPORT_TRUNC_HEADER, limits);
    assert!(flags.contains(ErrorFlags::TRUNC_HEADER));
    assert_eq!(events.headers[0].2.len(), 20);
    assert_eq!(&events.headers[0].2, b"Subject: something m");
}

#[test]
fn test_long_physical_line_reassembled_as_one_header() {
    // Force the framer to split the header line into continued fragments;
    // the parser must glue them back into a single logical header.
    let data = b"Subject: abcdefghijklmnopqrstuvwxyz\n\nbody\n";
    let mut records = RecordReader::with_max_record_len(Cursor::new(&data[..]), "<test>", 10);
    let mut parser = MimeParser::new(Options::NONE, Limits::default(), Events::default());
    let mut buf = Vec::new();
    while let Some(kind) = records.next_record(&mut buf).unwrap() {
        parser.update(kind, &buf);
    }
    let events = parser.into_sink();
    assert_eq!(events.headers.len(), 1);
    assert_eq!(events.headers[0].2, b"Subject: abcdefghijklmnopqrstuvwxyz");
}

// ─── Test 4: 8-bit in 7-bit body ────────────────────────────────────

#[test]
fn test_8bit_in_7bit_body_raised_exactly_once() {
    let mut data = b"Content-Transfer-Encoding: 7bit\n\n".to_vec();
    data.extend_from_slice(b"caf\xE9\n");
    data.extend_from_slice(b"more \xFF and \xFE bytes\n");
    let (_, flags) = parse_bytes(&data, Options::REPORT_8BIT_IN_7BIT_BODY, Limits::default());
    assert!(flags.contains(ErrorFlags::EIGHT_BIT_IN_7BIT_BODY));

    // Feeding the identical stream through a fresh parser yields the same
    // flags; within one message the flag is monotonic, never re-raised.
    let (_, again) = parse_bytes(&data, Options::REPORT_8BIT_IN_7BIT_BODY, Limits::default());
    assert_eq!(flags, again);
}

#[test]
fn test_8bit_body_unflagged_without_option() {
    let mut data = b"Content-Transfer-Encoding: 7bit\n\n".to_vec();
    data.extend_from_slice(b"caf\xE9\n");
    let (_, flags) = parse_bytes(&data, Options::NONE, Limits::default());
    assert!(flags.is_empty());
}

// ─── Test 5: Downgrade ──────────────────────────────────────────────

#[test]
fn test_downgrade_8bit_leaf_body() {
    let mut data = b"Content-Transfer-Encoding: 8bit\n\n".to_vec();
    data.extend_from_slice(b"h\xE9llo\n");
    let (events, flags) = parse_bytes(&data, Options::DOWNGRADE, Limits::default());
    assert!(flags.is_empty());

    // The declared encoding header is replaced, at its natural position.
    assert_eq!(events.headers.len(), 1);
    assert_eq!(
        events.headers[0].2,
        b"Content-Transfer-Encoding: quoted-printable"
    );
    assert_eq!(events.headers[0].1, None);

    assert_eq!(events.body_lines(), vec![b"h=E9llo" as &[u8]]);
}

#[test]
fn test_downgrade_output_is_valid_quoted_printable() {
    let mut data = b"Content-Transfer-Encoding: 8bit\n\n".to_vec();
    for _ in 0..5 {
        data.extend_from_slice(&[0xC3, 0xA9]);
        data.extend_from_slice(b" some text = and more text to push past the soft break ");
    }
    data.push(b'\n');
    let (events, _) = parse_bytes(&data, Options::DOWNGRADE, Limits::default());
    for line in events.body_lines() {
        assert!(line.len() <= 76, "line too long: {}", line.len());
        let mut i = 0;
        while i < line.len() {
            match line[i] {
                b'=' if i + 1 == line.len() => i += 1, // soft break
                b'=' => {
                    assert!(line[i + 1].is_ascii_hexdigit(), "bad escape in {line:?}");
                    assert!(line[i + 2].is_ascii_hexdigit(), "bad escape in {line:?}");
                    i += 3;
                }
                b'\t' => i += 1,
                b => {
                    assert!((32..=126).contains(&b), "raw byte {b:#x} in output");
                    i += 1;
                }
            }
        }
    }
}

// ─── Test 6: Nesting overflow ───────────────────────────────────────

#[test]
fn test_nesting_overflow_continues_parsing() {
    let limits = Limits {
        max_depth: 2,
        ..Limits::default()
    };
    let data = b"Content-Type: multipart/mixed; boundary=a\n\n\
--a\n\
Content-Type: multipart/mixed; boundary=b\n\n\
--b\n\
Content-Type: multipart/mixed; boundary=c\n\n\
--c\n\
deep body\n\
--c--\n";
    let (events, flags) = parse_bytes(data, Options::NONE, limits);
    assert!(flags.contains(ErrorFlags::NESTING));
    // The third boundary was never registered: its delimiters stay body
    // text, and the stream still terminates cleanly.
    assert!(events.body_lines().iter().any(|l| *l == b"--c"));
    assert!(events.body_lines().iter().any(|l| *l == b"deep body"));
    assert_eq!(events.body_ends, 1);
}

// ─── End-of-input edge cases ────────────────────────────────────────

#[test]
fn test_empty_input() {
    let (events, flags) = parse_bytes(b"", Options::NONE, Limits::default());
    assert!(flags.is_empty());
    assert!(events.headers.is_empty());
    assert_eq!(events.header_ends, 1);
    assert!(events.body.is_empty());
    assert_eq!(events.body_ends, 1);
}

#[test]
fn test_headers_without_body() {
    let (events, flags) = parse_bytes(b"Subject: only\n", Options::NONE, Limits::default());
    assert!(flags.is_empty());
    assert_eq!(events.headers.len(), 1);
    assert_eq!(events.header_ends, 1);
    assert_eq!(events.body_ends, 1);
}

#[test]
fn test_input_ending_mid_line_gets_hard_break() {
    let data = b"Subject: x\n\nbody without newline";
    let (events, _) = parse_bytes(data, Options::NONE, Limits::default());
    assert_eq!(
        events.body_lines(),
        vec![b"body without newline" as &[u8]]
    );
    assert_eq!(events.body_ends, 1);
}

// ─── Error text ─────────────────────────────────────────────────────

#[test]
fn test_error_text_picks_most_serious() {
    let limits = Limits {
        max_depth: 0,
        header_limit: 60,
        ..Limits::default()
    };
    let mut data = Vec::new();
    data.extend_from_slice(b"X-Note: ");
    data.extend_from_slice(&[b'x'; 100]);
    data.extend_from_slice(b"\nContent-Type: multipart/mixed; boundary=x\n\nbody\n");
    let (_, flags) = parse_bytes(&data, Options::REPORT_TRUNC_HEADER, limits);
    assert!(flags.contains(ErrorFlags::NESTING));
    assert!(flags.contains(ErrorFlags::TRUNC_HEADER));
    assert_eq!(flags.error_text(), "MIME nesting exceeds safety limit");
}
