//! `mimesieve` — a one-pass, bounded-memory MIME structure parser.
//!
//! This crate provides the core library for classifying the records of an
//! internet mail message (RFC 822, RFC 2045/2046) as headers or body content
//! at the correct multipart nesting level, with optional on-the-fly
//! conversion of 8-bit bodies to quoted-printable.
//!
//! The parser never decodes base64 or quoted-printable content, never
//! transcodes character sets, and never rejects malformed mail: structural
//! anomalies are reported as cumulative flags while parsing continues.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
