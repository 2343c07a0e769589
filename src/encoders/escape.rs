//! Quoting, escaping and number helpers shared by the encoders
//!
//! Everything here appends to a byte buffer; nothing allocates on the fast
//! paths (plain strings, integers, finite floats).

use crate::core::field::StructuredValue;
use colored::Color;
use std::fmt::{self, Write as _};

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Placeholder written when a `Display` impl fails
pub const DISPLAY_ERROR: &str = "!DISPLAY_ERROR";

/// `fmt::Write` over a byte buffer
///
/// Formatting through `io::Write` turns a failing `Display` impl into a
/// panic; through this adapter the error comes back as a value.
pub struct ByteWriter<'a>(pub &'a mut Vec<u8>);

impl fmt::Write for ByteWriter<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// Append formatted output; on error, partial output is removed
pub fn append_fmt(buf: &mut Vec<u8>, args: fmt::Arguments<'_>) -> fmt::Result {
    let start = buf.len();
    let result = ByteWriter(&mut *buf).write_fmt(args);
    if result.is_err() {
        buf.truncate(start);
    }
    result
}

fn append_display(buf: &mut Vec<u8>, value: &dyn fmt::Display) {
    if append_fmt(buf, format_args!("{}", value)).is_err() {
        eprintln!("[LOGGER WARNING] A Display impl returned an error while encoding a field");
        buf.extend_from_slice(DISPLAY_ERROR.as_bytes());
    }
}

/// Whether `s` must be quoted in output
///
/// True iff some byte is a control character, non-ASCII, a space, a
/// backslash or a double quote. The empty string needs no quoting.
#[inline]
pub fn needs_quote(s: &str) -> bool {
    s.bytes()
        .any(|b| b < 0x20 || b > 0x7e || b == b' ' || b == b'\\' || b == b'"')
}

/// Text-format string value: raw unless [`needs_quote`], then quoted and escaped
pub fn write_text_string(buf: &mut Vec<u8>, s: &str) {
    if needs_quote(s) {
        let _ = append_fmt(buf, format_args!("{:?}", s));
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Text-format message: raw, with line breaks and tabs escaped so one call
/// always produces one line
pub fn write_text_message(buf: &mut Vec<u8>, msg: &str) {
    let bytes = msg.as_bytes();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let escaped: &[u8] = match b {
            b'\n' => b"\\n",
            b'\r' => b"\\r",
            b'\t' => b"\\t",
            _ => continue,
        };
        buf.extend_from_slice(&bytes[start..i]);
        buf.extend_from_slice(escaped);
        start = i + 1;
    }
    buf.extend_from_slice(&bytes[start..]);
}

/// JSON string literal, including the surrounding quotes
pub fn write_json_string(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    if !needs_quote(s) {
        buf.extend_from_slice(s.as_bytes());
    } else {
        let bytes = s.as_bytes();
        let mut start = 0;
        for (i, &b) in bytes.iter().enumerate() {
            let escaped: &[u8] = match b {
                b'"' => b"\\\"",
                b'\\' => b"\\\\",
                b'\n' => b"\\n",
                b'\r' => b"\\r",
                b'\t' => b"\\t",
                0x08 => b"\\b",
                0x0c => b"\\f",
                0x00..=0x1f => {
                    buf.extend_from_slice(&bytes[start..i]);
                    buf.extend_from_slice(b"\\u00");
                    buf.push(HEX[(b >> 4) as usize]);
                    buf.push(HEX[(b & 0xf) as usize]);
                    start = i + 1;
                    continue;
                }
                _ => continue,
            };
            buf.extend_from_slice(&bytes[start..i]);
            buf.extend_from_slice(escaped);
            start = i + 1;
        }
        buf.extend_from_slice(&bytes[start..]);
    }
    buf.push(b'"');
}

/// JSON string literal of anything `Display`
pub fn write_json_display(buf: &mut Vec<u8>, value: &dyn fmt::Display) {
    let start = buf.len();
    append_display(buf, value);
    let rendered = buf.split_off(start);
    write_json_string(buf, &String::from_utf8_lossy(&rendered));
}

/// Text value of anything `Display`, quoted when [`needs_quote`]
pub fn write_text_display(buf: &mut Vec<u8>, value: &dyn fmt::Display) {
    let start = buf.len();
    append_display(buf, value);
    let quote = std::str::from_utf8(&buf[start..]).map(needs_quote).unwrap_or(true);
    if quote {
        let raw = buf.split_off(start);
        write_text_string(buf, &String::from_utf8_lossy(&raw));
    }
}

#[inline]
pub fn write_i64(buf: &mut Vec<u8>, v: i64) {
    let _ = append_fmt(buf, format_args!("{}", v));
}

#[inline]
pub fn write_u64(buf: &mut Vec<u8>, v: u64) {
    let _ = append_fmt(buf, format_args!("{}", v));
}

#[inline]
pub fn write_bool(buf: &mut Vec<u8>, v: bool) {
    let literal: &[u8] = if v { b"true" } else { b"false" };
    buf.extend_from_slice(literal);
}

/// Shortest decimal form, never in exponent notation
#[inline]
pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    let _ = append_fmt(buf, format_args!("{}", v));
}

#[inline]
pub fn write_f32(buf: &mut Vec<u8>, v: f32) {
    let _ = append_fmt(buf, format_args!("{}", v));
}

/// JSON number, or a string for values JSON cannot represent
pub fn write_json_f64(buf: &mut Vec<u8>, v: f64) {
    if v.is_nan() {
        buf.extend_from_slice(b"\"NaN\"");
    } else if v.is_infinite() {
        buf.extend_from_slice(if v > 0.0 { b"\"+Inf\"" } else { b"\"-Inf\"" });
    } else {
        write_f64(buf, v);
    }
}

pub fn write_json_f32(buf: &mut Vec<u8>, v: f32) {
    if v.is_finite() {
        write_f32(buf, v);
    } else {
        write_json_f64(buf, f64::from(v));
    }
}

/// Marshal through serde; on failure write `null` and report to stderr
pub fn write_marshaled(buf: &mut Vec<u8>, value: &dyn StructuredValue, key: &str) {
    let start = buf.len();
    if let Err(e) = value.write_json(buf) {
        buf.truncate(start);
        buf.extend_from_slice(b"null");
        eprintln!(
            "[LOGGER ERROR] Failed to marshal field '{}' ({:?}): {}",
            key, value, e
        );
    }
}

/// Terminal style: an optional foreground color, optionally bold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub color: Option<Color>,
    pub bold: bool,
}

impl Style {
    pub const fn fg(color: Color) -> Self {
        Style {
            color: Some(color),
            bold: false,
        }
    }

    pub const fn bold() -> Self {
        Style {
            color: None,
            bold: true,
        }
    }

    #[must_use]
    pub const fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }
}

/// Append `text` wrapped in ANSI SGR codes, or plain when `no_color`
pub fn write_colored(buf: &mut Vec<u8>, text: &[u8], style: Style, no_color: bool) {
    if no_color {
        buf.extend_from_slice(text);
        return;
    }
    if style.bold {
        buf.extend_from_slice(b"\x1b[1m");
    }
    if let Some(color) = style.color {
        buf.extend_from_slice(b"\x1b[");
        buf.extend_from_slice(color.to_fg_str().as_bytes());
        buf.push(b'm');
    }
    buf.extend_from_slice(text);
    buf.extend_from_slice(b"\x1b[0m");
}
