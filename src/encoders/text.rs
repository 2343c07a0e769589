//! Human-readable text encoder
//!
//! One line per entry: the configured parts separated by single spaces,
//! then ` key=value` for every field, then (when requested) the stacktrace
//! on the following lines.

use super::escape::{self, Style};
use super::{resolve_call_site, Encoder};
use crate::core::config::{Part, TextEncoderConfig};
use crate::core::entry::{Entry, EntryFlags};
use crate::core::error::{LoggerError, Result};
use crate::core::field::FieldValue;
use crate::core::level::Level;
use crate::core::timestamp::TimestampFormat;
use colored::Color;

const LEVEL_TOKENS: [&str; 6] = ["PNIC", "FATA", "ERRO", "WARN", "INFO", "DBUG"];

#[derive(Debug, Clone)]
pub struct TextEncoder {
    config: TextEncoderConfig,
}

impl Default for TextEncoder {
    fn default() -> Self {
        Self::new(TextEncoderConfig::default())
    }
}

impl TextEncoder {
    pub fn new(mut config: TextEncoderConfig) -> Self {
        if config.parts_order.is_empty() {
            config.parts_order = Part::default_order();
        }
        Self { config }
    }

    /// Like [`new`](Self::new), but rejects a time format chrono cannot render
    pub fn try_new(config: TextEncoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &TextEncoderConfig {
        &self.config
    }

    fn write_line(&self, entry: &mut Entry) {
        let Entry {
            module,
            message,
            level,
            timestamp,
            fields,
            fields_len,
            buf,
            caller,
            stack,
            flags,
            ..
        } = entry;
        let no_color = flags.contains(EntryFlags::NO_COLOR);

        let mut first = true;
        for part in &self.config.parts_order {
            let emit = match part {
                Part::Time => !self.config.disable_timestamp,
                Part::Level => true,
                Part::Name => flags.contains(EntryFlags::SHOW_NAME) && !module.is_empty(),
                Part::Caller => flags.contains(EntryFlags::CALLER) && !caller.is_empty(),
                // The stacktrace itself goes after the fields.
                Part::Stack => false,
                Part::Message => !message.is_empty(),
            };
            if !emit {
                continue;
            }
            if !first {
                buf.push(b' ');
            }
            first = false;

            match part {
                Part::Time => self.config.time_format.append(timestamp, buf),
                Part::Level => write_level(buf, *level, no_color),
                Part::Name => buf.extend_from_slice(module.as_bytes()),
                Part::Caller => {
                    escape::write_colored(buf, caller.as_bytes(), Style::bold(), no_color)
                }
                Part::Stack => {}
                Part::Message => escape::write_text_message(buf, message),
            }
        }

        for field in &fields[..*fields_len] {
            buf.push(b' ');
            if no_color {
                buf.extend_from_slice(field.key.as_bytes());
                buf.push(b'=');
            } else {
                buf.extend_from_slice(b"\x1b[");
                buf.extend_from_slice(Color::Cyan.to_fg_str().as_bytes());
                buf.push(b'm');
                buf.extend_from_slice(field.key.as_bytes());
                buf.extend_from_slice(b"=\x1b[0m");
            }
            write_value(buf, &field.value, &field.key, &self.config.time_format);
        }

        if flags.contains(EntryFlags::STACKTRACE) && !stack.is_empty() {
            buf.push(b'\n');
            buf.extend_from_slice(stack.as_bytes());
        }
        buf.push(b'\n');
    }
}

impl Encoder for TextEncoder {
    #[inline(never)]
    fn encode<'e>(&self, entry: Option<&'e mut Entry>) -> Result<&'e [u8]> {
        let entry = entry.ok_or(LoggerError::NilEntry)?;
        if self.config.disable_color {
            entry.set_flag(EntryFlags::NO_COLOR);
        }
        if self.config.show_module_name {
            entry.set_flag(EntryFlags::SHOW_NAME);
        }
        resolve_call_site(entry, self.config.caller_skip_frame);
        self.write_line(entry);
        Ok(entry.bytes())
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

fn write_level(buf: &mut Vec<u8>, level: Level, no_color: bool) {
    let token = LEVEL_TOKENS[level as usize];
    let style = Style::fg(level.color_code()).with_bold(level.is_bold());
    escape::write_colored(buf, token.as_bytes(), style, no_color);
}

fn write_value(buf: &mut Vec<u8>, value: &FieldValue, key: &str, time_format: &TimestampFormat) {
    match value {
        FieldValue::Null => buf.extend_from_slice(b"null"),
        FieldValue::Bool(b) => escape::write_bool(buf, *b),
        FieldValue::I64(i) => escape::write_i64(buf, *i),
        FieldValue::U64(u) => escape::write_u64(buf, *u),
        FieldValue::F32(f) => escape::write_f32(buf, *f),
        FieldValue::F64(f) => escape::write_f64(buf, *f),
        FieldValue::Str(s) => escape::write_text_string(buf, s),
        FieldValue::Bytes(b) => escape::write_text_string(buf, &String::from_utf8_lossy(b)),
        FieldValue::Error(e) => escape::write_text_display(buf, e),
        FieldValue::Time(t) => time_format.append(t, buf),
        FieldValue::Duration(d) => escape::write_text_display(buf, &format_args!("{:?}", d)),
        FieldValue::Any(v) => escape::write_marshaled(buf, v.as_ref(), key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::FieldValue;
    use std::time::Duration;

    fn plain() -> TextEncoder {
        TextEncoder::new(
            TextEncoderConfig::new()
                .with_disable_timestamp(true)
                .with_disable_color(true),
        )
    }

    fn encode_to_string(encoder: &TextEncoder, entry: &mut Entry) -> String {
        String::from_utf8(encoder.encode(Some(entry)).unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_nil_entry() {
        let err = plain().encode(None).unwrap_err();
        assert!(matches!(err, LoggerError::NilEntry));
    }

    #[test]
    fn test_basic_line() {
        let mut entry = Entry::new();
        entry.set_message("hello");
        entry.push_field("a".into(), FieldValue::from(1));
        entry.push_field("b".into(), FieldValue::from(true));
        assert_eq!(encode_to_string(&plain(), &mut entry), "INFO hello a=1 b=true\n");
    }

    #[test]
    fn test_no_fields_no_trailing_separator() {
        let mut entry = Entry::new();
        entry.set_level(Level::Warning);
        entry.set_message("careful");
        assert_eq!(encode_to_string(&plain(), &mut entry), "WARN careful\n");
    }

    #[test]
    fn test_skipped_last_part_leaves_no_space() {
        let encoder = TextEncoder::new(
            TextEncoderConfig::new()
                .with_disable_color(true)
                .with_disable_timestamp(true)
                .with_parts_order(vec![Part::Level, Part::Message, Part::Caller]),
        );
        let mut entry = Entry::new();
        entry.set_message("x");
        assert_eq!(encode_to_string(&encoder, &mut entry), "INFO x\n");
    }

    #[test]
    fn test_level_tokens() {
        let expected = ["PNIC", "FATA", "ERRO", "WARN", "INFO", "DBUG"];
        for (level, token) in Level::ALL.iter().zip(expected) {
            let mut entry = Entry::new();
            entry.set_level(*level);
            assert_eq!(encode_to_string(&plain(), &mut entry), format!("{}\n", token));
        }
    }

    #[test]
    fn test_quoting_and_value_types() {
        let mut entry = Entry::new();
        entry.set_message("m");
        entry.push_field("s".into(), FieldValue::from("two words"));
        entry.push_field("raw".into(), FieldValue::from("plain"));
        entry.push_field("f".into(), FieldValue::from(2.5));
        entry.push_field("d".into(), FieldValue::from(Duration::from_millis(150)));
        entry.push_field("n".into(), FieldValue::Null);
        assert_eq!(
            encode_to_string(&plain(), &mut entry),
            "INFO m s=\"two words\" raw=plain f=2.5 d=150ms n=null\n"
        );
    }

    #[test]
    fn test_message_line_breaks_escaped() {
        let mut entry = Entry::new();
        entry.set_message("first\nERRO forged");
        assert_eq!(
            encode_to_string(&plain(), &mut entry),
            "INFO first\\nERRO forged\n"
        );
    }

    #[test]
    fn test_colors() {
        let encoder = TextEncoder::new(TextEncoderConfig::new().with_disable_timestamp(true));
        let mut entry = Entry::new();
        entry.set_level(Level::Error);
        entry.set_message("boom");
        entry.push_field("k".into(), FieldValue::from(1));
        assert_eq!(
            encode_to_string(&encoder, &mut entry),
            "\x1b[31mERRO\x1b[0m boom \x1b[36mk=\x1b[0m1\n"
        );
    }

    #[test]
    fn test_entry_no_color_flag() {
        let encoder = TextEncoder::new(TextEncoderConfig::new().with_disable_timestamp(true));
        let mut entry = Entry::new();
        entry.set_flag(EntryFlags::NO_COLOR);
        entry.set_message("quiet");
        assert_eq!(encode_to_string(&encoder, &mut entry), "INFO quiet\n");
    }

    #[test]
    fn test_module_name_and_timestamp() {
        use chrono::TimeZone;
        let encoder = TextEncoder::new(
            TextEncoderConfig::new()
                .with_disable_color(true)
                .with_show_module_name(true)
                .with_time_format(TimestampFormat::Unix),
        );
        let mut entry = Entry::new();
        entry.set_timestamp(chrono::Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap());
        entry.set_module("db");
        entry.set_message("connected");
        assert_eq!(
            encode_to_string(&encoder, &mut entry),
            "1736332245 INFO db connected\n"
        );
    }

    #[derive(Debug)]
    struct Unprintable;

    impl std::fmt::Display for Unprintable {
        fn fmt(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            Err(std::fmt::Error)
        }
    }

    impl std::error::Error for Unprintable {}

    #[test]
    fn test_failing_error_display_does_not_panic() {
        let mut entry = Entry::new();
        entry.set_message("oops");
        entry.push_field("err".into(), FieldValue::error(Unprintable));
        entry.push_field("after".into(), FieldValue::from(1));
        assert_eq!(
            encode_to_string(&plain(), &mut entry),
            format!("INFO oops err={} after=1\n", escape::DISPLAY_ERROR)
        );
    }

    #[test]
    fn test_invalid_time_format() {
        let config = TextEncoderConfig::new()
            .with_disable_color(true)
            .with_time_format(TimestampFormat::Custom("%Q".to_string()));
        assert!(matches!(
            TextEncoder::try_new(config.clone()),
            Err(LoggerError::InvalidConfiguration { .. })
        ));

        let mut entry = Entry::new();
        entry.set_message("still written");
        let line = encode_to_string(&TextEncoder::new(config), &mut entry);
        assert!(line.ends_with("INFO still written\n"), "got {:?}", line);
    }
}
