//! JSON encoder
//!
//! Each entry becomes one flat JSON object on its own line. Scalars are
//! appended directly; only `FieldValue::Any` goes through serde.

use super::escape;
use super::{resolve_call_site, Encoder};
use crate::core::config::JsonEncoderConfig;
use crate::core::entry::{Entry, EntryFlags};
use crate::core::error::{LoggerError, Result};
use crate::core::field::FieldValue;
use crate::core::timestamp::TimestampFormat;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct JsonEncoder {
    config: JsonEncoderConfig,
}

impl JsonEncoder {
    pub fn new(config: JsonEncoderConfig) -> Self {
        Self { config }
    }

    /// Like [`new`](Self::new), but rejects a time format chrono cannot render
    pub fn try_new(config: JsonEncoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &JsonEncoderConfig {
        &self.config
    }

    fn write_object(&self, entry: &mut Entry) {
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
        let keys = &self.config.keys;

        buf.push(b'{');
        let mut first = true;

        if !self.config.disable_timestamp {
            write_key(buf, &mut first, &keys.time);
            write_time(buf, timestamp, &self.config.time_format);
        }
        write_key(buf, &mut first, &keys.level);
        escape::write_json_string(buf, level.as_str());
        if flags.contains(EntryFlags::SHOW_NAME) && !module.is_empty() {
            write_key(buf, &mut first, &keys.module);
            escape::write_json_string(buf, module);
        }
        if flags.contains(EntryFlags::CALLER) && !caller.is_empty() {
            write_key(buf, &mut first, &keys.caller);
            escape::write_json_string(buf, caller);
        }
        if flags.contains(EntryFlags::STACKTRACE) && !stack.is_empty() {
            write_key(buf, &mut first, &keys.stack);
            escape::write_json_string(buf, stack);
        }
        write_key(buf, &mut first, &keys.message);
        escape::write_json_string(buf, message);

        for field in &fields[..*fields_len] {
            write_key(buf, &mut first, &field.key);
            write_value(buf, &field.value, &field.key, &self.config.time_format);
        }
        buf.extend_from_slice(b"}\n");
    }
}

impl Encoder for JsonEncoder {
    #[inline(never)]
    fn encode<'e>(&self, entry: Option<&'e mut Entry>) -> Result<&'e [u8]> {
        let entry = entry.ok_or(LoggerError::NilEntry)?;
        if self.config.show_module_name {
            entry.set_flag(EntryFlags::SHOW_NAME);
        }
        resolve_call_site(entry, self.config.caller_skip_frame);
        self.write_object(entry);
        Ok(entry.bytes())
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

fn write_key(buf: &mut Vec<u8>, first: &mut bool, name: &str) {
    if !*first {
        buf.push(b',');
    }
    *first = false;
    escape::write_json_string(buf, name);
    buf.push(b':');
}

fn write_time(buf: &mut Vec<u8>, t: &DateTime<Utc>, format: &TimestampFormat) {
    if format.is_numeric() {
        format.append(t, buf);
    } else {
        buf.push(b'"');
        let start = buf.len();
        format.append(t, buf);
        let quote = std::str::from_utf8(&buf[start..])
            .map(escape::needs_quote)
            .unwrap_or(true);
        if quote {
            let raw = buf.split_off(start - 1);
            let rendered = String::from_utf8_lossy(&raw[1..]).into_owned();
            escape::write_json_string(buf, &rendered);
        } else {
            buf.push(b'"');
        }
    }
}

fn write_value(buf: &mut Vec<u8>, value: &FieldValue, key: &str, time_format: &TimestampFormat) {
    match value {
        FieldValue::Null => buf.extend_from_slice(b"null"),
        FieldValue::Bool(b) => escape::write_bool(buf, *b),
        FieldValue::I64(i) => escape::write_i64(buf, *i),
        FieldValue::U64(u) => escape::write_u64(buf, *u),
        FieldValue::F32(f) => escape::write_json_f32(buf, *f),
        FieldValue::F64(f) => escape::write_json_f64(buf, *f),
        FieldValue::Str(s) => escape::write_json_string(buf, s),
        FieldValue::Bytes(b) => escape::write_json_string(buf, &String::from_utf8_lossy(b)),
        FieldValue::Error(e) => escape::write_json_display(buf, e),
        FieldValue::Time(t) => write_time(buf, t, time_format),
        FieldValue::Duration(d) => escape::write_f64(buf, d.as_nanos() as f64 / 1e6),
        FieldValue::Any(v) => escape::write_marshaled(buf, v.as_ref(), key),
    }
}
