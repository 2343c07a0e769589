//! Timestamp formatting utilities
//!
//! Provides the configurable timestamp formats used by the encoders.
//! Formats are written straight into an output buffer; numeric formats are
//! rendered as bare integers so the JSON encoder can emit them unquoted.

use super::error::{LoggerError, Result};
use crate::encoders::escape::append_fmt;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Timestamp format options
///
/// Config strings: `"rfc3339"`, `"iso8601"`, `"iso8601micro"`, `"unix"`,
/// `"unixms"`, `"unixmicro"`; anything else non-empty is a strftime pattern.
///
/// # Examples
///
/// ```
/// use rust_log_engine::core::TimestampFormat;
/// use chrono::{TimeZone, Utc};
///
/// let t = Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// assert_eq!(TimestampFormat::Rfc3339.format(&t), "2025-01-08T10:30:45Z");
/// assert_eq!("unix".parse::<TimestampFormat>().unwrap().format(&t), "1736332245");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimestampFormat {
    /// RFC 3339 with second precision: `2025-01-08T10:30:45Z`
    #[default]
    Rfc3339,

    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Unix timestamp in microseconds: `1736332245123456`
    UnixMicros,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    /// Append the formatted timestamp to `buf`
    ///
    /// A custom pattern that chrono cannot render appends nothing and warns
    /// on stderr; [`validate`](Self::validate) catches those up front.
    pub fn append(&self, datetime: &DateTime<Utc>, buf: &mut Vec<u8>) {
        let result = match self {
            TimestampFormat::Rfc3339 => {
                append_fmt(buf, format_args!("{}", datetime.format("%Y-%m-%dT%H:%M:%SZ")))
            }
            TimestampFormat::Iso8601 => append_fmt(
                buf,
                format_args!("{}", datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            ),
            TimestampFormat::Iso8601Micros => append_fmt(
                buf,
                format_args!("{}", datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ")),
            ),
            TimestampFormat::Unix => append_fmt(buf, format_args!("{}", datetime.timestamp())),
            TimestampFormat::UnixMillis => {
                append_fmt(buf, format_args!("{}", datetime.timestamp_millis()))
            }
            TimestampFormat::UnixMicros => {
                append_fmt(buf, format_args!("{}", datetime.timestamp_micros()))
            }
            TimestampFormat::Custom(pattern) => {
                append_fmt(buf, format_args!("{}", datetime.format(pattern)))
            }
        };
        if result.is_err() {
            eprintln!("[LOGGER WARNING] Invalid timestamp format: {:?}", self);
        }
    }

    /// Reject custom patterns containing specifiers chrono does not know
    pub fn validate(&self) -> Result<()> {
        if let TimestampFormat::Custom(pattern) = self {
            validate_strftime("timeFormat", pattern)?;
        }
        Ok(())
    }

    /// Format a `DateTime<Utc>` according to this format
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        let mut buf = Vec::with_capacity(32);
        self.append(datetime, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Check if this is a Unix-based numeric format
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TimestampFormat::Unix | TimestampFormat::UnixMillis | TimestampFormat::UnixMicros
        )
    }

    /// The config string selecting this format
    pub fn as_config_str(&self) -> &str {
        match self {
            TimestampFormat::Rfc3339 => "rfc3339",
            TimestampFormat::Iso8601 => "iso8601",
            TimestampFormat::Iso8601Micros => "iso8601micro",
            TimestampFormat::Unix => "unix",
            TimestampFormat::UnixMillis => "unixms",
            TimestampFormat::UnixMicros => "unixmicro",
            TimestampFormat::Custom(pattern) => pattern,
        }
    }
}

/// Check that every item of a strftime pattern is one chrono can render
pub fn validate_strftime(component: &str, pattern: &str) -> Result<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(LoggerError::config(
            component,
            format!("invalid strftime pattern '{}'", pattern),
        ));
    }
    Ok(())
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_config_str())
    }
}

impl FromStr for TimestampFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "" | "rfc3339" => TimestampFormat::Rfc3339,
            "iso8601" => TimestampFormat::Iso8601,
            "iso8601micro" => TimestampFormat::Iso8601Micros,
            "unix" => TimestampFormat::Unix,
            "unixms" => TimestampFormat::UnixMillis,
            "unixmicro" => TimestampFormat::UnixMicros,
            pattern => TimestampFormat::Custom(pattern.to_string()),
        })
    }
}

impl Serialize for TimestampFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_config_str())
    }
}

impl<'de> Deserialize<'de> for TimestampFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.parse() {
            Ok(format) => Ok(format),
            Err(never) => match never {},
        }
    }
}
