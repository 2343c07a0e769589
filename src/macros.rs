//! Logging macros for ergonomic log message formatting.
//!
//! The leveled macros take a logger and `format!`-style arguments. The
//! message is only formatted when the level is enabled.
//!
//! # Examples
//!
//! ```
//! use rust_log_engine::prelude::*;
//! use rust_log_engine::{info, values};
//!
//! let buffer = SharedBuffer::new();
//! let logger = Logger::builder("server").writer(buffer.clone()).build();
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! logger.info_with("request", values!["path", "/health", "status", 200]);
//! assert_eq!(buffer.lines().len(), 2);
//! ```

/// Build an alternating key/value argument list
///
/// Every element is converted with `FieldValue::from`.
///
/// ```
/// use rust_log_engine::values;
/// use rust_log_engine::core::FieldValue;
///
/// let kv = values!["user", "bob", "attempts", 3];
/// assert!(matches!(kv[3], FieldValue::I64(3)));
/// ```
#[macro_export]
macro_rules! values {
    () => {{
        let empty: [$crate::core::FieldValue; 0] = [];
        empty
    }};
    ($($value:expr),+ $(,)?) => {
        [$($crate::core::FieldValue::from($value)),+]
    };
}

/// Log a formatted message at the given level.
///
/// # Examples
///
/// ```
/// # use rust_log_engine::prelude::*;
/// # let logger = Logger::builder("doc").writer(Discard).build();
/// use rust_log_engine::log;
/// log!(logger, Level::Info, "Simple message");
/// log!(logger, Level::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log_fmt($level, ::std::format_args!($($arg)+))
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_engine::prelude::*;
/// # let logger = Logger::builder("doc").level(Level::Debug).writer(Discard).build();
/// use rust_log_engine::debug;
/// debug!(logger, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_fmt($crate::core::Level::Debug, ::std::format_args!($($arg)+))
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_fmt($crate::core::Level::Info, ::std::format_args!($($arg)+))
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_fmt($crate::core::Level::Warning, ::std::format_args!($($arg)+))
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_engine::prelude::*;
/// # let logger = Logger::builder("doc").writer(Discard).build();
/// use rust_log_engine::error;
/// error!(logger, "Failed to open {}: {}", "config.yaml", "not found");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_fmt($crate::core::Level::Error, ::std::format_args!($($arg)+))
    };
}

/// Log a fatal-level message, flush and exit the process with status 1.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_fmt($crate::core::Level::Fatal, ::std::format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{FieldValue, Level, Logger, TextEncoderConfig};
    use crate::encoders::TextEncoder;
    use crate::writers::SharedBuffer;

    fn logger(buffer: &SharedBuffer) -> Logger {
        Logger::builder("macros")
            .level(Level::Debug)
            .encoder(TextEncoder::new(
                TextEncoderConfig::new()
                    .with_disable_timestamp(true)
                    .with_disable_color(true),
            ))
            .writer(buffer.clone())
            .build()
    }

    #[test]
    fn test_values_converts_each_element() {
        let kv = values!["a", 1u8, "b", 2.5, "c", None::<i32>];
        assert_eq!(kv.len(), 6);
        assert!(matches!(kv[1], FieldValue::U64(1)));
        assert!(kv[5].is_null());
        let empty = values![];
        assert!(empty.is_empty());
    }

    #[test]
    fn test_leveled_macros() {
        let buffer = SharedBuffer::new();
        let logger = logger(&buffer);
        debug!(logger, "d {}", 1);
        info!(logger, "i");
        warn!(logger, "w {}", "x");
        error!(logger, "e {:?}", Some(2));
        log!(logger, Level::Info, "l {}", 5);

        assert_eq!(
            buffer.lines(),
            vec!["DBUG d 1", "INFO i", "WARN w x", "ERRO e Some(2)", "INFO l 5"]
        );
    }
}
