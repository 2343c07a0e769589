//! # Rust Log Engine
//!
//! A structured, leveled logging engine with pooled entries and zero-copy
//! encoding.
//!
//! ## Features
//!
//! - **Structured fields**: typed key/value pairs, inherited by child loggers
//! - **Text and JSON encoders**: both write straight into a pooled buffer
//! - **Caller and stacktrace capture**: enabled per level, with a frame cache
//! - **Rotating files**: time-bucketed rotation with background retention
//! - **Fan-out**: one logger feeding several sinks, each with its own level
//! - **Per-module configuration**: from code, JSON or YAML
//!
//! ## Example
//!
//! ```
//! use rust_log_engine::prelude::*;
//!
//! let buffer = SharedBuffer::new();
//! let logger = Logger::builder("api")
//!     .encoder(TextEncoder::new(
//!         TextEncoderConfig::new()
//!             .with_disable_timestamp(true)
//!             .with_disable_color(true),
//!     ))
//!     .writer(buffer.clone())
//!     .build();
//!
//! logger
//!     .with_field("request_id", 42)
//!     .info_with("handled", values!["status", 200]);
//! assert_eq!(buffer.contents_string(), "INFO handled request_id=42 status=200\n");
//! ```

pub mod core;
pub mod encoders;
pub mod global;
pub mod macros;
pub mod writers;

pub mod prelude {
    pub use crate::core::{
        field, Config, Configs, Encoding, Field, FieldValue, Fields, JsonEncoderConfig, KeyValues,
        Level, Logger, LoggerBuilder, LoggerError, LoggerMetrics, LoggerRegistry,
        RotateFileConfig, Result, SinkConfig, TextEncoderConfig, TimestampFormat, Writer,
        WriterConfig,
    };
    pub use crate::encoders::{Encoder, JsonEncoder, TextEncoder};
    pub use crate::values;
    pub use crate::writers::{
        Discard, FileWriter, IoWriter, MultiWriter, RotateFile, SharedBuffer, StdStream,
    };
}

pub use crate::core::{
    Config, Configs, Field, FieldValue, Level, Logger, LoggerBuilder, LoggerError, LoggerMetrics,
    LoggerRegistry, Result,
};
pub use encoders::{Encoder, JsonEncoder, TextEncoder};
pub use writers::{MultiWriter, RotateFile, SharedBuffer};
