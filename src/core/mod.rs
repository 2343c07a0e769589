//! Core logger types and traits

pub mod config;
pub mod entry;
pub mod error;
pub mod field;
pub mod level;
pub mod logger;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod stack;
pub mod timestamp;
pub mod writer;

pub use config::{
    Config, Configs, Encoding, FileConfig, JsonEncoderConfig, JsonKeys, Part, RotateFileConfig,
    SinkConfig, TextEncoderConfig, WriterConfig, WriterKind, DEFAULT_BACKUP_TIME_FORMAT,
};
pub use entry::{Entry, EntryFlags};
pub use error::{LoggerError, Result};
pub use field::{field, Field, FieldValue, Fields, KeyValues, StructuredValue};
pub use level::{Level, LevelSet};
pub use logger::{Logger, LoggerBuilder};
pub use metrics::LoggerMetrics;
pub use pool::{default_entry_pool, EntryPool, Pool, Poolable, Pooled};
pub use registry::LoggerRegistry;
pub use stack::{capture, Depth, Frame, FrameCache, StackTrace};
pub use timestamp::TimestampFormat;
pub use writer::Writer;
