//! Main logger implementation
//!
//! A [`Logger`] is an immutable, cheaply clonable handle: a module name,
//! the fields inherited from its parents and a shared binding to an
//! encoder and a writer. Each call runs
//! `level check -> (drop | build entry -> encode -> write)` on the calling
//! thread, using a pooled [`Entry`](super::entry::Entry).

use super::config::Config;
use super::entry::EntryFlags;
use super::error::Result;
use super::field::{Field, FieldValue, KeyValues};
use super::level::{Level, LevelSet};
use super::metrics::LoggerMetrics;
use super::pool::{default_entry_pool, EntryPool};
use super::writer::Writer;
use crate::encoders::{self, Encoder, TextEncoder};
use crate::writers::{self, MultiWriter, StdStream};
use chrono::Utc;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// The writer/encoder pair a logger resolves to, plus everything about it
/// that is decided once at construction
pub(crate) struct Binding {
    writer: Arc<dyn Writer>,
    encoder: Arc<dyn Encoder>,
    level: Level,
    caller_levels: LevelSet,
    stacktrace_levels: LevelSet,
    metrics: Arc<LoggerMetrics>,
    pool: Arc<EntryPool>,
}

impl Binding {
    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            writer: writers::from_config(&config.writer)?,
            encoder: encoders::from_config(config),
            level: config.level,
            caller_levels: config.caller_level_set(),
            stacktrace_levels: config.stacktrace_level_set(),
            metrics: Arc::new(LoggerMetrics::new()),
            pool: default_entry_pool(),
        })
    }
}

enum Message<'a> {
    Str(&'a str),
    Fmt(fmt::Arguments<'a>),
}

#[derive(Clone)]
pub struct Logger {
    module: Arc<str>,
    fields: Arc<[Field]>,
    caller_skip: usize,
    binding: Arc<Binding>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("module", &self.module)
            .field("level", &self.binding.level)
            .field("encoder", &self.binding.encoder.name())
            .field("writer", &self.binding.writer.name())
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl Logger {
    /// Build a logger for `module` from a configuration
    ///
    /// Fails on an invalid configuration or a writer that cannot be opened.
    pub fn new(module: &str, config: &Config) -> Result<Self> {
        let binding = Binding::from_config(config)?;
        Ok(Self::from_binding(module, Arc::new(binding)))
    }

    pub(crate) fn from_binding(module: &str, binding: Arc<Binding>) -> Self {
        Self {
            module: Arc::from(module),
            fields: Arc::from(Vec::new()),
            caller_skip: 0,
            binding,
        }
    }

    /// Create a builder for Logger
    ///
    /// # Example
    /// ```
    /// use rust_log_engine::prelude::*;
    ///
    /// let buffer = SharedBuffer::new();
    /// let logger = Logger::builder("api")
    ///     .level(Level::Debug)
    ///     .writer(buffer.clone())
    ///     .build();
    /// logger.debug("ready");
    /// assert!(buffer.contents_string().contains("ready"));
    /// ```
    #[must_use]
    pub fn builder(module: &str) -> LoggerBuilder {
        LoggerBuilder::new(module)
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn level(&self) -> Level {
        self.binding.level
    }

    /// Fields attached to every entry from this logger
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn enabled(&self, level: Level) -> bool {
        level.is_enabled_for(self.binding.level)
    }

    /// Metrics shared by every logger on the same binding
    pub fn metrics(&self) -> &Arc<LoggerMetrics> {
        &self.binding.metrics
    }

    pub fn flush(&self) -> Result<()> {
        self.binding.writer.flush()
    }

    /// Child logger with one more inherited field
    #[must_use]
    pub fn with_field<K, V>(&self, key: K, value: V) -> Logger
    where
        K: Into<Cow<'static, str>>,
        V: Into<FieldValue>,
    {
        self.child(Field::new(key, value))
    }

    /// Child logger inheriting these fields as well
    #[must_use]
    pub fn with_fields(&self, fields: impl KeyValues) -> Logger {
        self.child(fields)
    }

    /// Child logger from alternating keys and values
    ///
    /// An odd trailing value is dropped.
    #[must_use]
    pub fn with_values(&self, values: impl KeyValues) -> Logger {
        self.child(values)
    }

    fn child(&self, extra: impl KeyValues) -> Logger {
        let mut fields = self.fields.to_vec();
        extra.visit(|key, value| fields.push(Field { key, value }));
        Logger {
            module: Arc::clone(&self.module),
            fields: fields.into(),
            caller_skip: 0,
            binding: Arc::clone(&self.binding),
        }
    }

    /// Report call sites `skip` frames further up
    ///
    /// For wrappers that log on behalf of their own caller.
    #[must_use]
    pub fn with_caller_skip(&self, skip: usize) -> Logger {
        Logger {
            caller_skip: self.caller_skip + skip,
            ..self.clone()
        }
    }

    #[inline(never)]
    pub fn debug(&self, msg: &str) {
        self.output(Level::Debug, Message::Str(msg), ());
    }

    #[inline(never)]
    pub fn info(&self, msg: &str) {
        self.output(Level::Info, Message::Str(msg), ());
    }

    #[inline(never)]
    pub fn warn(&self, msg: &str) {
        self.output(Level::Warning, Message::Str(msg), ());
    }

    #[inline(never)]
    pub fn error(&self, msg: &str) {
        self.output(Level::Error, Message::Str(msg), ());
    }

    /// Log, flush and exit the process with status 1
    ///
    /// Returns without writing or exiting when `Fatal` is suppressed.
    #[inline(never)]
    pub fn fatal(&self, msg: &str) {
        if !self.enabled(Level::Fatal) {
            return;
        }
        self.output(Level::Fatal, Message::Str(msg), ());
        self.exit()
    }

    /// Log, flush and panic with `msg`
    ///
    /// Returns without writing or panicking when `Panic` is suppressed.
    #[inline(never)]
    pub fn panic(&self, msg: &str) {
        if !self.enabled(Level::Panic) {
            return;
        }
        self.output(Level::Panic, Message::Str(msg), ());
        self.raise(format_args!("{}", msg))
    }

    #[inline(never)]
    pub fn debug_with(&self, msg: &str, kv: impl KeyValues) {
        self.output(Level::Debug, Message::Str(msg), kv);
    }

    #[inline(never)]
    pub fn info_with(&self, msg: &str, kv: impl KeyValues) {
        self.output(Level::Info, Message::Str(msg), kv);
    }

    #[inline(never)]
    pub fn warn_with(&self, msg: &str, kv: impl KeyValues) {
        self.output(Level::Warning, Message::Str(msg), kv);
    }

    #[inline(never)]
    pub fn error_with(&self, msg: &str, kv: impl KeyValues) {
        self.output(Level::Error, Message::Str(msg), kv);
    }

    #[inline(never)]
    pub fn fatal_with(&self, msg: &str, kv: impl KeyValues) {
        if !self.enabled(Level::Fatal) {
            return;
        }
        self.output(Level::Fatal, Message::Str(msg), kv);
        self.exit()
    }

    #[inline(never)]
    pub fn panic_with(&self, msg: &str, kv: impl KeyValues) {
        if !self.enabled(Level::Panic) {
            return;
        }
        self.output(Level::Panic, Message::Str(msg), kv);
        self.raise(format_args!("{}", msg))
    }

    /// Log at `level`; enabled `Fatal` and `Panic` calls terminate as their
    /// dedicated methods do
    #[inline(never)]
    pub fn log(&self, level: Level, msg: &str) {
        self.output(level, Message::Str(msg), ());
        self.terminate_if_needed(level, format_args!("{}", msg));
    }

    #[inline(never)]
    pub fn log_with(&self, level: Level, msg: &str, kv: impl KeyValues) {
        self.output(level, Message::Str(msg), kv);
        self.terminate_if_needed(level, format_args!("{}", msg));
    }

    /// Log a message built from format arguments, as the leveled macros do
    ///
    /// The arguments are only rendered when `level` is enabled.
    #[inline(never)]
    pub fn log_fmt(&self, level: Level, args: fmt::Arguments<'_>) {
        self.output(level, Message::Fmt(args), ());
        self.terminate_if_needed(level, args);
    }

    /// Shared body of every entry point
    ///
    /// Must be called directly by the public method the user called; caller
    /// resolution counts exactly one frame between the user and here.
    #[inline(never)]
    fn output<K: KeyValues>(&self, level: Level, message: Message<'_>, kv: K) {
        let binding = &*self.binding;
        if !level.is_enabled_for(binding.level) {
            return;
        }

        let mut entry = binding.pool.acquire();
        entry.set_module(&self.module);
        entry.set_level(level);
        entry.set_timestamp(Utc::now());
        match message {
            Message::Str(msg) => entry.set_message(msg),
            Message::Fmt(args) => entry.write_message_fmt(args),
        }
        entry.extend_fields(&self.fields);
        kv.visit(|key, value| entry.push_field(key, value));
        if binding.caller_levels.contains(level) {
            entry.set_flag(EntryFlags::CALLER);
        }
        if binding.stacktrace_levels.contains(level) {
            entry.set_flag(EntryFlags::STACKTRACE);
        }
        entry.set_caller_skip(self.caller_skip);

        match binding.encoder.encode(Some(&mut *entry)) {
            Ok(bytes) => match binding.writer.write_at(level, bytes) {
                Ok(_) => {
                    binding.metrics.record_logged();
                }
                Err(e) => {
                    binding.metrics.record_write_failure();
                    eprintln!(
                        "[LOGGER ERROR] Failed to write {} entry for module '{}' to {}: {}",
                        level,
                        self.module,
                        binding.writer.name(),
                        e
                    );
                }
            },
            Err(e) => {
                binding.metrics.record_encode_failure();
                eprintln!(
                    "[LOGGER ERROR] Failed to encode {} entry for module '{}' with {} encoder: {}",
                    level,
                    self.module,
                    binding.encoder.name(),
                    e
                );
            }
        }
        entry.release();
    }

    fn flush_before_exit(&self) {
        if let Err(e) = self.binding.writer.flush() {
            eprintln!(
                "[LOGGER ERROR] Failed to flush {} before terminating: {}",
                self.binding.writer.name(),
                e
            );
        }
    }

    fn exit(&self) -> ! {
        self.flush_before_exit();
        std::process::exit(1)
    }

    fn raise(&self, msg: fmt::Arguments<'_>) -> ! {
        self.flush_before_exit();
        panic!("{}", msg)
    }

    fn terminate_if_needed(&self, level: Level, msg: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        match level {
            Level::Fatal => self.exit(),
            Level::Panic => self.raise(msg),
            _ => {}
        }
    }
}

/// Builder for a [`Logger`] wired up in code rather than from a [`Config`]
pub struct LoggerBuilder {
    module: String,
    level: Level,
    encoder: Option<Arc<dyn Encoder>>,
    sinks: MultiWriter,
    caller_levels: LevelSet,
    stacktrace_levels: LevelSet,
    pool: Option<Arc<EntryPool>>,
}

impl LoggerBuilder {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            level: Level::Info,
            encoder: None,
            sinks: MultiWriter::new(),
            caller_levels: LevelSet::EMPTY,
            stacktrace_levels: LevelSet::EMPTY,
            pool: None,
        }
    }

    /// Set minimum log level
    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Defaults to a [`TextEncoder`] with default settings
    #[must_use = "builder methods return a new value"]
    pub fn encoder<E: Encoder + 'static>(mut self, encoder: E) -> Self {
        self.encoder = Some(Arc::new(encoder));
        self
    }

    /// Replace every sink with `writer`; defaults to stdout
    #[must_use = "builder methods return a new value"]
    pub fn writer<W: Writer + 'static>(mut self, writer: W) -> Self {
        self.sinks = MultiWriter::new().with_writer(writer);
        self
    }

    /// Add another sink; every sink receives each line
    #[must_use = "builder methods return a new value"]
    pub fn add_writer<W: Writer + 'static>(mut self, writer: W) -> Self {
        self.sinks.push(Arc::new(writer), None);
        self
    }

    /// Add a sink receiving only lines at `level` or more severe
    #[must_use = "builder methods return a new value"]
    pub fn add_writer_at<W: Writer + 'static>(mut self, level: Level, writer: W) -> Self {
        self.sinks.push(Arc::new(writer), Some(level));
        self
    }

    /// Levels whose entries carry the call site
    #[must_use = "builder methods return a new value"]
    pub fn caller_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.caller_levels = levels.into_iter().collect();
        self
    }

    /// Levels whose entries carry a full stacktrace
    #[must_use = "builder methods return a new value"]
    pub fn stacktrace_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.stacktrace_levels = levels.into_iter().collect();
        self
    }

    /// Use a dedicated entry pool instead of the process-wide one
    #[must_use = "builder methods return a new value"]
    pub fn pool(mut self, pool: Arc<EntryPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Logger {
        let binding = Binding {
            writer: self
                .sinks
                .into_writer()
                .unwrap_or_else(|| Arc::new(StdStream::stdout())),
            encoder: self
                .encoder
                .unwrap_or_else(|| Arc::new(TextEncoder::default())),
            level: self.level,
            caller_levels: self.caller_levels,
            stacktrace_levels: self.stacktrace_levels,
            metrics: Arc::new(LoggerMetrics::new()),
            pool: self.pool.unwrap_or_else(default_entry_pool),
        };
        Logger::from_binding(&self.module, Arc::new(binding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{JsonEncoderConfig, TextEncoderConfig};
    use crate::core::entry::Entry;
    use crate::core::error::LoggerError;
    use crate::encoders::JsonEncoder;
    use crate::values;
    use crate::writers::SharedBuffer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn plain() -> TextEncoder {
        TextEncoder::new(
            TextEncoderConfig::new()
                .with_disable_timestamp(true)
                .with_disable_color(true),
        )
    }

    fn text_logger(level: Level) -> (Logger, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let logger = Logger::builder("test")
            .level(level)
            .encoder(plain())
            .writer(buffer.clone())
            .build();
        (logger, buffer)
    }

    struct CountingEncoder {
        calls: Arc<AtomicUsize>,
    }

    impl Encoder for CountingEncoder {
        fn encode<'e>(&self, entry: Option<&'e mut Entry>) -> Result<&'e [u8]> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let entry = entry.ok_or(LoggerError::NilEntry)?;
            entry.write_str("x\n");
            Ok(entry.bytes())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    struct FailingWriter;

    impl Writer for FailingWriter {
        fn write(&self, _bytes: &[u8]) -> Result<usize> {
            Err(LoggerError::writer("disk full"))
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_basic_line() {
        let (logger, buffer) = text_logger(Level::Info);
        logger.info_with("hello", values!["a", 1, "b", true]);
        assert_eq!(buffer.contents_string(), "INFO hello a=1 b=true\n");
        assert_eq!(logger.metrics().total_logged(), 1);
    }

    #[test]
    fn test_suppressed_levels_never_encode() {
        let calls = Arc::new(AtomicUsize::new(0));
        let buffer = SharedBuffer::new();
        let logger = Logger::builder("gate")
            .level(Level::Warning)
            .encoder(CountingEncoder {
                calls: Arc::clone(&calls),
            })
            .writer(buffer.clone())
            .build();

        logger.debug("no");
        logger.info_with("no", values!["k", 1]);
        logger.log_fmt(Level::Debug, format_args!("{}", "no"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(buffer.is_empty());

        logger.warn("yes");
        logger.error("yes");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!logger.enabled(Level::Info));
        assert!(logger.enabled(Level::Panic));
    }

    #[test]
    fn test_children_inherit_without_mutating_parent() {
        let (logger, buffer) = text_logger(Level::Info);
        let child = logger.with_field("req", 7).with_values(values!["user", "bob"]);
        child.info_with("handled", values!["ms", 12]);
        logger.info("parent");

        assert_eq!(
            buffer.lines(),
            vec!["INFO handled req=7 user=bob ms=12", "INFO parent"]
        );
        assert!(logger.fields().is_empty());
        assert_eq!(child.fields().len(), 2);
    }

    #[test]
    fn test_odd_trailing_value_dropped() {
        let (logger, buffer) = text_logger(Level::Info);
        logger.info_with("odd", values!["a", 1, "dangling"]);
        logger.with_values(values!["x"]).info("child");
        assert_eq!(buffer.lines(), vec!["INFO odd a=1", "INFO child"]);
    }

    #[test]
    fn test_field_map_argument() {
        let (logger, buffer) = text_logger(Level::Info);
        let map = serde_json::json!({"host": "db1"});
        logger.info_with("map", [FieldValue::any(map)]);
        assert_eq!(buffer.contents_string(), "INFO map host=db1\n");
    }

    #[test]
    fn test_log_fmt_renders_arguments() {
        let (logger, buffer) = text_logger(Level::Debug);
        logger.log_fmt(Level::Debug, format_args!("took {}ms", 42));
        assert_eq!(buffer.contents_string(), "DBUG took 42ms\n");
    }

    #[test]
    fn test_write_failure_reported_not_returned() {
        let logger = Logger::builder("io")
            .encoder(plain())
            .writer(FailingWriter)
            .build();
        logger.error("lost");
        logger.info("lost again");
        assert_eq!(logger.metrics().write_failures(), 2);
        assert_eq!(logger.metrics().total_logged(), 0);
    }

    #[test]
    fn test_children_share_metrics() {
        let (logger, _buffer) = text_logger(Level::Info);
        let child = logger.with_field("k", "v");
        child.info("one");
        logger.info("two");
        assert!(Arc::ptr_eq(logger.metrics(), child.metrics()));
        assert_eq!(logger.metrics().total_logged(), 2);
    }

    #[test]
    fn test_panic_writes_then_panics() {
        let (logger, buffer) = text_logger(Level::Info);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            logger.panic_with("giving up", values!["code", 3]);
        }));
        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<String>().unwrap(), "giving up");
        assert_eq!(buffer.contents_string(), "PNIC giving up code=3\n");
    }

    #[test]
    fn test_suppressed_fatal_and_panic_return() {
        // min level Panic suppresses Fatal
        let (logger, buffer) = text_logger(Level::Panic);
        logger.fatal("not fatal here");
        logger.fatal_with("nor here", values!["k", 1]);
        logger.log(Level::Fatal, "or here");
        assert!(buffer.is_empty());
        assert_eq!(logger.metrics().total_logged(), 0);
    }

    #[test]
    fn test_panic_is_never_suppressed_by_level() {
        let (logger, buffer) = text_logger(Level::Panic);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            logger.panic("still raised");
        }));
        assert!(result.is_err());
        assert_eq!(buffer.contents_string(), "PNIC still raised\n");
    }

    #[test]
    fn test_caller_points_at_call_site() {
        let buffer = SharedBuffer::new();
        let logger = Logger::builder("caller")
            .encoder(JsonEncoder::new(
                JsonEncoderConfig::new().with_disable_timestamp(true),
            ))
            .writer(buffer.clone())
            .caller_levels([Level::Info])
            .build();

        let line = line!() + 1;
        logger.info("here");
        let value: serde_json::Value =
            serde_json::from_str(buffer.contents_string().trim_end()).unwrap();
        let caller = value["caller"].as_str().unwrap();
        assert!(
            caller.ends_with(&format!("logger.rs:{}", line)),
            "unexpected caller {}",
            caller
        );
    }

    #[test]
    fn test_fan_out_to_several_sinks() {
        let all = SharedBuffer::new();
        let errors = SharedBuffer::new();
        let logger = Logger::builder("fan")
            .encoder(plain())
            .writer(FailingWriter)
            .add_writer(all.clone())
            .add_writer_at(Level::Error, errors.clone())
            .build();

        logger.info("one");
        logger.error("two");

        assert_eq!(all.contents_string(), "INFO one\nERRO two\n");
        assert_eq!(errors.contents_string(), "ERRO two\n");
        assert_eq!(logger.metrics().write_failures(), 2);
    }

    #[test]
    fn test_new_from_config() {
        let config = Config::new().with_level(Level::Error);
        let logger = Logger::new("cfg", &config).unwrap();
        assert_eq!(logger.level(), Level::Error);
        assert_eq!(logger.module(), "cfg");
    }
}
