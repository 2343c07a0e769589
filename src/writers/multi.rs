//! Fan-out writer
//!
//! Delivers every line to several sinks, each optionally behind its own
//! minimum level. One sink failing (or panicking) never keeps the line from
//! the others; each failure is reported on its own.

use crate::core::error::{LoggerError, Result};
use crate::core::level::Level;
use crate::core::writer::Writer;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

struct Sink {
    writer: Arc<dyn Writer>,
    level: Option<Level>,
}

impl Sink {
    fn accepts(&self, level: Option<Level>) -> bool {
        match (level, self.level) {
            (Some(level), Some(min)) => level.is_enabled_for(min),
            _ => true,
        }
    }
}

/// A writer that copies each line to every registered sink
///
/// # Example
/// ```
/// use rust_log_engine::prelude::*;
///
/// let all = SharedBuffer::new();
/// let errors = SharedBuffer::new();
/// let logger = Logger::builder("api")
///     .encoder(TextEncoder::new(
///         TextEncoderConfig::new()
///             .with_disable_timestamp(true)
///             .with_disable_color(true),
///     ))
///     .writer(
///         MultiWriter::new()
///             .with_writer(all.clone())
///             .with_writer_at(Level::Error, errors.clone()),
///     )
///     .build();
///
/// logger.info("started");
/// logger.error("failed");
/// assert_eq!(all.lines(), vec!["INFO started", "ERRO failed"]);
/// assert_eq!(errors.lines(), vec!["ERRO failed"]);
/// ```
#[derive(Default)]
pub struct MultiWriter {
    sinks: Vec<Sink>,
}

impl std::fmt::Debug for MultiWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sinks.iter().map(|s| (s.writer.name(), s.level)))
            .finish()
    }
}

impl MultiWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink receiving every line
    #[must_use]
    pub fn with_writer<W: Writer + 'static>(mut self, writer: W) -> Self {
        self.push(Arc::new(writer), None);
        self
    }

    /// Add a sink receiving only lines at `level` or more severe
    #[must_use]
    pub fn with_writer_at<W: Writer + 'static>(mut self, level: Level, writer: W) -> Self {
        self.push(Arc::new(writer), Some(level));
        self
    }

    pub fn push(&mut self, writer: Arc<dyn Writer>, level: Option<Level>) {
        self.sinks.push(Sink { writer, level });
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Collapse to the simplest equivalent writer: nothing, the lone
    /// unfiltered sink, or the fan-out itself
    pub(crate) fn into_writer(mut self) -> Option<Arc<dyn Writer>> {
        match self.sinks.len() {
            0 => None,
            1 if self.sinks[0].level.is_none() => self.sinks.pop().map(|s| s.writer),
            _ => Some(Arc::new(self)),
        }
    }

    fn fan_out(&self, level: Option<Level>, bytes: &[u8]) -> Result<usize> {
        let mut attempted = 0;
        let mut failed = 0;
        let mut written = 0;

        for (idx, sink) in self.sinks.iter().enumerate() {
            if !sink.accepts(level) {
                continue;
            }
            attempted += 1;
            let result = panic::catch_unwind(AssertUnwindSafe(|| sink.writer.write(bytes)));
            match result {
                Ok(Ok(n)) => written = written.max(n),
                Ok(Err(e)) => {
                    failed += 1;
                    eprintln!(
                        "[LOGGER ERROR] Sink #{} ({}) failed: {}",
                        idx,
                        sink.writer.name(),
                        e
                    );
                }
                Err(_) => {
                    failed += 1;
                    eprintln!(
                        "[LOGGER CRITICAL] Sink #{} ({}) panicked. Other sinks continue to function.",
                        idx,
                        sink.writer.name()
                    );
                }
            }
        }

        if failed > 0 {
            return Err(LoggerError::writer(format!(
                "{} of {} sinks failed",
                failed, attempted
            )));
        }
        Ok(written)
    }
}

impl Writer for MultiWriter {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.fan_out(None, bytes)
    }

    fn write_at(&self, level: Level, bytes: &[u8]) -> Result<usize> {
        self.fan_out(Some(level), bytes)
    }

    /// Flush every sink; the first failure is returned after all were tried
    fn flush(&self) -> Result<()> {
        let mut first_err = None;
        for (idx, sink) in self.sinks.iter().enumerate() {
            if let Err(e) = sink.writer.flush() {
                eprintln!(
                    "[LOGGER ERROR] Sink #{} ({}) failed to flush: {}",
                    idx,
                    sink.writer.name(),
                    e
                );
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn name(&self) -> &str {
        "multi"
    }
}
