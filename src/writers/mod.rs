//! Writer implementations

pub mod file;
pub mod io;
pub mod multi;
pub mod rotate_file;
pub mod std_stream;

pub use file::FileWriter;
pub use io::{IoWriter, SharedBuffer};
pub use multi::MultiWriter;
pub use rotate_file::{Clock, ManualClock, RotateFile, SystemClock};
pub use std_stream::{Discard, StdStream};

use crate::core::config::{WriterConfig, WriterKind};
use crate::core::error::{LoggerError, Result};
use crate::core::writer::Writer;
use std::sync::Arc;

/// Build the writer selected by `config.kind`
pub fn from_config(config: &WriterConfig) -> Result<Arc<dyn Writer>> {
    config.validate()?;
    match config.kind {
        WriterKind::Stdout => Ok(Arc::new(StdStream::stdout())),
        WriterKind::Stderr => Ok(Arc::new(StdStream::stderr())),
        WriterKind::Discard => Ok(Arc::new(Discard)),
        WriterKind::File => FileWriter::open(&config.file),
        WriterKind::RotateFile => Ok(Arc::new(RotateFile::new(config.rotate_file.clone())?)),
        WriterKind::Custom => config
            .custom
            .clone()
            .ok_or_else(|| LoggerError::config("writer", "type 'custom' requires a custom writer")),
        WriterKind::Multi => {
            let mut multi = MultiWriter::new();
            for sink in &config.sinks {
                multi.push(from_config(&sink.writer)?, sink.level);
            }
            Ok(multi.into_writer().unwrap_or_else(|| Arc::new(Discard)))
        }
    }
}
