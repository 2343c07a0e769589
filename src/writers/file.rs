//! Plain file writer

use super::std_stream::{Discard, StdStream};
use crate::core::config::FileConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::writer::Writer;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Appends to a file, flushing after every line
pub struct FileWriter {
    path: PathBuf,
    name: String,
    writer: Mutex<BufWriter<File>>,
}

impl FileWriter {
    /// Open the sink named by `config.path`
    ///
    /// `"stdout"` and `"stderr"` select the process streams and an empty
    /// path discards output; anything else is opened in append mode.
    pub fn open(config: &FileConfig) -> Result<Arc<dyn Writer>> {
        match config.path.as_str() {
            "stdout" => Ok(Arc::new(StdStream::stdout())),
            "stderr" => Ok(Arc::new(StdStream::stderr())),
            "" => Ok(Arc::new(Discard)),
            path => Ok(Arc::new(Self::create(path)?)),
        }
    }

    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "creating log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation(
                    "opening log file",
                    format!("Failed to open '{}'", path.display()),
                    e,
                )
            })?;

        Ok(Self {
            name: path.display().to_string(),
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Writer for FileWriter {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut writer = self.writer.lock();
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(bytes.len())
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.get_mut().flush() {
            eprintln!(
                "[LOGGER ERROR] Failed to flush '{}' on drop: {}",
                self.path.display(),
                e
            );
        }
    }
}
