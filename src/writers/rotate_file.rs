//! Time-bucketed rotating file writer
//!
//! The active file is rotated whenever the clock's time bucket (the current
//! time formatted with `backup_time_format`, one day by default) differs from
//! the bucket recorded when the file was opened. The old file is renamed to
//! `<stem>-<bucket><ext>.<unix seconds>` and a background worker deletes the
//! oldest backups beyond `max_backups`.
//!
//! All file operations, writes included, happen under one mutex.

use crate::core::config::RotateFileConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::writer::Writer;
use chrono::{DateTime, Local, TimeZone, Utc};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Source of the current time for bucket computation
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Naming scheme shared by the writer and the retention worker
#[derive(Debug, Clone)]
struct BackupNaming {
    dir: PathBuf,
    stem: String,
    ext: String,
    /// The bucket format rendered at a fixed instant; a backup's bucket must
    /// have the same shape
    bucket_sample: Option<String>,
}

#[derive(PartialEq, Eq)]
enum CharClass {
    Digit,
    Alpha,
    Other(u8),
}

fn char_class(b: u8) -> CharClass {
    if b.is_ascii_digit() {
        CharClass::Digit
    } else if b.is_ascii_alphabetic() {
        CharClass::Alpha
    } else {
        CharClass::Other(b)
    }
}

/// Whether `bucket` could have been rendered by the format that rendered
/// `sample`
///
/// Runs of digits and runs of letters match runs of any length, so
/// variable-width fields such as `%s` or `%B` still match; every other byte
/// must be identical.
fn same_shape(sample: &str, bucket: &str) -> bool {
    fn skip_run(bytes: &[u8], class: &CharClass) -> usize {
        bytes.iter().take_while(|&&b| char_class(b) == *class).count()
    }

    let (mut s, mut b) = (sample.as_bytes(), bucket.as_bytes());
    loop {
        match (s.first(), b.first()) {
            (None, None) => return true,
            (Some(&x), Some(&y)) => {
                let class = char_class(x);
                if class != char_class(y) {
                    return false;
                }
                match class {
                    CharClass::Other(_) => {
                        s = &s[1..];
                        b = &b[1..];
                    }
                    _ => {
                        s = &s[skip_run(s, &class)..];
                        b = &b[skip_run(b, &class)..];
                    }
                }
            }
            _ => return false,
        }
    }
}

impl BackupNaming {
    fn new(path: &Path, bucket_format: &str) -> Self {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let bucket_sample = Utc.timestamp_opt(0, 0).single().and_then(|epoch| {
            let mut sample = String::new();
            write!(sample, "{}", epoch.format(bucket_format))
                .ok()
                .map(|_| sample)
        });
        Self {
            dir,
            stem,
            ext,
            bucket_sample,
        }
    }

    fn backup_path(&self, bucket: &str, unix: i64) -> PathBuf {
        self.dir
            .join(format!("{}-{}{}.{}", self.stem, bucket, self.ext, unix))
    }

    /// Embedded unix seconds of a backup file name, if it is one of ours
    fn parse(&self, file_name: &str) -> Option<i64> {
        let rest = file_name.strip_prefix(&self.stem)?.strip_prefix('-')?;
        let (body, unix) = rest.rsplit_once('.')?;
        let bucket = body.strip_suffix(&self.ext)?;
        if unix.is_empty() || !unix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if let Some(sample) = &self.bucket_sample {
            if !same_shape(sample, bucket) {
                return None;
            }
        }
        unix.parse().ok()
    }

    /// Backups sorted oldest to newest
    fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            LoggerError::io_operation(
                "reading log directory",
                format!("can't read log file directory '{}'", self.dir.display()),
                e,
            )
        })?;

        let mut backups: Vec<(i64, String)> = Vec::new();
        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(unix) = self.parse(&name) {
                backups.push((unix, name));
            }
        }
        backups.sort();
        Ok(backups
            .into_iter()
            .map(|(_, name)| self.dir.join(name))
            .collect())
    }

    fn remove_excess(&self, max_backups: usize) {
        if max_backups == 0 {
            return;
        }
        let backups = match self.list() {
            Ok(backups) => backups,
            Err(e) => {
                eprintln!("[LOGGER ERROR] Retention cleanup failed: {}", e);
                return;
            }
        };
        if backups.len() <= max_backups {
            return;
        }
        for old in &backups[..backups.len() - max_backups] {
            if let Err(e) = fs::remove_file(old) {
                eprintln!(
                    "[LOGGER WARNING] Failed to remove old backup {}: {}",
                    old.display(),
                    e
                );
            }
        }
    }
}

struct RetentionWorker {
    tx: Sender<()>,
    handle: JoinHandle<()>,
}

struct RotateState {
    writer: Option<BufWriter<File>>,
    bucket: String,
    retention: Option<RetentionWorker>,
}

/// Rotating file writer
///
/// # Examples
///
/// ```no_run
/// use rust_log_engine::writers::RotateFile;
/// use rust_log_engine::core::RotateFileConfig;
///
/// let file = RotateFile::new(
///     RotateFileConfig::new("/var/log/app.log")
///         .with_max_backups(7)
///         .with_backup_time_format("%Y%m%d"),
/// )
/// .unwrap();
/// ```
pub struct RotateFile {
    config: RotateFileConfig,
    path: PathBuf,
    name: String,
    naming: BackupNaming,
    clock: Arc<dyn Clock>,
    state: Mutex<RotateState>,
}

impl RotateFile {
    pub fn new(config: RotateFileConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create with an injected clock
    pub fn with_clock(mut config: RotateFileConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        if config.backup_time_format.is_empty() {
            config.backup_time_format = crate::core::config::DEFAULT_BACKUP_TIME_FORMAT.to_string();
        }
        let path = if config.filename.is_empty() {
            default_filename()
        } else {
            PathBuf::from(&config.filename)
        };

        let file = Self {
            name: path.display().to_string(),
            naming: BackupNaming::new(&path, &config.backup_time_format),
            path,
            config,
            clock,
            state: Mutex::new(RotateState {
                writer: None,
                bucket: String::new(),
                retention: None,
            }),
        };
        {
            let mut state = file.state.lock();
            file.open_locked(&mut state)?;
        }
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &RotateFileConfig {
        &self.config
    }

    /// Existing backup files, oldest first
    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        self.naming.list()
    }

    fn bucket(&self, now: &DateTime<Utc>) -> Result<String> {
        let mut bucket = String::new();
        let formatted = if self.config.local_time {
            write!(
                bucket,
                "{}",
                now.with_timezone(&Local).format(&self.config.backup_time_format)
            )
        } else {
            write!(bucket, "{}", now.format(&self.config.backup_time_format))
        };
        formatted.map_err(|_| {
            LoggerError::config(
                "rotateFile",
                format!(
                    "invalid backupTimeFormat '{}'",
                    self.config.backup_time_format
                ),
            )
        })?;
        Ok(bucket)
    }

    fn open_locked(&self, state: &mut RotateState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "creating log directory",
                    format!("can't make directories for '{}'", self.path.display()),
                    e,
                )
            })?;
        }
        state.bucket = self.bucket(&self.clock.now())?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                LoggerError::io_operation(
                    "opening log file",
                    format!("Failed to open '{}'", self.path.display()),
                    e,
                )
            })?;
        state.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn close_file_locked(&self, state: &mut RotateState) -> Result<()> {
        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.name.clone(),
                    format!("Failed to flush before close: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn rotate_locked(&self, state: &mut RotateState) -> Result<()> {
        let now = self.clock.now();
        self.close_file_locked(state)?;

        if self.path.is_file() {
            let mut unix = now.timestamp();
            let mut backup = self.naming.backup_path(&state.bucket, unix);
            while backup.exists() {
                unix += 1;
                backup = self.naming.backup_path(&state.bucket, unix);
            }
            fs::rename(&self.path, &backup).map_err(|e| {
                LoggerError::file_rotation(
                    self.name.clone(),
                    format!("can't rename log file to '{}': {}", backup.display(), e),
                )
            })?;
        }

        self.open_locked(state)?;
        self.signal_retention(state);
        Ok(())
    }

    fn signal_retention(&self, state: &mut RotateState) {
        if state.retention.is_none() {
            let (tx, rx) = bounded::<()>(1);
            let naming = self.naming.clone();
            let max_backups = self.config.max_backups.max(0) as usize;
            let spawned = std::thread::Builder::new()
                .name("rotate-file-retention".to_string())
                .spawn(move || {
                    for () in rx.iter() {
                        naming.remove_excess(max_backups);
                    }
                });
            match spawned {
                Ok(handle) => state.retention = Some(RetentionWorker { tx, handle }),
                Err(e) => {
                    eprintln!("[LOGGER ERROR] Failed to start retention worker: {}", e);
                    return;
                }
            }
        }
        if let Some(worker) = &state.retention {
            // A pending signal already covers this rotation.
            if let Err(TrySendError::Disconnected(())) = worker.tx.try_send(()) {
                eprintln!("[LOGGER WARNING] Retention worker for '{}' has stopped", self.name);
            }
        }
    }

    /// Recover from a failed rotation by reopening the active path
    fn try_reopen(&self, state: &mut RotateState) {
        if state.writer.is_none() {
            if let Err(e) = self.open_locked(state) {
                eprintln!(
                    "[LOGGER ERROR] Failed to reopen '{}' after rotation failure: {}",
                    self.name, e
                );
            }
        }
    }

    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();

        if state.writer.is_none() {
            self.open_locked(&mut state)?;
        } else if state.bucket != self.bucket(&self.clock.now())? {
            if let Err(e) = self.rotate_locked(&mut state) {
                eprintln!("[LOGGER WARNING] Rotation of '{}' failed: {}", self.name, e);
                self.try_reopen(&mut state);
                return Err(e);
            }
        }

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("rotate file is not open"))?;
        writer.write_all(bytes)?;
        if !self.config.async_write {
            writer.flush()?;
        }
        Ok(bytes.len())
    }

    pub fn flush(&self) -> Result<()> {
        if let Some(writer) = self.state.lock().writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Rotate now, regardless of the time bucket
    pub fn rotate(&self) -> Result<()> {
        let mut state = self.state.lock();
        let result = self.rotate_locked(&mut state);
        if result.is_err() {
            self.try_reopen(&mut state);
        }
        result
    }

    /// Flush and close the active file and wait for pending retention work
    ///
    /// A later write reopens the file.
    pub fn close(&self) -> Result<()> {
        let (result, retention) = {
            let mut state = self.state.lock();
            (self.close_file_locked(&mut state), state.retention.take())
        };
        if let Some(RetentionWorker { tx, handle }) = retention {
            drop(tx);
            if handle.join().is_err() {
                eprintln!("[LOGGER ERROR] Retention worker for '{}' panicked", self.name);
            }
        }
        result
    }
}

impl Writer for RotateFile {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        RotateFile::write(self, bytes)
    }

    fn flush(&self) -> Result<()> {
        RotateFile::flush(self)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RotateFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] Failed to close '{}': {}", self.name, e);
        }
    }
}

/// `<process name>.log` next to the executable, or in the temp dir
fn default_filename() -> PathBuf {
    let process = std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "app".to_string());
    let name = format!("{}.log", process);
    match std::env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join(&name))
            .unwrap_or_else(|| std::env::temp_dir().join(&name)),
        Err(_) => std::env::temp_dir().join(name),
    }
}
