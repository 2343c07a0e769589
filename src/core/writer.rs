//! Writer trait for log output destinations

use super::error::Result;
use super::level::Level;
use std::sync::Arc;

/// A sink for encoded log lines
///
/// Writers take `&self` and are shared between threads; implementations
/// serialize concurrent writes internally. A sink must copy what it needs
/// out of `bytes` before returning, since the buffer goes back to the entry
/// pool right after.
pub trait Writer: Send + Sync {
    fn write(&self, bytes: &[u8]) -> Result<usize>;

    /// Write a line encoded at `level`
    ///
    /// The logger calls this one; sinks that filter by level override it.
    fn write_at(&self, level: Level, bytes: &[u8]) -> Result<usize> {
        let _ = level;
        self.write(bytes)
    }

    fn flush(&self) -> Result<()>;
    fn name(&self) -> &str;
}

impl<W: Writer + ?Sized> Writer for Arc<W> {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }

    fn write_at(&self, level: Level, bytes: &[u8]) -> Result<usize> {
        (**self).write_at(level, bytes)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }

    fn write_at(&self, level: Level, bytes: &[u8]) -> Result<usize> {
        (**self).write_at(level, bytes)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
