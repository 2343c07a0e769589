//! Adapters from `std::io::Write` to [`Writer`]

use crate::core::error::Result;
use crate::core::writer::Writer;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Wraps any `io::Write` behind a mutex
pub struct IoWriter<W: Write + Send> {
    inner: Mutex<W>,
    name: String,
}

impl<W: Write + Send> IoWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_name(inner, "custom")
    }

    pub fn with_name(inner: W, name: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(inner),
            name: name.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W: Write + Send> Writer for IoWriter<W> {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.inner.lock().write_all(bytes)?;
        Ok(bytes.len())
    }

    fn flush(&self) -> Result<()> {
        self.inner.lock().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// In-memory sink; every clone sees the same bytes
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents_string().lines().map(str::to_owned).collect()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.bytes.lock().clear();
    }
}

impl Writer for SharedBuffer {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.bytes.lock().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "buffer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_buffer_clones_share_bytes() {
        let buffer = SharedBuffer::new();
        let clone = buffer.clone();
        clone.write(b"one\n").unwrap();
        buffer.write(b"two\n").unwrap();
        assert_eq!(buffer.lines(), vec!["one", "two"]);
        buffer.clear();
        assert!(clone.is_empty());
    }

    #[test]
    fn test_io_writer() {
        let writer = IoWriter::with_name(Vec::new(), "vec");
        writer.write(b"hello\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.name(), "vec");
        assert_eq!(writer.into_inner(), b"hello\n");
    }
}
