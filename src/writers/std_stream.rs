//! Process standard streams and the discard sink

use crate::core::error::Result;
use crate::core::writer::Writer;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Stdout,
    Stderr,
}

/// Writes to stdout or stderr, holding the stream lock for each line
#[derive(Debug, Clone, Copy)]
pub struct StdStream {
    target: Target,
}

impl StdStream {
    pub fn stdout() -> Self {
        Self {
            target: Target::Stdout,
        }
    }

    pub fn stderr() -> Self {
        Self {
            target: Target::Stderr,
        }
    }
}

impl Writer for StdStream {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        match self.target {
            Target::Stdout => io::stdout().lock().write_all(bytes)?,
            Target::Stderr => io::stderr().lock().write_all(bytes)?,
        }
        Ok(bytes.len())
    }

    fn flush(&self) -> Result<()> {
        match self.target {
            Target::Stdout => io::stdout().flush()?,
            Target::Stderr => io::stderr().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        match self.target {
            Target::Stdout => "stdout",
            Target::Stderr => "stderr",
        }
    }
}

/// Accepts and drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Writer for Discard {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        Ok(bytes.len())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "discard"
    }
}
