//! Encoder implementations
//!
//! An encoder renders an [`Entry`] into the entry's own byte buffer and
//! hands back a view of it. Encoding has exactly one validated failure: a
//! missing entry.

pub mod escape;
pub mod json;
pub mod text;

pub use escape::needs_quote;
pub use json::JsonEncoder;
pub use text::TextEncoder;

use crate::core::config::{Config, Encoding};
use crate::core::entry::{Entry, EntryFlags};
use crate::core::error::Result;
use crate::core::stack::{self, effective_skip, Depth};
use std::sync::Arc;

pub trait Encoder: Send + Sync {
    /// Render `entry`, appending to its buffer; `None` is rejected with
    /// [`LoggerError::NilEntry`](crate::core::LoggerError::NilEntry)
    fn encode<'e>(&self, entry: Option<&'e mut Entry>) -> Result<&'e [u8]>;

    fn name(&self) -> &'static str;
}

/// Build the encoder selected by `config.encoding`
pub fn from_config(config: &Config) -> Arc<dyn Encoder> {
    match config.encoding {
        Encoding::Text => Arc::new(TextEncoder::new(config.text_encoder.clone())),
        Encoding::Json => Arc::new(JsonEncoder::new(config.json_encoder.clone())),
    }
}

/// Fill in the caller and stacktrace the entry's flags ask for
///
/// Must be called directly from an encoder's `encode`; the skip arithmetic
/// counts this frame.
#[inline(never)]
pub(crate) fn resolve_call_site(entry: &mut Entry, encoder_extra: usize) {
    let want_caller = entry.flags.contains(EntryFlags::CALLER);
    let want_stack = entry.flags.contains(EntryFlags::STACKTRACE);
    if !want_caller && !want_stack {
        return;
    }
    let depth = if want_stack {
        Depth::Full
    } else {
        Depth::FirstFrameOnly
    };
    let trace = stack::capture(effective_skip(entry.caller_skip, encoder_extra), depth);
    if want_caller {
        entry.caller.clear();
        trace.write_caller(&mut entry.caller);
    }
    if want_stack {
        entry.stack.clear();
        trace.format_into(&mut entry.stack);
    }
    trace.release();
}
