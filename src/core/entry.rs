//! The pooled record for one in-flight log call

use super::field::{Field, FieldValue};
use super::level::Level;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::fmt::{self, Write as _};

/// Per-entry option bits, cumulative within one log call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct EntryFlags(u8);

impl EntryFlags {
    pub const EMPTY: EntryFlags = EntryFlags(0);
    pub const NO_COLOR: EntryFlags = EntryFlags(1);
    pub const CALLER: EntryFlags = EntryFlags(1 << 1);
    pub const STACKTRACE: EntryFlags = EntryFlags(1 << 2);
    pub const SHOW_NAME: EntryFlags = EntryFlags(1 << 3);

    #[inline]
    pub fn contains(self, other: EntryFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for EntryFlags {
    type Output = EntryFlags;

    fn bitor(self, rhs: Self) -> Self {
        EntryFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EntryFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One log record
///
/// Entries are handed out by an [`EntryPool`](super::pool::EntryPool),
/// populated by the logger, encoded in place into their own byte buffer and
/// returned to the pool. Field slots and buffers keep their capacity across
/// uses; only the logical lengths are reset.
#[derive(Debug)]
pub struct Entry {
    pub(crate) module: String,
    pub(crate) message: String,
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) fields: Vec<Field>,
    pub(crate) fields_len: usize,
    pub(crate) buf: Vec<u8>,
    pub(crate) caller_skip: usize,
    pub(crate) caller: String,
    pub(crate) stack: String,
    pub(crate) flags: EntryFlags,
}

impl Default for Entry {
    fn default() -> Self {
        Self::new()
    }
}

impl Entry {
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Create an entry with pre-reserved buffer bytes and field slots
    pub fn with_capacity(buf_bytes: usize, fields: usize) -> Self {
        Self {
            module: String::new(),
            message: String::new(),
            level: Level::Info,
            timestamp: Utc::now(),
            fields: Vec::with_capacity(fields),
            fields_len: 0,
            buf: Vec::with_capacity(buf_bytes),
            caller_skip: 0,
            caller: String::new(),
            stack: String::new(),
            flags: EntryFlags::EMPTY,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    /// The fields of the current log call, in insertion order
    pub fn fields(&self) -> &[Field] {
        &self.fields[..self.fields_len]
    }

    /// The encoded bytes
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    pub fn stacktrace(&self) -> &str {
        &self.stack
    }

    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    pub fn caller_skip(&self) -> usize {
        self.caller_skip
    }

    /// Number of field slots that can be filled without reallocating
    pub fn field_capacity(&self) -> usize {
        self.fields.capacity()
    }

    pub fn buf_capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    pub fn set_module(&mut self, module: &str) {
        self.module.clear();
        self.module.push_str(module);
    }

    pub fn set_message(&mut self, message: &str) {
        self.message.clear();
        self.message.push_str(message);
    }

    /// Format the message in place, reusing the message buffer
    pub fn write_message_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.message.clear();
        if self.message.write_fmt(args).is_err() {
            eprintln!("[LOGGER WARNING] A Display impl returned an error while formatting a log message");
        }
    }

    /// Append a field, reusing a released slot when one is available
    pub fn push_field(&mut self, key: Cow<'static, str>, value: FieldValue) {
        if self.fields_len < self.fields.len() {
            let slot = &mut self.fields[self.fields_len];
            slot.key = key;
            slot.value = value;
        } else {
            self.fields.push(Field { key, value });
        }
        self.fields_len += 1;
    }

    pub fn extend_fields(&mut self, fields: &[Field]) {
        for f in fields {
            self.push_field(f.key.clone(), f.value.clone());
        }
    }

    /// Set flag bits; flags are only ever added until the entry is reset
    pub fn set_flag(&mut self, flag: EntryFlags) {
        self.flags |= flag;
    }

    pub fn set_caller(&mut self, caller: &str) {
        self.caller.clear();
        self.caller.push_str(caller);
    }

    pub fn set_caller_skip(&mut self, skip: usize) {
        self.caller_skip = skip;
    }

    #[inline]
    pub fn write_byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    #[inline]
    pub fn write_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    #[inline]
    pub fn write_bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    pub fn buf_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    /// Heap bytes reserved by the buffers and field slots
    pub fn retained_bytes(&self) -> usize {
        self.buf.capacity()
            + self.message.capacity()
            + self.module.capacity()
            + self.caller.capacity()
            + self.stack.capacity()
            + self.fields.capacity() * std::mem::size_of::<Field>()
    }

    /// Clear every logical length while keeping all capacity
    ///
    /// The timestamp goes back to the Unix epoch until the next call sets it.
    ///
    /// Used slots have their values dropped so a released entry holds no
    /// user data.
    pub fn reset(&mut self) {
        self.module.clear();
        self.message.clear();
        self.level = Level::Info;
        self.timestamp = DateTime::<Utc>::default();
        for slot in &mut self.fields[..self.fields_len] {
            slot.key = Cow::Borrowed("");
            slot.value = FieldValue::Null;
        }
        self.fields_len = 0;
        self.buf.clear();
        self.caller_skip = 0;
        self.caller.clear();
        self.stack.clear();
        self.flags = EntryFlags::EMPTY;
    }
}
