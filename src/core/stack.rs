//! Call-site and stack capture
//!
//! Raw program counters are collected with `backtrace::trace` and symbolized
//! with `backtrace::resolve`. Symbolization is the expensive half, so
//! resolved frame lists are cached by a hash of the counter sequence; a cache
//! hit is only trusted after the full sequence compares equal.
//!
//! Skip counting is anchored on this module's own frame rather than on the
//! top of the unwinder's stack, so unwinder-internal frames never shift the
//! result.

use super::pool::{Pool, Poolable, Pooled};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::ffi::c_void;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Library frames between a user call site and [`capture`]:
/// public entry point, `Logger::output`, `Encoder::encode` and the
/// encoder's call-site resolver.
pub const BASE_LIBRARY_FRAMES: usize = 4;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

const DEFAULT_CACHE_ENTRIES: usize = 4096;

/// Skip passed to [`capture`] by an encoder resolving the user's call site
#[inline]
pub fn effective_skip(caller_requested: usize, encoder_extra: usize) -> usize {
    BASE_LIBRARY_FRAMES + caller_requested + encoder_extra
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    /// Only the first frame, for caller annotation
    FirstFrameOnly,
    /// Every remaining frame
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub file: String,
    pub line: u32,
}

/// A captured stack, pooled; dropping it returns it to the pool
#[derive(Debug)]
pub struct StackTrace {
    pcs: Vec<usize>,
    frames: Option<Arc<[Frame]>>,
    depth: Depth,
}

impl Default for StackTrace {
    fn default() -> Self {
        Self {
            pcs: Vec::with_capacity(32),
            frames: None,
            depth: Depth::Full,
        }
    }
}

impl Poolable for StackTrace {
    fn reset(&mut self) {
        self.pcs.clear();
        self.frames = None;
        self.depth = Depth::Full;
    }

    fn retained_bytes(&self) -> usize {
        self.pcs.capacity() * std::mem::size_of::<usize>()
    }
}

impl StackTrace {
    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// Raw program counters, innermost first
    pub fn program_counters(&self) -> &[usize] {
        &self.pcs
    }

    pub fn frames(&self) -> &[Frame] {
        self.frames.as_deref().unwrap_or(&[])
    }

    pub fn first(&self) -> Option<&Frame> {
        self.frames().first()
    }

    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }

    /// Append `function\n\tfile:line` blocks joined by newlines
    pub fn format_into(&self, out: &mut String) {
        for (i, frame) in self.frames().iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&frame.function);
            out.push_str("\n\t");
            out.push_str(&frame.file);
            out.push(':');
            let _ = write!(out, "{}", frame.line);
        }
    }

    pub fn format(&self) -> String {
        let mut out = String::new();
        self.format_into(&mut out);
        out
    }

    /// `file:line` of the first frame, empty when nothing was captured
    pub fn caller_string(&self) -> String {
        let mut out = String::new();
        self.write_caller(&mut out);
        out
    }

    pub fn write_caller(&self, out: &mut String) {
        if let Some(frame) = self.first() {
            out.push_str(&frame.file);
            out.push(':');
            let _ = write!(out, "{}", frame.line);
        }
    }
}

#[derive(Debug)]
struct CachedStack {
    pcs: Box<[usize]>,
    frames: Arc<[Frame]>,
}

/// Resolved frame lists keyed by FNV-1a over the program counters
#[derive(Debug)]
pub struct FrameCache {
    map: DashMap<u64, Vec<CachedStack>>,
    entries: AtomicUsize,
    max_entries: usize,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}

impl FrameCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            map: DashMap::new(),
            entries: AtomicUsize::new(0),
            max_entries,
        }
    }

    pub fn hash(pcs: &[usize]) -> u64 {
        let mut hash = FNV_OFFSET;
        for pc in pcs {
            for b in pc.to_le_bytes() {
                hash ^= u64::from(b);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        hash
    }

    pub fn get(&self, pcs: &[usize]) -> Option<Arc<[Frame]>> {
        self.get_hashed(Self::hash(pcs), pcs)
    }

    fn get_hashed(&self, hash: u64, pcs: &[usize]) -> Option<Arc<[Frame]>> {
        let bucket = self.map.get(&hash)?;
        bucket
            .iter()
            .find(|cached| *cached.pcs == *pcs)
            .map(|cached| Arc::clone(&cached.frames))
    }

    pub fn insert(&self, pcs: &[usize], frames: Arc<[Frame]>) {
        self.insert_hashed(Self::hash(pcs), pcs, frames);
    }

    fn insert_hashed(&self, hash: u64, pcs: &[usize], frames: Arc<[Frame]>) {
        if self.entries.load(Ordering::Relaxed) >= self.max_entries {
            self.clear();
        }
        let mut bucket = self.map.entry(hash).or_default();
        if bucket.iter().any(|cached| *cached.pcs == *pcs) {
            return;
        }
        bucket.push(CachedStack {
            pcs: pcs.into(),
            frames,
        });
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.map.clear();
        self.entries.store(0, Ordering::Relaxed);
    }
}

static STACK_POOL: Lazy<Pool<StackTrace>> = Lazy::new(|| Pool::new(StackTrace::default));
static FRAME_CACHE: Lazy<FrameCache> = Lazy::new(FrameCache::default);

/// The process-wide frame cache used by [`capture`]
pub fn frame_cache() -> &'static FrameCache {
    &FRAME_CACHE
}

/// Capture the stack of the caller
///
/// `skip == 0` reports the function that called `capture`.
#[inline(never)]
pub fn capture(skip: usize, depth: Depth) -> Pooled<'static, StackTrace> {
    let mut trace = STACK_POOL.acquire();
    walk(skip, depth, &mut trace);
    symbolize(&mut trace, Some(&FRAME_CACHE));
    trace
}

/// Like [`capture`], but always symbolizes
#[inline(never)]
pub fn capture_uncached(skip: usize, depth: Depth) -> Pooled<'static, StackTrace> {
    let mut trace = STACK_POOL.acquire();
    walk(skip, depth, &mut trace);
    symbolize(&mut trace, None);
    trace
}

#[inline(never)]
fn walk(skip: usize, depth: Depth, trace: &mut StackTrace) {
    let marker = walk as usize;
    let pcs = &mut trace.pcs;
    pcs.clear();
    trace.depth = depth;

    let mut start = None;
    backtrace::trace(|frame| {
        pcs.push(frame.ip() as usize);
        if start.is_none() && frame.symbol_address() as usize == marker {
            // the next frame is the public capture function
            start = Some(pcs.len() + 1 + skip);
        }
        match (depth, start) {
            (Depth::FirstFrameOnly, Some(s)) => pcs.len() <= s,
            _ => true,
        }
    });

    // Without a marker, assume the unwinder starts at `walk`.
    let start = start.unwrap_or(skip + 2).min(pcs.len());
    pcs.drain(..start);
    if depth == Depth::FirstFrameOnly {
        pcs.truncate(1);
    }
}

fn symbolize(trace: &mut StackTrace, cache: Option<&FrameCache>) {
    if trace.pcs.is_empty() {
        return;
    }
    let hash = FrameCache::hash(&trace.pcs);
    if let Some(cached) = cache.and_then(|c| c.get_hashed(hash, &trace.pcs)) {
        trace.frames = Some(cached);
        return;
    }

    let mut frames = Vec::with_capacity(trace.pcs.len());
    for &pc in &trace.pcs {
        let before = frames.len();
        backtrace::resolve(pc as *mut c_void, |symbol| {
            let function = symbol
                .name()
                .map(|name| format!("{:#}", name))
                .unwrap_or_else(|| format!("{:#x}", pc));
            let file = symbol
                .filename()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            frames.push(Frame {
                function,
                file,
                line: symbol.lineno().unwrap_or(0),
            });
        });
        if frames.len() == before {
            frames.push(Frame {
                function: format!("{:#x}", pc),
                file: "unknown".to_string(),
                line: 0,
            });
        }
    }
    let frames: Arc<[Frame]> = frames.into();
    if let Some(cache) = cache {
        cache.insert_hashed(hash, &trace.pcs, Arc::clone(&frames));
    }
    trace.frames = Some(frames);
}
