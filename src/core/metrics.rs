//! Logger metrics for observability
//!
//! Counters shared by every logger bound to the same writer/encoder pair.
//! Hot-path failures never reach the caller, so these counters are how a
//! program (or a test) observes that they happened.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use rust_log_engine::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_logged();
/// metrics.record_write_failure();
///
/// assert_eq!(metrics.total_logged(), 1);
/// assert_eq!(metrics.write_failures(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Entries encoded and written successfully
    total_logged: AtomicU64,

    /// Entries whose sink write failed
    write_failures: AtomicU64,

    /// Entries the encoder rejected
    encode_failures: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            total_logged: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn total_logged(&self) -> u64 {
        self.total_logged.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn encode_failures(&self) -> u64 {
        self.encode_failures.load(Ordering::Relaxed)
    }

    /// Record a successfully logged entry, returning the previous count
    #[inline]
    pub fn record_logged(&self) -> u64 {
        self.total_logged.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_write_failure(&self) -> u64 {
        self.write_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_encode_failure(&self) -> u64 {
        self.encode_failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Failed entries as a percentage (0.0 - 100.0) of all attempts
    ///
    /// Returns 0.0 if nothing has been logged.
    pub fn failure_rate(&self) -> f64 {
        let failed = (self.write_failures() + self.encode_failures()) as f64;
        let total = self.total_logged() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.total_logged.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
        self.encode_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            total_logged: AtomicU64::new(self.total_logged()),
            write_failures: AtomicU64::new(self.write_failures()),
            encode_failures: AtomicU64::new(self.encode_failures()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.total_logged(), 0);
        assert_eq!(metrics.write_failures(), 0);
        assert_eq!(metrics.encode_failures(), 0);
    }

    #[test]
    fn test_record_returns_previous() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.record_write_failure(), 0);
        assert_eq!(metrics.record_write_failure(), 1);
        assert_eq!(metrics.write_failures(), 2);
    }

    #[test]
    fn test_failure_rate() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.failure_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_logged();
        }
        for _ in 0..5 {
            metrics.record_write_failure();
            metrics.record_encode_failure();
        }
        assert!((metrics.failure_rate() - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = LoggerMetrics::new();
        metrics.record_logged();
        let snapshot = metrics.clone();
        metrics.reset();
        assert_eq!(snapshot.total_logged(), 1);
        assert_eq!(metrics.total_logged(), 0);
    }
}
