use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe traffic counters for a pipe.
///
/// Reader-side and writer-side counters live on separate cache lines since
/// they are bumped by different threads after the channel lock is released.
#[derive(Debug, Default)]
pub struct Metrics {
    reader: CachePadded<SideCounters>,
    writer: CachePadded<SideCounters>,
    notifications: AtomicU64,
}

#[derive(Debug, Default)]
struct SideCounters {
    bytes: AtomicU64,
    calls: AtomicU64,
    waits: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub reads: u64,
    pub writes: u64,
    /// Number of times a reader went to sleep on an empty pipe.
    pub read_waits: u64,
    /// Number of times a writer went to sleep on a full pipe.
    pub write_waits: u64,
    /// Subscriber notifications delivered.
    pub notifications: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_read(&self, bytes: usize) {
        self.reader.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.reader.calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_write(&self, bytes: usize) {
        self.writer.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.writer.calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_read_wait(&self) {
        self.reader.waits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_write_wait(&self) {
        self.writer.waits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_notifications(&self, count: usize) {
        self.notifications
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_read: self.reader.bytes.load(Ordering::Relaxed),
            bytes_written: self.writer.bytes.load(Ordering::Relaxed),
            reads: self.reader.calls.load(Ordering::Relaxed),
            writes: self.writer.calls.load(Ordering::Relaxed),
            read_waits: self.reader.waits.load(Ordering::Relaxed),
            write_waits: self.writer.waits.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
        }
    }
}
