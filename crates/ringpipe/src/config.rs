use crate::PipeError;

/// Default ring storage size in bytes (one byte is the sentinel slot).
pub const DEFAULT_CAPACITY: usize = 4000;

/// Default number of channels in a [`PipeTable`](crate::PipeTable).
pub const DEFAULT_PIPE_COUNT: usize = 4;

/// Configuration for a [`Channel`](crate::Channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Ring storage size in bytes. Usable capacity is `capacity - 1`.
    pub capacity: usize,
    /// Enable metrics collection (slight overhead)
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    pub const fn new(capacity: usize, enable_metrics: bool) -> Self {
        Self {
            capacity,
            enable_metrics,
        }
    }

    /// Returns the number of bytes the pipe can hold at once.
    #[inline]
    pub const fn usable_capacity(&self) -> usize {
        self.capacity.saturating_sub(1)
    }

    /// Sets the ring storage size.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Enables or disables metrics collection.
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Checks that the configuration describes a usable pipe.
    ///
    /// A capacity below 2 leaves no room beside the sentinel slot.
    pub fn validate(&self) -> Result<(), PipeError> {
        if self.capacity < 2 {
            return Err(PipeError::InvalidArgument("capacity must be at least 2"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            enable_metrics: false,
        }
    }
}

/// Small pipe for line-at-a-time traffic (256 bytes)
pub const SMALL_PIPE_CONFIG: Config = Config::new(256, false);

/// Large pipe for bulk transfers (64 KiB, metrics on)
pub const BULK_PIPE_CONFIG: Config = Config::new(64 * 1024, true);
