use crate::config::DEFAULT_PIPE_COUNT;
use crate::{Access, Channel, ChannelStatus, Config, Handle, PipeError};
use tracing::debug;

/// Fixed table of independent pipes addressed by index.
///
/// Stands in for a device table keyed by minor number: the glue that maps
/// external names to pipes owns one of these instead of a global array.
#[derive(Debug, Clone)]
pub struct PipeTable {
    channels: Vec<Channel>,
}

impl PipeTable {
    /// Builds `count` channels sharing one configuration.
    pub fn new(count: usize, config: Config) -> Result<Self, PipeError> {
        if count == 0 {
            return Err(PipeError::InvalidArgument("pipe table must hold at least one pipe"));
        }

        let channels = (0..count)
            .map(|_| Channel::new(config))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count, capacity = config.capacity, "created pipe table");
        Ok(Self { channels })
    }

    /// Returns the channel at `index`, if any.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Opens a handle on the pipe at `index`.
    pub fn open(&self, index: usize, access: Access) -> Result<Handle, PipeError> {
        self.get(index)
            .ok_or(PipeError::InvalidArgument("pipe index out of range"))?
            .open(access)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// Status of every pipe, in index order.
    pub fn statuses(&self) -> Vec<ChannelStatus> {
        self.channels.iter().map(Channel::status).collect()
    }
}

impl Default for PipeTable {
    /// Four pipes with the default configuration.
    fn default() -> Self {
        // The default config always validates.
        let config = Config::default();
        debug_assert!(config.validate().is_ok());
        Self {
            channels: (0..DEFAULT_PIPE_COUNT)
                .map(|_| Channel::with_valid_config(config))
                .collect(),
        }
    }
}
