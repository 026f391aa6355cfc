//! Error types for pipe operations.

use thiserror::Error;

/// Errors returned by [`Channel`](crate::Channel) and [`Handle`](crate::Handle) operations.
///
/// Every error goes back to the immediate caller. Nothing is logged or
/// swallowed internally, and no error leaves the channel in an unusable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipeError {
    /// A non-blocking read found the pipe empty, or a non-blocking write found it full.
    #[error("operation would block")]
    WouldBlock,

    /// A blocking wait was interrupted through its [`CancelToken`](crate::CancelToken).
    #[error("blocking wait was cancelled")]
    Cancelled,

    /// A blocking wait reached its deadline before the pipe became ready.
    #[error("blocking wait timed out")]
    TimedOut,

    /// The ring storage could not be allocated on open.
    #[error("failed to allocate {capacity} bytes of pipe storage")]
    ResourceExhausted {
        /// The configured capacity that could not be allocated.
        capacity: usize,
    },

    /// The call was malformed: bad capacity, bad access mode, or a handle
    /// that is closed or was not opened on this channel.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl PipeError {
    /// Returns `true` if retrying the same call later may succeed.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WouldBlock | Self::Cancelled | Self::TimedOut)
    }

    /// Returns `true` if this error came from an interrupted or expired wait.
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut)
    }
}
