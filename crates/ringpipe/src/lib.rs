//! ringpipe - Bounded Blocking Byte Pipe
//!
//! A fixed-capacity circular byte buffer shared by any number of readers and
//! writers, in the style of a character-device pipe.
//!
//! # Key Features
//!
//! - Sentinel-slot ring buffer (`capacity - 1` usable bytes, no length field)
//! - Blocking, non-blocking, cancellable and timed reads and writes
//! - Independent reader and writer wait sets, broadcast wakes
//! - Readiness polling (`poll`, `poll_wait`) for multiplexing callers
//! - Fire-and-forget "data available" notification to subscribers
//! - Storage allocated on first open, released on last close
//!
//! # Example
//!
//! ```
//! use ringpipe::{Access, Channel, Config, PipeError, Wait};
//! use std::thread;
//!
//! let channel = Channel::new(Config::new(8, false)).unwrap();
//! let writer = channel.open(Access::WRITE).unwrap();
//! let reader = channel.open(Access::READ).unwrap();
//!
//! // Seven usable bytes: the eighth write would block.
//! assert_eq!(writer.write(b"ABCDEFG", Wait::nonblocking()), Ok(7));
//! assert_eq!(writer.write(b"H", Wait::nonblocking()), Err(PipeError::WouldBlock));
//!
//! let consumer = thread::spawn(move || {
//!     let mut buf = [0u8; 3];
//!     let n = reader.read(&mut buf, Wait::blocking()).unwrap();
//!     buf[..n].to_vec()
//! });
//! assert_eq!(consumer.join().unwrap(), b"ABC");
//! ```

mod channel;
mod config;
mod error;
mod invariants;
mod metrics;
mod notify;
mod registry;
mod ring;
mod wait;

pub use channel::{Access, Channel, ChannelStatus, Handle, Interest, Readiness};
pub use config::{
    Config, BULK_PIPE_CONFIG, DEFAULT_CAPACITY, DEFAULT_PIPE_COUNT, SMALL_PIPE_CONFIG,
};
pub use error::PipeError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use notify::{Event, Subscriber};
pub use registry::PipeTable;
pub use ring::RingStore;
pub use wait::{CancelToken, Wait};
