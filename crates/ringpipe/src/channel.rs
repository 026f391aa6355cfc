use crate::invariants::debug_assert_open_count;
use crate::notify::{Event, Subscriber};
use crate::wait::Interruptible;
use crate::{Config, Metrics, MetricsSnapshot, PipeError, RingStore, Wait};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, trace};

// =============================================================================
// LOCKING PROTOCOL
// =============================================================================
//
// One mutex guards the ring store, both open counts and the subscriber map.
// Three condition variables hang off it:
//
// - `readers_waiting`: broadcast after every successful write
// - `writers_waiting`: broadcast after every successful read
// - `pollers`:         broadcast after either, for `poll_wait`
//
// A blocked call always runs the same loop: test the condition under the
// lock, and if it does not hold, check the wait policy (non-blocking,
// cancelled, past deadline) and sleep on the condvar, which releases the
// lock. On wake the lock is re-acquired and the condition re-tested, so
// spurious and stolen wakes are harmless. Wakes are broadcasts: woken callers
// compete for the data or space, with no FIFO fairness among them.
//
// Subscriber callbacks and condvar notifications run after the lock is
// released.
//
// =============================================================================

/// Read/write capabilities requested when opening a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    read: bool,
    write: bool,
}

impl Access {
    pub const READ: Self = Self::new(true, false);
    pub const WRITE: Self = Self::new(false, true);
    pub const READ_WRITE: Self = Self::new(true, true);

    pub const fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }

    #[inline]
    pub const fn can_read(&self) -> bool {
        self.read
    }

    #[inline]
    pub const fn can_write(&self) -> bool {
        self.write
    }
}

/// Readiness of a pipe at one instant, as reported by `poll`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// A read would return data without blocking.
    pub readable: bool,
    /// A write would accept at least one byte without blocking.
    pub writable: bool,
}

/// Which readiness a `poll_wait` caller is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    readable: bool,
    writable: bool,
}

impl Interest {
    pub const READABLE: Self = Self {
        readable: true,
        writable: false,
    };
    pub const WRITABLE: Self = Self {
        readable: false,
        writable: true,
    };
    pub const BOTH: Self = Self {
        readable: true,
        writable: true,
    };
}

impl Readiness {
    /// Returns true if any readiness named in `interest` holds.
    #[inline]
    pub fn satisfies(&self, interest: Interest) -> bool {
        (interest.readable && self.readable) || (interest.writable && self.writable)
    }
}

/// Structured snapshot of a channel's internal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    pub capacity: usize,
    /// Whether ring storage currently exists (some handle is open).
    pub allocated: bool,
    pub read_pos: usize,
    pub write_pos: usize,
    /// Bytes written but not yet read.
    pub resident: usize,
    pub readers: usize,
    pub writers: usize,
    pub subscribers: usize,
}

/// Bounded, blocking byte pipe shared by any number of readers and writers.
///
/// Cloning a `Channel` yields another reference to the same pipe. Data moves
/// through [`Handle`]s obtained from [`open`](Self::open); ring storage is
/// allocated on the first open and released when the last handle closes, so
/// a pipe reopened after a full close starts empty.
///
/// # Example
///
/// ```
/// use ringpipe::{Access, Channel, Config, Wait};
///
/// let channel = Channel::new(Config::new(8, false)).unwrap();
/// let writer = channel.open(Access::WRITE).unwrap();
/// let reader = channel.open(Access::READ).unwrap();
///
/// assert_eq!(writer.write(b"hello", Wait::nonblocking()).unwrap(), 5);
///
/// let mut buf = [0u8; 16];
/// let n = reader.read(&mut buf, Wait::nonblocking()).unwrap();
/// assert_eq!(&buf[..n], b"hello");
/// ```
#[derive(Clone)]
pub struct Channel {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    readers_waiting: Condvar,
    writers_waiting: Condvar,
    pollers: Condvar,
    config: Config,
    metrics: Metrics,
    next_handle_id: AtomicU64,
}

struct State {
    store: Option<RingStore>,
    open_readers: usize,
    open_writers: usize,
    subscribers: BTreeMap<u64, Arc<dyn Subscriber>>,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Reader,
    Writer,
    Poller,
}

impl Channel {
    /// Creates a closed channel. No storage is allocated until the first open.
    ///
    /// Returns `InvalidArgument` if `config.capacity < 2`.
    pub fn new(config: Config) -> Result<Self, PipeError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    /// Builds a channel from a config the caller has already validated.
    pub(crate) fn with_valid_config(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    store: None,
                    open_readers: 0,
                    open_writers: 0,
                    subscribers: BTreeMap::new(),
                }),
                readers_waiting: Condvar::new(),
                writers_waiting: Condvar::new(),
                pollers: Condvar::new(),
                config,
                metrics: Metrics::new(),
                next_handle_id: AtomicU64::new(1),
            }),
        }
    }

    /// Opens a handle with the given capabilities.
    ///
    /// Allocates the ring storage if no handle is currently open. Any number
    /// of readers and writers may be open at once.
    pub fn open(&self, access: Access) -> Result<Handle, PipeError> {
        if !access.can_read() && !access.can_write() {
            return Err(PipeError::InvalidArgument(
                "access must include read or write",
            ));
        }

        let mut state = self.shared.state.lock();
        if state.store.is_none() {
            state.store = Some(RingStore::new(self.shared.config.capacity)?);
            debug!(
                capacity = self.shared.config.capacity,
                "allocated pipe storage"
            );
        }
        if access.can_read() {
            state.open_readers += 1;
        }
        if access.can_write() {
            state.open_writers += 1;
        }
        let (readers, writers) = (state.open_readers, state.open_writers);
        drop(state);

        let id = self.shared.next_handle_id.fetch_add(1, Ordering::Relaxed);
        trace!(handle = id, ?access, readers, writers, "opened pipe handle");

        Ok(Handle {
            shared: Arc::clone(&self.shared),
            id,
            access,
            open: true,
        })
    }

    /// Closes `handle`, which must have been opened on this channel.
    ///
    /// Equivalent to [`Handle::close`] apart from the ownership check.
    pub fn close(&self, handle: &mut Handle) -> Result<(), PipeError> {
        if !Arc::ptr_eq(&self.shared, &handle.shared) {
            return Err(PipeError::InvalidArgument(
                "handle was opened on another channel",
            ));
        }
        handle.close()
    }

    /// Current readiness. Both flags are false while no handle is open.
    pub fn poll(&self) -> Readiness {
        Shared::readiness(&self.shared.state.lock())
    }

    /// Returns the configuration the channel was built with.
    #[inline]
    pub fn config(&self) -> Config {
        self.shared.config
    }

    /// Ring storage size in bytes; one less than this can be buffered.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.config.capacity
    }

    /// Returns a snapshot of cursors, open counts and subscribers.
    pub fn status(&self) -> ChannelStatus {
        let state = self.shared.state.lock();
        let (read_pos, write_pos, resident) = state
            .store
            .as_ref()
            .map_or((0, 0, 0), |s| (s.read_pos(), s.write_pos(), s.len()));

        ChannelStatus {
            capacity: self.shared.config.capacity,
            allocated: state.store.is_some(),
            read_pos,
            write_pos,
            resident,
            readers: state.open_readers,
            writers: state.open_writers,
            subscribers: state.subscribers.len(),
        }
    }

    /// Get a metrics snapshot if enabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        if self.shared.config.enable_metrics {
            self.shared.metrics.snapshot()
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("config", &self.shared.config)
            .field("status", &self.status())
            .finish()
    }
}

impl Shared {
    fn store(state: &State) -> Result<&RingStore, PipeError> {
        state
            .store
            .as_ref()
            .ok_or(PipeError::InvalidArgument("pipe storage is not allocated"))
    }

    fn store_mut(state: &mut State) -> Result<&mut RingStore, PipeError> {
        state
            .store
            .as_mut()
            .ok_or(PipeError::InvalidArgument("pipe storage is not allocated"))
    }

    fn readiness(state: &State) -> Readiness {
        match &state.store {
            Some(store) => Readiness {
                readable: !store.is_empty(),
                writable: store.space_free() > 0,
            },
            None => Readiness::default(),
        }
    }

    fn condvar(&self, side: Side) -> &Condvar {
        match side {
            Side::Reader => &self.readers_waiting,
            Side::Writer => &self.writers_waiting,
            Side::Poller => &self.pollers,
        }
    }

    /// One round of the wait loop: apply the wait policy, then sleep once.
    ///
    /// Returns `Ok(())` after waking; the caller re-tests its condition.
    fn block(
        self: &Arc<Self>,
        state: &mut MutexGuard<'_, State>,
        side: Side,
        wait: &Wait<'_>,
        handle: u64,
    ) -> Result<(), PipeError> {
        if !wait.is_blocking() {
            return Err(PipeError::WouldBlock);
        }

        if let Some(token) = wait.cancel_token() {
            // Register before testing the flag, or a cancel landing in
            // between would find no sleeper to wake.
            let target: Weak<dyn Interruptible> = Arc::<Self>::downgrade(self);
            token.register(target);
            if token.is_cancelled() {
                debug!(handle, ?side, "wait cancelled");
                return Err(PipeError::Cancelled);
            }
        }

        let deadline = wait.deadline();
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!(handle, ?side, "wait timed out");
            return Err(PipeError::TimedOut);
        }

        if self.config.enable_metrics {
            match side {
                Side::Reader => self.metrics.record_read_wait(),
                Side::Writer => self.metrics.record_write_wait(),
                Side::Poller => {}
            }
        }

        trace!(handle, ?side, "going to sleep");
        let condvar = self.condvar(side);
        match deadline {
            // Expiry is reported on the next round, after the condition has
            // been re-tested.
            Some(deadline) => {
                let _ = condvar.wait_until(state, deadline);
            }
            None => condvar.wait(state),
        }
        Ok(())
    }

    fn read(
        self: &Arc<Self>,
        handle: u64,
        buf: &mut [u8],
        wait: &Wait<'_>,
    ) -> Result<usize, PipeError> {
        let mut state = self.state.lock();

        while Self::store(&state)?.is_empty() {
            self.block(&mut state, Side::Reader, wait, handle)?;
        }

        let n = Self::store_mut(&mut state)?.read_into(buf);
        drop(state);

        self.writers_waiting.notify_all();
        self.pollers.notify_all();

        if self.config.enable_metrics {
            self.metrics.record_read(n);
        }
        trace!(handle, bytes = n, "did read");
        Ok(n)
    }

    fn write(
        self: &Arc<Self>,
        handle: u64,
        data: &[u8],
        wait: &Wait<'_>,
    ) -> Result<usize, PipeError> {
        let mut state = self.state.lock();

        while Self::store(&state)?.space_free() == 0 {
            self.block(&mut state, Side::Writer, wait, handle)?;
        }

        let n = Self::store_mut(&mut state)?.write_from(data);
        let targets: Vec<Arc<dyn Subscriber>> = state.subscribers.values().cloned().collect();
        drop(state);

        self.readers_waiting.notify_all();
        self.pollers.notify_all();

        for target in &targets {
            target.notify(Event::Readable);
        }

        if self.config.enable_metrics {
            self.metrics.record_write(n);
            self.metrics.record_notifications(targets.len());
        }
        trace!(handle, bytes = n, subscribers = targets.len(), "did write");
        Ok(n)
    }

    fn poll_wait(
        self: &Arc<Self>,
        handle: u64,
        interest: Interest,
        wait: &Wait<'_>,
    ) -> Result<Readiness, PipeError> {
        let mut state = self.state.lock();
        loop {
            let ready = Self::readiness(&state);
            if ready.satisfies(interest) {
                return Ok(ready);
            }
            self.block(&mut state, Side::Poller, wait, handle)?;
        }
    }

    fn release(&self, handle: u64, access: Access) {
        let mut state = self.state.lock();
        state.subscribers.remove(&handle);

        if access.can_read() {
            debug_assert_open_count!("reader", state.open_readers);
            state.open_readers = state.open_readers.saturating_sub(1);
        }
        if access.can_write() {
            debug_assert_open_count!("writer", state.open_writers);
            state.open_writers = state.open_writers.saturating_sub(1);
        }

        trace!(
            handle,
            readers = state.open_readers,
            writers = state.open_writers,
            "closed pipe handle"
        );
        if state.open_readers + state.open_writers == 0 {
            state.store = None;
            debug!("last handle closed, released pipe storage");
        }
    }
}

impl Interruptible for Shared {
    fn interrupt(&self) {
        let _state = self.state.lock();
        self.readers_waiting.notify_all();
        self.writers_waiting.notify_all();
        self.pollers.notify_all();
    }
}

/// An open reference to a [`Channel`] with fixed read/write capabilities.
///
/// Handles are not `Clone`; each one counts as one open reader and/or
/// writer. A handle may be shared between threads by reference, and all of
/// its data operations take `&self`. Dropping an open handle closes it.
pub struct Handle {
    shared: Arc<Shared>,
    id: u64,
    access: Access,
    open: bool,
}

impl Handle {
    /// Unique id of this handle within its channel.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns the channel this handle was opened on.
    pub fn channel(&self) -> Channel {
        Channel {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Reads up to `buf.len()` bytes.
    ///
    /// Returns as soon as any data is available. A single call never crosses
    /// the ring's wrap boundary, so it may return fewer bytes than are
    /// buffered even when `buf` has room; call again for the rest.
    ///
    /// An empty pipe yields `WouldBlock` under [`Wait::nonblocking`], and
    /// otherwise sleeps until a writer adds data, the wait is cancelled
    /// (`Cancelled`) or its deadline passes (`TimedOut`). An empty `buf`
    /// returns `Ok(0)` immediately.
    pub fn read(&self, buf: &mut [u8], wait: Wait<'_>) -> Result<usize, PipeError> {
        self.ensure_open()?;
        if !self.access.can_read() {
            return Err(PipeError::InvalidArgument("handle lacks read access"));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        self.shared.read(self.id, buf, &wait)
    }

    /// Writes up to `data.len()` bytes, returning how many were accepted.
    ///
    /// Accepts as much as fits in the contiguous free run; like `read`, a
    /// single call never crosses the wrap boundary. A full pipe is handled
    /// per `wait` exactly as an empty one is for `read`. Each successful
    /// write wakes blocked readers and notifies every subscriber. An empty
    /// `data` returns `Ok(0)` immediately without notifying anyone.
    pub fn write(&self, data: &[u8], wait: Wait<'_>) -> Result<usize, PipeError> {
        self.ensure_open()?;
        if !self.access.can_write() {
            return Err(PipeError::InvalidArgument("handle lacks write access"));
        }
        if data.is_empty() {
            return Ok(0);
        }
        self.shared.write(self.id, data, &wait)
    }

    /// Writes all of `data`, looping across the wrap boundary and waiting
    /// between segments according to `wait`.
    ///
    /// If the wait fails after some bytes went in, returns the short count
    /// instead of the error; an error before the first byte is returned as is.
    pub fn write_all(&self, data: &[u8], wait: Wait<'_>) -> Result<usize, PipeError> {
        self.ensure_open()?;
        let mut written = 0;
        while written < data.len() {
            match self.write(&data[written..], wait) {
                Ok(n) => written += n,
                Err(e) if written == 0 => return Err(e),
                Err(e) => {
                    debug!(handle = self.id, written, error = %e, "short write");
                    break;
                }
            }
        }
        Ok(written)
    }

    /// Non-blocking readiness snapshot.
    pub fn poll(&self) -> Result<Readiness, PipeError> {
        self.ensure_open()?;
        Ok(Shared::readiness(&self.shared.state.lock()))
    }

    /// Sleeps until the pipe satisfies `interest`, then returns its readiness.
    pub fn poll_wait(&self, interest: Interest, wait: Wait<'_>) -> Result<Readiness, PipeError> {
        self.ensure_open()?;
        if !interest.readable && !interest.writable {
            return Err(PipeError::InvalidArgument("empty poll interest"));
        }
        self.shared.poll_wait(self.id, interest, &wait)
    }

    /// Registers `target` to be told about every successful write.
    ///
    /// Replaces any earlier subscription of this handle. The subscription
    /// ends when the handle closes.
    pub fn subscribe(&self, target: Arc<dyn Subscriber>) -> Result<(), PipeError> {
        self.ensure_open()?;
        self.shared.state.lock().subscribers.insert(self.id, target);
        trace!(handle = self.id, "subscribed");
        Ok(())
    }

    /// Removes this handle's subscription. Returns false if there was none.
    pub fn unsubscribe(&self) -> Result<bool, PipeError> {
        self.ensure_open()?;
        let removed = self.shared.state.lock().subscribers.remove(&self.id);
        Ok(removed.is_some())
    }

    /// Closes the handle, releasing the ring storage if it was the last one.
    ///
    /// Returns `InvalidArgument` if the handle is already closed.
    pub fn close(&mut self) -> Result<(), PipeError> {
        self.ensure_open()?;
        self.open = false;
        self.shared.release(self.id, self.access);
        Ok(())
    }

    #[inline]
    fn ensure_open(&self) -> Result<(), PipeError> {
        if self.open {
            Ok(())
        } else {
            Err(PipeError::InvalidArgument("handle is closed"))
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            self.shared.release(self.id, self.access);
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("access", &self.access)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}
