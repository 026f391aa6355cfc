//! Blocking policy for a single read/write call, and cooperative cancellation.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Something a blocked caller may be sleeping on.
///
/// `interrupt` must take the same lock the sleeper checks its cancellation
/// flag under, then broadcast, so a wake can never slip in between the
/// flag check and the sleep.
pub(crate) trait Interruptible: Send + Sync {
    fn interrupt(&self);
}

/// How a read or write behaves when the pipe is not ready.
///
/// The default is to block indefinitely.
///
/// # Example
///
/// ```
/// use ringpipe::{CancelToken, Wait};
/// use std::time::Duration;
///
/// let token = CancelToken::new();
/// let wait = Wait::blocking()
///     .with_cancel(&token)
///     .with_timeout(Duration::from_millis(50));
/// assert!(wait.is_blocking());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Wait<'a> {
    blocking: bool,
    cancel: Option<&'a CancelToken>,
    deadline: Option<Instant>,
}

impl<'a> Wait<'a> {
    /// Sleep until the pipe is ready.
    pub const fn blocking() -> Self {
        Self {
            blocking: true,
            cancel: None,
            deadline: None,
        }
    }

    /// Fail with `WouldBlock` instead of sleeping.
    pub const fn nonblocking() -> Self {
        Self {
            blocking: false,
            cancel: None,
            deadline: None,
        }
    }

    /// Blocking wait that can be interrupted through `token`.
    pub fn cancellable(token: &'a CancelToken) -> Self {
        Self::blocking().with_cancel(token)
    }

    /// Attaches a cancellation token.
    pub fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Gives up with `TimedOut` after `timeout` from now.
    ///
    /// A timeout too large to represent is treated as no timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Gives up with `TimedOut` once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    #[inline]
    pub(crate) fn cancel_token(&self) -> Option<&'a CancelToken> {
        self.cancel
    }

    #[inline]
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for Wait<'_> {
    fn default() -> Self {
        Self::blocking()
    }
}

/// Cloneable flag that aborts blocking pipe calls.
///
/// Cancellation is cooperative: a blocked call notices the flag when it is
/// woken and returns `PipeError::Cancelled` without touching the buffer.
/// Calls that find the pipe ready never look at the token.
///
/// A token stays cancelled until [`reset`](Self::reset) is called.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    /// Pipes that have had a caller sleep under this token.
    sleepers: Mutex<Vec<Weak<dyn Interruptible>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every caller blocked under this token.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);

        // Upgrade under the token lock, interrupt after releasing it: the
        // interrupt takes the pipe lock, and sleepers register while holding it.
        let targets: Vec<Arc<dyn Interruptible>> = {
            let mut sleepers = self.inner.sleepers.lock();
            sleepers.retain(|w| w.strong_count() > 0);
            sleepers.iter().filter_map(Weak::upgrade).collect()
        };

        tracing::debug!(targets = targets.len(), "cancel token fired");
        for target in targets {
            target.interrupt();
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Clears the flag so the token can be reused.
    pub fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    /// Records `target` so a later `cancel` wakes callers sleeping on it.
    pub(crate) fn register(&self, target: Weak<dyn Interruptible>) {
        let mut sleepers = self.inner.sleepers.lock();
        sleepers.retain(|w| w.strong_count() > 0);
        if !sleepers.iter().any(|w| Weak::ptr_eq(w, &target)) {
            sleepers.push(target);
        }
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.inner.sleepers.lock().len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingTarget(AtomicUsize);

    impl Interruptible for CountingTarget {
        fn interrupt(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_wait_defaults_to_blocking() {
        let wait = Wait::default();
        assert!(wait.is_blocking());
        assert!(wait.cancel_token().is_none());
        assert!(wait.deadline().is_none());
        assert!(!Wait::nonblocking().is_blocking());
    }

    #[test]
    fn test_wait_builders() {
        let token = CancelToken::new();
        let wait = Wait::cancellable(&token).with_timeout(Duration::from_secs(1));
        assert!(wait.is_blocking());
        assert!(wait.cancel_token().is_some());
        assert!(wait.deadline().is_some());

        let huge = Wait::blocking().with_timeout(Duration::MAX);
        assert!(huge.deadline().is_none());
    }

    #[test]
    fn test_cancel_and_reset() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        clone.cancel();
        assert!(token.is_cancelled());

        token.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn test_cancel_interrupts_registered_targets() {
        let token = CancelToken::new();
        let target = Arc::new(CountingTarget(AtomicUsize::new(0)));
        let weak: Weak<dyn Interruptible> = Arc::<CountingTarget>::downgrade(&target);

        token.register(weak.clone());
        token.register(weak);
        assert_eq!(token.registered(), 1);

        token.cancel();
        assert_eq!(target.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dead_targets_are_pruned() {
        let token = CancelToken::new();
        {
            let target = Arc::new(CountingTarget(AtomicUsize::new(0)));
            let weak: Weak<dyn Interruptible> = Arc::<CountingTarget>::downgrade(&target);
            token.register(weak);
        }
        token.cancel();
        assert_eq!(token.registered(), 0);
    }
}
