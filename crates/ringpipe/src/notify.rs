//! Asynchronous "data available" notification.

/// Event delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// New bytes were written and can be read.
    Readable,
}

/// A listener told about new data independently of blocking reads.
///
/// Delivery is fire-and-forget: `notify` runs on the writer's thread after
/// the pipe lock is released, so it must not block, and whatever it does
/// with the event never affects the write that triggered it.
pub trait Subscriber: Send + Sync {
    fn notify(&self, event: Event);
}

impl<F> Subscriber for F
where
    F: Fn(Event) + Send + Sync,
{
    #[inline]
    fn notify(&self, event: Event) {
        self(event);
    }
}

/// Forwards events into a channel. A full or disconnected receiver drops the
/// event silently.
impl Subscriber for crossbeam_channel::Sender<Event> {
    #[inline]
    fn notify(&self, event: Event) {
        let _ = self.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_subscriber() {
        let hits = AtomicUsize::new(0);
        let sub = |event: Event| {
            assert_eq!(event, Event::Readable);
            hits.fetch_add(1, Ordering::SeqCst);
        };
        sub.notify(Event::Readable);
        sub.notify(Event::Readable);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_channel_subscriber_drops_when_disconnected() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        tx.notify(Event::Readable);
        // Full: silently dropped
        tx.notify(Event::Readable);
        assert_eq!(rx.try_recv(), Ok(Event::Readable));
        assert!(rx.try_recv().is_err());

        drop(rx);
        tx.notify(Event::Readable);
    }
}
