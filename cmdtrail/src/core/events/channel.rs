//! Bounded conduit moving raw events from the probe pump to the consumer.
//!
//! The producer is never blocked: if the queue is full when a new event
//! arrives, the event is dropped and counted as an overrun. Records lost on
//! the kernel side (perf buffer full) are counted the same way.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError},
        Arc,
    },
    time::Duration,
};

use log::{info, warn};

/// Overrun counters, shared by both ends of the channel.
#[derive(Debug, Default)]
pub(crate) struct Overruns {
    /// Records lost in the kernel before reaching user space.
    kernel: AtomicU64,
    /// Records dropped because the queue to the consumer was full.
    channel: AtomicU64,
}

impl Overruns {
    pub(crate) fn kernel(&self) -> u64 {
        self.kernel.load(Ordering::Relaxed)
    }

    pub(crate) fn channel(&self) -> u64 {
        self.channel.load(Ordering::Relaxed)
    }

    pub(crate) fn total(&self) -> u64 {
        self.kernel() + self.channel()
    }

    fn add_kernel(&self, cpu: i32, count: u64) {
        let prev = self.kernel.fetch_add(count, Ordering::Relaxed);
        if should_warn(prev, prev + count) {
            warn!(
                "{count} event(s) lost on cpu {cpu} ({} lost so far): perf buffer is full",
                prev + count
            );
        }
    }

    fn add_channel(&self) {
        let prev = self.channel.fetch_add(1, Ordering::Relaxed);
        if should_warn(prev, prev + 1) {
            warn!(
                "Event dropped ({} dropped so far): consumer can't keep up",
                prev + 1
            );
        }
    }

    /// Log the totals.
    pub(crate) fn report(&self) {
        if self.total() == 0 {
            return;
        }
        info!(
            "{} event(s) lost in the kernel, {} dropped before processing",
            self.kernel(),
            self.channel()
        );
    }
}

// Warn on the first overrun and then each time the total crosses a power of
// two, not to flood the logs while under pressure.
fn should_warn(prev: u64, total: u64) -> bool {
    prev.checked_ilog2() != total.checked_ilog2()
}

/// Creates a new raw event channel holding at most `capacity` events.
pub(crate) fn channel(capacity: usize) -> (RawEventSender, RawEventReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let overruns = Arc::new(Overruns::default());

    (
        RawEventSender {
            tx,
            overruns: Arc::clone(&overruns),
        },
        RawEventReceiver { rx, overruns },
    )
}

/// Producer side, cheap to clone.
#[derive(Clone)]
pub(crate) struct RawEventSender {
    tx: SyncSender<Vec<u8>>,
    overruns: Arc<Overruns>,
}

impl RawEventSender {
    /// Queue a copy of a raw event, dropping it if the queue is full. Returns
    /// `false` if the event was not queued.
    pub(crate) fn push(&self, data: &[u8]) -> bool {
        match self.tx.try_send(data.to_vec()) {
            Ok(_) => true,
            Err(TrySendError::Full(_)) => {
                self.overruns.add_channel();
                false
            }
            // The consumer is gone, we're shutting down.
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Account for events lost before reaching us.
    pub(crate) fn lost(&self, cpu: i32, count: u64) {
        self.overruns.add_kernel(cpu, count);
    }
}

/// The return value of RawEventReceiver::next_event()
#[derive(Debug, PartialEq)]
pub(crate) enum EventResult {
    /// A raw event was retrieved.
    Event(Vec<u8>),
    /// The timeout went off but a new attempt to retrieve an event might succeed.
    Timeout,
    /// All producers are gone and the queue is empty.
    Closed,
}

/// Consumer side.
pub(crate) struct RawEventReceiver {
    rx: Receiver<Vec<u8>>,
    overruns: Arc<Overruns>,
}

impl RawEventReceiver {
    /// Retrieve the next raw event, in the order they were queued. Blocks
    /// until one is available, the timeout (if any) expires or the channel is
    /// closed.
    pub(crate) fn next_event(&self, timeout: Option<Duration>) -> EventResult {
        match timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(data) => EventResult::Event(data),
                Err(RecvTimeoutError::Timeout) => EventResult::Timeout,
                Err(RecvTimeoutError::Disconnected) => EventResult::Closed,
            },
            None => match self.rx.recv() {
                Ok(data) => EventResult::Event(data),
                Err(_) => EventResult::Closed,
            },
        }
    }

    pub(crate) fn overruns(&self) -> Arc<Overruns> {
        Arc::clone(&self.overruns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Option<Duration> = Some(Duration::from_millis(10));

    #[test]
    fn fifo() {
        let (tx, rx) = channel(4);
        assert!(tx.push(b"one"));
        assert!(tx.push(b"two"));

        assert_eq!(rx.next_event(TIMEOUT), EventResult::Event(b"one".to_vec()));
        assert_eq!(rx.next_event(TIMEOUT), EventResult::Event(b"two".to_vec()));
        assert_eq!(rx.next_event(TIMEOUT), EventResult::Timeout);
    }

    #[test]
    fn full_queue_drops_new_events() {
        let (tx, rx) = channel(2);
        assert!(tx.push(b"1"));
        assert!(tx.push(b"2"));
        assert!(!tx.push(b"3"));
        assert!(!tx.push(b"4"));

        let overruns = rx.overruns();
        assert_eq!(overruns.channel(), 2);
        assert_eq!(overruns.kernel(), 0);

        // Oldest events are kept.
        assert_eq!(rx.next_event(TIMEOUT), EventResult::Event(b"1".to_vec()));
        assert_eq!(rx.next_event(TIMEOUT), EventResult::Event(b"2".to_vec()));
        assert!(tx.push(b"5"));
        assert_eq!(rx.next_event(None), EventResult::Event(b"5".to_vec()));
    }

    #[test]
    fn kernel_losses() {
        let (tx, rx) = channel(1);
        tx.lost(0, 3);
        tx.lost(1, 4);

        assert_eq!(rx.overruns().kernel(), 7);
        assert_eq!(rx.overruns().total(), 7);
    }

    #[test]
    fn closed_after_drain() {
        let (tx, rx) = channel(2);
        let tx2 = tx.clone();
        tx.push(b"last");
        drop(tx);
        drop(tx2);

        assert_eq!(rx.next_event(TIMEOUT), EventResult::Event(b"last".to_vec()));
        assert_eq!(rx.next_event(TIMEOUT), EventResult::Closed);
        assert_eq!(rx.next_event(None), EventResult::Closed);
    }

    #[test]
    fn push_after_consumer_is_gone() {
        let (tx, rx) = channel(2);
        drop(rx);
        assert!(!tx.push(b"x"));
    }

    #[test]
    fn warn_thresholds() {
        assert!(should_warn(0, 1));
        assert!(should_warn(1, 2));
        assert!(!should_warn(2, 3));
        assert!(should_warn(3, 4));
        assert!(!should_warn(4, 7));
        assert!(should_warn(0, 100));
    }
}
