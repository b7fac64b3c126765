//! Delivery of decoded commands to the store, and the consumer loop driving
//! decode, key generation and delivery for one record at a time.

use std::{thread, time::Duration};

use anyhow::{Context, Result};
use events::{CommandEvent, EntryKey, KeyGenerator, StoredEntry};
use log::{debug, error, warn};

use crate::{
    core::events::{EventResult, RawEventReceiver},
    helpers::{signals::Running, time::realtime_timestamp},
    store::{Session, Store},
};

/// Timeout when waiting for a new raw event, so termination is noticed.
const CONSUMER_POLL_TIMEOUT_MS: u64 = 200;

/// Writes commands to the store under the authenticated session.
pub(crate) struct Sink<S: Store> {
    store: S,
    session: Session,
    keys: KeyGenerator,
    retries: u32,
    backoff: Duration,
}

impl<S: Store> Sink<S> {
    pub(crate) fn new(store: S, session: Session, keys: KeyGenerator) -> Self {
        Self {
            store,
            session,
            keys,
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Retry failed writes `retries` times, waiting `backoff` in between.
    pub(crate) fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries;
        self.backoff = backoff;
        self
    }

    /// Store a single command. The key is generated once, retries reuse it.
    pub(crate) fn deliver(&self, event: &CommandEvent) -> Result<EntryKey> {
        let value = StoredEntry::from(event).to_bytes()?;
        let key = self.keys.generate(realtime_timestamp()?);
        let raw_key = key.to_bytes();

        let mut attempt = 0;
        loop {
            match self.store.set(&self.session, &raw_key, &value) {
                Ok(()) => return Ok(key),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "Could not store {key} ({e}), retrying ({attempt}/{})",
                        self.retries
                    );
                    thread::sleep(self.backoff);
                }
                Err(e) => return Err(e).with_context(|| format!("Could not store {key}")),
            }
        }
    }
}

/// Records processed by the consumer loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ConsumerStats {
    /// Commands written to the store.
    pub(crate) delivered: u64,
    /// Records dropped because they could not be decoded.
    pub(crate) dropped: u64,
}

/// Consumer loop: pulls raw events until `run` says to stop or all producers
/// are gone, decodes them and delivers the commands. Undecodable records are
/// logged and dropped. A delivery failure is fatal: `run` is terminated so the
/// producer stops too, and the error is returned.
pub(crate) fn consume<S: Store>(
    rx: RawEventReceiver,
    sink: Sink<S>,
    run: Running,
) -> Result<ConsumerStats> {
    let mut stats = ConsumerStats::default();

    while run.running() {
        let data = match rx.next_event(Some(Duration::from_millis(CONSUMER_POLL_TIMEOUT_MS))) {
            EventResult::Event(data) => data,
            EventResult::Timeout => continue,
            EventResult::Closed => break,
        };

        let event = match events::decode(&data) {
            Ok(event) => event,
            Err(e) => {
                error!("Could not decode raw event: {e}");
                stats.dropped += 1;
                continue;
            }
        };

        match sink.deliver(&event) {
            Ok(key) => {
                debug!("{event} stored as {key}");
                stats.delivered += 1;
            }
            Err(e) => {
                run.terminate();
                return Err(e);
            }
        }
    }

    Ok(stats)
}
