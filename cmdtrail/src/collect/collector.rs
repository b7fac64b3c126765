use std::{fmt, thread};

use anyhow::{anyhow, bail, Context, Result};
use events::KeyGenerator;
use log::{debug, info, warn};
use signal_hook::low_level::signal_name;

use super::sink::{consume, ConsumerStats, Sink};
use crate::{
    config::Config,
    core::{events::channel, probe::EventSource},
    helpers::signals::Running,
    store::{Credentials, Session, Store},
};

/// Lifecycle of a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    Idle,
    ProbeAttached,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "idle",
            State::ProbeAttached => "probe attached",
            State::Running => "running",
            State::Draining => "draining",
            State::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Main collector: ties an event source to a store.
///
/// The store session is opened first; if that fails nothing is attached.
/// Then the probe is attached and raw events are pumped, in the calling
/// thread, into a bounded channel drained by a consumer thread doing the
/// decoding and the writes. Collection ends on a termination signal or on the
/// first write failure.
pub(crate) struct Collector<P: EventSource, S: Store + 'static> {
    config: Config,
    source: P,
    // Moved to the consumer once running.
    store: Option<S>,
    state: State,
    run: Running,
}

impl<P: EventSource, S: Store + 'static> Collector<P, S> {
    pub(crate) fn new(config: Config, source: P, store: S, run: Running) -> Self {
        Self {
            config,
            source,
            store: Some(store),
            state: State::Idle,
            run,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, to: State) {
        debug!("Collector: {} -> {to}", self.state);
        self.state = to;
    }

    /// Run the collection until termination. Returns an error if the
    /// collection could not start or if a command could not be stored.
    pub(crate) fn run(&mut self) -> Result<ConsumerStats> {
        if self.state != State::Idle {
            bail!("Collector was already started ({})", self.state);
        }
        let store = self
            .store
            .take()
            .ok_or_else(|| anyhow!("Collector has no store"))?;

        let credentials = Credentials {
            username: self.config.store.username.clone(),
            password: self.config.store.password.clone(),
        };
        let session = match Session::open(&store, &credentials) {
            Ok(session) => session,
            Err(e) => {
                self.transition(State::Stopped);
                return Err(e).context("Could not log in to the store");
            }
        };

        let (tx, rx) = channel(self.config.channel.capacity);
        let overruns = rx.overruns();

        if let Err(e) = self.source.attach(tx) {
            self.transition(State::Stopped);
            return Err(e).context("Could not install the probe");
        }
        self.transition(State::ProbeAttached);

        let user = session.username().to_string();
        let sink = Sink::new(
            store,
            session,
            KeyGenerator::new(&self.config.key.namespace),
        )
        .with_retries(
            self.config.store.write_retries,
            self.config.store.retry_backoff(),
        );
        let run = self.run.clone();
        let consumer = thread::Builder::new()
            .name("consumer".to_string())
            .spawn(move || consume(rx, sink, run));
        let consumer = match consumer {
            Ok(handle) => handle,
            Err(e) => {
                self.stop();
                return Err(e).context("Could not start the consumer thread");
            }
        };

        self.transition(State::Running);
        info!(
            "Collecting commands as '{user}' under the '{}' namespace",
            self.config.key.namespace
        );

        let pumped = self.source.pump(&self.run);

        self.transition(State::Draining);
        // Stop the consumer even if the pump failed on its own.
        if pumped.is_err() {
            self.run.terminate();
        }
        // Detaching releases the sender, letting the consumer finish.
        if let Err(e) = self.source.detach() {
            warn!("Could not detach the probe: {e}");
        }
        let consumed = consumer
            .join()
            .map_err(|_| anyhow!("Consumer thread panicked"));
        self.transition(State::Stopped);

        overruns.report();
        if let Some(sig) = self.run.signal() {
            info!(
                "Collection stopped by {}",
                signal_name(sig).unwrap_or("a signal")
            );
        }

        let stats = consumed??;
        pumped.context("Could not retrieve events")?;

        info!(
            "{} command(s) stored, {} record(s) dropped",
            stats.delivered, stats.dropped
        );
        Ok(stats)
    }

    fn stop(&mut self) {
        self.run.terminate();
        if let Err(e) = self.source.detach() {
            warn!("Could not detach the probe: {e}");
        }
        self.transition(State::Stopped);
    }
}
