/// # Signals
///
/// Shared termination state, observed by the probe pump and the consumer loop,
/// and flipped either by a termination signal or by a fatal error in one of
/// them.
use std::{
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Arc,
    },
    thread,
};

use anyhow::Result;
use log::info;
use signal_hook::{iterator::Signals, low_level::signal_name};

#[derive(Clone)]
pub(crate) struct Running {
    condition: Arc<AtomicBool>,
    // Signal which triggered the termination, 0 if none did.
    signal: Arc<AtomicI32>,
}

impl Running {
    // Create a new Running instance.
    //
    // - Helps handling loops in various threads to synchonize termination.
    // - This instance will also stop upon receiving one of the termination
    //   signals (SIGINT, SIGTERM, SIGQUIT).
    pub(crate) fn new() -> Result<Running> {
        let mut sigs = Signals::new(signal_hook::consts::TERM_SIGNALS)?;

        let run = Self::ignore_signals();
        let condition = Arc::clone(&run.condition);
        let signal = Arc::clone(&run.signal);

        thread::spawn(move || {
            if let Some(sig) = sigs.forever().next() {
                signal.store(sig, Ordering::Relaxed);
                condition.store(true, Ordering::Relaxed);
                info!(
                    "Received {}, terminating...",
                    signal_name(sig).unwrap_or("signal")
                );
            }
        });

        Ok(run)
    }

    // Same as `new()` but without handling termination signals. Termination
    // *must* be manually handled here.
    pub(crate) fn ignore_signals() -> Running {
        Self {
            condition: Arc::new(AtomicBool::new(false)),
            signal: Arc::new(AtomicI32::new(0)),
        }
    }

    pub(crate) fn running(&self) -> bool {
        !self.condition.load(Ordering::Relaxed)
    }

    pub(crate) fn terminate(&self) {
        self.condition.store(true, Ordering::Relaxed);
    }

    /// Returns the signal number that stopped us, if any.
    pub(crate) fn signal(&self) -> Option<i32> {
        match self.signal.load(Ordering::Relaxed) {
            0 => None,
            sig => Some(sig),
        }
    }
}
