//! # Probe
//!
//! Module providing an API to attach probes and to pump the events they emit.

use std::path::PathBuf;

use anyhow::Result;

use crate::{core::events::RawEventSender, helpers::signals::Running};

pub(crate) mod user;

/// Errors raised while setting up a probe. Those are fatal: nothing is
/// captured if a probe can't be installed.
#[derive(thiserror::Error, Debug)]
pub(crate) enum ProbeAttachError {
    #[error("insufficient privileges: {0}")]
    Privilege(String),
    #[error("could not inspect {}: {reason}", path.display())]
    Library { path: PathBuf, reason: String },
    #[error("symbol {symbol} not found in {}", path.display())]
    SymbolNotFound { symbol: String, path: PathBuf },
    #[error("could not load the BPF program: {0}")]
    Load(String),
    #[error("could not attach the return probe to {symbol} ({}): {reason}", path.display())]
    Attach {
        symbol: String,
        path: PathBuf,
        reason: String,
    },
}

/// Trait representing a source of raw events: something that can be attached,
/// pumped for events and detached. We use a trait here so the collection
/// pipeline can be driven without BPF.
pub(crate) trait EventSource {
    /// Install the probe, events being sent to `tx`. The retrieval side is
    /// set up before the probe is installed so no event is produced without
    /// a reader. Events start being produced (and buffered on the kernel
    /// side) once this returns.
    fn attach(&mut self, tx: RawEventSender) -> Result<(), ProbeAttachError>;
    /// Move raw events into the sender given at attach time, until `run`
    /// says to stop. Runs in the calling thread.
    fn pump(&mut self, run: &Running) -> Result<()>;
    /// Remove the probe and release the sender, telling the consumer no
    /// more events will come. Failing to detach is not fatal.
    fn detach(&mut self) -> Result<()>;
}
