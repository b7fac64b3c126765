use serde::{Deserialize, Serialize};

use crate::CommandEvent;

/// Record persisted in the remote store for each captured command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Process id of the shell.
    pub pid: u32,
    /// Command line, as text.
    pub command: String,
}

impl StoredEntry {
    /// Encode the entry into the bytes written to the store.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode an entry previously written with `to_bytes`.
    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

impl From<&CommandEvent> for StoredEntry {
    fn from(event: &CommandEvent) -> Self {
        StoredEntry {
            pid: event.pid,
            command: event.command_lossy().into_owned(),
        }
    }
}
