use std::{borrow::Cow, fmt};

/// A command captured on the return path of the instrumented line reader.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandEvent {
    /// Process id (thread group id) of the shell that read the line.
    pub pid: u32,
    /// Raw command bytes, without the NULL terminator. Bytes are kept as
    /// emitted, no validation is performed.
    pub command: Vec<u8>,
}

impl CommandEvent {
    /// Returns the command as text, replacing invalid UTF-8 sequences.
    pub fn command_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.command)
    }
}

impl fmt::Display for CommandEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.pid, self.command_lossy())
    }
}
