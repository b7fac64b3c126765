use std::fmt;

use super::Session;

/// Errors raised while logging in. Those are fatal, nothing gets captured
/// without a session.
#[derive(thiserror::Error, Debug)]
pub(crate) enum AuthError {
    #[error("store is unavailable: {0}")]
    Unavailable(String),
    #[error("invalid credentials for user '{0}'")]
    InvalidCredentials(String),
    #[error("unexpected login response: {0}")]
    Protocol(String),
}

/// Errors raised while writing an entry.
#[derive(thiserror::Error, Debug)]
pub(crate) enum StoreError {
    #[error("store is unavailable: {0}")]
    Unavailable(String),
    #[error("session token was refused: {0}")]
    Unauthorized(String),
    #[error("store rejected the write ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Login credentials.
#[derive(Clone)]
pub(crate) struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
}

// Keep the password out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Opaque authentication token returned by a successful login.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Token(String);

impl Token {
    pub(crate) fn new(token: String) -> Self {
        Self(token)
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

/// Append-only key/value store. Writes are only ever insertions, entries are
/// never updated nor deleted by cmdtrail.
pub(crate) trait Store: Send {
    /// Exchange credentials for a token.
    fn login(&self, credentials: &Credentials) -> Result<Token, AuthError>;
    /// Write `value` under `key`, authenticated by `session`.
    fn set(&self, session: &Session, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_not_printed() {
        let creds = Credentials {
            username: "immudb".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert!(!format!("{:?}", Token::new("s3cr3t".to_string())).contains("s3cr3t"));
    }
}
