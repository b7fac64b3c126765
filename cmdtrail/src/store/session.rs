use log::info;

use super::{AuthError, Credentials, Store, Token};

/// Authenticated session with the store. Established once at startup and
/// shared, read-only, by every write. There is no token renewal: an expired
/// token makes writes fail.
#[derive(Clone, Debug)]
pub(crate) struct Session {
    username: String,
    token: Token,
}

impl Session {
    /// Performs the single login exchange.
    pub(crate) fn open<S: Store + ?Sized>(
        store: &S,
        credentials: &Credentials,
    ) -> Result<Session, AuthError> {
        let token = store.login(credentials)?;
        info!("Logged in to the store as '{}'", credentials.username);

        Ok(Session {
            username: credentials.username.clone(),
            token,
        })
    }

    pub(crate) fn token(&self) -> &Token {
        &self.token
    }

    pub(crate) fn username(&self) -> &str {
        &self.username
    }
}
