//! In-memory store recording every write, for tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use super::{AuthError, Credentials, Session, Store, StoreError, Token};

const MOCK_TOKEN: &str = "mock-token";

#[derive(Default)]
struct Inner {
    fail_login: bool,
    // Writes whose index is >= this one fail.
    fail_from: Option<usize>,
    // Number of upcoming writes failing before writes succeed again.
    transient_failures: AtomicUsize,
    logins: AtomicUsize,
    attempts: AtomicUsize,
    sets: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
}

/// Cloning shares the recorded state, so a test can keep a handle on a store
/// moved into the pipeline.
#[derive(Clone, Default)]
pub(crate) struct MockStore {
    inner: Arc<Inner>,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_login(self) -> Self {
        self.configure(|inner| inner.fail_login = true)
    }

    /// Writes number `n` (starting at 0) and the following ones fail.
    pub(crate) fn fail_from(self, n: usize) -> Self {
        self.configure(|inner| inner.fail_from = Some(n))
    }

    /// The next `n` writes fail, the following ones succeed.
    pub(crate) fn transient_failures(self, n: usize) -> Self {
        self.configure(|inner| inner.transient_failures = AtomicUsize::new(n))
    }

    fn configure<F: FnOnce(&mut Inner)>(mut self, f: F) -> Self {
        f(Arc::get_mut(&mut self.inner).expect("configure the mock before sharing it"));
        self
    }

    pub(crate) fn token(&self) -> Token {
        Token::new(MOCK_TOKEN.to_string())
    }

    pub(crate) fn logins(&self) -> usize {
        self.inner.logins.load(Ordering::SeqCst)
    }

    /// Number of write attempts, successful or not.
    pub(crate) fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Successful writes, in order.
    pub(crate) fn sets(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.inner.sets.lock().unwrap().clone()
    }
}

impl Store for MockStore {
    fn login(&self, credentials: &Credentials) -> Result<Token, AuthError> {
        self.inner.logins.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_login {
            return Err(AuthError::InvalidCredentials(credentials.username.clone()));
        }
        Ok(self.token())
    }

    fn set(&self, session: &Session, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        if session.token().as_str() != MOCK_TOKEN {
            return Err(StoreError::Unauthorized("unknown token".to_string()));
        }
        if matches!(self.inner.fail_from, Some(n) if attempt >= n) {
            return Err(StoreError::Unavailable("mock store is down".to_string()));
        }
        if self
            .inner
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("mock store hiccup".to_string()));
        }

        self.inner
            .sets
            .lock()
            .unwrap()
            .push((key.to_vec(), value.to_vec()));
        Ok(())
    }
}
