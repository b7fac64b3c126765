//! Keys addressing entries in the append-only store.
//!
//! A key is `<namespace>:<unix timestamp in ns>:<short id>`. The timestamp part
//! gives a rough ordering while the random short id keeps keys unique even
//! when two records share the same nanosecond. As the store addresses entries
//! by key, a repeated key would silently shadow a previous entry.

use std::{fmt, str::FromStr};

use uuid::Uuid;

/// Alphabet used for short ids, visually ambiguous characters are left out.
const SHORT_ID_ALPHABET: &[u8; 57] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
/// Length of a short id; 57^22 > 2^128 so any UUID fits.
pub const SHORT_ID_LEN: usize = 22;
/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "bash";

/// Errors raised when parsing a key.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum KeyError {
    #[error("key must have 3 ':' separated parts")]
    Format,
    #[error("invalid timestamp in key: {0}")]
    Timestamp(String),
    #[error("invalid short id in key: {0}")]
    ShortId(String),
}

/// Key of a stored entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub namespace: String,
    /// Wall-clock time, in nanoseconds since the Unix epoch.
    pub timestamp: u64,
    pub id: String,
}

impl EntryKey {
    /// Key bytes as written to the store.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.timestamp, self.id)
    }
}

impl FromStr for EntryKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [namespace, timestamp, id] = parts.as_slice() else {
            return Err(KeyError::Format);
        };
        if namespace.is_empty() {
            return Err(KeyError::Format);
        }

        let timestamp = timestamp
            .parse::<u64>()
            .map_err(|_| KeyError::Timestamp(timestamp.to_string()))?;

        if id.len() != SHORT_ID_LEN || !id.bytes().all(|c| SHORT_ID_ALPHABET.contains(&c)) {
            return Err(KeyError::ShortId(id.to_string()));
        }

        Ok(EntryKey {
            namespace: namespace.to_string(),
            timestamp,
            id: id.to_string(),
        })
    }
}

/// Generates a new key for every record.
#[derive(Clone, Debug)]
pub struct KeyGenerator {
    namespace: String,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KeyGenerator {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Generate a key for a record observed at `timestamp` (ns since the Unix
    /// epoch).
    pub fn generate(&self, timestamp: u64) -> EntryKey {
        EntryKey {
            namespace: self.namespace.clone(),
            timestamp,
            id: short_id(),
        }
    }
}

/// Returns a new random short id: a UUID v4 encoded in base57.
pub fn short_id() -> String {
    encode_base57(Uuid::new_v4().as_u128())
}

fn encode_base57(mut value: u128) -> String {
    let mut out = [SHORT_ID_ALPHABET[0]; SHORT_ID_LEN];

    for slot in out.iter_mut().rev() {
        *slot = SHORT_ID_ALPHABET[(value % 57) as usize];
        value /= 57;
    }

    // The alphabet is ASCII only.
    out.iter().map(|&c| c as char).collect()
}
