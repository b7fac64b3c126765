//! # Configuration
//!
//! cmdtrail takes no command line argument. Its configuration is read from an
//! optional YAML file; every field has a default so an absent file, or a
//! partial one, is fine.
//!
//! ```yaml
//! probe:
//!   library: /usr/lib64/libreadline.so
//!   symbol: readline
//! store:
//!   url: http://127.0.0.1:8080/api
//!   write_retries: 3
//! ```

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

/// Environment variable used to override the configuration file path.
pub(crate) const CONFIG_PATH_ENV: &str = "CMDTRAIL_CONFIG";
/// Configuration file used when `CMDTRAIL_CONFIG` is not set.
pub(crate) const DEFAULT_CONFIG_PATH: &str = "/etc/cmdtrail/config.yaml";

#[derive(thiserror::Error, Debug)]
pub(crate) enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) probe: ProbeConfig,
    pub(crate) channel: ChannelConfig,
    pub(crate) store: StoreConfig,
    pub(crate) key: KeyConfig,
}

/// Where the return probe is attached.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ProbeConfig {
    /// Shared library exporting the line reading function.
    pub(crate) library: PathBuf,
    /// Exported symbol to probe on return.
    pub(crate) symbol: String,
    /// Process to probe, -1 for all processes.
    pub(crate) pid: i32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            library: PathBuf::from("/usr/lib64/libreadline.so"),
            symbol: "readline".to_string(),
            pid: -1,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ChannelConfig {
    /// Number of raw events queued between the probe pump and the consumer.
    /// Events arriving while the queue is full are dropped and counted.
    pub(crate) capacity: usize,
    /// Per-CPU perf buffer size, in pages. Must be a power of two.
    pub(crate) perf_pages: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            perf_pages: 64,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StoreConfig {
    /// Base URL of the store HTTP API.
    pub(crate) url: String,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) connect_timeout_ms: u64,
    pub(crate) timeout_ms: u64,
    /// How many times a failed write is retried before giving up. 0 makes the
    /// first failure fatal.
    pub(crate) write_retries: u32,
    pub(crate) retry_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/api".to_string(),
            username: "immudb".to_string(),
            password: "immudb".to_string(),
            connect_timeout_ms: 5000,
            timeout_ms: 10000,
            write_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl StoreConfig {
    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct KeyConfig {
    /// First part of every stored key.
    pub(crate) namespace: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            namespace: events::DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl Config {
    /// Load the configuration from `CMDTRAIL_CONFIG`, or the default path. A
    /// missing file at the default path means the default configuration; an
    /// explicitly given file must exist.
    pub(crate) fn load() -> Result<Config, ConfigError> {
        match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub(crate) fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub(crate) fn parse(contents: &str) -> Result<Config, ConfigError> {
        // An empty document is a valid, default, configuration.
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.probe.symbol.is_empty() {
            return invalid("probe.symbol can't be empty");
        }
        if self.channel.capacity == 0 {
            return invalid("channel.capacity must be greater than 0");
        }
        if !self.channel.perf_pages.is_power_of_two() {
            return invalid("channel.perf_pages must be a power of two");
        }
        if self.store.url.is_empty() {
            return invalid("store.url can't be empty");
        }
        if self.key.namespace.is_empty() || self.key.namespace.contains(':') {
            return invalid("key.namespace must be non-empty and can't contain ':'");
        }
        Ok(())
    }
}
