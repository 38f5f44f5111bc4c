// Store configuration models

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::helpers::{database_from_uri, redact_uri_password, validate_mongodb_uri};

const ENV_PREFIX: &str = "CMDB_MONGO_";

/// Connection settings for the replica set backing the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URI; its path segment names the database.
    pub uri: String,
    /// Replica set name. Transactions need one, so an empty value is rejected.
    #[serde(default)]
    pub rs_name: String,
    #[serde(default = "default_max_open_conns")]
    pub max_open_conns: u32,
    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound for a single database round trip.
    #[serde(default = "default_socket_timeout_secs")]
    pub socket_timeout_secs: u64,
    #[serde(default)]
    pub app_name: Option<String>,
    /// Refuse servers older than 4.2.0.
    #[serde(default = "default_check_version")]
    pub check_version: bool,
}

fn default_max_open_conns() -> u32 {
    100
}

fn default_max_idle_conns() -> u32 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_socket_timeout_secs() -> u64 {
    10
}

fn default_check_version() -> bool {
    true
}

impl StoreConfig {
    pub fn new(uri: impl Into<String>, rs_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            rs_name: rs_name.into(),
            max_open_conns: default_max_open_conns(),
            max_idle_conns: default_max_idle_conns(),
            connect_timeout_secs: default_connect_timeout_secs(),
            socket_timeout_secs: default_socket_timeout_secs(),
            app_name: None,
            check_version: default_check_version(),
        }
    }

    /// Load a JSON5 configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: StoreConfig = json5::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Build the configuration from `CMDB_MONGO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let uri = lookup("URI").context("CMDB_MONGO_URI is not set")?;
        let mut config = Self::new(uri, lookup("RS_NAME").unwrap_or_default());

        if let Some(value) = lookup("MAX_OPEN_CONNS") {
            config.max_open_conns = value.parse().context("Invalid CMDB_MONGO_MAX_OPEN_CONNS")?;
        }
        if let Some(value) = lookup("MAX_IDLE_CONNS") {
            config.max_idle_conns = value.parse().context("Invalid CMDB_MONGO_MAX_IDLE_CONNS")?;
        }
        if let Some(value) = lookup("CONNECT_TIMEOUT_SECS") {
            config.connect_timeout_secs =
                value.parse().context("Invalid CMDB_MONGO_CONNECT_TIMEOUT_SECS")?;
        }
        if let Some(value) = lookup("SOCKET_TIMEOUT_SECS") {
            config.socket_timeout_secs =
                value.parse().context("Invalid CMDB_MONGO_SOCKET_TIMEOUT_SECS")?;
        }
        if let Some(value) = lookup("CHECK_VERSION") {
            config.check_version = value.parse().context("Invalid CMDB_MONGO_CHECK_VERSION")?;
        }
        config.app_name = lookup("APP_NAME").filter(|name| !name.trim().is_empty());

        Ok(config)
    }

    /// Reject configurations that can never produce a usable store.
    pub fn validate(&self) -> Result<(), Error> {
        validate_mongodb_uri(&self.uri).map_err(Error::Config)?;
        if self.rs_name.trim().is_empty() {
            return Err(Error::Config("mongodb rsName not set".into()));
        }
        if database_from_uri(&self.uri).is_none() {
            return Err(Error::Config(format!(
                "mongodb uri {} does not name a database",
                self.redacted_uri()
            )));
        }
        if self.max_idle_conns > self.max_open_conns {
            return Err(Error::Config(format!(
                "max_idle_conns {} exceeds max_open_conns {}",
                self.max_idle_conns, self.max_open_conns
            )));
        }
        if self.socket_timeout_secs == 0 {
            return Err(Error::Config("socket_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn redacted_uri(&self) -> String {
        redact_uri_password(&self.uri)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }
}
