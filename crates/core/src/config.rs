// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for the session and sync layer.
//!
//! Stored as TOML, every field optional:
//!
//! ```toml
//! [refresh]
//! interval_secs = 900
//! activity_timeout_secs = 1800
//! threshold_minutes = 10
//!
//! [polling]
//! empty_delay_secs = 5
//! error_delay_secs = 10
//! local_conversation_prefix = "temp_"
//!
//! [queue]
//! storage_key = "offline_mutation_queue"
//!
//! [store]
//! path = "/var/lib/app/store.json"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::queue::{QueueConfig, DEFAULT_STORAGE_KEY};
use crate::store::FileStore;
use crate::token::REFRESH_THRESHOLD_MINUTES;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

/// Background token refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// Seconds between refresh checks (default: 900).
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
    /// Skip checks once the user has been idle this long (default: 1800).
    #[serde(default = "default_activity_timeout_secs")]
    pub activity_timeout_secs: u64,
    /// Refresh when this many minutes or fewer remain (default: 10).
    #[serde(default = "default_threshold_minutes")]
    pub threshold_minutes: u64,
}

/// Conversation polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Delay before re-polling after an empty result (default: 5).
    #[serde(default = "default_empty_delay_secs")]
    pub empty_delay_secs: u64,
    /// Delay before re-polling after a failed fetch (default: 10).
    #[serde(default = "default_error_delay_secs")]
    pub error_delay_secs: u64,
    /// Conversation ids with this prefix exist only locally and are never polled.
    #[serde(default = "default_local_conversation_prefix")]
    pub local_conversation_prefix: String,
}

/// Offline mutation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

/// File-backed store location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Path to the store document; defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_refresh_interval_secs() -> u64 {
    15 * 60
}

fn default_activity_timeout_secs() -> u64 {
    30 * 60
}

fn default_threshold_minutes() -> u64 {
    REFRESH_THRESHOLD_MINUTES
}

fn default_empty_delay_secs() -> u64 {
    5
}

fn default_error_delay_secs() -> u64 {
    10
}

fn default_local_conversation_prefix() -> String {
    "temp_".to_string()
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

impl Default for RefreshSettings {
    fn default() -> Self {
        RefreshSettings {
            interval_secs: default_refresh_interval_secs(),
            activity_timeout_secs: default_activity_timeout_secs(),
            threshold_minutes: default_threshold_minutes(),
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        PollingSettings {
            empty_delay_secs: default_empty_delay_secs(),
            error_delay_secs: default_error_delay_secs(),
            local_conversation_prefix: default_local_conversation_prefix(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings { storage_key: default_storage_key() }
    }
}

impl TetherConfig {
    /// Parses and validates a TOML document.
    pub fn parse(content: &str) -> Result<Self> {
        let config: TetherConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(TetherConfig::default());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Rejects values that would stall or spin the timers.
    pub fn validate(&self) -> Result<()> {
        if self.refresh.interval_secs == 0 {
            return Err(Error::Config("refresh.interval_secs must be positive".to_string()));
        }
        if self.refresh.activity_timeout_secs == 0 {
            return Err(Error::Config(
                "refresh.activity_timeout_secs must be positive".to_string(),
            ));
        }
        if self.polling.empty_delay_secs == 0 || self.polling.error_delay_secs == 0 {
            return Err(Error::Config("polling delays must be positive".to_string()));
        }
        if self.queue.storage_key.trim().is_empty() {
            return Err(Error::Config("queue.storage_key must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolved location of the file-backed store.
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => FileStore::default_path(),
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig { storage_key: self.queue.storage_key.clone() }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
