//! linkd settings (`~/.config/linkd/config.toml`)
//!
//! Every field has a default, so a missing file or a partial one is fine.
//!
//! ```toml
//! machine_config = "/etc/linkd/machine.toml"
//! state_file = "~/.local/state/linkd/links.toml"
//! cmdline = "/proc/cmdline"
//! jobs = 4
//! poll_interval_ms = 1000
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 100
//! backoff_factor = 2.0
//! max_delay_ms = 5000
//! ```

use anyhow::{Context, Result};
use declarative::{ExecuteOptions, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

const SETTINGS_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Machine configuration document (TOML)
    pub machine_config: String,
    /// Where published link declarations are kept; defaults under the state dir
    pub state_file: Option<String>,
    /// File holding the kernel command line
    pub cmdline: String,
    /// Store operations applied in parallel per batch
    pub jobs: usize,
    /// How often `watch` checks the machine configuration for changes
    pub poll_interval_ms: u64,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            machine_config: "/etc/linkd/machine.toml".to_string(),
            state_file: None,
            cmdline: "/proc/cmdline".to_string(),
            jobs: 1,
            poll_interval_ms: 1000,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            max_attempts: retry.max_attempts,
            base_delay_ms: retry.base_delay.as_millis() as u64,
            backoff_factor: retry.backoff_factor,
            max_delay_ms: retry.max_delay.as_millis() as u64,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            backoff_factor: settings.backoff_factor,
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Result<PathBuf> {
        Ok(paths::config_dir()?.join(SETTINGS_FILE))
    }

    /// Load settings from `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            log::debug!("Settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn machine_config_path(&self) -> PathBuf {
        paths::expand(&self.machine_config)
    }

    pub fn cmdline_path(&self) -> PathBuf {
        paths::expand(&self.cmdline)
    }

    pub fn state_file_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(file) => Ok(paths::expand(file)),
            None => Ok(paths::state_dir()?.join("links.toml")),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    /// Executor options for these settings
    pub fn execute_options(&self, dry_run: bool) -> ExecuteOptions {
        ExecuteOptions {
            dry_run,
            jobs: self.jobs.max(1),
            retry: RetryConfig::from(&self.retry),
        }
    }
}
