//! Daemon settings, read from a TOML file.

use std::{path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::AdapterConfig;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/cec-poweron/config.toml";
pub const DEFAULT_COMMAND: &str = "systemctl start kodi-x11";

/// Root of the config file. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Shell command that starts the player and returns once it exits.
    pub command: String,
    pub on_missing_adapter: MissingAdapter,
    pub adapter: AdapterSettings,
    pub timing: Timing,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            on_missing_adapter: MissingAdapter::default(),
            adapter: AdapterSettings::default(),
            timing: Timing::default(),
        }
    }
}

/// What to do if there is no adapter when the daemon starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingAdapter {
    /// keep looking until one shows up
    #[default]
    Wait,
    /// give up after the first empty scan
    Exit,
}

/// The `[adapter]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterSettings {
    /// OSD name shown by the TV
    pub device_name: String,
    pub device_dir: String,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        let d = AdapterConfig::default();
        Self {
            device_name: d.device_name,
            device_dir: d.device_dir,
        }
    }
}

/// All the waits of the state machine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timing {
    /// between empty adapter scans
    #[serde(with = "humantime_serde")]
    pub discovery_backoff: Duration,
    /// per open attempt
    #[serde(with = "humantime_serde")]
    pub open_timeout: Duration,
    /// between open attempts on a busy adapter
    #[serde(with = "humantime_serde")]
    pub open_backoff: Duration,
    /// minimum spacing of power status polls
    #[serde(with = "humantime_serde")]
    pub poll_spacing: Duration,
    /// after the player exited, lets it let go of the adapter
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    /// after every full cycle
    #[serde(with = "humantime_serde")]
    pub cycle_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            discovery_backoff: Duration::from_secs(5),
            open_timeout: Duration::from_millis(500),
            open_backoff: Duration::from_secs(2),
            poll_spacing: Duration::from_millis(500),
            settle: Duration::from_secs(5),
            cycle_delay: Duration::from_secs(5),
        }
    }
}

impl Settings {
    /// Parse TOML text. Validates the result.
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override the command, e.g. from the command line
    pub fn with_command(mut self, command: impl Into<String>) -> Result<Self> {
        self.command = command.into();
        self.validate()?;
        Ok(self)
    }

    /// How the adapter introduces itself: a recording device that never claims to be the active source.
    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            device_name: self.adapter.device_name.clone(),
            device_dir: self.adapter.device_dir.clone(),
            ..AdapterConfig::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            bail!("command must not be blank");
        }
        if !self.adapter.device_name.is_ascii() {
            bail!("adapter.device_name must be ASCII");
        }
        if self.timing.open_timeout.is_zero() {
            bail!("timing.open_timeout must be positive");
        }
        Ok(())
    }
}

/// Loads the config file at `path`, returning `Settings::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Settings::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
