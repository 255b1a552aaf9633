//! Persisted command line defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use rfid_detect::ProbeConfig;
use rfid_protocol::ReaderFamily;
use rfid_session::{SessionConfig, TransportConfig};
use serde::{Deserialize, Serialize};

/// Defaults applied when a flag is not given on the command line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Port used by `read` when `--port` is omitted
    #[serde(default)]
    pub port: Option<String>,
    /// Family used by `read` when `--family` is omitted
    #[serde(default)]
    pub family: Option<ReaderFamily>,
    /// Serial baud rate
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Per-command response deadline in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Detection settle window in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Detection hard deadline in milliseconds
    #[serde(default = "default_probe_deadline_ms")]
    pub probe_deadline_ms: u64,
}

fn default_baud() -> u32 {
    115_200
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_settle_ms() -> u64 {
    200
}

fn default_probe_deadline_ms() -> u64 {
    2000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            family: None,
            baud_rate: default_baud(),
            request_timeout_ms: default_request_timeout_ms(),
            settle_ms: default_settle_ms(),
            probe_deadline_ms: default_probe_deadline_ms(),
        }
    }
}

impl Settings {
    /// Get the config directory for rfidctl
    /// Uses $XDG_CONFIG_HOME/rfidctl when set, otherwise the platform config dir
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("rfidctl"));
            }
        }

        dirs::config_dir().map(|c| c.join("rfidctl"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::settings_path().context("could not determine settings path")?;
        self.save_to(&path)
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            baud_rate: self.baud_rate,
            ..Default::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            transport: self.transport_config(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            settle: Duration::from_millis(self.settle_ms),
            deadline: Duration::from_millis(self.probe_deadline_ms),
            transport: self.transport_config(),
            ..Default::default()
        }
    }
}
