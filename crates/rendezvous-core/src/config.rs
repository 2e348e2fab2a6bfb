//! Configuration system for Rendezvous.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $RENDEZVOUS_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/rendezvous/config.toml
//!   3. ~/.config/rendezvous/config.toml

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::wire::DEFAULT_MAX_FRAME_BYTES;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RendezvousConfig {
    pub network: NetworkConfig,
    pub store: StoreConfig,
    pub presence: PresenceConfig,
    pub wire: WireConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the peer listener binds to.
    pub listen_addr: IpAddr,
    /// TCP port peers connect to.
    pub port: u16,
    /// Local HTTP status API port. 0 = disabled.
    pub api_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database holding last-known peer records.
    pub path: PathBuf,
    /// Delete records older than the inactivity timeout at startup.
    pub prune_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// How often the reaper scans for idle peers.
    pub sweep_interval_secs: u64,
    /// A peer silent for longer than this is evicted.
    pub inactivity_timeout_secs: u64,
    /// Delay before the first sweep after startup.
    pub first_sweep_delay_secs: u64,
    /// Heartbeat cadence clients are expected to use. The inactivity
    /// timeout must exceed it.
    pub expected_heartbeat_secs: u64,
    /// Where rosters are drawn from.
    pub roster_source: RosterSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Largest accepted frame body in bytes.
    pub max_frame_bytes: usize,
}

/// Source of the peer list returned on each heartbeat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterSource {
    /// Live sessions in the presence registry.
    #[default]
    Registry,
    /// Every record in the durable store, connected or not.
    Store,
}

impl FromStr for RosterSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registry" => Ok(Self::Registry),
            "store" => Ok(Self::Store),
            other => Err(format!("unknown roster source '{other}'")),
        }
    }
}

impl std::fmt::Display for RosterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry => f.write_str("registry"),
            Self::Store => f.write_str("store"),
        }
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::from([0, 0, 0, 0]),
            port: 12345,
            api_port: 9101,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("peers.db"),
            prune_on_start: true,
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 10,
            inactivity_timeout_secs: 10,
            first_sweep_delay_secs: 1,
            expected_heartbeat_secs: 5,
            roster_source: RosterSource::Registry,
        }
    }
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl PresenceConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn first_sweep_delay(&self) -> Duration {
        Duration::from_secs(self.first_sweep_delay_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("rendezvous")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("rendezvous")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl RendezvousConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load the file at `path`, or defaults if it does not exist.
    /// No environment overrides are applied.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("RENDEZVOUS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    fn write_default_to(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(&RendezvousConfig::default())
            .map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply RENDEZVOUS_* overrides. `lookup` is `std::env::var` in
    /// production.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RENDEZVOUS_NETWORK__LISTEN_ADDR") {
            if let Ok(addr) = v.parse() {
                self.network.listen_addr = addr;
            }
        }
        if let Some(v) = lookup("RENDEZVOUS_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Some(v) = lookup("RENDEZVOUS_NETWORK__API_PORT") {
            if let Ok(p) = v.parse() {
                self.network.api_port = p;
            }
        }
        if let Some(v) = lookup("RENDEZVOUS_STORE__PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("RENDEZVOUS_PRESENCE__SWEEP_INTERVAL_SECS") {
            if let Ok(s) = v.parse() {
                self.presence.sweep_interval_secs = s;
            }
        }
        if let Some(v) = lookup("RENDEZVOUS_PRESENCE__INACTIVITY_TIMEOUT_SECS") {
            if let Ok(s) = v.parse() {
                self.presence.inactivity_timeout_secs = s;
            }
        }
        if let Some(v) = lookup("RENDEZVOUS_PRESENCE__ROSTER_SOURCE") {
            if let Ok(source) = v.parse() {
                self.presence.roster_source = source;
            }
        }
    }

    /// Reject settings that would evict live peers or never evict at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.presence;
        if p.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "presence.sweep_interval_secs must be greater than 0".into(),
            ));
        }
        if p.inactivity_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "presence.inactivity_timeout_secs must be greater than 0".into(),
            ));
        }
        if p.inactivity_timeout_secs <= p.expected_heartbeat_secs {
            return Err(ConfigError::Invalid(format!(
                "presence.inactivity_timeout_secs ({}) must exceed expected_heartbeat_secs ({})",
                p.inactivity_timeout_secs, p.expected_heartbeat_secs
            )));
        }
        if self.wire.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid(
                "wire.max_frame_bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
