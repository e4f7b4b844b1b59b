//! Configuration for a relay node.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $OEC_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/oec/config.toml
//!   3. ~/.config/oec/config.toml

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub instance: InstanceConfig,
    pub http: HttpConfig,
    /// Static destination → `host:port` routes.
    pub routes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Human-readable node name. Only used in startup logging.
    pub name: String,
    /// Logical address of this node in the exchange.
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_address: String,
    /// 0 = OS-assigned.
    pub listen_port: u16,
    /// Inbound messages dispatched at once. 0 = unbounded.
    pub max_concurrent_requests: usize,
    /// Outbound connect timeout. 0 = network stack default.
    pub connect_timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: "oec-node".to_string(),
            address: String::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            listen_port: 9720,
            max_concurrent_requests: 64,
            connect_timeout_ms: 0,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("oec")
}

fn home_dir() -> PathBuf {
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
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl RelayConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit file, without env overrides. A missing file
    /// yields the defaults.
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
        std::env::var("OEC_CONFIG")
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
        let text =
            toml::to_string_pretty(&RelayConfig::default()).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply OEC_* overrides. Unparseable numbers are ignored.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("OEC_INSTANCE__NAME") {
            self.instance.name = v;
        }
        if let Some(v) = var("OEC_INSTANCE__ADDRESS") {
            self.instance.address = v;
        }
        if let Some(v) = var("OEC_HTTP__BIND_ADDRESS") {
            self.http.bind_address = v;
        }
        if let Some(p) = var("OEC_HTTP__LISTEN_PORT").and_then(|v| v.parse().ok()) {
            self.http.listen_port = p;
        }
        if let Some(n) = var("OEC_HTTP__MAX_CONCURRENT_REQUESTS").and_then(|v| v.parse().ok()) {
            self.http.max_concurrent_requests = n;
        }
        if let Some(ms) = var("OEC_HTTP__CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.http.connect_timeout_ms = ms;
        }
    }

    /// Named-property view over the typed config, e.g. `http.listen_port`
    /// or `routes.<destination>`.
    pub fn property(&self, name: &str) -> Option<String> {
        if let Some(destination) = name.strip_prefix("routes.") {
            return self.routes.get(destination).cloned();
        }
        let value = match name {
            "instance.name" => self.instance.name.clone(),
            "instance.address" => self.instance.address.clone(),
            "http.bind_address" => self.http.bind_address.clone(),
            "http.listen_port" => self.http.listen_port.to_string(),
            "http.max_concurrent_requests" => self.http.max_concurrent_requests.to_string(),
            "http.connect_timeout_ms" => self.http.connect_timeout_ms.to_string(),
            _ => return None,
        };
        Some(value)
    }
}
