use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Top-level configuration.
///
/// Values come from built-in defaults, then an optional YAML file, then
/// environment variables, in increasing precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub beacon: BeaconConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds a connection may sit idle in a read; 0 disables the limit
    pub read_timeout_secs: u64,
    pub max_line_length: usize,
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// Hosts whose page views are recorded
    pub domains: Vec<String>,
    /// JSON-lines hit log; hits stay in memory when unset
    pub store_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            read_timeout_secs: 60,
            max_line_length: 8192,
            max_body_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }
}

impl Config {
    /// Defaults with environment overrides applied.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Reads a YAML file, then applies environment overrides.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut cfg: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT must be a port number, got {port:?}"))?;
        }

        if let Ok(secs) = std::env::var("READ_TIMEOUT") {
            self.server.read_timeout_secs = secs
                .parse()
                .with_context(|| format!("READ_TIMEOUT must be whole seconds, got {secs:?}"))?;
        }

        if let Ok(path) = std::env::var("HIT_LOG") {
            self.beacon.store_path = Some(PathBuf::from(path));
        }

        Ok(())
    }
}
