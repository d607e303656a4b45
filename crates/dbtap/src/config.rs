use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub logline: LoglineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            logging: LoggingConfig::default(),
            observer: ObserverConfig::default(),
            logline: LoglineConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_listen")]
    pub listen_addr: String,
    #[serde(default = "default_backend")]
    pub backend_addr: String,
    /// Upper bound on concurrently relayed client connections.
    #[serde(default = "default_max_dialogs")]
    pub max_dialogs: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen(),
            backend_addr: default_backend(),
            max_dialogs: default_max_dialogs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ledger_path: default_ledger_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ObserverConfig {
    /// "audit" decodes the wire protocol and feeds the ledger;
    /// "dump" hex-dumps relayed chunks to the trace log instead.
    #[serde(default = "default_observer_mode")]
    pub mode: String,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            mode: default_observer_mode(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoglineConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_logline_listen")]
    pub listen_addr: String,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for LoglineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_logline_listen(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_listen() -> String {
    "127.0.0.1:27017".to_string()
}

fn default_backend() -> String {
    "127.0.0.1:27018".to_string()
}

fn default_max_dialogs() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("ledger.jsonl")
}

fn default_observer_mode() -> String {
    "audit".to_string()
}

fn default_logline_listen() -> String {
    "127.0.0.1:4560".to_string()
}

fn default_idle_timeout() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// If the file does not exist a default configuration is returned and a
/// warning is emitted, so dbtap can start with sensible defaults before a
/// config file has been written.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    let config: Config = serde_yml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;

    Ok(config)
}
