use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8068;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_INTERVAL_SECS: u64 = 180;
pub const DEFAULT_TRANSPORT_BIND: &str = "0.0.0.0:0";
pub const MAX_PAYLOAD_BYTES: usize = 128 * 1024; // 128 KB hard cap per frame

/// Top-level config (cuebus.toml + CUEBUS_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CuebusConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Which iteration number the condition evaluator sees on expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IterationMode {
    /// Every expiry evaluates conditions against iteration 0.
    #[default]
    Constant,
    /// Expiries evaluate against the group's fire count since its last reset.
    Counting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval given to groups created through `groups.add`.
    #[serde(default = "default_interval")]
    pub default_interval_secs: u64,
    #[serde(default)]
    pub iteration: IterationMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: DEFAULT_INTERVAL_SECS,
            iteration: IterationMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Local address the outbound UDP socket binds to.
    #[serde(default = "default_transport_bind")]
    pub bind: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_TRANSPORT_BIND.to_string(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_transport_bind() -> String {
    DEFAULT_TRANSPORT_BIND.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cuebus/cuebus.db", home)
}

impl CuebusConfig {
    /// Load config from a TOML file with CUEBUS_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.cuebus/cuebus.toml
    ///
    /// A missing file is not an error; defaults fill every section.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CuebusConfig = Figment::from(Serialized::defaults(CuebusConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CUEBUS_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        if config.scheduler.default_interval_secs == 0 {
            return Err(crate::error::CoreError::Config(
                "scheduler.default_interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cuebus/cuebus.toml", home)
}
