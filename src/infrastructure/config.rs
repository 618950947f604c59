use crate::domain::error::DexError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://beta.pokeapi.co/graphql/v1beta";
pub const DEFAULT_STORAGE_KEY: &str = "DEX_OFFLINE_CACHE";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub clear_screen: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub persist: PersistConfig,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_gc_time")]
    pub gc_time_secs: u64,
    /// Absent means cached data never goes stale on its own.
    pub stale_time_secs: Option<u64>,
    #[serde(default = "default_retry")]
    pub retry: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PersistConfig {
    #[serde(default = "default_enable")]
    pub enable: bool,
    #[serde(default = "default_storage_key")]
    pub key: String,
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
    #[serde(default)]
    pub buster: String,
    pub path: Option<String>,
    #[serde(default = "default_quota")]
    pub quota_bytes: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Logging {
    #[serde(default = "default_enable")]
    pub enable: bool,
    pub path: Option<String>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            gc_time_secs: default_gc_time(),
            stale_time_secs: None,
            retry: default_retry(),
            retry_delay_ms: default_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
        }
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            enable: true,
            key: default_storage_key(),
            max_age_secs: default_max_age(),
            buster: String::new(),
            path: None,
            quota_bytes: default_quota(),
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            enable: true,
            path: None,
            level: "WARN".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            theme: default_theme(),
            clear_screen: false,
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            query: QueryConfig::default(),
            persist: PersistConfig::default(),
            logging: Logging::default(),
        }
    }
}

impl QueryConfig {
    pub fn gc_time(&self) -> Duration {
        Duration::from_secs(self.gc_time_secs)
    }

    pub fn stale_time(&self) -> Option<Duration> {
        self.stale_time_secs.map(Duration::from_secs)
    }
}

impl PersistConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

// Defaults
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_theme() -> String {
    "temp".to_string()
}
fn default_user_agent() -> String {
    concat!("dex/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_gc_time() -> u64 {
    // 1 hour to retain an unobserved query before removing it
    60 * 60
}
fn default_retry() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_max_retry_delay() -> u64 {
    30_000
}
fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}
fn default_max_age() -> u64 {
    24 * 60 * 60
}
fn default_quota() -> usize {
    5 * 1024 * 1024
}
fn default_enable() -> bool {
    true
}
fn default_log_level() -> String {
    "WARN".to_string()
}

pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dex").join("config.toml"))
}

/// Durable storage path: `persist.path` if set, else ~/.local/share/dex/storage.db (Linux)
pub fn get_storage_path(config: &Config) -> PathBuf {
    if let Some(path) = config.persist.path.as_deref().filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dex")
        .join("storage.db")
}

pub fn load_config() -> Result<Config, DexError> {
    match get_config_path() {
        Some(path) => load_config_from(&path),
        None => Ok(Config::default()),
    }
}

/// Parse a config file; a missing file yields defaults, a malformed one warns and yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, DexError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)?;
    match toml::from_str::<Config>(&content) {
        Ok(config) => Ok(config),
        Err(e) => {
            eprintln!(
                "Warning: Failed to parse config file: {}. Using defaults.",
                e
            );
            Ok(Config::default())
        }
    }
}

pub fn generate_config_sample() -> Result<(), DexError> {
    let config_path = get_config_path();

    if let Some(path) = config_path {
        if path.exists() {
            eprintln!("Config file already exists at: {}", path.display());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let sample = Config::default();
        let toml_content = toml::to_string_pretty(&sample)
            .map_err(|e| DexError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(&path, toml_content)
            .map_err(|e| DexError::Config(format!("Failed to write config file: {}", e)))?;
        println!("Generated config file at: {}", path.display());
    } else {
        return Err(DexError::Config(
            "Cannot determine config directory".to_string(),
        ));
    }

    Ok(())
}
