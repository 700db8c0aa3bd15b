use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::module::presence::DEFAULT_CLIENT_ID;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// GameTDB XML dump used to build the catalog
    #[serde(default = "default_dump_path")]
    pub dump_path: String,

    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Maximum number of autocomplete suggestions
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameTdbConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Discord application id
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub gametdb: GameTdbConfig,

    #[serde(default)]
    pub presence: PresenceConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_dump_path() -> String {
    "switchtdb.xml".to_string()
}

fn default_catalog_path() -> String {
    "games.json".to_string()
}

fn default_search_limit() -> usize {
    20
}

fn default_base_url() -> String {
    "https://www.gametdb.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            dump_path: default_dump_path(),
            catalog_path: default_catalog_path(),
            search_limit: default_search_limit(),
        }
    }
}

impl Default for GameTdbConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            client_id: default_client_id(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            catalog: CatalogConfig::default(),
            gametdb: GameTdbConfig::default(),
            presence: PresenceConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }
}

pub static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Read the configuration once and publish it through [`CONFIG`]
pub fn read_config(path: impl AsRef<Path>) -> Result<&'static AppConfig> {
    let config = AppConfig::from_file_or_default(path)?;
    Ok(CONFIG.get_or_init(|| config))
}
