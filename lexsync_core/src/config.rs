//! Configuration file support for lexsync.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/lexsync/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cards: CardsConfig,

    #[serde(default)]
    pub data: DataConfig,

    /// Simulate provisioning instead of calling the card service
    #[serde(default)]
    pub dry_run: bool,
}

/// Card service endpoint and credentials
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,

    #[serde(default)]
    pub key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            key: String::new(),
        }
    }
}

/// Card template and field wiring
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CardsConfig {
    /// Template used for every provisioned card
    #[serde(default)]
    pub template_id: String,

    /// Field receiving the chunk text
    #[serde(default)]
    pub term_field_id: String,

    /// Field receiving the meaning
    #[serde(default)]
    pub meaning_field_id: String,

    /// Field receiving the observation, when the template has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs_field_id: Option<String>,

    /// Parent deck for newly created class decks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_deck_id: Option<String>,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

// Default value functions
fn default_api_url() -> String {
    "https://app.mochi.cards/api".into()
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("lexsync")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("lexsync").join("config.toml")
    }

    /// Path of the shared registry inside the data directory
    pub fn registry_path(&self) -> PathBuf {
        self.data.data_dir.join("registry.json")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
