//! Client configuration.

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Session URL: scheme and host select the server, the query string
    /// carries the durable session state (name, room, settings).
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_url() -> String {
    "http://localhost:8080/".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from default location (config/default.toml) or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = std::path::PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(Config::default())
    }
}
