use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Rows returned by the read API when no limit is given.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// How many of a brand-new source's candidates are fully extracted
    /// on its first run; the rest are inserted as blocked rows.
    #[serde(default = "default_catchup_limit")]
    pub catchup_limit: usize,

    /// Articles found before this horizon are eligible for pruning.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Whether the read surface includes rows without extracted content
    /// (blocked articles).
    #[serde(default)]
    pub show_unextracted: bool,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsgrab");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("news.db").to_string_lossy().to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_catchup_limit() -> usize {
    10
}

fn default_retention_days() -> u32 {
    14
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            page_size: default_page_size(),
            catchup_limit: default_catchup_limit(),
            retention_days: default_retention_days(),
            show_unextracted: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newsgrab")
            .join("config.toml")
    }
}
