//! Application configuration management.
//!
//! This module handles loading and saving the configuration, which holds the
//! cache directory override, the catalog URL, and the request timeout.
//!
//! Configuration is stored at `~/.config/recipecache/config.json`.
//! `RECIPECACHE_CACHE_DIR` and `RECIPECACHE_CATALOG_URL` override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::REQUEST_TIMEOUT_SECS;
use crate::models::ALL_RECIPES_URL;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "recipecache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Subdirectory of the app cache dir that holds resource files
const CACHE_SUBDIR: &str = "cache";

pub const CACHE_DIR_ENV: &str = "RECIPECACHE_CACHE_DIR";
pub const CATALOG_URL_ENV: &str = "RECIPECACHE_CATALOG_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub cache_dir: Option<PathBuf>,
    pub catalog_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_env(&mut self) {
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Ok(url) = std::env::var(CATALOG_URL_ENV) {
            if !url.is_empty() {
                self.catalog_url = Some(url);
            }
        }
    }

    /// Directory holding cached resource files.
    ///
    /// Falls back to the system temp dir when the platform has no cache dir.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_NAME)
            .join(CACHE_SUBDIR)
    }

    pub fn catalog_url(&self) -> Result<Url> {
        let url = self.catalog_url.as_deref().unwrap_or(ALL_RECIPES_URL);
        Url::parse(url).with_context(|| format!("Invalid catalog URL: {}", url))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS))
    }
}
