//! Configuration management for What's Next
//!
//! Handles config file loading/saving and service credentials.
//! Config is stored at ~/.config/whatsnext/config.toml; the environment
//! variables `TMDB_API_KEY`, `SUPABASE_URL`, `SUPABASE_ANON_KEY` and
//! `WHATSNEXT_DATA_DIR` override the file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::api::{BackendClient, TmdbClient};
use crate::notifications::NotificationPreferences;
use crate::store::LocalStorage;

/// Value shipped in templates in place of a real project URL
pub const PLACEHOLDER_BACKEND_URL: &str = "YOUR_SUPABASE_URL_HERE";

const STORAGE_FILE: &str = "storage.json";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// TMDB v3 API key
    pub tmdb_api_key: Option<String>,
    /// Hosted backend project URL
    pub supabase_url: Option<String>,
    /// Hosted backend public key
    pub supabase_anon_key: Option<String>,
    /// Directory holding device storage
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub notifications: NotificationPreferences,
}

impl Config {
    /// Get config file path (~/.config/whatsnext/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("whatsnext").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path().map(|p| Self::load_from(&p)).unwrap_or_default()
    }

    /// Load config from `path`; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        toml::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            Self::default()
        })
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup; empty values are ignored
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = var("TMDB_API_KEY") {
            self.tmdb_api_key = Some(key);
        }
        if let Some(url) = var("SUPABASE_URL") {
            self.supabase_url = Some(url);
        }
        if let Some(key) = var("SUPABASE_ANON_KEY") {
            self.supabase_anon_key = Some(key);
        }
        if let Some(dir) = var("WHATSNEXT_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Catalog client; without a key every lookup comes back empty
    pub fn tmdb_client(&self) -> TmdbClient {
        TmdbClient::new(self.tmdb_api_key.clone().unwrap_or_default())
    }

    /// URL and key are both set and the URL is not the template placeholder
    pub fn backend_configured(&self) -> bool {
        let url_ok = self
            .supabase_url
            .as_deref()
            .map(str::trim)
            .map(|u| !u.is_empty() && u != PLACEHOLDER_BACKEND_URL)
            .unwrap_or(false);
        let key_ok = self
            .supabase_anon_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        url_ok && key_ok
    }

    pub fn backend_client(&self) -> Option<BackendClient> {
        if !self.backend_configured() {
            return None;
        }
        match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(url), Some(key)) => Some(BackendClient::new(url.trim(), key.trim())),
            _ => None,
        }
    }

    /// Device storage file
    pub fn storage_path(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.join(STORAGE_FILE),
            None => LocalStorage::default_path().unwrap_or_else(|| PathBuf::from(STORAGE_FILE)),
        }
    }

    pub fn storage(&self) -> LocalStorage {
        LocalStorage::new(self.storage_path())
    }
}
