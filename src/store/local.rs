//! Device-local key/value storage
//!
//! String keys mapped to string values, kept in a single JSON document on
//! disk. Every call reads the file and every write replaces it, so any
//! number of handles to the same path observe each other's writes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage keys
pub mod keys {
    pub const USER_DATA: &str = "user_data";
    pub const WATCHLIST: &str = "user_watchlist";
    pub const WATCHED: &str = "user_watched";
    pub const WATCHED_EPISODES: &str = "user_watched_episodes";
    pub const SEARCH_HISTORY: &str = "search_history";
    pub const IS_AUTHENTICATED: &str = "is_authenticated";
    pub const AUTH_SESSION: &str = "auth_session";
    pub const INSTALL_PROMPT_DISMISSED: &str = "pwa-prompt-dismissed";
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Storage file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Value under '{key}' is not valid: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Handle to the storage file
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location (~/.local/share/whatsnext/storage.json on Linux)
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("whatsnext").join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StorageError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        // Write next to the target and rename so a crash never leaves half a file
        let text = serde_json::to_string_pretty(entries).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set_item(&self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.into());
        self.write_all(&entries)
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    /// Remove several keys with one write
    pub fn remove_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.read_all()?;
        let before = entries.len();
        for key in keys {
            entries.remove(*key);
        }
        if entries.len() != before {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    /// Deserialize the JSON value stored under `key`
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_item(key)? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|source| StorageError::InvalidValue {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Serialize `value` as JSON under `key`
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let text = serde_json::to_string(value).map_err(|source| StorageError::InvalidValue {
            key: key.to_string(),
            source,
        })?;
        self.set_item(key, text)
    }

    /// Boolean flags are stored as the string "true"
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get_item(key), Ok(Some(v)) if v == "true")
    }

    pub fn set_flag(&self, key: &str, on: bool) -> Result<(), StorageError> {
        if on {
            self.set_item(key, "true")
        } else {
            self.remove_item(key)
        }
    }

    pub fn install_prompt_dismissed(&self) -> bool {
        self.flag(keys::INSTALL_PROMPT_DISMISSED)
    }

    pub fn dismiss_install_prompt(&self) -> Result<(), StorageError> {
        self.set_flag(keys::INSTALL_PROMPT_DISMISSED, true)
    }
}
