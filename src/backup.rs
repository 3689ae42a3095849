//! Export and import of watch data
//!
//! A backup is a JSON document with the watchlist, watched list, episode
//! progress and the time it was written. Imports are parsed completely
//! before anything is handed to the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::models::MediaItem;
use crate::store::{EpisodeWatchedMap, StoreError, UserStore, WriteOutcome};

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Could not access backup file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Backup is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Backup document
///
/// Every collection is optional on import; a missing one is left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchlist: Option<Vec<MediaItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched: Option<Vec<MediaItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_episodes: Option<EpisodeWatchedMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
}

impl BackupData {
    /// Capture the store's collections
    pub fn from_store(store: &UserStore, now: DateTime<Utc>) -> Self {
        Self {
            watchlist: Some(store.watchlist().to_vec()),
            watched: Some(store.watched().to_vec()),
            watched_episodes: Some(store.episodes().clone()),
            export_date: Some(now),
        }
    }

    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn parse(text: &str) -> Result<Self, BackupError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn is_empty(&self) -> bool {
        self.watchlist.is_none() && self.watched.is_none() && self.watched_episodes.is_none()
    }
}

/// Default export file name for a date
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("whatsnext-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Write the store's data to `path`, or to the dated default name in the
/// current directory
pub fn export_to(
    store: &UserStore,
    path: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<PathBuf, BackupError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(backup_file_name(now.date_naive())));
    let json = BackupData::from_store(store, now).to_json()?;
    std::fs::write(&path, json).map_err(|source| BackupError::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "backup exported");
    Ok(path)
}

pub fn read_from(path: &Path) -> Result<BackupData, BackupError> {
    let text = std::fs::read_to_string(path).map_err(|source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    BackupData::parse(&text)
}

/// Read and apply a backup; nothing changes unless the whole file parses
pub async fn import_from(store: &mut UserStore, path: &Path) -> Result<WriteOutcome, BackupError> {
    let data = read_from(path)?;
    let outcome = store
        .replace_all(data.watchlist, data.watched, data.watched_episodes)
        .await?;
    info!(path = %path.display(), ?outcome, "backup imported");
    Ok(outcome)
}
