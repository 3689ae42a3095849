//! Recent search queries, most recent first

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::local::{keys, LocalStorage, StorageError};

pub const MAX_SEARCH_HISTORY: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHistory(Vec<String>);

impl SearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from storage; an unreadable entry starts a fresh history
    pub fn load(storage: &LocalStorage) -> Self {
        match storage.get_json::<Vec<String>>(keys::SEARCH_HISTORY) {
            Ok(entries) => {
                let mut history = Self::new();
                // Oldest first so the stored order is rebuilt with the same rules
                for query in entries.unwrap_or_default().iter().rev() {
                    history.push(query);
                }
                history
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable search history");
                Self::new()
            }
        }
    }

    pub fn save(&self, storage: &LocalStorage) -> Result<(), StorageError> {
        storage.set_json(keys::SEARCH_HISTORY, &self.0)
    }

    /// Move `query` to the front, dropping the oldest past the limit
    pub fn push(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.0.retain(|q| q != query);
        self.0.insert(0, query.to_string());
        self.0.truncate(MAX_SEARCH_HISTORY);
    }

    pub fn remove(&mut self, query: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|q| q != query.trim());
        self.0.len() != before
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
