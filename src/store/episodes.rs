//! Per-episode watch progress
//!
//! Series id → season number → set of watched episode numbers. Levels are
//! created when the first episode under them is marked and pruned when the
//! last one is unmarked, so a missing key always means "nothing watched".

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Watched episodes of every tracked series
///
/// Serializes as `{"1396": {"1": [1, 2]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeWatchedMap(BTreeMap<u64, BTreeMap<u32, BTreeSet<u32>>>);

impl EpisodeWatchedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one episode; returns the new watched state
    pub fn toggle(&mut self, series_id: u64, season: u32, episode: u32) -> bool {
        let seasons = self.0.entry(series_id).or_default();
        let episodes = seasons.entry(season).or_default();

        let watched = if episodes.remove(&episode) {
            false
        } else {
            episodes.insert(episode);
            true
        };

        if episodes.is_empty() {
            seasons.remove(&season);
        }
        if seasons.is_empty() {
            self.0.remove(&series_id);
        }
        watched
    }

    pub fn is_watched(&self, series_id: u64, season: u32, episode: u32) -> bool {
        self.0
            .get(&series_id)
            .and_then(|s| s.get(&season))
            .map(|e| e.contains(&episode))
            .unwrap_or(false)
    }

    /// Watched episodes of one season
    pub fn season(&self, series_id: u64, season: u32) -> Vec<u32> {
        self.0
            .get(&series_id)
            .and_then(|s| s.get(&season))
            .map(|e| e.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Watched episodes across all seasons of a series
    pub fn watched_count(&self, series_id: u64) -> usize {
        self.0
            .get(&series_id)
            .map(|s| s.values().map(BTreeSet::len).sum())
            .unwrap_or(0)
    }

    /// Watched episodes across every series
    pub fn total(&self) -> usize {
        self.0.keys().map(|id| self.watched_count(*id)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_twice_restores_map() {
        let mut map = EpisodeWatchedMap::new();
        map.toggle(1396, 1, 1);
        let before = map.clone();

        assert!(map.toggle(1396, 2, 5));
        assert!(map.is_watched(1396, 2, 5));
        assert!(!map.toggle(1396, 2, 5));
        assert!(!map.is_watched(1396, 2, 5));
        assert_eq!(map, before);
    }

    #[test]
    fn test_absent_levels_count_as_zero() {
        let map = EpisodeWatchedMap::new();
        assert_eq!(map.watched_count(42), 0);
        assert!(map.season(42, 1).is_empty());
        assert!(!map.is_watched(42, 1, 1));
    }

    #[test]
    fn test_counts_span_seasons() {
        let mut map = EpisodeWatchedMap::new();
        map.toggle(1, 1, 1);
        map.toggle(1, 1, 2);
        map.toggle(1, 2, 1);
        map.toggle(2, 1, 1);
        assert_eq!(map.watched_count(1), 3);
        assert_eq!(map.season(1, 1), vec![1, 2]);
        assert_eq!(map.total(), 4);
    }

    #[test]
    fn test_serializes_with_string_keys() {
        let mut map = EpisodeWatchedMap::new();
        map.toggle(1396, 1, 2);
        map.toggle(1396, 1, 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"1396":{"1":[1,2]}}"#);

        let back: EpisodeWatchedMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
