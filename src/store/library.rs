//! Library views over the watchlist and watched list, and viewing stats

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::EpisodeWatchedMap;
use crate::models::{MediaItem, MediaKind, UserStats};

/// Assumed length of an episode when computing hours watched
pub const EPISODE_MINUTES: u32 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    All,
    Movie,
    Series,
}

impl KindFilter {
    pub fn matches(&self, kind: MediaKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Movie => kind == MediaKind::Movie,
            KindFilter::Series => kind == MediaKind::Series,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibrarySort {
    /// Most recently added first
    #[default]
    DateAdded,
    Title,
    /// Highest rated first, unrated last
    Rating,
}

/// Filter and order a list kept in insertion order
pub fn library_view(items: &[MediaItem], filter: KindFilter, sort: LibrarySort) -> Vec<MediaItem> {
    let mut view: Vec<MediaItem> = items
        .iter()
        .filter(|item| filter.matches(item.kind))
        .cloned()
        .collect();

    match sort {
        LibrarySort::DateAdded => view.reverse(),
        LibrarySort::Title => view.sort_by_key(|item| item.title.to_lowercase()),
        LibrarySort::Rating => view.sort_by(|a, b| match (a.rating, b.rating) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
    }
    view
}

/// Episodes watched out of the series total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesProgress {
    pub watched: usize,
    pub total: Option<u32>,
}

impl SeriesProgress {
    pub fn percent(&self) -> Option<u8> {
        self.total
            .filter(|t| *t > 0)
            .map(|t| ((self.watched as f64 / t as f64) * 100.0).min(100.0).round() as u8)
    }
}

/// Progress for a series; `None` for movies
pub fn series_progress(item: &MediaItem, episodes: &EpisodeWatchedMap) -> Option<SeriesProgress> {
    (item.kind == MediaKind::Series).then(|| SeriesProgress {
        watched: episodes.watched_count(item.id),
        total: item.episodes,
    })
}

/// Profile statistics derived from the watched list and episode progress
pub fn compute_stats(watched: &[MediaItem], episodes: &EpisodeWatchedMap) -> UserStats {
    let movies: Vec<&MediaItem> = watched.iter().filter(|i| i.kind == MediaKind::Movie).collect();
    let episode_count = episodes.total() as u32;

    let movie_minutes: u32 = movies.iter().filter_map(|m| m.runtime).sum();
    let minutes = movie_minutes + episode_count * EPISODE_MINUTES;

    UserStats {
        hours_watched: minutes / 60,
        movies_watched: movies.len() as u32,
        episodes_watched: episode_count,
        favorite_genre: favorite_genre(watched),
    }
}

/// Most frequent genre; ties go to the genre seen first
fn favorite_genre(watched: &[MediaItem]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, genre) in watched.iter().flat_map(|i| i.genres.iter()).enumerate() {
        let entry = counts.entry(genre.as_str()).or_insert((0, order));
        entry.0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, oa)), (_, (cb, ob))| ca.cmp(cb).then(ob.cmp(oa)))
        .map(|(genre, _)| genre.to_string())
}
