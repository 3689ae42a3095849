//! Release calendar
//!
//! Upcoming movie premieres and episode airings for everything on the
//! watchlist, plus the date helpers the calendar view needs.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::api::TmdbClient;
use crate::models::{CalendarEntry, EpisodeRef, MediaItem, MediaKind};

/// Seasons per series checked for upcoming episodes, newest first
pub const RECENT_SEASONS: usize = 2;

/// Upcoming releases for `watchlist`, oldest first
///
/// Movies count when their release date is today or later. For series the
/// two highest-numbered seasons are fetched one after another and every
/// episode airing today or later becomes an entry.
pub async fn upcoming_releases(
    tmdb: &TmdbClient,
    watchlist: &[MediaItem],
    today: NaiveDate,
) -> Vec<CalendarEntry> {
    let mut entries = Vec::new();

    for item in watchlist {
        match item.kind {
            MediaKind::Movie => {
                if let Some(date) = item.release_date.filter(|d| *d >= today) {
                    entries.push(CalendarEntry {
                        media: item.clone(),
                        title: item.title.clone(),
                        date,
                        episode: None,
                    });
                }
            }
            MediaKind::Series => {
                entries.extend(series_releases(tmdb, item, today).await);
            }
        }
    }

    entries.sort_by_key(|e| e.date);
    entries
}

async fn series_releases(tmdb: &TmdbClient, series: &MediaItem, today: NaiveDate) -> Vec<CalendarEntry> {
    let mut seasons = tmdb.seasons(series.id).await;
    seasons.sort_by(|a, b| b.season_number.cmp(&a.season_number));

    let mut entries = Vec::new();
    for season in seasons
        .iter()
        .take(RECENT_SEASONS)
        .filter(|s| s.season_number > 0 && s.episode_count > 0)
    {
        let episodes = tmdb.season_episodes(series.id, season.season_number).await;
        debug!(series = series.id, season = season.season_number, episodes = episodes.len(), "season fetched");

        for episode in episodes {
            let Some(date) = episode.air_date.filter(|d| *d >= today) else {
                continue;
            };
            entries.push(CalendarEntry {
                media: series.clone(),
                title: format!("{} - S{}E{}", series.title, episode.season, episode.episode),
                date,
                episode: Some(EpisodeRef {
                    season: episode.season,
                    episode: episode.episode,
                    name: episode.name,
                }),
            });
        }
    }
    entries
}

// =============================================================================
// Grouping
// =============================================================================

/// Entries sharing a release date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub label: String,
    pub entries: Vec<CalendarEntry>,
}

/// Long date label, e.g. "Monday, October 19, 2026"
pub fn date_label(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Bucket sorted entries by date, keeping their order
pub fn group_by_date(entries: &[CalendarEntry]) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    for entry in entries {
        match groups.last_mut() {
            Some(group) if group.date == entry.date => group.entries.push(entry.clone()),
            _ => groups.push(DayGroup {
                date: entry.date,
                label: date_label(entry.date),
                entries: vec![entry.clone()],
            }),
        }
    }
    groups
}

/// Entries released on `date`
pub fn releases_on(entries: &[CalendarEntry], date: NaiveDate) -> Vec<&CalendarEntry> {
    entries.iter().filter(|e| e.date == date).collect()
}

/// Entries released within `days` days from `today`, inclusive
pub fn releases_within(entries: &[CalendarEntry], today: NaiveDate, days: u32) -> Vec<&CalendarEntry> {
    let end = today + chrono::Duration::days(i64::from(days));
    entries
        .iter()
        .filter(|e| e.date >= today && e.date <= end)
        .collect()
}

// =============================================================================
// Month view
// =============================================================================

/// Month shown by the calendar view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthCursor {
    pub year: i32,
    pub month: u32,
}

impl MonthCursor {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn prev(&self) -> Self {
        Self::containing(self.first_day() - Months::new(1))
    }

    pub fn next(&self) -> Self {
        Self::containing(self.first_day() + Months::new(1))
    }

    /// e.g. "October 2026"
    pub fn label(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }

    pub fn grid(&self) -> Vec<Option<NaiveDate>> {
        month_grid(self.year, self.month)
    }
}

/// Cells of a Sunday-first month grid
///
/// Leading `None`s pad up to the weekday of the 1st, then one cell per day.
pub fn month_grid(year: i32, month: u32) -> Vec<Option<NaiveDate>> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let blanks = first.weekday().num_days_from_sunday() as usize;

    let mut cells = vec![None; blanks];
    cells.extend(
        first
            .iter_days()
            .take_while(|d| d.month() == month)
            .map(Some),
    );
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(title: &str, d: &str) -> CalendarEntry {
        CalendarEntry {
            media: MediaItem::new(1, MediaKind::Movie, title),
            title: title.to_string(),
            date: date(d),
            episode: None,
        }
    }

    #[test]
    fn test_date_label() {
        assert_eq!(date_label(date("2026-10-19")), "Monday, October 19, 2026");
        assert_eq!(date_label(date("2026-11-01")), "Sunday, November 1, 2026");
    }

    #[test]
    fn test_grouping_preserves_order() {
        let entries = vec![
            entry("a", "2026-10-20"),
            entry("b", "2026-10-20"),
            entry("c", "2026-10-22"),
        ];
        let groups = group_by_date(&entries);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].entries.len(), 2);
        assert_eq!(groups[0].entries[1].title, "b");
        assert_eq!(groups[1].label, "Thursday, October 22, 2026");
        assert_eq!(releases_on(&entries, date("2026-10-22")).len(), 1);
    }

    #[test]
    fn test_month_grid_shape() {
        // October 2026 starts on a Thursday
        let grid = month_grid(2026, 10);
        assert_eq!(grid.iter().take_while(|c| c.is_none()).count(), 4);
        assert_eq!(grid.len(), 4 + 31);
        assert_eq!(grid[4], Some(date("2026-10-01")));
        assert_eq!(grid.last().copied().flatten(), Some(date("2026-10-31")));

        // February 2026 starts on a Sunday
        let grid = month_grid(2026, 2);
        assert_eq!(grid[0], Some(date("2026-02-01")));
        assert_eq!(grid.len(), 28);

        assert!(month_grid(2026, 13).is_empty());
    }

    #[test]
    fn test_month_navigation_wraps_years() {
        let jan = MonthCursor::new(2027, 1).unwrap();
        assert_eq!(jan.prev(), MonthCursor::new(2026, 12).unwrap());
        assert_eq!(jan.prev().next(), jan);
        assert_eq!(jan.label(), "January 2027");
        assert!(MonthCursor::new(2026, 0).is_none());
    }

    #[test]
    fn test_releases_within_window() {
        let entries = vec![
            entry("today", "2026-10-19"),
            entry("tomorrow", "2026-10-20"),
            entry("next week", "2026-10-26"),
            entry("later", "2026-10-27"),
        ];
        let today = date("2026-10-19");
        assert_eq!(releases_within(&entries, today, 1).len(), 2);
        assert_eq!(releases_within(&entries, today, 7).len(), 3);
    }
}
