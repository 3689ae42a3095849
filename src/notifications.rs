//! Release reminders
//!
//! Preferences live in the config file. Reminders are calendar entries that
//! fall inside the reminder window and match an enabled kind.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::releases_within;
use crate::models::CalendarEntry;

pub const DAILY_WINDOW_DAYS: u32 = 1;
pub const WEEKLY_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    /// New episodes of watchlisted series
    pub new_episodes: bool,
    /// Premieres of watchlisted movies
    pub movie_releases: bool,
    /// Reminders ahead of release days
    pub upcoming_releases: bool,
    /// Look a week ahead instead of a day
    pub weekly_digest: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            new_episodes: true,
            movie_releases: true,
            upcoming_releases: true,
            weekly_digest: false,
        }
    }
}

impl NotificationPreferences {
    pub fn window_days(&self) -> u32 {
        if self.weekly_digest {
            WEEKLY_WINDOW_DAYS
        } else {
            DAILY_WINDOW_DAYS
        }
    }

    fn wants(&self, entry: &CalendarEntry) -> bool {
        if entry.is_episode() {
            self.new_episodes
        } else {
            self.movie_releases
        }
    }

    /// Toggle a preference by name; returns false for an unknown name
    pub fn set(&mut self, name: &str, on: bool) -> bool {
        let slot = match name.replace('-', "_").as_str() {
            "new_episodes" => &mut self.new_episodes,
            "movie_releases" => &mut self.movie_releases,
            "upcoming_releases" => &mut self.upcoming_releases,
            "weekly_digest" => &mut self.weekly_digest,
            _ => return false,
        };
        *slot = on;
        true
    }
}

/// Entries worth a reminder today
pub fn due_notifications<'a>(
    entries: &'a [CalendarEntry],
    prefs: &NotificationPreferences,
    today: NaiveDate,
) -> Vec<&'a CalendarEntry> {
    if !prefs.upcoming_releases {
        return Vec::new();
    }
    releases_within(entries, today, prefs.window_days())
        .into_iter()
        .filter(|e| prefs.wants(e))
        .collect()
}
