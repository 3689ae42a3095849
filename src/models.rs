//! Data structures for What's Next
//!
//! Contains all shared models used across the application organized by domain:
//! - **Catalog**: normalized media records, details, seasons and episodes
//! - **User**: profile, watch statistics and partial profile edits
//! - **Calendar**: upcoming releases derived from the watchlist

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Poster image prefix (w500 rendition)
pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

/// Backdrop and logo image prefix (original size)
pub const BACKDROP_BASE_URL: &str = "https://image.tmdb.org/t/p/original";

/// Country used when a profile has none or the catalog has no providers for it
pub const DEFAULT_COUNTRY: &str = "US";

// =============================================================================
// Catalog Models (TMDB)
// =============================================================================

/// Media kind discriminator
///
/// Stored as `"movie"` / `"tv"` to match the catalog's own vocabulary;
/// `"series"` is accepted when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "movie")]
    Movie,
    #[serde(rename = "tv", alias = "series")]
    Series,
}

impl MediaKind {
    /// Path segment TMDB uses for this kind
    pub fn tmdb_path(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        }
    }

    /// Parse TMDB's `media_type` field (`None` for people and other kinds)
    pub fn from_tmdb(media_type: &str) -> Option<Self> {
        match media_type {
            "movie" => Some(MediaKind::Movie),
            "tv" | "series" => Some(MediaKind::Series),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "Movie"),
            MediaKind::Series => write!(f, "TV Show"),
        }
    }
}

/// Normalized media record
///
/// Built from any of the catalog's movie/tv shapes. Movies carry `runtime`,
/// series carry `seasons` / `episodes`; the other fields are shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: u64,
    pub kind: MediaKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Runtime in minutes (movies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,
    /// Number of seasons (series)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasons: Option<u32>,
    /// Number of episodes (series)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<u32>,
    /// Release date for movies, first air date for series
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
}

impl MediaItem {
    /// Minimal record with only the identifying fields set
    pub fn new(id: u64, kind: MediaKind, title: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            title: title.into(),
            poster: None,
            backdrop: None,
            rating: None,
            year: None,
            overview: String::new(),
            genres: Vec::new(),
            runtime: None,
            seasons: None,
            episodes: None,
            release_date: None,
        }
    }

    /// Release date lies strictly after `today`
    pub fn is_upcoming_on(&self, today: NaiveDate) -> bool {
        self.release_date.map(|d| d > today).unwrap_or(false)
    }

    /// Release date lies in the future (local time)
    pub fn is_upcoming(&self) -> bool {
        self.is_upcoming_on(Local::now().date_naive())
    }

    /// Format runtime for display (e.g. "2h 46m")
    pub fn format_runtime(&self) -> Option<String> {
        self.runtime
            .filter(|m| *m > 0)
            .map(|m| format!("{}h {}m", m / 60, m % 60))
    }

    /// Rating with one decimal, or "N/A"
    pub fn rating_label(&self) -> String {
        self.rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "N/A".to_string())
    }
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year_str = self.year.map(|y| format!(" ({})", y)).unwrap_or_default();
        write!(
            f,
            "{}{} [{}] ⭐ {}",
            self.title,
            year_str,
            self.kind,
            self.rating_label()
        )
    }
}

/// Billed cast member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// Streaming service offering a title in a given country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// Summary of a TV season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season_number: u32,
    pub episode_count: u32,
    pub name: Option<String>,
    pub air_date: Option<NaiveDate>,
}

impl fmt::Display for SeasonSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("Season");
        write!(f, "{} ({} episodes)", name, self.episode_count)
    }
}

/// TV episode information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub season: u32,
    pub episode: u32,
    pub name: String,
    pub overview: String,
    pub runtime: Option<u32>,
    pub air_date: Option<NaiveDate>,
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02} - {}", self.season, self.episode, self.name)
    }
}

/// Full record for the detail view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDetail {
    #[serde(flatten)]
    pub item: MediaItem,
    /// Top-billed cast, at most ten
    pub cast: Vec<CastMember>,
    /// YouTube video key of the chosen trailer
    pub trailer_key: Option<String>,
    /// Flat-rate streaming offers
    pub providers: Vec<Provider>,
    /// Country the providers were resolved for
    pub provider_region: Option<String>,
    /// Regular seasons (specials excluded), series only
    #[serde(default)]
    pub season_list: Vec<SeasonSummary>,
}

impl MediaDetail {
    pub fn trailer_url(&self) -> Option<String> {
        self.trailer_key
            .as_ref()
            .map(|k| format!("https://www.youtube.com/watch?v={}", k))
    }
}

impl fmt::Display for MediaDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.item)?;
        if let Some(runtime) = self.item.format_runtime() {
            write!(f, " - {}", runtime)?;
        }
        if let (Some(seasons), Some(episodes)) = (self.item.seasons, self.item.episodes) {
            write!(f, " - {} seasons, {} episodes", seasons, episodes)?;
        }
        Ok(())
    }
}

// =============================================================================
// User Models
// =============================================================================

/// Viewing statistics shown on the profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub hours_watched: u32,
    pub movies_watched: u32,
    pub episodes_watched: u32,
    pub favorite_genre: Option<String>,
}

/// The current user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub email: String,
    /// ISO 3166-1 alpha-2, selects which streaming providers are shown
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined: Option<NaiveDate>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub stats: UserStats,
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

/// Generated avatar for a display name
pub fn avatar_for(name: &str) -> String {
    format!(
        "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
        urlencoding::encode(name)
    )
}

/// Partial profile edit; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.avatar.is_none()
            && self.email.is_none()
            && self.country.is_none()
            && self.bio.is_none()
    }

    /// Merge into `profile`, returning whether anything changed
    pub fn apply(&self, profile: &mut UserProfile) -> bool {
        let before = profile.clone();
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = Some(avatar.clone());
        }
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(country) = &self.country {
            profile.country = country.to_uppercase();
        }
        if let Some(bio) = &self.bio {
            profile.bio = bio.clone();
        }
        *profile != before
    }
}

// =============================================================================
// Calendar Models
// =============================================================================

/// Episode coordinates attached to a calendar entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub season: u32,
    pub episode: u32,
    pub name: String,
}

/// One upcoming release: a movie premiere or a single episode airing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub media: MediaItem,
    /// Display title; episodes are labelled "Series - S1E2"
    pub title: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeRef>,
}

impl CalendarEntry {
    pub fn is_episode(&self) -> bool {
        self.episode.is_some()
    }
}

impl fmt::Display for CalendarEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.date.format("%Y-%m-%d"), self.title)?;
        if let Some(ep) = &self.episode {
            if !ep.name.is_empty() {
                write!(f, " \"{}\"", ep.name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_kind_serializes_as_catalog_vocabulary() {
        assert_eq!(serde_json::to_string(&MediaKind::Series).unwrap(), "\"tv\"");
        let kind: MediaKind = serde_json::from_str("\"series\"").unwrap();
        assert_eq!(kind, MediaKind::Series);
        assert_eq!(MediaKind::from_tmdb("person"), None);
    }

    #[test]
    fn test_upcoming_is_strictly_after_today() {
        let mut item = MediaItem::new(1, MediaKind::Movie, "Dune");
        let today = date("2026-10-19");
        assert!(!item.is_upcoming_on(today));

        item.release_date = Some(today);
        assert!(!item.is_upcoming_on(today));

        item.release_date = Some(date("2026-10-20"));
        assert!(item.is_upcoming_on(today));
    }

    #[test]
    fn test_runtime_and_rating_labels() {
        let mut item = MediaItem::new(1, MediaKind::Movie, "Dune: Part Two");
        assert_eq!(item.format_runtime(), None);
        assert_eq!(item.rating_label(), "N/A");

        item.runtime = Some(166);
        item.rating = Some(8.5);
        assert_eq!(item.format_runtime().as_deref(), Some("2h 46m"));
        assert_eq!(item.rating_label(), "8.5");
    }

    #[test]
    fn test_profile_update_merges_only_set_fields() {
        let mut profile = UserProfile {
            id: "u1".into(),
            name: "Old".into(),
            avatar: None,
            email: "old@example.com".into(),
            country: "US".into(),
            joined: None,
            bio: String::new(),
            stats: UserStats::default(),
        };

        let update = ProfileUpdate {
            name: Some("New".into()),
            country: Some("gr".into()),
            ..Default::default()
        };
        assert!(update.apply(&mut profile));
        assert_eq!(profile.name, "New");
        assert_eq!(profile.country, "GR");
        assert_eq!(profile.email, "old@example.com");

        assert!(!update.apply(&mut profile));
        assert!(ProfileUpdate::default().is_empty());
    }

    #[test]
    fn test_episode_display() {
        let ep = Episode {
            season: 1,
            episode: 3,
            name: "Pilot".into(),
            overview: String::new(),
            runtime: None,
            air_date: None,
        };
        assert_eq!(ep.to_string(), "S01E03 - Pilot");
    }
}
