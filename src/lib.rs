//! What's Next? - movie and TV tracker
//!
//! Browse trending titles, search the TMDB catalog, keep a watchlist and a
//! watched history, track episode progress and see upcoming releases.
//!
//! # Modules
//!
//! - `models` - Media records, profiles and calendar entries
//! - `api` - TMDB catalog client and the optional hosted backend
//! - `store` - User data store and its persistence backends
//! - `calendar` - Release calendar built from the watchlist
//! - `backup` - Export/import of watch data
//! - `auth` - Login and registration
//! - `notifications` - Release reminders
//! - `config` / `cli` / `commands` - Command-line front end

pub mod api;
pub mod auth;
pub mod backup;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod notifications;
pub mod store;

// Re-export commonly used types
pub use models::{
    CalendarEntry, Episode, MediaDetail, MediaItem, MediaKind, ProfileUpdate, SeasonSummary,
    UserProfile, UserStats,
};

pub use api::{BackendClient, TmdbClient};
pub use config::Config;
pub use store::{EpisodeWatchedMap, StoreEvent, UserStore, WriteOutcome};
