//! User data store
//!
//! Holds the current profile, watchlist, watched list and episode progress
//! for one session. Every mutation updates memory first and then writes the
//! affected collection through the session's [`PersistenceBackend`]. A failed
//! write never rolls memory back: it is logged, reported as
//! [`WriteOutcome::Unsaved`] and broadcast as [`StoreEvent::PersistFailed`].
//!
//! A load that fails leaves the store in [`StoreState::Failed`]: nothing was
//! read, so nothing may be written over what the backend holds.

pub mod episodes;
pub mod identity;
pub mod library;
pub mod local;
pub mod persistence;
pub mod search_history;

pub use episodes::EpisodeWatchedMap;
pub use identity::{bootstrap_identity, choose_backend, BackendChoice, IdentityEnv, IdentitySource};
pub use library::{compute_stats, library_view, series_progress, KindFilter, LibrarySort, SeriesProgress};
pub use local::{LocalStorage, StorageError};
pub use persistence::{
    select_backend, stored_session, LocalBackend, PersistError, PersistenceBackend, RemoteBackend,
    Snapshot,
};
pub use search_history::SearchHistory;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::models::{MediaItem, ProfileUpdate, UserProfile};

const EVENT_CAPACITY: usize = 32;

/// Load state of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    Uninitialized,
    Loading,
    Ready,
    /// The backend could not be read; writes are refused
    Failed,
}

/// Independently persisted pieces of user data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Profile,
    Watchlist,
    Watched,
    Episodes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Changed(Collection),
    PersistFailed { collection: Collection, reason: String },
}

/// Result of a store mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing to do; memory and backend untouched
    Unchanged,
    /// Memory updated and written
    Saved,
    /// Memory updated but the write failed
    Unsaved(String),
}

impl WriteOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, WriteOutcome::Saved)
    }

    pub fn changed(&self) -> bool {
        !matches!(self, WriteOutcome::Unchanged)
    }

    /// Combine outcomes of writes made for one operation; failures win
    fn and(self, other: WriteOutcome) -> WriteOutcome {
        match (self, other) {
            (WriteOutcome::Unsaved(a), _) => WriteOutcome::Unsaved(a),
            (_, WriteOutcome::Unsaved(b)) => WriteOutcome::Unsaved(b),
            (WriteOutcome::Saved, _) | (_, WriteOutcome::Saved) => WriteOutcome::Saved,
            _ => WriteOutcome::Unchanged,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("User data has not been loaded yet")]
    NotReady,

    #[error("User data could not be loaded: {0}")]
    LoadFailed(String),
}

/// The session's user data
pub struct UserStore {
    backend: Box<dyn PersistenceBackend>,
    state: StoreState,
    load_error: Option<String>,
    source: Option<IdentitySource>,
    profile: Option<UserProfile>,
    watchlist: Vec<MediaItem>,
    watched: Vec<MediaItem>,
    episodes: EpisodeWatchedMap,
    events: broadcast::Sender<StoreEvent>,
}

impl UserStore {
    pub fn new(backend: Box<dyn PersistenceBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            state: StoreState::Uninitialized,
            load_error: None,
            source: None,
            profile: None,
            watchlist: Vec::new(),
            watched: Vec::new(),
            episodes: EpisodeWatchedMap::new(),
            events,
        }
    }

    /// Receive change and failure notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn is_remote(&self) -> bool {
        self.backend.is_remote()
    }

    /// Where the current identity came from, once loaded
    pub fn identity_source(&self) -> Option<IdentitySource> {
        self.source
    }

    /// Load the session's data using today's local date
    pub async fn load(&mut self) -> Result<IdentitySource, StoreError> {
        self.load_on(Local::now().date_naive()).await
    }

    /// Load the session's data; later calls return the first result
    pub async fn load_on(&mut self, today: NaiveDate) -> Result<IdentitySource, StoreError> {
        if let Some(source) = self.source {
            return Ok(source);
        }
        if let Some(reason) = &self.load_error {
            return Err(StoreError::LoadFailed(reason.clone()));
        }
        self.state = StoreState::Loading;

        let snapshot = match self.backend.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let reason = e.to_string();
                error!(backend = self.backend.name(), error = %reason, "failed to load user data");
                self.state = StoreState::Failed;
                self.load_error = Some(reason.clone());
                return Err(StoreError::LoadFailed(reason));
            }
        };

        let remote = self.backend.is_remote();
        let (mut profile, source) = bootstrap_identity(IdentityEnv {
            session_profile: snapshot.profile.clone().filter(|_| remote),
            stored_profile: snapshot.profile.filter(|_| !remote),
            today,
        });

        self.watchlist = dedupe(snapshot.watchlist);
        self.watched = dedupe(snapshot.watched);
        self.episodes = snapshot.episodes;
        profile.stats = compute_stats(&self.watched, &self.episodes);

        // A remote session never gets a demo profile written over its row
        if source == IdentitySource::Demo && !remote {
            if let Err(e) = self.backend.save_profile(&profile).await {
                warn!(error = %e, "could not persist demo profile");
            }
        }

        info!(
            backend = self.backend.name(),
            source = ?source,
            watchlist = self.watchlist.len(),
            watched = self.watched.len(),
            "user data loaded"
        );
        self.profile = Some(profile);
        self.source = Some(source);
        self.state = StoreState::Ready;
        Ok(source)
    }

    fn ensure_ready(&self) -> Result<(), StoreError> {
        match (self.state, &self.load_error) {
            (StoreState::Ready, _) => Ok(()),
            (StoreState::Failed, Some(reason)) => Err(StoreError::LoadFailed(reason.clone())),
            _ => Err(StoreError::NotReady),
        }
    }

    /// Turn a backend result into an outcome and an event
    fn settle(&self, collection: Collection, result: Result<(), PersistError>) -> WriteOutcome {
        match result {
            Ok(()) => {
                debug!(?collection, "saved");
                let _ = self.events.send(StoreEvent::Changed(collection));
                WriteOutcome::Saved
            }
            Err(e) => {
                let reason = e.to_string();
                error!(?collection, backend = self.backend.name(), error = %reason, "failed to save");
                let _ = self.events.send(StoreEvent::PersistFailed {
                    collection,
                    reason: reason.clone(),
                });
                WriteOutcome::Unsaved(reason)
            }
        }
    }

    async fn persist_watchlist(&self) -> WriteOutcome {
        let result = self.backend.save_watchlist(&self.watchlist).await;
        self.settle(Collection::Watchlist, result)
    }

    async fn persist_watched(&self) -> WriteOutcome {
        let result = self.backend.save_watched(&self.watched).await;
        self.settle(Collection::Watched, result)
    }

    async fn persist_episodes(&self) -> WriteOutcome {
        let result = self.backend.save_episode_map(&self.episodes).await;
        self.settle(Collection::Episodes, result)
    }

    fn refresh_stats(&mut self) {
        let stats = compute_stats(&self.watched, &self.episodes);
        if let Some(profile) = self.profile.as_mut() {
            profile.stats = stats;
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn watchlist(&self) -> &[MediaItem] {
        &self.watchlist
    }

    pub fn watched(&self) -> &[MediaItem] {
        &self.watched
    }

    pub fn episodes(&self) -> &EpisodeWatchedMap {
        &self.episodes
    }

    pub fn is_in_watchlist(&self, id: u64) -> bool {
        self.watchlist.iter().any(|i| i.id == id)
    }

    pub fn is_watched(&self, id: u64) -> bool {
        self.watched.iter().any(|i| i.id == id)
    }

    pub fn is_episode_watched(&self, series_id: u64, season: u32, episode: u32) -> bool {
        self.episodes.is_watched(series_id, season, episode)
    }

    pub fn watched_episode_count(&self, series_id: u64) -> usize {
        self.episodes.watched_count(series_id)
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    pub async fn add_to_watchlist(&mut self, item: MediaItem) -> Result<WriteOutcome, StoreError> {
        self.ensure_ready()?;
        if self.is_in_watchlist(item.id) {
            return Ok(WriteOutcome::Unchanged);
        }
        self.watchlist.push(item);
        Ok(self.persist_watchlist().await)
    }

    pub async fn remove_from_watchlist(&mut self, id: u64) -> Result<WriteOutcome, StoreError> {
        self.ensure_ready()?;
        if !self.is_in_watchlist(id) {
            return Ok(WriteOutcome::Unchanged);
        }
        self.watchlist.retain(|i| i.id != id);
        Ok(self.persist_watchlist().await)
    }

    /// Record an item as watched and take it off the watchlist
    pub async fn mark_watched(&mut self, item: MediaItem) -> Result<WriteOutcome, StoreError> {
        self.ensure_ready()?;
        if self.is_watched(item.id) {
            return Ok(WriteOutcome::Unchanged);
        }
        let id = item.id;
        let was_listed = self.is_in_watchlist(id);
        self.watched.push(item);
        self.watchlist.retain(|i| i.id != id);
        self.refresh_stats();

        let mut outcome = self.persist_watched().await;
        if was_listed {
            outcome = outcome.and(self.persist_watchlist().await);
        }
        Ok(outcome)
    }

    /// Forget a watched item; the watchlist is left alone
    pub async fn remove_from_watched(&mut self, id: u64) -> Result<WriteOutcome, StoreError> {
        self.ensure_ready()?;
        if !self.is_watched(id) {
            return Ok(WriteOutcome::Unchanged);
        }
        self.watched.retain(|i| i.id != id);
        self.refresh_stats();
        Ok(self.persist_watched().await)
    }

    /// Flip one episode; returns its new state with the write outcome
    pub async fn toggle_episode_watched(
        &mut self,
        series_id: u64,
        season: u32,
        episode: u32,
    ) -> Result<(bool, WriteOutcome), StoreError> {
        self.ensure_ready()?;
        let watched = self.episodes.toggle(series_id, season, episode);
        self.refresh_stats();
        Ok((watched, self.persist_episodes().await))
    }

    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<WriteOutcome, StoreError> {
        self.ensure_ready()?;
        let Some(profile) = self.profile.as_mut() else {
            return Err(StoreError::NotReady);
        };
        if !update.apply(profile) {
            return Ok(WriteOutcome::Unchanged);
        }
        let result = self.backend.save_profile(profile).await;
        Ok(self.settle(Collection::Profile, result))
    }

    /// Swap in a whole profile, e.g. after signing up
    pub async fn replace_profile(&mut self, mut profile: UserProfile) -> Result<WriteOutcome, StoreError> {
        self.ensure_ready()?;
        profile.stats = compute_stats(&self.watched, &self.episodes);
        if self.profile.as_ref() == Some(&profile) {
            return Ok(WriteOutcome::Unchanged);
        }
        let result = self.backend.save_profile(&profile).await;
        self.profile = Some(profile);
        Ok(self.settle(Collection::Profile, result))
    }

    /// Replace the given collections wholesale; `None` leaves one untouched
    pub async fn replace_all(
        &mut self,
        watchlist: Option<Vec<MediaItem>>,
        watched: Option<Vec<MediaItem>>,
        episodes: Option<EpisodeWatchedMap>,
    ) -> Result<WriteOutcome, StoreError> {
        self.ensure_ready()?;
        let mut outcome = WriteOutcome::Unchanged;

        if let Some(watched) = watched {
            self.watched = dedupe(watched);
            outcome = outcome.and(self.persist_watched().await);
        }
        if let Some(watchlist) = watchlist {
            let watched: HashSet<u64> = self.watched.iter().map(|i| i.id).collect();
            self.watchlist = dedupe(watchlist)
                .into_iter()
                .filter(|i| !watched.contains(&i.id))
                .collect();
            outcome = outcome.and(self.persist_watchlist().await);
        }
        if let Some(episodes) = episodes {
            self.episodes = episodes;
            outcome = outcome.and(self.persist_episodes().await);
        }
        self.refresh_stats();
        Ok(outcome)
    }

    /// Empty every collection; the profile is kept
    pub async fn clear_data(&mut self) -> Result<WriteOutcome, StoreError> {
        self.replace_all(Some(Vec::new()), Some(Vec::new()), Some(EpisodeWatchedMap::new()))
            .await
    }
}

/// Keep the first occurrence of every id
fn dedupe(items: Vec<MediaItem>) -> Vec<MediaItem> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Backend that can be told to fail every write, or the load
    #[derive(Default)]
    struct FlakyBackend {
        fail: AtomicBool,
        unreadable: bool,
    }

    #[async_trait]
    impl PersistenceBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn load(&self) -> Result<Snapshot, PersistError> {
            if self.unreadable {
                return Err(crate::api::BackendError::NotConfigured.into());
            }
            Ok(Snapshot::default())
        }

        async fn save_profile(&self, _: &UserProfile) -> Result<(), PersistError> {
            self.result()
        }

        async fn save_watchlist(&self, _: &[MediaItem]) -> Result<(), PersistError> {
            self.result()
        }

        async fn save_watched(&self, _: &[MediaItem]) -> Result<(), PersistError> {
            self.result()
        }

        async fn save_episode_map(&self, _: &EpisodeWatchedMap) -> Result<(), PersistError> {
            self.result()
        }
    }

    impl FlakyBackend {
        fn failing() -> Self {
            Self {
                fail: AtomicBool::new(true),
                ..Default::default()
            }
        }

        fn result(&self) -> Result<(), PersistError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(crate::api::BackendError::NotConfigured.into())
            } else {
                Ok(())
            }
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn movie(id: u64) -> MediaItem {
        MediaItem::new(id, MediaKind::Movie, format!("Movie {}", id))
    }

    #[tokio::test]
    async fn test_mutations_require_load() {
        let mut store = UserStore::new(Box::new(FlakyBackend::default()));
        assert_eq!(store.state(), StoreState::Uninitialized);
        assert_eq!(
            store.add_to_watchlist(movie(1)).await,
            Err(StoreError::NotReady)
        );
    }

    #[tokio::test]
    async fn test_load_is_terminal() {
        let mut store = UserStore::new(Box::new(FlakyBackend::default()));
        assert_eq!(store.load_on(today()).await, Ok(IdentitySource::Demo));
        assert_eq!(store.state(), StoreState::Ready);
        store.add_to_watchlist(movie(1)).await.unwrap();

        store.load_on(today()).await.unwrap();
        assert_eq!(store.watchlist().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_refuses_writes() {
        let mut store = UserStore::new(Box::new(FlakyBackend {
            unreadable: true,
            ..Default::default()
        }));
        assert!(matches!(store.load_on(today()).await, Err(StoreError::LoadFailed(_))));
        assert_eq!(store.state(), StoreState::Failed);
        assert!(store.profile().is_none());
        assert!(matches!(
            store.add_to_watchlist(movie(1)).await,
            Err(StoreError::LoadFailed(_))
        ));
        assert!(store.watchlist().is_empty());

        // Still failed on a second attempt
        assert!(store.load_on(today()).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_memory_and_broadcasts() {
        let mut store = UserStore::new(Box::new(FlakyBackend::failing()));
        store.load_on(today()).await.unwrap();
        let mut events = store.subscribe();

        let outcome = store.add_to_watchlist(movie(1)).await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Unsaved(_)));
        assert!(store.is_in_watchlist(1));
        assert!(matches!(
            events.try_recv(),
            Ok(StoreEvent::PersistFailed {
                collection: Collection::Watchlist,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_mark_watched_moves_item() {
        let mut store = UserStore::new(Box::new(FlakyBackend::default()));
        store.load_on(today()).await.unwrap();
        store.add_to_watchlist(movie(1)).await.unwrap();

        assert_eq!(store.mark_watched(movie(1)).await, Ok(WriteOutcome::Saved));
        assert!(!store.is_in_watchlist(1));
        assert!(store.is_watched(1));
        assert_eq!(store.mark_watched(movie(1)).await, Ok(WriteOutcome::Unchanged));

        store.remove_from_watched(1).await.unwrap();
        assert!(!store.is_watched(1));
        assert!(!store.is_in_watchlist(1));
    }

    #[tokio::test]
    async fn test_stats_follow_history() {
        let mut store = UserStore::new(Box::new(FlakyBackend::default()));
        store.load_on(today()).await.unwrap();
        let mut film = movie(1);
        film.runtime = Some(120);
        store.mark_watched(film).await.unwrap();
        store.toggle_episode_watched(9, 1, 1).await.unwrap();

        let stats = &store.profile().unwrap().stats;
        assert_eq!(stats.movies_watched, 1);
        assert_eq!(stats.episodes_watched, 1);
        assert_eq!(stats.hours_watched, 2);
    }

    #[test]
    fn test_outcome_combination() {
        let unsaved = WriteOutcome::Unsaved("x".into());
        assert_eq!(WriteOutcome::Saved.and(unsaved.clone()), unsaved);
        assert_eq!(
            WriteOutcome::Unchanged.and(WriteOutcome::Saved),
            WriteOutcome::Saved
        );
        assert!(!WriteOutcome::Unchanged.changed());
    }
}
