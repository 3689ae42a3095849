//! Where user data is written
//!
//! One backend is picked when the store is created and kept for the whole
//! session. `LocalBackend` uses device storage; `RemoteBackend` talks to the
//! optional hosted backend for a signed-in user.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::identity::{choose_backend, BackendChoice};
use super::local::{keys, LocalStorage, StorageError};
use super::EpisodeWatchedMap;
use crate::api::backend::{MediaTable, ProfileRow};
use crate::api::{BackendClient, BackendError, Session};
use crate::models::{MediaItem, UserProfile};

#[derive(Error, Debug)]
pub enum PersistError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] BackendError),
}

/// Everything a backend holds for the current user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub profile: Option<UserProfile>,
    pub watchlist: Vec<MediaItem>,
    pub watched: Vec<MediaItem>,
    pub episodes: EpisodeWatchedMap,
}

#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether the profile comes from an authenticated session
    fn is_remote(&self) -> bool {
        false
    }

    async fn load(&self) -> Result<Snapshot, PersistError>;

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), PersistError>;

    async fn save_watchlist(&self, items: &[MediaItem]) -> Result<(), PersistError>;

    async fn save_watched(&self, items: &[MediaItem]) -> Result<(), PersistError>;

    async fn save_episode_map(&self, map: &EpisodeWatchedMap) -> Result<(), PersistError>;
}

// =============================================================================
// Local
// =============================================================================

/// Device-local persistence
#[derive(Debug, Clone)]
pub struct LocalBackend {
    storage: LocalStorage,
}

impl LocalBackend {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// A value that fails to parse is treated as absent
    fn read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.storage.get_json(key) {
            Ok(value) => Ok(value),
            Err(e @ StorageError::InvalidValue { .. }) => {
                warn!(key, error = %e, "ignoring unreadable stored value");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PersistenceBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn load(&self) -> Result<Snapshot, PersistError> {
        Ok(Snapshot {
            profile: self.read(keys::USER_DATA)?,
            watchlist: self.read(keys::WATCHLIST)?.unwrap_or_default(),
            watched: self.read(keys::WATCHED)?.unwrap_or_default(),
            episodes: self.read(keys::WATCHED_EPISODES)?.unwrap_or_default(),
        })
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), PersistError> {
        Ok(self.storage.set_json(keys::USER_DATA, profile)?)
    }

    async fn save_watchlist(&self, items: &[MediaItem]) -> Result<(), PersistError> {
        Ok(self.storage.set_json(keys::WATCHLIST, items)?)
    }

    async fn save_watched(&self, items: &[MediaItem]) -> Result<(), PersistError> {
        Ok(self.storage.set_json(keys::WATCHED, items)?)
    }

    async fn save_episode_map(&self, map: &EpisodeWatchedMap) -> Result<(), PersistError> {
        Ok(self.storage.set_json(keys::WATCHED_EPISODES, map)?)
    }
}

// =============================================================================
// Remote
// =============================================================================

/// Hosted persistence for a signed-in user
#[derive(Clone)]
pub struct RemoteBackend {
    client: BackendClient,
    session: Session,
}

impl RemoteBackend {
    pub fn new(client: BackendClient, session: Session) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Profile for a user who has no row yet
    fn profile_from_session(&self) -> UserProfile {
        ProfileRow {
            id: self.session.user.id.clone(),
            email: self.session.user.email.clone(),
            full_name: self
                .session
                .user
                .email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .map(str::to_string),
            ..Default::default()
        }
        .into_profile()
    }
}

#[async_trait]
impl PersistenceBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<Snapshot, PersistError> {
        let row = self.client.fetch_profile(&self.session).await?;
        let watchlist = self
            .client
            .fetch_media_rows(&self.session, MediaTable::Watchlists)
            .await?;
        let watched = self
            .client
            .fetch_media_rows(&self.session, MediaTable::History)
            .await?;

        let (profile, episodes) = match row {
            Some(mut row) => {
                let episodes = row.watched_episodes.take().unwrap_or_default();
                (row.into_profile(), episodes)
            }
            None => {
                // Later column updates need a row to land on
                info!(user = %self.session.user.id, "creating missing profile row");
                let profile = self.profile_from_session();
                self.client
                    .upsert_profile(&self.session, &ProfileRow::from_profile(&profile))
                    .await?;
                (profile, EpisodeWatchedMap::new())
            }
        };

        Ok(Snapshot {
            profile: Some(profile),
            watchlist: watchlist.into_iter().map(|r| r.into_item()).collect(),
            watched: watched.into_iter().map(|r| r.into_item()).collect(),
            episodes,
        })
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), PersistError> {
        let row = ProfileRow::from_profile(profile);
        Ok(self.client.upsert_profile(&self.session, &row).await?)
    }

    async fn save_watchlist(&self, items: &[MediaItem]) -> Result<(), PersistError> {
        Ok(self
            .client
            .replace_media_rows(&self.session, MediaTable::Watchlists, items)
            .await?)
    }

    async fn save_watched(&self, items: &[MediaItem]) -> Result<(), PersistError> {
        Ok(self
            .client
            .replace_media_rows(&self.session, MediaTable::History, items)
            .await?)
    }

    async fn save_episode_map(&self, map: &EpisodeWatchedMap) -> Result<(), PersistError> {
        let fields = serde_json::json!({ "watched_episodes": map });
        Ok(self.client.patch_profile(&self.session, &fields).await?)
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Session persisted by a previous login, if it can be read
pub fn stored_session(storage: &LocalStorage) -> Option<Session> {
    match storage.get_json::<Session>(keys::AUTH_SESSION) {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable session");
            None
        }
    }
}

/// Pick the backend for this session
///
/// `backend` is `Some` only when the hosted backend is configured.
pub fn select_backend(
    backend: Option<BackendClient>,
    storage: LocalStorage,
) -> Box<dyn PersistenceBackend> {
    let session = stored_session(&storage);
    match (
        choose_backend(backend.is_some(), session.is_some()),
        backend,
        session,
    ) {
        (BackendChoice::Remote, Some(client), Some(session)) => {
            info!(user = %session.user.id, "using remote persistence");
            Box::new(RemoteBackend::new(client, session))
        }
        _ => {
            debug!(path = %storage.path().display(), "using local persistence");
            Box::new(LocalBackend::new(storage))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::backend::SessionUser;
    use crate::models::MediaKind;

    fn storage() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("storage.json"));
        (dir, storage)
    }

    fn session() -> Session {
        Session {
            access_token: "token".into(),
            refresh_token: None,
            user: SessionUser {
                id: "user-1".into(),
                email: Some("fan@example.com".into()),
            },
        }
    }

    #[tokio::test]
    async fn test_local_round_trip() {
        let (_dir, storage) = storage();
        let backend = LocalBackend::new(storage);
        let items = vec![MediaItem::new(1, MediaKind::Movie, "Dune")];
        let mut map = EpisodeWatchedMap::new();
        map.toggle(2, 1, 1);

        backend.save_watchlist(&items).await.unwrap();
        backend.save_episode_map(&map).await.unwrap();

        let snapshot = backend.load().await.unwrap();
        assert_eq!(snapshot.watchlist, items);
        assert!(snapshot.watched.is_empty());
        assert_eq!(snapshot.episodes, map);
        assert!(snapshot.profile.is_none());
    }

    #[tokio::test]
    async fn test_local_ignores_corrupt_values() {
        let (_dir, storage) = storage();
        storage.set_item(keys::WATCHED, "not json").unwrap();
        let snapshot = LocalBackend::new(storage).load().await.unwrap();
        assert!(snapshot.watched.is_empty());
    }

    #[test]
    fn test_selects_local_without_session() {
        let (_dir, storage) = storage();
        let client = BackendClient::new("http://localhost:1", "anon");
        assert_eq!(select_backend(Some(client), storage).name(), "local");
    }

    #[test]
    fn test_selects_local_when_unconfigured() {
        let (_dir, storage) = storage();
        storage.set_json(keys::AUTH_SESSION, &session()).unwrap();
        assert_eq!(select_backend(None, storage).name(), "local");
    }

    #[test]
    fn test_selects_remote_with_session() {
        let (_dir, storage) = storage();
        storage.set_json(keys::AUTH_SESSION, &session()).unwrap();
        let client = BackendClient::new("http://localhost:1", "anon");
        let backend = select_backend(Some(client), storage);
        assert_eq!(backend.name(), "remote");
        assert!(backend.is_remote());
    }

    #[test]
    fn test_profile_from_session_uses_email_name() {
        let client = BackendClient::new("http://localhost:1", "anon");
        let profile = RemoteBackend::new(client, session()).profile_from_session();
        assert_eq!(profile.id, "user-1");
        assert_eq!(profile.name, "fan");
        assert_eq!(profile.email, "fan@example.com");
    }
}
