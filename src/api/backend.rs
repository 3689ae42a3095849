//! Backend-as-a-service client
//!
//! Talks to a Supabase-style deployment: GoTrue for sessions
//! (`/auth/v1/*`) and PostgREST for the `profiles`, `watchlists` and
//! `history` tables (`/rest/v1/*`). Entirely optional: nothing in the
//! catalog features depends on it.

use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{MediaItem, MediaKind, UserProfile, UserStats, DEFAULT_COUNTRY};
use crate::store::EpisodeWatchedMap;

/// Backend error types
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend is not configured")]
    NotConfigured,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Account needs email confirmation before signing in")]
    ConfirmationRequired,

    #[error("Backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("No {0} row exists for the signed-in user")]
    MissingRow(&'static str),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// Tables holding one row per (user, media) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTable {
    Watchlists,
    History,
}

impl MediaTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaTable::Watchlists => "watchlists",
            MediaTable::History => "history",
        }
    }
}

/// Authenticated user as reported by the auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Signed-in session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: SessionUser,
}

/// Extra fields stored with a new account
#[derive(Debug, Clone, Serialize)]
pub struct SignUpMetadata {
    pub full_name: String,
    pub country: String,
}

/// Row of the `profiles` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_episodes: Option<EpisodeWatchedMap>,
}

impl ProfileRow {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            full_name: Some(profile.name.clone()),
            username: None,
            avatar_url: profile.avatar.clone(),
            email: Some(profile.email.clone()).filter(|e| !e.is_empty()),
            country: Some(profile.country.clone()),
            bio: Some(profile.bio.clone()),
            created_at: None,
            watched_episodes: None,
        }
    }

    /// Stats are left zeroed; the store recomputes them from history
    pub fn into_profile(self) -> UserProfile {
        let joined = self
            .created_at
            .as_deref()
            .and_then(|c| c.get(..10))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        UserProfile {
            name: self
                .full_name
                .or(self.username)
                .unwrap_or_else(|| "Movie Fan".to_string()),
            id: self.id,
            avatar: self.avatar_url,
            email: self.email.unwrap_or_default(),
            country: self.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            joined,
            bio: self.bio.unwrap_or_default(),
            stats: UserStats::default(),
        }
    }
}

/// Row of the `watchlists` / `history` tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRow {
    pub user_id: String,
    pub movie_id: u64,
    pub media_type: MediaKind,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    /// Full normalized record
    #[serde(default)]
    pub payload: Option<MediaItem>,
}

impl MediaRow {
    pub fn from_item(user_id: &str, item: &MediaItem) -> Self {
        Self {
            user_id: user_id.to_string(),
            movie_id: item.id,
            media_type: item.kind,
            title: item.title.clone(),
            poster_path: item.poster.clone(),
            vote_average: item.rating,
            release_date: item.release_date,
            payload: Some(item.clone()),
        }
    }

    /// Prefer the stored payload; older rows only have the flat columns
    pub fn into_item(self) -> MediaItem {
        if let Some(item) = self.payload {
            return item;
        }
        let mut item = MediaItem::new(self.movie_id, self.media_type, self.title);
        item.poster = self.poster_path;
        item.rating = self.vote_average;
        item.release_date = self.release_date;
        item
    }
}

#[derive(Debug, Deserialize)]
struct SignUpResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error_description", alias = "msg", alias = "error")]
    message: Option<String>,
}

/// Backend REST client
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
}

impl BackendClient {
    /// Create a client for a project URL and its public (anon) key
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    fn request(&self, method: Method, path: &str, session: Option<&Session>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = method.as_str(), path, "backend request");
        let token = session
            .map(|s| s.access_token.as_str())
            .unwrap_or(&self.anon_key);
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json")
    }

    /// Map non-success statuses to errors, keeping the server's message
    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(BackendError::Unauthorized(message))
            }
            _ => Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let body = Self::check(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    // -------------------------------------------------------------------------
    // Auth
    // -------------------------------------------------------------------------

    /// Password sign-in
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/token?grant_type=password", None)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        Self::json(response).await
    }

    /// Create an account; fails with `ConfirmationRequired` when the
    /// project does not hand out a session until the email is confirmed
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Session, BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/signup", None)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;
        let body: SignUpResponse = Self::json(response).await?;
        match (body.access_token, body.user) {
            (Some(access_token), Some(user)) => Ok(Session {
                access_token,
                refresh_token: body.refresh_token,
                user,
            }),
            _ => Err(BackendError::ConfirmationRequired),
        }
    }

    /// Revoke the session's tokens
    pub async fn sign_out(&self, session: &Session) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/logout", Some(session))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Profiles
    // -------------------------------------------------------------------------

    pub async fn fetch_profile(&self, session: &Session) -> Result<Option<ProfileRow>, BackendError> {
        let path = format!(
            "/rest/v1/profiles?id=eq.{}&select=*",
            urlencoding::encode(&session.user.id)
        );
        let response = self.request(Method::GET, &path, Some(session)).send().await?;
        let rows: Vec<ProfileRow> = Self::json(response).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert or update the whole profile row
    pub async fn upsert_profile(&self, session: &Session, row: &ProfileRow) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, "/rest/v1/profiles?on_conflict=id", Some(session))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Update selected profile columns; fails when the user has no row
    pub async fn patch_profile(
        &self,
        session: &Session,
        fields: &serde_json::Value,
    ) -> Result<(), BackendError> {
        let path = format!(
            "/rest/v1/profiles?id=eq.{}&select=id",
            urlencoding::encode(&session.user.id)
        );
        let response = self
            .request(Method::PATCH, &path, Some(session))
            .header("Prefer", "return=representation")
            .json(fields)
            .send()
            .await?;
        let updated: Vec<serde_json::Value> = Self::json(response).await?;
        if updated.is_empty() {
            return Err(BackendError::MissingRow("profiles"));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Watchlist / history rows
    // -------------------------------------------------------------------------

    /// The user's rows, oldest first
    pub async fn fetch_media_rows(
        &self,
        session: &Session,
        table: MediaTable,
    ) -> Result<Vec<MediaRow>, BackendError> {
        let path = format!(
            "/rest/v1/{}?user_id=eq.{}&select=*&order=created_at.asc",
            table.as_str(),
            urlencoding::encode(&session.user.id)
        );
        let response = self.request(Method::GET, &path, Some(session)).send().await?;
        Self::json(response).await
    }

    /// Make the table's rows for this user equal to `items`
    ///
    /// Upserts every item, then deletes rows whose media id is no longer
    /// listed.
    pub async fn replace_media_rows(
        &self,
        session: &Session,
        table: MediaTable,
        items: &[MediaItem],
    ) -> Result<(), BackendError> {
        let user_id = session.user.id.as_str();

        if !items.is_empty() {
            let rows: Vec<MediaRow> = items
                .iter()
                .map(|item| MediaRow::from_item(user_id, item))
                .collect();
            let path = format!("/rest/v1/{}?on_conflict=user_id,movie_id", table.as_str());
            let response = self
                .request(Method::POST, &path, Some(session))
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&rows)
                .send()
                .await?;
            Self::check(response).await?;
        }

        let mut path = format!(
            "/rest/v1/{}?user_id=eq.{}",
            table.as_str(),
            urlencoding::encode(user_id)
        );
        if !items.is_empty() {
            let ids: Vec<String> = items.iter().map(|i| i.id.to_string()).collect();
            path.push_str(&format!("&movie_id=not.in.({})", ids.join(",")));
        }
        let response = self.request(Method::DELETE, &path, Some(session)).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}
