//! TMDB (The Movie Database) API client
//!
//! Provides trending lists, search, genre discovery and full title details.
//! API docs: https://developer.themoviedb.org/docs
//!
//! Every public operation degrades instead of failing: a missing API key,
//! a network error or an unexpected response is logged and surfaces as an
//! empty list or `None`.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    CastMember, Episode, MediaDetail, MediaItem, MediaKind, Provider, SeasonSummary,
    BACKDROP_BASE_URL, DEFAULT_COUNTRY, IMAGE_BASE_URL,
};

const BASE_URL: &str = "https://api.themoviedb.org/3";

/// Genre discovery returns at most this many titles
pub const DISCOVER_LIMIT: usize = 20;

/// Cast list in the detail view is cut to the top-billed entries
pub const CAST_LIMIT: usize = 10;

/// Genre names understood by [`TmdbClient::discover_by_genre`]
pub const GENRES: &[(&str, u32)] = &[
    ("Action", 28),
    ("Adventure", 12),
    ("Animation", 16),
    ("Comedy", 35),
    ("Crime", 80),
    ("Documentary", 99),
    ("Drama", 18),
    ("Family", 10751),
    ("Fantasy", 14),
    ("History", 36),
    ("Horror", 27),
    ("Music", 10402),
    ("Mystery", 9648),
    ("Romance", 10749),
    ("Sci-Fi", 878),
    ("Thriller", 53),
    ("War", 10752),
    ("Western", 37),
];

/// Look up a genre id by name (case-insensitive)
pub fn genre_id(name: &str) -> Option<u32> {
    let name = name.trim();
    GENRES
        .iter()
        .find(|(g, _)| g.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
}

/// TMDB API error types
#[derive(Error, Debug)]
pub enum TmdbError {
    #[error("TMDB API key is missing")]
    MissingApiKey,

    #[error("Resource not found (404)")]
    NotFound,

    #[error("Unauthorized (401), check the API key")]
    Unauthorized,

    #[error("Rate limited (429), retries exhausted")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// TMDB API client
pub struct TmdbClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl TmdbClient {
    /// Create a new TMDB client; a blank key leaves the client unconfigured
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            api_key: Some(api_key).filter(|k| !k.trim().is_empty()),
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            max_retries: 3,
        }
    }

    /// Whether an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Make an authenticated GET request with retry logic for rate limits
    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, TmdbError> {
        let api_key = self.api_key.as_deref().ok_or(TmdbError::MissingApiKey)?;
        let url = format!("{}{}", self.base_url, endpoint);
        let mut retries = 0;

        loop {
            debug!(endpoint, "TMDB request");
            let response = self
                .client
                .get(&url)
                .query(&[("api_key", api_key), ("language", "en-US")])
                .header("Accept", "application/json")
                .send()
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await?;
                    let parsed: T = serde_json::from_str(&body).map_err(|e| {
                        TmdbError::InvalidResponse(format!("JSON parse error: {}", e))
                    })?;
                    return Ok(parsed);
                }
                StatusCode::NOT_FOUND => {
                    return Err(TmdbError::NotFound);
                }
                StatusCode::UNAUTHORIZED => {
                    return Err(TmdbError::Unauthorized);
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(TmdbError::RateLimited);
                    }

                    // Get Retry-After header or default to exponential backoff
                    let wait_secs = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(2u64.pow(retries));

                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    continue;
                }
                status => {
                    return Err(TmdbError::ServerError(status.as_u16()));
                }
            }
        }
    }

    /// GET that logs failures and turns them into `None`
    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str) -> Option<T> {
        match self.get(endpoint).await {
            Ok(value) => Some(value),
            Err(TmdbError::MissingApiKey) => {
                warn!(endpoint, "TMDB API key is missing, returning empty result");
                None
            }
            Err(e) => {
                warn!(endpoint, error = %e, "TMDB request failed");
                None
            }
        }
    }

    /// This week's trending titles of one kind
    pub async fn trending(&self, kind: MediaKind) -> Vec<MediaItem> {
        let endpoint = format!("/trending/{}/week", kind.tmdb_path());
        self.fetch::<ListResponse>(&endpoint)
            .await
            .map(|r| r.into_items(Some(kind)))
            .unwrap_or_default()
    }

    /// Search movies and TV shows (people are dropped)
    pub async fn search_multi(&self, query: &str) -> Vec<MediaItem> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let endpoint = format!("/search/multi?query={}", urlencoding::encode(query));
        self.fetch::<ListResponse>(&endpoint)
            .await
            .map(|r| r.into_items(None))
            .unwrap_or_default()
    }

    /// Movies and series of a genre, interleaved one-for-one and capped
    pub async fn discover_by_genre(&self, genre: &str) -> Vec<MediaItem> {
        let Some(id) = genre_id(genre) else {
            debug!(genre, "unknown genre");
            return Vec::new();
        };

        let movie_endpoint = format!("/discover/movie?with_genres={}&sort_by=popularity.desc", id);
        let tv_endpoint = format!("/discover/tv?with_genres={}&sort_by=popularity.desc", id);
        let (movies, shows) = tokio::join!(
            self.fetch::<ListResponse>(&movie_endpoint),
            self.fetch::<ListResponse>(&tv_endpoint),
        );

        let movies = movies
            .map(|r| r.into_items(Some(MediaKind::Movie)))
            .unwrap_or_default();
        let shows = shows
            .map(|r| r.into_items(Some(MediaKind::Series)))
            .unwrap_or_default();

        interleave(movies, shows, DISCOVER_LIMIT)
    }

    /// Full record with cast, trailer and providers for `country`
    ///
    /// Providers fall back to the default country when the catalog has
    /// none listed for the requested one.
    pub async fn details(&self, id: u64, kind: MediaKind, country: &str) -> Option<MediaDetail> {
        let base = format!("/{}/{}", kind.tmdb_path(), id);
        let credits_endpoint = format!("{}/credits", base);
        let providers_endpoint = format!("{}/watch/providers", base);
        let videos_endpoint = format!("{}/videos", base);

        let (media, credits, providers, videos) = tokio::join!(
            self.fetch::<RawMedia>(&base),
            self.fetch::<CreditsResponse>(&credits_endpoint),
            self.fetch::<ProvidersResponse>(&providers_endpoint),
            self.fetch::<VideosResponse>(&videos_endpoint),
        );

        let media = media?;
        let season_list: Vec<SeasonSummary> = media
            .seasons
            .iter()
            .filter(|s| s.season_number > 0)
            .map(SeasonRaw::to_summary)
            .collect();
        let item = media.into_item(Some(kind))?;

        let cast: Vec<CastMember> = credits
            .map(|c| c.cast.into_iter().take(CAST_LIMIT).map(CastRaw::into_member).collect())
            .unwrap_or_default();
        let trailer_key = videos.and_then(|v| pick_trailer(&v.results));
        let (provider_region, providers) = providers
            .and_then(|p| p.resolve(country))
            .map(|(region, list)| (Some(region), list))
            .unwrap_or((None, Vec::new()));

        Some(MediaDetail {
            item,
            cast,
            trailer_key,
            providers,
            provider_region,
            season_list,
        })
    }

    /// All seasons of a series as listed by the catalog (specials included)
    pub async fn seasons(&self, series_id: u64) -> Vec<SeasonSummary> {
        let endpoint = format!("/tv/{}", series_id);
        self.fetch::<RawMedia>(&endpoint)
            .await
            .map(|m| m.seasons.iter().map(SeasonRaw::to_summary).collect())
            .unwrap_or_default()
    }

    /// Episodes of one season, in catalog order
    pub async fn season_episodes(&self, series_id: u64, season: u32) -> Vec<Episode> {
        let endpoint = format!("/tv/{}/season/{}", series_id, season);
        self.fetch::<SeasonResponse>(&endpoint)
            .await
            .map(|r| r.into_episodes(season))
            .unwrap_or_default()
    }
}

/// Alternate items from `a` and `b`, continuing with the longer list, then cap
fn interleave(a: Vec<MediaItem>, b: Vec<MediaItem>, limit: usize) -> Vec<MediaItem> {
    let mut combined = Vec::with_capacity(a.len() + b.len());
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    loop {
        let (x, y) = (a.next(), b.next());
        if x.is_none() && y.is_none() {
            break;
        }
        combined.extend(x);
        combined.extend(y);
    }
    combined.truncate(limit);
    combined
}

/// First YouTube "Trailer", else first YouTube video of any type
fn pick_trailer(videos: &[VideoRaw]) -> Option<String> {
    let youtube = |v: &&VideoRaw| v.site == "YouTube";
    videos
        .iter()
        .filter(youtube)
        .find(|v| v.video_type == "Trailer")
        .or_else(|| videos.iter().find(youtube))
        .map(|v| v.key.clone())
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<RawMedia>,
}

impl ListResponse {
    fn into_items(self, kind: Option<MediaKind>) -> Vec<MediaItem> {
        self.results
            .into_iter()
            .filter_map(|r| r.into_item(kind))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    id: u64,
    media_type: Option<String>,
    // Movies use "title", TV uses "name"
    title: Option<String>,
    name: Option<String>,
    // Movies use "release_date", TV uses "first_air_date"
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f32>,
    #[serde(default)]
    genres: Vec<GenreRaw>,
    runtime: Option<u32>,
    number_of_seasons: Option<u32>,
    number_of_episodes: Option<u32>,
    #[serde(default)]
    seasons: Vec<SeasonRaw>,
}

impl RawMedia {
    /// Normalize; `kind` is used when the payload carries no `media_type`
    fn into_item(self, kind: Option<MediaKind>) -> Option<MediaItem> {
        let kind = match self.media_type.as_deref() {
            // Filter out "person" and other types
            Some(media_type) => MediaKind::from_tmdb(media_type)?,
            None => kind.unwrap_or(if self.first_air_date.is_some() {
                MediaKind::Series
            } else {
                MediaKind::Movie
            }),
        };

        let title = self.title.or(self.name).unwrap_or_default();
        let date_str = self
            .release_date
            .filter(|d| !d.is_empty())
            .or(self.first_air_date.filter(|d| !d.is_empty()));
        let year = date_str.as_deref().and_then(extract_year);
        let release_date = date_str.as_deref().and_then(parse_date);
        let is_movie = kind == MediaKind::Movie;

        Some(MediaItem {
            id: self.id,
            kind,
            title,
            poster: self.poster_path.map(|p| format!("{}{}", IMAGE_BASE_URL, p)),
            backdrop: self
                .backdrop_path
                .map(|p| format!("{}{}", BACKDROP_BASE_URL, p)),
            rating: self
                .vote_average
                .filter(|v| *v > 0.0)
                .map(|v| (v * 10.0).round() / 10.0),
            year,
            overview: self.overview.unwrap_or_default(),
            genres: self.genres.into_iter().map(|g| g.name).collect(),
            runtime: self.runtime.filter(|_| is_movie),
            seasons: self.number_of_seasons.filter(|_| !is_movie),
            episodes: self.number_of_episodes.filter(|_| !is_movie),
            release_date,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenreRaw {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SeasonRaw {
    season_number: u32,
    #[serde(default)]
    episode_count: u32,
    name: Option<String>,
    air_date: Option<String>,
}

impl SeasonRaw {
    fn to_summary(&self) -> SeasonSummary {
        SeasonSummary {
            season_number: self.season_number,
            episode_count: self.episode_count,
            name: self.name.clone(),
            air_date: self.air_date.as_deref().and_then(parse_date),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeasonResponse {
    #[serde(default)]
    episodes: Vec<EpisodeRaw>,
}

impl SeasonResponse {
    fn into_episodes(self, season: u32) -> Vec<Episode> {
        self.episodes
            .into_iter()
            .map(|e| e.into_episode(season))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct EpisodeRaw {
    episode_number: u32,
    season_number: Option<u32>,
    name: Option<String>,
    overview: Option<String>,
    runtime: Option<u32>,
    air_date: Option<String>,
}

impl EpisodeRaw {
    fn into_episode(self, season: u32) -> Episode {
        Episode {
            season: self.season_number.unwrap_or(season),
            episode: self.episode_number,
            name: self.name.unwrap_or_default(),
            overview: self.overview.unwrap_or_default(),
            runtime: self.runtime,
            air_date: self.air_date.as_deref().and_then(parse_date),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    #[serde(default)]
    cast: Vec<CastRaw>,
}

#[derive(Debug, Deserialize)]
struct CastRaw {
    id: u64,
    name: String,
    character: Option<String>,
    profile_path: Option<String>,
}

impl CastRaw {
    fn into_member(self) -> CastMember {
        CastMember {
            id: self.id,
            name: self.name,
            character: self.character.filter(|c| !c.is_empty()),
            profile: self.profile_path.map(|p| format!("{}{}", IMAGE_BASE_URL, p)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProvidersResponse {
    #[serde(default)]
    results: HashMap<String, RegionProviders>,
}

impl ProvidersResponse {
    /// Providers for `country`, else the default country
    fn resolve(mut self, country: &str) -> Option<(String, Vec<Provider>)> {
        let country = country.to_uppercase();
        let (region, providers) = match self.results.remove(&country) {
            Some(p) => (country, p),
            None => (
                DEFAULT_COUNTRY.to_string(),
                self.results.remove(DEFAULT_COUNTRY)?,
            ),
        };
        let list = providers
            .flatrate
            .into_iter()
            .map(ProviderRaw::into_provider)
            .collect();
        Some((region, list))
    }
}

#[derive(Debug, Deserialize)]
struct RegionProviders {
    #[serde(default)]
    flatrate: Vec<ProviderRaw>,
}

#[derive(Debug, Deserialize)]
struct ProviderRaw {
    provider_id: u64,
    provider_name: String,
    logo_path: Option<String>,
}

impl ProviderRaw {
    fn into_provider(self) -> Provider {
        Provider {
            id: self.provider_id,
            name: self.provider_name,
            logo: self.logo_path.map(|p| format!("{}{}", BACKDROP_BASE_URL, p)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    results: Vec<VideoRaw>,
}

#[derive(Debug, Deserialize)]
struct VideoRaw {
    key: String,
    site: String,
    #[serde(rename = "type")]
    video_type: String,
}

/// Extract year from a date string like "2022-03-04"
fn extract_year(date: &str) -> Option<u16> {
    date.get(..4)?.parse().ok()
}

/// Parse a catalog date; empty or malformed strings yield `None`
fn parse_date(date: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
