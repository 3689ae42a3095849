//! TMDB API client tests
//!
//! Tests trending, search, discovery, detail assembly and error handling.

use mockito::{Matcher, Server};
use whatsnext::api::TmdbClient;
use whatsnext::models::MediaKind;

fn list_body(results: &[serde_json::Value]) -> String {
    serde_json::json!({ "page": 1, "results": results }).to_string()
}

// =============================================================================
// Trending / Search
// =============================================================================

#[tokio::test]
async fn test_trending_uses_kind_from_endpoint() {
    let mut server = Server::new_async().await;

    let body = list_body(&[
        serde_json::json!({
            "id": 95396,
            "name": "Severance",
            "first_air_date": "2022-02-18",
            "poster_path": "/poster.jpg",
            "vote_average": 8.4,
            "overview": "Mark leads a team of office workers"
        }),
        serde_json::json!({ "id": 1399, "name": "Game of Thrones", "first_air_date": "" }),
    ]);

    let mock = server
        .mock("GET", "/trending/tv/week")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("api_key".into(), "test_key".into()),
            Matcher::UrlEncoded("language".into(), "en-US".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let results = client.trending(MediaKind::Series).await;

    mock.assert_async().await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].kind, MediaKind::Series);
    assert_eq!(results[0].title, "Severance");
    assert_eq!(results[0].year, Some(2022));
    assert_eq!(
        results[0].poster.as_deref(),
        Some("https://image.tmdb.org/t/p/w500/poster.jpg")
    );
    // Empty date string is treated as absent
    assert_eq!(results[1].year, None);
    assert_eq!(results[1].release_date, None);
}

#[tokio::test]
async fn test_search_drops_people() {
    let mut server = Server::new_async().await;

    let body = list_body(&[
        serde_json::json!({
            "id": 414906,
            "media_type": "movie",
            "title": "The Batman",
            "release_date": "2022-03-01",
            "vote_average": 7.8
        }),
        serde_json::json!({ "id": 880, "media_type": "person", "name": "Ben Affleck" }),
        serde_json::json!({
            "id": 2098,
            "media_type": "tv",
            "name": "Batman: The Animated Series",
            "first_air_date": "1992-09-05"
        }),
    ]);

    let mock = server
        .mock("GET", "/search/multi")
        .match_query(Matcher::UrlEncoded("query".into(), "the batman".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let results = client.search_multi("  the batman ").await;

    mock.assert_async().await;

    let ids: Vec<u64> = results.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![414906, 2098]);
    assert_eq!(results[1].kind, MediaKind::Series);
}

#[tokio::test]
async fn test_blank_search_makes_no_request() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/search/multi")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    assert!(client.search_multi("   ").await.is_empty());

    mock.assert_async().await;
}

// =============================================================================
// Discovery
// =============================================================================

#[tokio::test]
async fn test_discover_interleaves_and_caps() {
    let mut server = Server::new_async().await;

    let movies: Vec<_> = (1..=15)
        .map(|i| serde_json::json!({ "id": i, "title": format!("Movie {}", i), "release_date": "2020-01-01" }))
        .collect();
    let shows: Vec<_> = (101..=115)
        .map(|i| serde_json::json!({ "id": i, "name": format!("Show {}", i), "first_air_date": "2020-01-01" }))
        .collect();

    let movie_mock = server
        .mock("GET", "/discover/movie")
        .match_query(Matcher::UrlEncoded("with_genres".into(), "878".into()))
        .with_status(200)
        .with_body(list_body(&movies))
        .create_async()
        .await;
    let tv_mock = server
        .mock("GET", "/discover/tv")
        .match_query(Matcher::UrlEncoded("with_genres".into(), "878".into()))
        .with_status(200)
        .with_body(list_body(&shows))
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let results = client.discover_by_genre("sci-fi").await;

    movie_mock.assert_async().await;
    tv_mock.assert_async().await;

    assert_eq!(results.len(), 20);
    assert_eq!(results[0].id, 1);
    assert_eq!(results[1].id, 101);
    assert_eq!(results[2].id, 2);
    assert_eq!(results[0].kind, MediaKind::Movie);
    assert_eq!(results[1].kind, MediaKind::Series);
}

#[tokio::test]
async fn test_discover_unknown_genre_is_empty() {
    let server = Server::new_async().await;
    let client = TmdbClient::with_base_url("test_key", server.url());
    assert!(client.discover_by_genre("Superhero").await.is_empty());
}

// =============================================================================
// Details
// =============================================================================

#[tokio::test]
async fn test_details_assembles_record() {
    let mut server = Server::new_async().await;

    let media = server
        .mock("GET", "/movie/550")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            serde_json::json!({
                "id": 550,
                "title": "Fight Club",
                "release_date": "1999-10-15",
                "runtime": 139,
                "genres": [{ "id": 18, "name": "Drama" }],
                "vote_average": 8.4
            })
            .to_string(),
        )
        .create_async()
        .await;

    let cast: Vec<_> = (1..=12)
        .map(|i| serde_json::json!({ "id": i, "name": format!("Actor {}", i), "character": "" }))
        .collect();
    let credits = server
        .mock("GET", "/movie/550/credits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(serde_json::json!({ "cast": cast }).to_string())
        .create_async()
        .await;

    let providers = server
        .mock("GET", "/movie/550/watch/providers")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            serde_json::json!({
                "results": {
                    "US": { "flatrate": [{ "provider_id": 8, "provider_name": "Netflix", "logo_path": "/n.png" }] }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let videos = server
        .mock("GET", "/movie/550/videos")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            serde_json::json!({
                "results": [
                    { "key": "teaser1", "site": "YouTube", "type": "Teaser" },
                    { "key": "trailer1", "site": "YouTube", "type": "Trailer" }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let detail = client
        .details(550, MediaKind::Movie, "gr")
        .await
        .expect("detail");

    media.assert_async().await;
    credits.assert_async().await;
    providers.assert_async().await;
    videos.assert_async().await;

    assert_eq!(detail.item.title, "Fight Club");
    assert_eq!(detail.item.runtime, Some(139));
    assert_eq!(detail.item.genres, vec!["Drama".to_string()]);
    assert_eq!(detail.cast.len(), 10);
    assert_eq!(detail.cast[0].character, None);
    assert_eq!(detail.trailer_key.as_deref(), Some("trailer1"));
    // No providers listed for GR, falls back to US
    assert_eq!(detail.provider_region.as_deref(), Some("US"));
    assert_eq!(detail.providers.len(), 1);
    assert_eq!(detail.providers[0].name, "Netflix");
}

#[tokio::test]
async fn test_details_not_found_is_none() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", Matcher::Regex(r"^/tv/999999".to_string()))
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"status_code":34,"status_message":"The resource you requested could not be found."}"#)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    assert!(client.details(999999, MediaKind::Series, "US").await.is_none());
}

// =============================================================================
// Seasons / Episodes
// =============================================================================

#[tokio::test]
async fn test_season_episodes() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/tv/1396/season/1")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            serde_json::json!({
                "episodes": [
                    { "episode_number": 1, "name": "Pilot", "air_date": "2008-01-20", "runtime": 58 },
                    { "episode_number": 2, "name": "Cat's in the Bag...", "air_date": null }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let episodes = client.season_episodes(1396, 1).await;

    mock.assert_async().await;

    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes[0].season, 1);
    assert_eq!(episodes[0].name, "Pilot");
    assert_eq!(episodes[1].air_date, None);
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_missing_key_makes_no_request() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/trending/movie/week")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("  ", server.url());
    assert!(!client.is_configured());
    assert!(client.trending(MediaKind::Movie).await.is_empty());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_degrades_to_empty() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/search/multi")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"status_code":7,"status_message":"Invalid API key"}"#)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("bad_key", server.url());
    assert!(client.search_multi("dune").await.is_empty());
}

#[tokio::test]
async fn test_rate_limit_retries_then_gives_up() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/trending/movie/week")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("Retry-After", "0")
        .expect(3)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    assert!(client.trending(MediaKind::Movie).await.is_empty());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_body_degrades_to_empty() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/trending/movie/week")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    assert!(client.trending(MediaKind::Movie).await.is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_share_client() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/search/multi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(list_body(&[serde_json::json!({
            "id": 1,
            "media_type": "movie",
            "title": "Dune"
        })]))
        .expect(4)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let queries = ["dune", "dune part two", "arrival", "sicario"];
    let results = futures::future::join_all(queries.iter().map(|q| client.search_multi(q))).await;

    mock.assert_async().await;
    assert!(results.iter().all(|r| r.len() == 1));
}
