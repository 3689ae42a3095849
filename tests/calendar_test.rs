//! Release calendar tests
//!
//! Builds the calendar from a watchlist against a mocked catalog.

use chrono::NaiveDate;
use mockito::{Matcher, Server};
use whatsnext::api::TmdbClient;
use whatsnext::calendar::{group_by_date, releases_within, upcoming_releases};
use whatsnext::models::{MediaItem, MediaKind};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn movie(id: u64, title: &str, release: &str) -> MediaItem {
    let mut item = MediaItem::new(id, MediaKind::Movie, title);
    item.release_date = Some(date(release));
    item
}

fn season_body(season: u32, air_dates: &[&str]) -> String {
    let episodes: Vec<_> = air_dates
        .iter()
        .enumerate()
        .map(|(i, d)| {
            serde_json::json!({
                "episode_number": i + 1,
                "season_number": season,
                "name": format!("Episode {}", i + 1),
                "air_date": d
            })
        })
        .collect();
    serde_json::json!({ "episodes": episodes }).to_string()
}

#[tokio::test]
async fn test_upcoming_releases_from_watchlist() {
    let mut server = Server::new_async().await;
    let today = date("2026-10-19");

    let show = server
        .mock("GET", "/tv/100")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            serde_json::json!({
                "id": 100,
                "name": "Slow Horses",
                "seasons": [
                    { "season_number": 0, "episode_count": 3 },
                    { "season_number": 1, "episode_count": 6 },
                    { "season_number": 2, "episode_count": 6 },
                    { "season_number": 3, "episode_count": 0 }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    // Season 3 has no episodes yet, so only season 2 of the two newest is fetched
    let season2 = server
        .mock("GET", "/tv/100/season/2")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(season_body(2, &["2026-10-12", "2026-10-19", "2026-10-26"]))
        .create_async()
        .await;
    let older = server
        .mock("GET", Matcher::Regex(r"^/tv/100/season/(0|1|3)$".to_string()))
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let watchlist = vec![
        movie(1, "Mickey 17", "2026-11-01"),
        movie(2, "Dune", "2021-10-22"),
        MediaItem::new(100, MediaKind::Series, "Slow Horses"),
        MediaItem::new(3, MediaKind::Movie, "Undated"),
    ];

    let client = TmdbClient::with_base_url("test_key", server.url());
    let entries = upcoming_releases(&client, &watchlist, today).await;

    show.assert_async().await;
    season2.assert_async().await;
    older.assert_async().await;

    let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Slow Horses - S2E2", "Slow Horses - S2E3", "Mickey 17"]
    );
    assert_eq!(entries[0].date, today);
    assert!(entries[0].is_episode());
    assert!(!entries[2].is_episode());

    let groups = group_by_date(&entries);
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].label, "Monday, October 19, 2026");

    let this_week = releases_within(&entries, today, 7);
    assert_eq!(this_week.len(), 2);
}

#[tokio::test]
async fn test_series_lookup_failure_skips_series() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/tv/200")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let watchlist = vec![
        MediaItem::new(200, MediaKind::Series, "Broken"),
        movie(1, "Mickey 17", "2026-11-01"),
    ];

    let client = TmdbClient::with_base_url("test_key", server.url());
    let entries = upcoming_releases(&client, &watchlist, date("2026-10-19")).await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].media.id, 1);
}

#[tokio::test]
async fn test_empty_watchlist_makes_no_requests() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", Matcher::Any)
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    assert!(upcoming_releases(&client, &[], date("2026-10-19")).await.is_empty());

    mock.assert_async().await;
}
