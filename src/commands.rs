//! CLI Command Handlers
//!
//! Implements all CLI commands on top of the catalog client and the user
//! data store. Each handler takes CLI args, the shared [`Context`] and
//! Output, and returns an ExitCode.

use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use crate::api::tmdb::GENRES;
use crate::api::{BackendError, TmdbClient};
use crate::auth::{AccountMode, Accounts, AuthError, LoginForm, RegisterForm};
use crate::backup::{self, BackupError};
use crate::calendar::{self, DayGroup, MonthCursor};
use crate::cli::{
    CalendarCmd, DetailCmd, DiscoverCmd, EpisodeAction, EpisodesCmd, ExitCode, HistoryCmd,
    HomeCmd, LibraryCmd, LibraryTab, ListAction, LoginCmd, NotificationsCmd, Output,
    ProfileAction, ProfileCmd, ProfileEditCmd, RegisterCmd, SearchCmd, SettingsAction, TitleRef,
};
use crate::config::Config;
use crate::models::{CalendarEntry, Episode, MediaDetail, MediaItem, MediaKind, ProfileUpdate, UserProfile};
use crate::notifications::{due_notifications, NotificationPreferences};
use crate::store::{
    library_view, select_backend, series_progress, IdentitySource, LocalStorage, SearchHistory,
    SeriesProgress, UserStore, WriteOutcome,
};

// =============================================================================
// Context
// =============================================================================

/// Settings and clock shared by every command
pub struct Context {
    pub config: Config,
    /// Explicit `--config` path, if any
    pub config_path: Option<PathBuf>,
    pub today: NaiveDate,
}

impl Context {
    /// Load config from `--config` or the default path, then the environment
    pub fn load(config_path: Option<PathBuf>) -> Self {
        let config = match &config_path {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
        .with_env();
        Self {
            config,
            config_path,
            today: Local::now().date_naive(),
        }
    }

    pub fn with_config(config: Config, today: NaiveDate) -> Self {
        Self {
            config,
            config_path: None,
            today,
        }
    }

    pub fn tmdb(&self) -> TmdbClient {
        self.config.tmdb_client()
    }

    pub fn storage(&self) -> LocalStorage {
        self.config.storage()
    }

    pub fn accounts(&self) -> Accounts {
        Accounts::new(self.storage(), self.config.backend_client())
    }

    /// Loaded store on the backend chosen for this session
    ///
    /// A store whose load failed is still returned; it reads as empty and
    /// refuses every write.
    pub async fn open_store(&self) -> UserStore {
        let backend = select_backend(self.config.backend_client(), self.storage());
        let mut store = UserStore::new(backend);
        if let Err(e) = store.load_on(self.today).await {
            warn!(error = %e, "continuing without user data");
        }
        store
    }

    /// Persist notification preferences without writing environment overrides
    fn save_notifications(&self, prefs: NotificationPreferences) -> anyhow::Result<()> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => Config::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?,
        };
        let mut file_config = Config::load_from(&path);
        file_config.notifications = prefs;
        file_config.save_to(&path)
    }
}

fn country_of(store: &UserStore) -> String {
    store
        .profile()
        .map(|p| p.country.clone())
        .unwrap_or_else(|| crate::models::DEFAULT_COUNTRY.to_string())
}

fn list_lines(items: &[MediaItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{:>3}. {}  (id {})", i + 1, item, item.id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Report a write outcome; unsaved writes fail the command
fn finish_write<T: Serialize>(output: &Output, outcome: &WriteOutcome, data: T, done: &str) -> ExitCode {
    match outcome {
        WriteOutcome::Unsaved(reason) => {
            output.error(format!("Change was not saved: {}", reason), ExitCode::Error)
        }
        WriteOutcome::Unchanged => output.show(data, |_| "Nothing to change.".to_string()),
        WriteOutcome::Saved => output.show(data, |_| done.to_string()),
    }
}

fn outcome_label(outcome: &WriteOutcome) -> &'static str {
    match outcome {
        WriteOutcome::Unchanged => "unchanged",
        WriteOutcome::Saved => "saved",
        WriteOutcome::Unsaved(_) => "unsaved",
    }
}

// =============================================================================
// Home Command
// =============================================================================

#[derive(Serialize)]
struct HomeView {
    featured: Option<MediaItem>,
    trending: Vec<MediaItem>,
}

pub async fn home_cmd(cmd: HomeCmd, ctx: &Context, output: &Output) -> ExitCode {
    let kind = MediaKind::from(cmd.kind);
    let mut items = ctx.tmdb().trending(kind).await;
    let featured = (!items.is_empty()).then(|| items.remove(0));
    items.truncate(cmd.limit);

    let storage = ctx.storage();
    if !output.json && !storage.install_prompt_dismissed() {
        output.info("Tip: `whatsnext calendar` shows what's coming from your watchlist.");
        if let Err(e) = storage.dismiss_install_prompt() {
            warn!(error = %e, "could not remember dismissed tip");
        }
    }

    let heading = match kind {
        MediaKind::Movie => "Trending Movies",
        MediaKind::Series => "Trending TV Shows",
    };
    output.show(HomeView { featured, trending: items }, |view| {
        let Some(featured) = &view.featured else {
            return "Nothing trending right now.".to_string();
        };
        let mut text = format!("★ {}\n  {}\n", featured, featured.overview);
        text.push_str(&format!("\n{}:\n{}", heading, list_lines(&view.trending)));
        text
    })
}

// =============================================================================
// Search / Discover / History Commands
// =============================================================================

pub async fn search_cmd(cmd: SearchCmd, ctx: &Context, output: &Output) -> ExitCode {
    let query = cmd.query.trim();
    if !query.is_empty() {
        let storage = ctx.storage();
        let mut history = SearchHistory::load(&storage);
        history.push(query);
        if let Err(e) = history.save(&storage) {
            warn!(error = %e, "could not save search history");
        }
    }

    output.info(format!("Searching for: {}", query));
    let mut results = ctx.tmdb().search_multi(query).await;
    if let Some(kind) = cmd.media_type {
        let kind = MediaKind::from(kind);
        results.retain(|r| r.kind == kind);
    }
    results.truncate(cmd.limit);

    output.show(results, |results| {
        if results.is_empty() {
            format!("No results for \"{}\".", query)
        } else {
            list_lines(results)
        }
    })
}

pub async fn discover_cmd(cmd: DiscoverCmd, ctx: &Context, output: &Output) -> ExitCode {
    let Some(genre) = cmd.genre else {
        let names: Vec<&str> = GENRES.iter().map(|(name, _)| *name).collect();
        return output.show(names, |names| names.join("\n"));
    };
    if crate::api::tmdb::genre_id(&genre).is_none() {
        return output.error(
            format!("Unknown genre '{}'. Run `whatsnext discover` to list genres.", genre),
            ExitCode::InvalidArgs,
        );
    }

    let results = ctx.tmdb().discover_by_genre(&genre).await;
    output.show(results, |results| {
        if results.is_empty() {
            format!("Nothing found for {}.", genre)
        } else {
            list_lines(results)
        }
    })
}

pub async fn history_cmd(cmd: HistoryCmd, ctx: &Context, output: &Output) -> ExitCode {
    let storage = ctx.storage();
    let mut history = SearchHistory::load(&storage);

    let changed = if cmd.clear {
        history.clear();
        true
    } else if let Some(query) = &cmd.remove {
        history.remove(query)
    } else {
        false
    };
    if changed {
        if let Err(e) = history.save(&storage) {
            return output.error(format!("Could not save search history: {}", e), ExitCode::Error);
        }
    }

    output.show(history, |history| {
        if history.is_empty() {
            "No recent searches.".to_string()
        } else {
            history.entries().join("\n")
        }
    })
}

// =============================================================================
// Library Command
// =============================================================================

#[derive(Serialize)]
struct LibraryRow {
    #[serde(flatten)]
    item: MediaItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<SeriesProgress>,
}

pub async fn library_cmd(cmd: LibraryCmd, ctx: &Context, output: &Output) -> ExitCode {
    let store = ctx.open_store().await;
    let (items, tab_name) = match cmd.tab {
        LibraryTab::Watchlist => (store.watchlist(), "watchlist"),
        LibraryTab::Watched => (store.watched(), "watched"),
    };
    let filter = cmd.filter.into();
    let rows: Vec<LibraryRow> = library_view(items, filter, cmd.sort.into())
        .into_iter()
        .map(|item| LibraryRow {
            progress: series_progress(&item, store.episodes()),
            item,
        })
        .collect();

    output.show(rows, |rows| {
        if rows.is_empty() {
            return match filter {
                crate::store::KindFilter::Movie => format!("No movies in your {}.", tab_name),
                crate::store::KindFilter::Series => format!("No TV shows in your {}.", tab_name),
                crate::store::KindFilter::All => format!("Your {} is empty.", tab_name),
            };
        }
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let progress = row
                    .progress
                    .map(|p| match p.total {
                        Some(total) => format!("  [{}/{} episodes]", p.watched, total),
                        None => format!("  [{} episodes watched]", p.watched),
                    })
                    .unwrap_or_default();
                format!("{:>3}. {}  (id {}){}", i + 1, row.item, row.item.id, progress)
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

// =============================================================================
// Calendar Command
// =============================================================================

#[derive(Serialize)]
struct MonthDay {
    date: NaiveDate,
    releases: Vec<String>,
}

#[derive(Serialize)]
struct MonthView {
    month: MonthCursor,
    label: String,
    previous: MonthCursor,
    next: MonthCursor,
    /// Sunday-first cells; `null` pads the first week
    cells: Vec<Option<MonthDay>>,
}

fn render_month(view: &MonthView) -> String {
    let mut text = format!("{}\n Su  Mo  Tu  We  Th  Fr  Sa\n", view.label);
    let mut highlights = Vec::new();
    for (i, cell) in view.cells.iter().enumerate() {
        match cell {
            Some(day) => {
                let marker = if day.releases.is_empty() { ' ' } else { '*' };
                text.push_str(&format!("{:>3}{}", day.date.format("%-d"), marker));
                for title in &day.releases {
                    highlights.push(format!("{}  {}", day.date.format("%b %-d"), title));
                }
            }
            None => text.push_str("    "),
        }
        if i % 7 == 6 {
            text.push('\n');
        }
    }
    if !highlights.is_empty() {
        text.push_str("\n\n");
        text.push_str(&highlights.join("\n"));
    }
    text
}

fn render_groups(groups: &[DayGroup]) -> String {
    if groups.is_empty() {
        return "No upcoming releases in your watchlist.".to_string();
    }
    groups
        .iter()
        .map(|g| {
            let lines: Vec<String> = g.entries.iter().map(|e| format!("  {}", entry_line(e))).collect();
            format!("{}\n{}", g.label, lines.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn entry_line(entry: &CalendarEntry) -> String {
    match &entry.episode {
        Some(ep) if !ep.name.is_empty() => format!("{} \"{}\"", entry.title, ep.name),
        _ => entry.title.clone(),
    }
}

pub async fn calendar_cmd(cmd: CalendarCmd, ctx: &Context, output: &Output) -> ExitCode {
    let month = match cmd.parse_month() {
        Some(Ok((year, month))) => MonthCursor::new(year, month),
        Some(Err(msg)) => return output.error(msg, ExitCode::InvalidArgs),
        None => None,
    };
    let date = match cmd.date.as_deref().map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d")) {
        Some(Ok(date)) => Some(date),
        Some(Err(_)) => {
            return output.error("Invalid date (expected YYYY-MM-DD)", ExitCode::InvalidArgs)
        }
        None => None,
    };

    let store = ctx.open_store().await;
    output.info("Checking your watchlist for upcoming releases...");
    let entries = calendar::upcoming_releases(&ctx.tmdb(), store.watchlist(), ctx.today).await;

    if let Some(date) = date {
        let day: Vec<CalendarEntry> = calendar::releases_on(&entries, date).into_iter().cloned().collect();
        let label = calendar::date_label(date);
        return output.show(day, |day| {
            if day.is_empty() {
                format!("{}\n  No releases.", label)
            } else {
                let lines: Vec<String> = day.iter().map(|e| format!("  {}", entry_line(e))).collect();
                format!("{}\n{}", label, lines.join("\n"))
            }
        });
    }

    if let Some(cursor) = month {
        let cells = cursor
            .grid()
            .into_iter()
            .map(|cell| {
                cell.map(|date| MonthDay {
                    date,
                    releases: calendar::releases_on(&entries, date)
                        .into_iter()
                        .map(|e| e.title.clone())
                        .collect(),
                })
            })
            .collect();
        let view = MonthView {
            month: cursor,
            label: cursor.label(),
            previous: cursor.prev(),
            next: cursor.next(),
            cells,
        };
        return output.show(view, render_month);
    }

    output.show(calendar::group_by_date(&entries), |groups| render_groups(groups))
}

// =============================================================================
// Detail / Episodes Commands
// =============================================================================

#[derive(Serialize)]
struct DetailView {
    #[serde(flatten)]
    detail: MediaDetail,
    in_watchlist: bool,
    watched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<SeriesProgress>,
}

fn render_detail(view: &DetailView) -> String {
    let d = &view.detail;
    let mut lines = vec![d.to_string()];
    if !d.item.genres.is_empty() {
        lines.push(d.item.genres.join(", "));
    }
    if !d.item.overview.is_empty() {
        lines.push(String::new());
        lines.push(d.item.overview.clone());
    }
    if !d.cast.is_empty() {
        let names: Vec<&str> = d.cast.iter().map(|c| c.name.as_str()).collect();
        lines.push(format!("\nCast: {}", names.join(", ")));
    }
    if let Some(url) = d.trailer_url() {
        lines.push(format!("Trailer: {}", url));
    }
    if !d.providers.is_empty() {
        let names: Vec<&str> = d.providers.iter().map(|p| p.name.as_str()).collect();
        lines.push(format!(
            "Stream on ({}): {}",
            d.provider_region.as_deref().unwrap_or("-"),
            names.join(", ")
        ));
    }
    for season in &d.season_list {
        lines.push(format!("  {}", season));
    }
    if let Some(progress) = view.progress {
        lines.push(format!("Watched episodes: {}", progress.watched));
    }
    let status = if view.watched {
        "Watched"
    } else if view.in_watchlist {
        "On your watchlist"
    } else {
        "Not in your library"
    };
    lines.push(format!("\n{}", status));
    lines.join("\n")
}

pub async fn detail_cmd(cmd: DetailCmd, ctx: &Context, output: &Output) -> ExitCode {
    let store = ctx.open_store().await;
    let kind = MediaKind::from(cmd.kind);
    let Some(detail) = ctx.tmdb().details(cmd.id, kind, &country_of(&store)).await else {
        return output.error(format!("No {} with id {}", kind, cmd.id), ExitCode::NotFound);
    };

    let view = DetailView {
        in_watchlist: store.is_in_watchlist(detail.item.id),
        watched: store.is_watched(detail.item.id),
        progress: series_progress(&detail.item, store.episodes()),
        detail,
    };
    output.show(view, render_detail)
}

#[derive(Serialize)]
struct EpisodeRow {
    #[serde(flatten)]
    episode: Episode,
    watched: bool,
}

pub async fn episodes_cmd(cmd: EpisodesCmd, ctx: &Context, output: &Output) -> ExitCode {
    let episodes = ctx.tmdb().season_episodes(cmd.series_id, cmd.season).await;
    if episodes.is_empty() {
        return output.error(
            format!("No episodes found for season {} of {}", cmd.season, cmd.series_id),
            ExitCode::NotFound,
        );
    }

    let store = ctx.open_store().await;
    let rows: Vec<EpisodeRow> = episodes
        .into_iter()
        .map(|episode| EpisodeRow {
            watched: store.is_episode_watched(cmd.series_id, episode.season, episode.episode),
            episode,
        })
        .collect();

    output.show(rows, |rows| {
        rows.iter()
            .map(|r| {
                let mark = if r.watched { "[x]" } else { "[ ]" };
                let date = r
                    .episode
                    .air_date
                    .map(|d| format!("  {}", d))
                    .unwrap_or_default();
                format!("{} {}{}", mark, r.episode, date)
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

// =============================================================================
// Watchlist / Watched / Episode Commands
// =============================================================================

#[derive(Serialize)]
struct ListChange {
    id: u64,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

/// Catalog record for a title about to be stored
async fn fetch_item(ctx: &Context, store: &UserStore, title: &TitleRef) -> Option<MediaItem> {
    ctx.tmdb()
        .details(title.id, title.kind.into(), &country_of(store))
        .await
        .map(|d| d.item)
}

pub async fn watchlist_cmd(action: ListAction, ctx: &Context, output: &Output) -> ExitCode {
    let mut store = ctx.open_store().await;
    let result = match &action {
        ListAction::Add(title) => {
            let Some(item) = fetch_item(ctx, &store, title).await else {
                return output.error(format!("No title with id {}", title.id), ExitCode::NotFound);
            };
            let name = item.title.clone();
            store.add_to_watchlist(item).await.map(|o| (o, Some(name), "Added to watchlist."))
        }
        ListAction::Remove(title) => store
            .remove_from_watchlist(title.id)
            .await
            .map(|o| (o, None, "Removed from watchlist.")),
    };
    let id = match &action {
        ListAction::Add(t) | ListAction::Remove(t) => t.id,
    };

    match result {
        Ok((outcome, title, done)) => {
            let change = ListChange {
                id,
                outcome: outcome_label(&outcome),
                title,
            };
            finish_write(output, &outcome, change, done)
        }
        Err(e) => output.error(e.to_string(), ExitCode::Error),
    }
}

pub async fn watched_cmd(action: ListAction, ctx: &Context, output: &Output) -> ExitCode {
    let mut store = ctx.open_store().await;
    let result = match &action {
        ListAction::Add(title) => {
            let Some(item) = fetch_item(ctx, &store, title).await else {
                return output.error(format!("No title with id {}", title.id), ExitCode::NotFound);
            };
            let name = item.title.clone();
            store.mark_watched(item).await.map(|o| (o, Some(name), "Marked as watched."))
        }
        ListAction::Remove(title) => store
            .remove_from_watched(title.id)
            .await
            .map(|o| (o, None, "Removed from watched.")),
    };
    let id = match &action {
        ListAction::Add(t) | ListAction::Remove(t) => t.id,
    };

    match result {
        Ok((outcome, title, done)) => {
            let change = ListChange {
                id,
                outcome: outcome_label(&outcome),
                title,
            };
            finish_write(output, &outcome, change, done)
        }
        Err(e) => output.error(e.to_string(), ExitCode::Error),
    }
}

#[derive(Serialize)]
struct EpisodeChange {
    series_id: u64,
    season: u32,
    episode: u32,
    watched: bool,
    watched_in_series: usize,
    outcome: &'static str,
}

pub async fn episode_cmd(action: EpisodeAction, ctx: &Context, output: &Output) -> ExitCode {
    let EpisodeAction::Toggle(cmd) = action;
    let mut store = ctx.open_store().await;
    match store
        .toggle_episode_watched(cmd.series_id, cmd.season, cmd.episode)
        .await
    {
        Ok((watched, outcome)) => {
            let change = EpisodeChange {
                series_id: cmd.series_id,
                season: cmd.season,
                episode: cmd.episode,
                watched,
                watched_in_series: store.watched_episode_count(cmd.series_id),
                outcome: outcome_label(&outcome),
            };
            let done = if watched {
                format!("S{}E{} marked as watched.", cmd.season, cmd.episode)
            } else {
                format!("S{}E{} marked as unwatched.", cmd.season, cmd.episode)
            };
            finish_write(output, &outcome, change, &done)
        }
        Err(e) => output.error(e.to_string(), ExitCode::Error),
    }
}

// =============================================================================
// Profile Command
// =============================================================================

#[derive(Serialize)]
struct ProfileView {
    #[serde(flatten)]
    profile: UserProfile,
    source: Option<IdentitySource>,
    backend: &'static str,
    watchlist: usize,
}

fn render_profile(view: &ProfileView) -> String {
    let p = &view.profile;
    let mut lines = vec![format!("{} <{}>", p.name, p.email)];
    if !p.bio.is_empty() {
        lines.push(p.bio.clone());
    }
    lines.push(format!("Country: {}", p.country));
    if let Some(joined) = p.joined {
        lines.push(format!("Joined: {}", joined.format("%B %Y")));
    }
    lines.push(String::new());
    lines.push(format!("Hours watched:    {}", p.stats.hours_watched));
    lines.push(format!("Movies watched:   {}", p.stats.movies_watched));
    lines.push(format!("Episodes watched: {}", p.stats.episodes_watched));
    lines.push(format!("On watchlist:     {}", view.watchlist));
    if let Some(genre) = &p.stats.favorite_genre {
        lines.push(format!("Favorite genre:   {}", genre));
    }
    if view.source == Some(IdentitySource::Demo) {
        lines.push("\nUsing a demo profile. Run `whatsnext register` to make it yours.".to_string());
    }
    lines.join("\n")
}

pub async fn profile_cmd(cmd: ProfileCmd, ctx: &Context, output: &Output) -> ExitCode {
    let mut store = ctx.open_store().await;

    if let Some(ProfileAction::Edit(edit)) = cmd.action {
        if let Some(code) = apply_profile_edit(edit, &mut store, output).await {
            return code;
        }
    }

    let Some(profile) = store.profile().cloned() else {
        return output.error("No profile loaded", ExitCode::Error);
    };
    let view = ProfileView {
        profile,
        source: store.identity_source(),
        backend: store.backend_name(),
        watchlist: store.watchlist().len(),
    };
    output.show(view, render_profile)
}

/// Apply an edit; `Some` carries the exit code when the command should stop
async fn apply_profile_edit(edit: ProfileEditCmd, store: &mut UserStore, output: &Output) -> Option<ExitCode> {
    if let Some(email) = &edit.email {
        if !crate::auth::is_valid_email(email) {
            return Some(output.error("email: Email is invalid", ExitCode::ValidationFailed));
        }
    }
    if let Some(name) = &edit.name {
        if name.trim().chars().count() < crate::auth::MIN_NAME_LEN {
            return Some(output.error(
                "name: Name must be at least 2 characters",
                ExitCode::ValidationFailed,
            ));
        }
    }

    let update = ProfileUpdate {
        name: edit.name,
        avatar: edit.avatar,
        email: edit.email,
        country: edit.country,
        bio: edit.bio,
    };
    if update.is_empty() {
        return Some(output.error(
            "Nothing to change. Pass --name, --email, --country, --bio or --avatar.",
            ExitCode::InvalidArgs,
        ));
    }

    match store.update_profile(&update).await {
        Ok(WriteOutcome::Unsaved(reason)) => Some(output.error(
            format!("Profile was not saved: {}", reason),
            ExitCode::Error,
        )),
        Ok(_) => {
            output.info("Profile updated.");
            None
        }
        Err(e) => Some(output.error(e.to_string(), ExitCode::Error)),
    }
}

// =============================================================================
// Notifications Command
// =============================================================================

#[derive(Serialize)]
struct NotificationsView {
    preferences: NotificationPreferences,
    window_days: u32,
    due: Vec<CalendarEntry>,
}

pub async fn notifications_cmd(cmd: NotificationsCmd, ctx: &Context, output: &Output) -> ExitCode {
    let mut prefs = ctx.config.notifications;
    let changes = cmd
        .enable
        .iter()
        .map(|n| (n, true))
        .chain(cmd.disable.iter().map(|n| (n, false)));
    let mut changed = false;
    for (name, on) in changes {
        if !prefs.set(name, on) {
            return output.error(format!("Unknown preference '{}'", name), ExitCode::InvalidArgs);
        }
        changed = true;
    }
    if changed {
        if let Err(e) = ctx.save_notifications(prefs) {
            return output.error(format!("Could not save preferences: {}", e), ExitCode::Error);
        }
    }

    let store = ctx.open_store().await;
    let entries = calendar::upcoming_releases(&ctx.tmdb(), store.watchlist(), ctx.today).await;
    let due: Vec<CalendarEntry> = due_notifications(&entries, &prefs, ctx.today)
        .into_iter()
        .cloned()
        .collect();

    let view = NotificationsView {
        preferences: prefs,
        window_days: prefs.window_days(),
        due,
    };
    output.show(view, |view| {
        let p = &view.preferences;
        let flag = |on: bool| if on { "on" } else { "off" };
        let mut text = format!(
            "New episodes: {}\nMovie releases: {}\nUpcoming reminders: {}\nWeekly digest: {}\n\n",
            flag(p.new_episodes),
            flag(p.movie_releases),
            flag(p.upcoming_releases),
            flag(p.weekly_digest)
        );
        if view.due.is_empty() {
            text.push_str("No notifications.");
        } else {
            let lines: Vec<String> = view.due.iter().map(|e| e.to_string()).collect();
            text.push_str(&lines.join("\n"));
        }
        text
    })
}

// =============================================================================
// Settings Command
// =============================================================================

#[derive(Serialize)]
struct SettingsResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
}

pub async fn settings_cmd(action: SettingsAction, ctx: &Context, output: &Output) -> ExitCode {
    let mut store = ctx.open_store().await;
    match action {
        SettingsAction::Export { path } => {
            match backup::export_to(&store, path.as_deref(), Utc::now()) {
                Ok(path) => output.show(
                    SettingsResult {
                        status: "exported",
                        path: Some(path),
                    },
                    |r| {
                        let shown = r.path.as_ref().map(|p| p.display().to_string());
                        format!("Backup written to {}", shown.unwrap_or_default())
                    },
                ),
                Err(e) => output.error(e.to_string(), ExitCode::Error),
            }
        }
        SettingsAction::Import { path } => match backup::import_from(&mut store, &path).await {
            Ok(WriteOutcome::Unsaved(reason)) => {
                output.error(format!("Import was not saved: {}", reason), ExitCode::Error)
            }
            Ok(_) => output.show(
                SettingsResult {
                    status: "imported",
                    path: Some(path),
                },
                |_| "Data imported successfully!".to_string(),
            ),
            Err(BackupError::Malformed(e)) => output.error(
                format!("Error importing data. Please check the file format. ({})", e),
                ExitCode::ValidationFailed,
            ),
            Err(e) => output.error(e.to_string(), ExitCode::Error),
        },
        SettingsAction::Clear { yes } => {
            if !yes {
                return output.error(
                    "This deletes your watchlist, history and episode progress. Re-run with --yes.",
                    ExitCode::InvalidArgs,
                );
            }
            match store.clear_data().await {
                Ok(WriteOutcome::Unsaved(reason)) => {
                    output.error(format!("Clear was not saved: {}", reason), ExitCode::Error)
                }
                Ok(_) => output.show(
                    SettingsResult {
                        status: "cleared",
                        path: None,
                    },
                    |_| "All data cleared.".to_string(),
                ),
                Err(e) => output.error(e.to_string(), ExitCode::Error),
            }
        }
    }
}

// =============================================================================
// Account Commands
// =============================================================================

#[derive(Serialize)]
struct AccountResult {
    status: &'static str,
    mode: AccountMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

/// Map account failures to exit codes; field errors are printed one per line
fn auth_failure(output: &Output, err: AuthError) -> ExitCode {
    match err {
        AuthError::Invalid(errors) => {
            if output.json {
                return output.error(errors.to_string(), ExitCode::ValidationFailed);
            }
            for e in errors.iter() {
                output.info(format!("{}: {}", e.field, e.message));
            }
            output.error("Please fix the fields above", ExitCode::ValidationFailed)
        }
        AuthError::UnknownAccount(_) => output.error(err.to_string(), ExitCode::NotFound),
        AuthError::Backend(BackendError::RequestFailed(e)) => {
            output.error(format!("Could not reach the server: {}", e), ExitCode::NetworkError)
        }
        other => output.error(other.to_string(), ExitCode::Error),
    }
}

pub async fn login_cmd(cmd: LoginCmd, ctx: &Context, output: &Output) -> ExitCode {
    let accounts = ctx.accounts();
    let form = LoginForm {
        email: cmd.email,
        password: cmd.password,
    };
    match accounts.login(&form).await {
        Ok(user_id) => output.show(
            AccountResult {
                status: "signed_in",
                mode: accounts.mode(),
                user_id: Some(user_id),
            },
            |_| "Welcome back!".to_string(),
        ),
        Err(e) => auth_failure(output, e),
    }
}

pub async fn register_cmd(cmd: RegisterCmd, ctx: &Context, output: &Output) -> ExitCode {
    let accounts = ctx.accounts();
    let form = RegisterForm {
        name: cmd.name,
        email: cmd.email,
        country: cmd.country,
        password: cmd.password,
        confirm_password: cmd.confirm_password,
    };
    match accounts.register(&form, ctx.today).await {
        Ok(profile) => output.show(
            AccountResult {
                status: "registered",
                mode: accounts.mode(),
                user_id: Some(profile.id),
            },
            |_| "Account created successfully!".to_string(),
        ),
        Err(AuthError::Backend(BackendError::ConfirmationRequired)) => output.show(
            AccountResult {
                status: "confirmation_required",
                mode: accounts.mode(),
                user_id: None,
            },
            |_| "Account created. Confirm your email, then run `whatsnext login`.".to_string(),
        ),
        Err(e) => auth_failure(output, e),
    }
}

pub async fn logout_cmd(ctx: &Context, output: &Output) -> ExitCode {
    let accounts = ctx.accounts();
    match accounts.logout().await {
        Ok(()) => output.show(
            AccountResult {
                status: "signed_out",
                mode: accounts.mode(),
                user_id: None,
            },
            |_| "Signed out. Your data stays on this device.".to_string(),
        ),
        Err(e) => auth_failure(output, e),
    }
}
