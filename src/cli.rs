//! CLI - Command Line Interface for What's Next
//!
//! Every page of the app is a subcommand. Output is human-readable on a
//! terminal and JSON (`{"data": ...}` / `{"error": ..., "exit_code": n}`)
//! with `--json` or when stdout is not a TTY.
//!
//! # Examples
//!
//! ```bash
//! # Browse the catalog
//! whatsnext home --kind tv
//! whatsnext search "the bear" --json
//! whatsnext discover sci-fi
//!
//! # Track what you watch
//! whatsnext watchlist add 693134 --kind movie
//! whatsnext watched add 693134 --kind movie
//! whatsnext episode toggle 136315 2 5
//!
//! # See what's coming
//! whatsnext calendar
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::models::MediaKind;
use crate::store::{KindFilter, LibrarySort};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// Title or record not found
    NotFound = 4,
    /// Form validation failed
    ValidationFailed = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// What's Next? - track movies and TV shows
///
/// Run without arguments for the home page.
#[derive(Parser, Debug)]
#[command(
    name = "whatsnext",
    version,
    about = "Track movies and TV shows from your terminal",
    long_about = "Browse trending titles, search the catalog, keep a watchlist and \
                  history, track episodes and see upcoming releases.\n\n\
                  Run without arguments for the home page.",
    after_help = "EXAMPLES:\n\
                  whatsnext                               Trending movies\n\
                  whatsnext search \"dune\"                 Search movies and shows\n\
                  whatsnext watchlist add 693134 -k movie Add to watchlist\n\
                  whatsnext calendar --json               Upcoming releases as JSON"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log filter (e.g. "debug", "whatsnext=trace"); RUST_LOG wins when set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Subcommand to run (omit for the home page)
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Trending titles with a featured pick
    Home(HomeCmd),

    /// Search movies and TV shows
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Browse popular titles of a genre
    Discover(DiscoverCmd),

    /// Show or edit recent searches
    History(HistoryCmd),

    /// Your watchlist or watched titles
    #[command(visible_alias = "lib")]
    Library(LibraryCmd),

    /// Upcoming releases from your watchlist
    #[command(visible_alias = "cal")]
    Calendar(CalendarCmd),

    /// Full details for a title
    #[command(visible_alias = "i")]
    Detail(DetailCmd),

    /// Episodes of one season, with your progress
    Episodes(EpisodesCmd),

    /// Add to or remove from the watchlist
    #[command(subcommand)]
    Watchlist(ListAction),

    /// Mark titles as watched or unwatched
    #[command(subcommand)]
    Watched(ListAction),

    /// Episode progress
    #[command(subcommand)]
    Episode(EpisodeAction),

    /// Show or edit your profile
    Profile(ProfileCmd),

    /// Release reminders and their settings
    #[command(visible_alias = "notif")]
    Notifications(NotificationsCmd),

    /// Export, import or clear your data
    #[command(subcommand)]
    Settings(SettingsAction),

    /// Sign in
    Login(LoginCmd),

    /// Create an account
    Register(RegisterCmd),

    /// Sign out (keeps your data)
    Logout,
}

/// Media kind argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindArg {
    /// Movies
    #[default]
    Movie,
    /// TV shows
    #[value(alias = "series")]
    Tv,
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Movie => MediaKind::Movie,
            KindArg::Tv => MediaKind::Series,
        }
    }
}

// =============================================================================
// Browse Commands
// =============================================================================

#[derive(Args, Debug)]
pub struct HomeCmd {
    /// Which trending list to show
    #[arg(long, short = 'k', value_enum, default_value = "movie")]
    pub kind: KindArg,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

impl Default for HomeCmd {
    fn default() -> Self {
        Self {
            kind: KindArg::Movie,
            limit: 20,
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchCmd {
    /// Search query (title, keywords)
    #[arg(required = true)]
    pub query: String,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,

    /// Filter by media type
    #[arg(long, short = 't', value_enum)]
    pub media_type: Option<KindArg>,
}

#[derive(Args, Debug)]
pub struct DiscoverCmd {
    /// Genre name (e.g. "Sci-Fi", "comedy"); omit to list genres
    pub genre: Option<String>,
}

#[derive(Args, Debug)]
pub struct HistoryCmd {
    /// Forget one query
    #[arg(long, conflicts_with = "clear")]
    pub remove: Option<String>,

    /// Forget every query
    #[arg(long)]
    pub clear: bool,
}

#[derive(Args, Debug)]
pub struct DetailCmd {
    /// TMDB id
    pub id: u64,

    /// Media kind of the id
    #[arg(long, short = 'k', value_enum, default_value = "movie")]
    pub kind: KindArg,
}

#[derive(Args, Debug)]
pub struct EpisodesCmd {
    /// TMDB id of the series
    pub series_id: u64,

    /// Season number
    #[arg(default_value = "1")]
    pub season: u32,
}

// =============================================================================
// Library Commands
// =============================================================================

/// Library tab
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibraryTab {
    #[default]
    Watchlist,
    Watched,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterArg {
    #[default]
    All,
    Movie,
    #[value(alias = "series")]
    Tv,
}

impl From<FilterArg> for KindFilter {
    fn from(filter: FilterArg) -> Self {
        match filter {
            FilterArg::All => KindFilter::All,
            FilterArg::Movie => KindFilter::Movie,
            FilterArg::Tv => KindFilter::Series,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortArg {
    /// Most recently added first
    #[default]
    #[value(name = "date-added", alias = "date")]
    DateAdded,
    /// Alphabetical
    Title,
    /// Highest rated first
    Rating,
}

impl From<SortArg> for LibrarySort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::DateAdded => LibrarySort::DateAdded,
            SortArg::Title => LibrarySort::Title,
            SortArg::Rating => LibrarySort::Rating,
        }
    }
}

#[derive(Args, Debug)]
pub struct LibraryCmd {
    /// Which list to show
    #[arg(long, short = 't', value_enum, default_value = "watchlist")]
    pub tab: LibraryTab,

    /// Only movies or only shows
    #[arg(long, short = 'f', value_enum, default_value = "all")]
    pub filter: FilterArg,

    /// Sort order
    #[arg(long, short = 's', value_enum, default_value = "date-added")]
    pub sort: SortArg,
}

/// Title to add or remove
#[derive(Args, Debug)]
pub struct TitleRef {
    /// TMDB id
    pub id: u64,

    /// Media kind of the id
    #[arg(long, short = 'k', value_enum, default_value = "movie")]
    pub kind: KindArg,
}

#[derive(Subcommand, Debug)]
pub enum ListAction {
    /// Add a title
    Add(TitleRef),
    /// Remove a title
    #[command(visible_alias = "rm")]
    Remove(TitleRef),
}

#[derive(Subcommand, Debug)]
pub enum EpisodeAction {
    /// Flip an episode between watched and unwatched
    Toggle(EpisodeToggleCmd),
}

#[derive(Args, Debug)]
pub struct EpisodeToggleCmd {
    /// TMDB id of the series
    pub series_id: u64,
    /// Season number
    pub season: u32,
    /// Episode number
    pub episode: u32,
}

// =============================================================================
// Calendar / Notifications
// =============================================================================

#[derive(Args, Debug)]
pub struct CalendarCmd {
    /// Show a month grid (YYYY-MM) instead of the upcoming list
    #[arg(long, short = 'm')]
    pub month: Option<String>,

    /// Only releases on this date (YYYY-MM-DD)
    #[arg(long, short = 'd')]
    pub date: Option<String>,
}

impl CalendarCmd {
    /// Parse the `--month` argument
    pub fn parse_month(&self) -> Option<Result<(i32, u32), String>> {
        self.month.as_deref().map(parse_year_month)
    }
}

/// Parse "YYYY-MM"
pub fn parse_year_month(s: &str) -> Result<(i32, u32), String> {
    let invalid = || format!("Invalid month '{}' (expected YYYY-MM)", s);
    let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if (1..=12).contains(&month) {
        Ok((year, month))
    } else {
        Err(invalid())
    }
}

#[derive(Args, Debug)]
pub struct NotificationsCmd {
    /// Turn a preference on (new-episodes, movie-releases, upcoming-releases, weekly-digest)
    #[arg(long, value_name = "PREF")]
    pub enable: Vec<String>,

    /// Turn a preference off
    #[arg(long, value_name = "PREF")]
    pub disable: Vec<String>,
}

// =============================================================================
// Profile / Settings / Account
// =============================================================================

#[derive(Args, Debug)]
pub struct ProfileCmd {
    #[command(subcommand)]
    pub action: Option<ProfileAction>,
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// Change profile fields
    Edit(ProfileEditCmd),
}

#[derive(Args, Debug, Default)]
pub struct ProfileEditCmd {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    /// Two-letter country code
    #[arg(long)]
    pub country: Option<String>,
    #[arg(long)]
    pub bio: Option<String>,
    /// Avatar image URL
    #[arg(long)]
    pub avatar: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Write a backup file
    Export {
        /// Destination (default: whatsnext-backup-YYYY-MM-DD.json)
        path: Option<PathBuf>,
    },
    /// Restore from a backup file
    Import {
        path: PathBuf,
    },
    /// Delete watchlist, history and episode progress
    Clear {
        /// Skip the confirmation check
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct LoginCmd {
    #[arg(long, short = 'e')]
    pub email: String,
    #[arg(long, short = 'p')]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct RegisterCmd {
    #[arg(long, short = 'n')]
    pub name: String,
    #[arg(long, short = 'e')]
    pub email: String,
    /// Two-letter country code
    #[arg(long, default_value = "")]
    pub country: String,
    #[arg(long, short = 'p')]
    pub password: String,
    /// Repeat the password
    #[arg(long)]
    pub confirm_password: String,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data as JSON
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print data as JSON, or through `render` on a terminal
    pub fn show<T: Serialize>(&self, data: T, render: impl FnOnce(&T) -> String) -> ExitCode {
        if self.json {
            return match self.print(data) {
                Ok(()) => ExitCode::Success,
                Err(e) => self.error(format!("Failed to serialize: {}", e), ExitCode::Error),
            };
        }
        let text = render(&data);
        if !text.is_empty() {
            println!("{}", text);
        }
        ExitCode::Success
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
