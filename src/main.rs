//! What's Next? - track movies and TV shows from the terminal
//!
//! # Usage
//!
//! ```bash
//! # Home page: trending titles
//! whatsnext
//!
//! # Scriptable commands
//! whatsnext search "severance" --json
//! whatsnext watchlist add 95396 --kind tv
//! whatsnext calendar --month 2026-11
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use whatsnext::cli::{Cli, Command, HomeCmd, Output};
use whatsnext::commands::{self, Context};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}

/// Logs go to stderr so stdout stays parseable
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> whatsnext::cli::ExitCode {
    let output = Output::new(&cli);
    let ctx = Context::load(cli.config.clone());

    match cli.command {
        None => commands::home_cmd(HomeCmd::default(), &ctx, &output).await,

        Some(Command::Home(cmd)) => commands::home_cmd(cmd, &ctx, &output).await,

        Some(Command::Search(cmd)) => commands::search_cmd(cmd, &ctx, &output).await,

        Some(Command::Discover(cmd)) => commands::discover_cmd(cmd, &ctx, &output).await,

        Some(Command::History(cmd)) => commands::history_cmd(cmd, &ctx, &output).await,

        Some(Command::Library(cmd)) => commands::library_cmd(cmd, &ctx, &output).await,

        Some(Command::Calendar(cmd)) => commands::calendar_cmd(cmd, &ctx, &output).await,

        Some(Command::Detail(cmd)) => commands::detail_cmd(cmd, &ctx, &output).await,

        Some(Command::Episodes(cmd)) => commands::episodes_cmd(cmd, &ctx, &output).await,

        Some(Command::Watchlist(action)) => commands::watchlist_cmd(action, &ctx, &output).await,

        Some(Command::Watched(action)) => commands::watched_cmd(action, &ctx, &output).await,

        Some(Command::Episode(action)) => commands::episode_cmd(action, &ctx, &output).await,

        Some(Command::Profile(cmd)) => commands::profile_cmd(cmd, &ctx, &output).await,

        Some(Command::Notifications(cmd)) => commands::notifications_cmd(cmd, &ctx, &output).await,

        Some(Command::Settings(action)) => commands::settings_cmd(action, &ctx, &output).await,

        Some(Command::Login(cmd)) => commands::login_cmd(cmd, &ctx, &output).await,

        Some(Command::Register(cmd)) => commands::register_cmd(cmd, &ctx, &output).await,

        Some(Command::Logout) => commands::logout_cmd(&ctx, &output).await,
    }
}
