//! divemedia CLI
//!
//! A command-line interface for managing dives, dive logs and media on a
//! divemedia backend.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use divemedia_ops::{OpsClient, OpsConfig};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// divemedia CLI: upload and organize dive photos and videos.
#[derive(Parser, Debug)]
#[command(name = "divemedia", version, about)]
struct Cli {
    /// Backend base URL.
    #[arg(
        long,
        env = "DIVEMEDIA_API_URL",
        default_value = divemedia_ops::DEFAULT_API_URL,
        global = true
    )]
    api_url: String,

    /// Pre-issued access token. Skips the stored login.
    #[arg(long, env = "DIVEMEDIA_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    /// Where `login` keeps the session between runs.
    #[arg(long, env = "DIVEMEDIA_SESSION_FILE", global = true)]
    session_file: Option<PathBuf>,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password, or print an OAuth sign-in URL.
    Login(commands::auth::LoginArgs),
    /// Sign out and forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Manage dives.
    Dives(commands::dives::DivesArgs),
    /// Manage media items.
    Media(commands::media::MediaArgs),
    /// Read and edit dive logs.
    Log(commands::log::LogArgs),
    /// Upload photos and videos to a dive.
    Upload(commands::upload::UploadArgs),
    /// Follow media processing on a dive until everything is ready.
    Watch(commands::watch::WatchArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = OpsConfig::from_env();
    config.api_url.clone_from(&cli.api_url);
    config.access_token.clone_from(&cli.access_token);
    if let Some(ref path) = cli.session_file {
        config = config.with_session_file(path);
    }
    let ops = OpsClient::from_config(&config)?;

    if let Err(e) = ops.restore_session().await {
        warn!(error = %e, "ignoring unreadable session file");
    }

    match cli.command {
        Command::Login(args) => commands::auth::login(&ops, &args, &cli.format).await,
        Command::Logout => commands::auth::logout(&ops).await,
        Command::Whoami => commands::auth::whoami(&ops, &cli.format).await,
        Command::Dives(args) => commands::dives::run(&ops, &args, &cli.format).await,
        Command::Media(args) => commands::media::run(&ops, &args, &cli.format).await,
        Command::Log(args) => commands::log::run(&ops, &args, &cli.format).await,
        Command::Upload(args) => commands::upload::run(&ops, &args, &cli.format).await,
        Command::Watch(args) => commands::watch::run(&ops, &args, &cli.format).await,
    }
}
