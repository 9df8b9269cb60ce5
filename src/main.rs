mod commands;
mod config;
mod error;
mod logging;
mod ports;
mod services;
mod shutdown;
mod spotify_rs;
#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{OptionExt, Result};

use crate::commands::cleanup::CleanupTarget;
use crate::commands::sync::SyncArgs;
use crate::config::Config;
use crate::error::AccountRole;
use crate::logging::init_tracing;
use crate::services::spotify::account::SpotifyAccountService;
use crate::services::spotify::client::SpotifyApiCredentials;
use crate::shutdown::Shutdown;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mirror Spotify liked tracks and playlists from one account to another", long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, global = true, env = "SPOTIFY_MIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `spotify_mirror=debug`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Path to the log file (defaults to the data directory)
    #[arg(long, global = true, env = "SPOTIFY_MIRROR_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// OTLP collector endpoint for traces
    #[arg(long, global = true, env = "OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Spotify app client id
    #[arg(long, global = true, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// Spotify app client secret
    #[arg(long, global = true, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Redirect URI registered for the Spotify app
    #[arg(
        long,
        global = true,
        env = "SPOTIFY_REDIRECT_URI",
        default_value = "http://127.0.0.1:8888/callback"
    )]
    redirect_uri: String,

    #[command(subcommand)]
    command: Commands,
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if interval < Duration::from_secs(60) {
        return Err("interval must be at least 1m".to_string());
    }
    Ok(interval)
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror liked tracks and playlists from the source to the destination account
    Sync {
        /// Keep running and sync again every interval
        #[arg(short, long)]
        watch: bool,

        /// Time between syncs in watch mode, e.g. `30m` (defaults to the config)
        #[arg(short, long, value_parser = parse_interval)]
        interval: Option<Duration>,

        /// Show what would be copied without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip liked tracks
        #[arg(long)]
        no_liked: bool,

        /// Skip playlists
        #[arg(long)]
        no_playlists: bool,
    },
    /// Compare the order of liked tracks between both accounts
    CheckOrder,
    /// Remove playlists and/or liked tracks from the destination account
    Cleanup {
        #[command(flatten)]
        target: CleanupTargetArgs,

        /// Skip the confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },
    /// Manage the connected Spotify accounts
    #[command(subcommand)]
    Auth(AuthCommands),
    /// Show sync statistics
    Stats,
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct CleanupTargetArgs {
    /// Delete every playlist the destination account owns
    #[arg(long)]
    playlists: bool,

    /// Unlike every liked track of the destination account
    #[arg(long)]
    liked: bool,

    /// Both of the above
    #[arg(long)]
    all: bool,
}

impl CleanupTargetArgs {
    fn target(&self) -> CleanupTarget {
        if self.all {
            CleanupTarget::All
        } else if self.playlists {
            CleanupTarget::Playlists
        } else {
            CleanupTarget::Liked
        }
    }
}

#[derive(Subcommand, Debug)]
enum AuthCommands {
    /// Connect an account through the Spotify login page
    Login {
        #[arg(short, long, value_enum)]
        role: AccountRole,
    },
    /// Show the connected accounts
    Status,
    /// Forget a connected account
    Logout {
        #[arg(short, long, value_enum)]
        role: AccountRole,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
    /// Print the effective configuration
    Show,
}

fn account_service(args: &Args, config: &Config) -> Result<SpotifyAccountService> {
    let client_id = args
        .client_id
        .clone()
        .ok_or_eyre("SPOTIFY_CLIENT_ID is not set")?;
    let client_secret = args
        .client_secret
        .clone()
        .ok_or_eyre("SPOTIFY_CLIENT_SECRET is not set")?;

    Ok(SpotifyAccountService::new(
        SpotifyApiCredentials::new(client_id, client_secret, args.redirect_uri.clone()),
        config.accounts_path(),
        config.rate_limit.requests_per_second,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref());

    let log_file = args.log_file.clone().unwrap_or_else(|| config.log_path());
    let tracer_provider = init_tracing(
        "spotify-mirror",
        args.otlp_endpoint.as_deref(),
        &args.log_level,
        Some(&log_file),
    )?;
    tracing::debug!("spotify-mirror starting");

    let shutdown = Shutdown::new();
    shutdown.install_ctrl_c_handler();

    let result = run(args, config, shutdown).await;

    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to flush traces: {e}");
        }
    }
    result
}

async fn run(args: Args, config: Config, shutdown: Shutdown) -> Result<()> {
    match &args.command {
        Commands::Sync {
            watch,
            interval,
            dry_run,
            no_liked,
            no_playlists,
        } => {
            let accounts = account_service(&args, &config)?;
            let sync_args = SyncArgs {
                watch: *watch,
                interval: *interval,
                dry_run: *dry_run,
                no_liked: *no_liked,
                no_playlists: *no_playlists,
            };
            commands::sync::handle_sync(config, &accounts, sync_args, shutdown).await?;
        }
        Commands::CheckOrder => {
            let accounts = account_service(&args, &config)?;
            commands::check_order::handle_check_order(&config, &accounts, shutdown).await?;
        }
        Commands::Cleanup { target, yes } => {
            let accounts = account_service(&args, &config)?;
            commands::cleanup::handle_cleanup(&config, &accounts, target.target(), *yes, shutdown)
                .await?;
        }
        Commands::Auth(auth_commands) => {
            let accounts = account_service(&args, &config)?;
            match auth_commands {
                AuthCommands::Login { role } => {
                    commands::auth::handle_login(&accounts, *role).await?
                }
                AuthCommands::Status => commands::auth::handle_status(&accounts)?,
                AuthCommands::Logout { role } => commands::auth::handle_logout(&accounts, *role)?,
            }
        }
        Commands::Stats => commands::stats::handle_stats(&config),
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default(args.config.as_deref())?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match args.config.clone().or_else(Config::config_path) {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
            ConfigCommands::Show => {
                let rendered = toml::to_string_pretty(&config)?;
                println!("{rendered}");
            }
        },
    }

    Ok(())
}
