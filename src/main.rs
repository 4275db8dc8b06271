//! yt-trends - scrape YouTube listings into Firestore
//!
//! Resolves YouTube credentials (live sign-in, cookie file, or browser), runs yt-dlp
//! over the configured targets, and stores each video record.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use yt_trends::core::browser::LocalBrowserStore;
use yt_trends::core::credentials::{CredentialEnv, CredentialResolver};
use yt_trends::core::refresher::ChromeSessionProvider;
use yt_trends::core::scraper::ScrapeInvoker;
use yt_trends::core::youtube;
use yt_trends::error::TrendsError;
use yt_trends::storage::firestore::FirestoreSink;
use yt_trends::storage::sink::{StdoutSink, VideoSink};
use yt_trends::storage::{config, targets};
use yt_trends::types::{Config, ResolvedSession};
use yt_trends::ui::display;
use yt_trends::utils::logging::init_logging;
use yt_trends::utils::paths::ensure_app_dirs;

/// Scrape YouTube listings with whatever credentials are available.
#[derive(Parser, Debug)]
#[command(name = "yt-trends")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve credentials and scrape every target
    Scrape {
        /// Print records as JSON lines instead of writing to Firestore
        #[arg(long)]
        dry_run: bool,
    },
    /// Resolve credentials and report which source was used
    Auth,
    /// Show the most popular videos for a region
    Trending {
        /// Region code, e.g. IT or US
        #[arg(short, long)]
        region: Option<String>,

        /// Number of videos
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Edit the configuration file
    Edit,
}

async fn resolve_session(cfg: &Config) -> anyhow::Result<ResolvedSession> {
    let env = CredentialEnv::from_env(cfg);
    let sessions = ChromeSessionProvider {
        binary: cfg.chromedriver.clone(),
        port: cfg.chromedriver_port,
        login_timeout: Duration::from_secs(cfg.login_timeout_secs),
    };
    let browsers = LocalBrowserStore::new();

    let session = CredentialResolver::new(&sessions, &browsers)
        .resolve(&env)
        .await
        .context("credential resolution failed")?;
    Ok(session)
}

async fn scrape(cfg: &Config, dry_run: bool) -> anyhow::Result<()> {
    let targets = targets::load_targets(Path::new(&cfg.targets_dir)).await;
    if targets.is_empty() {
        return Err(TrendsError::InvalidConfig(format!(
            "no scrape targets found in {}",
            cfg.targets_dir
        ))
        .into());
    }

    // Open the sink before signing in so a bad key file fails fast
    let sink: Box<dyn VideoSink> = if dry_run {
        Box::new(StdoutSink)
    } else {
        Box::new(
            FirestoreSink::from_key_file(
                Path::new(&cfg.firestore_credentials),
                cfg.firestore_project.clone(),
                &cfg.collection,
            )
            .await?,
        )
    };

    let session = resolve_session(cfg).await?;
    if !dry_run {
        display::print_session_report(&session);
    }

    let summary = ScrapeInvoker::from_config(cfg)
        .run(
            &session,
            Path::new(&cfg.runtime_cookie_file),
            cfg.browser_passthrough,
            &targets,
            sink.as_ref(),
        )
        .await?;

    if !dry_run {
        display::print_run_summary(&summary);
    }
    Ok(())
}

async fn trending(cfg: &Config, region: Option<String>, limit: Option<usize>) -> anyhow::Result<()> {
    let api_key = cfg.youtube_api_key.as_deref().ok_or_else(|| {
        TrendsError::InvalidConfig(format!(
            "no YouTube API key; set {} or youtube_api_key in the config",
            config::API_KEY_ENV
        ))
    })?;
    let region = region.unwrap_or_else(|| cfg.region_code.clone());
    let limit = limit.unwrap_or(cfg.trending_limit);

    let videos = youtube::fetch_trending(api_key, &region, limit).await?;
    display::print_trending(&videos, &region);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    ensure_app_dirs().await?;
    let cfg = config::load_config(cli.config.as_deref()).await?;

    let result = match cli.command {
        Command::Scrape { dry_run } => scrape(&cfg, dry_run).await,
        Command::Auth => resolve_session(&cfg).await.map(|session| {
            display::print_session_report(&session);
        }),
        Command::Trending { region, limit } => trending(&cfg, region, limit).await,
        Command::Edit => config::edit_config(&cfg.editor, cli.config.as_deref())
            .await
            .map_err(Into::into),
    };

    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<TrendsError>() {
            tracing::debug!(code = ?err.code(), "command failed");
        }
        eprintln!("{} {:#}", "Error:".red(), e);
        std::process::exit(1);
    }
    Ok(())
}
