//! Runs a single fetch for the configured account and prints the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scrobble_sync::config::{AppConfig, CliConfig, FileConfig};
use scrobble_sync::lastfm::LastFmClient;
use scrobble_sync::scheduler::OrchestratorRunner;
use scrobble_sync::scrobble_store::{ScrobbleStore, SqliteScrobbleStore};
use scrobble_sync::state_store::{FileStateStore, StateStore};
use scrobble_sync::sync::DuplicateDetector;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the scrobble database and checkpoint file.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override command line arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    #[clap(long, env = "LASTFM_API_KEY", hide_env_values = true)]
    pub lastfm_api_key: Option<String>,

    /// The last.fm account to mirror.
    #[clap(long)]
    pub lastfm_username: Option<String>,

    /// Override for the last.fm API endpoint.
    #[clap(long)]
    pub lastfm_base_url: Option<String>,

    /// Minimum seconds between two remote requests.
    #[clap(long)]
    pub throttle_secs: Option<u64>,

    /// Stop after this many remote requests. A later run resumes from the
    /// checkpoint. 0 means unlimited.
    #[clap(long)]
    pub request_limit: Option<u32>,

    /// Scan the whole store for quick repeats once the fetch is done.
    #[clap(long)]
    pub duplicates: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        lastfm_api_key: cli_args.lastfm_api_key.clone(),
        lastfm_username: cli_args.lastfm_username.clone(),
        lastfm_base_url: cli_args.lastfm_base_url.clone(),
        throttle_secs: cli_args.throttle_secs,
        request_limit: cli_args.request_limit,
        ..Default::default()
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let store: Arc<dyn ScrobbleStore> =
        Arc::new(SqliteScrobbleStore::new(config.scrobble_db_path())?);
    let state_store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(config.state_dir())?);
    let source = Arc::new(LastFmClient::with_base_url(
        &config.lastfm.api_key,
        &config.lastfm.base_url,
    )?);
    let runner = OrchestratorRunner::new(
        source,
        store.clone(),
        state_store,
        config.fetch.clone(),
        config.fetch_options(),
    );

    info!("Fetching recent tracks for {}", config.lastfm.username);
    let result = runner
        .orchestrator(&config.lastfm.username)
        .run(&config.fetch_options())
        .await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to encode fetch result")?
    );

    if !result.complete {
        warn!("Fetch stopped before reaching the newest play; run again to resume");
    }

    if cli_args.duplicates {
        let detector = DuplicateDetector::new(config.duplicates.threshold_secs);
        let report = detector.flag(store.as_ref(), 0)?;
        println!("{}", report);
    }

    info!("{} plays stored", store.activity_count()?);
    Ok(())
}
