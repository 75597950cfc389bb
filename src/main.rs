use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scrobble_sync::config::{AppConfig, CliConfig, FileConfig};
use scrobble_sync::lastfm::LastFmClient;
use scrobble_sync::live::ClientRegistry;
use scrobble_sync::scheduler::{
    LastRunStore, OrchestratorRunner, UpdateScheduler, UPDATE_REQUEST_CAPACITY,
};
use scrobble_sync::scrobble_store::{ScrobbleStore, SqliteScrobbleStore};
use scrobble_sync::server::{self, run_server, ServerState};
use scrobble_sync::state_store::{FileStateStore, StateStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the scrobble database, checkpoint and last-run files.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override command line arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3002)]
    pub port: u16,

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

    /// Maximum remote requests per fetch run. 0 means unlimited.
    #[clap(long)]
    pub request_limit: Option<u32>,

    /// Seconds between syncs while nobody is watching.
    #[clap(long)]
    pub inactive_interval_secs: Option<u64>,

    /// Flag quick repeats after every completed fetch.
    #[clap(long)]
    pub check_duplicates: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            lastfm_api_key: self.lastfm_api_key.clone(),
            lastfm_username: self.lastfm_username.clone(),
            lastfm_base_url: self.lastfm_base_url.clone(),
            throttle_secs: self.throttle_secs,
            request_limit: self.request_limit,
            inactive_interval_secs: self.inactive_interval_secs,
            check_duplicates: self.check_duplicates,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    let db_path = config.scrobble_db_path();
    info!("Opening SQLite scrobble database at {:?}...", db_path);
    let store: Arc<dyn ScrobbleStore> = Arc::new(SqliteScrobbleStore::new(&db_path)?);
    info!("{} plays stored so far", store.activity_count()?);

    let state_store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(config.state_dir())?);
    let source = Arc::new(LastFmClient::with_base_url(
        &config.lastfm.api_key,
        &config.lastfm.base_url,
    )?);
    let runner = Arc::new(OrchestratorRunner::new(
        source,
        store,
        state_store.clone(),
        config.fetch.clone(),
        config.fetch_options(),
    ));

    let registry = Arc::new(ClientRegistry::new());
    let (update_sender, update_receiver) = mpsc::channel(UPDATE_REQUEST_CAPACITY);
    let shutdown_token = CancellationToken::new();

    let mut scheduler = UpdateScheduler::new(
        &config.lastfm.username,
        runner,
        registry.clone(),
        LastRunStore::new(state_store),
        config.scheduler.clone(),
        update_receiver,
        shutdown_token.clone(),
    );
    // Whichever task ends first takes the other one down with it.
    let scheduler_handle = {
        let shutdown_token = shutdown_token.clone();
        tokio::spawn(async move {
            let result = scheduler.run().await;
            shutdown_token.cancel();
            result
        })
    };

    {
        let shutdown_token = shutdown_token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl-C, shutting down...");
                    shutdown_token.cancel();
                }
                Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
            }
        });
    }

    let state = ServerState::new(&config.lastfm.username, registry, update_sender);
    let server_handle = {
        let shutdown_token = shutdown_token.clone();
        let port = config.port;
        tokio::spawn(async move {
            let result = run_server(state, port, shutdown_token.clone()).await;
            shutdown_token.cancel();
            result
        })
    };

    let server_result = server_handle.await.context("Server task panicked")?;
    let scheduler_result = scheduler_handle
        .await
        .context("Update scheduler task panicked")?;
    server_result?;
    scheduler_result?;

    info!("Bye");
    Ok(())
}
