mod file_config;

pub use file_config::{DuplicatesConfig, FetchConfig, FileConfig, LastFmConfig, SchedulerConfig};

use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::lastfm::LASTFM_API_BASE;
use crate::sync::{DuplicateCheck, FetchOptions};

/// Largest page last.fm serves for `user.getRecentTracks`.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Command line values that take part in config resolution.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub lastfm_api_key: Option<String>,
    pub lastfm_username: Option<String>,
    pub lastfm_base_url: Option<String>,
    pub throttle_secs: Option<u64>,
    pub request_limit: Option<u32>,
    pub inactive_interval_secs: Option<u64>,
    pub check_duplicates: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub lastfm: LastFmSettings,
    pub fetch: FetchSettings,
    /// Remote requests allowed per fetch run; `None` for no ceiling.
    pub request_limit: Option<u32>,
    pub scheduler: SchedulerSettings,
    pub duplicates: DuplicateSettings,
}

#[derive(Debug, Clone)]
pub struct LastFmSettings {
    pub api_key: String,
    pub username: String,
    pub base_url: String,
}

/// How a fetch run talks to last.fm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub throttle_secs: u64,
    pub max_retries: u32,
    pub page_size: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            throttle_secs: 5,
            max_retries: 3,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub tick: Duration,
    /// Minimum time between two runs for the same account.
    pub cooldown: Duration,
    /// Run interval while the account has live viewers.
    pub active_interval: Duration,
    pub inactive_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            cooldown: Duration::from_secs(120),
            active_interval: Duration::from_secs(600),
            inactive_interval: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSettings {
    pub check_after_fetch: bool,
    pub threshold_secs: i64,
    pub lookback_days: i64,
}

impl Default for DuplicateSettings {
    fn default() -> Self {
        Self {
            check_after_fetch: false,
            threshold_secs: 30,
            lookback_days: 7,
        }
    }
}

impl DuplicateSettings {
    pub fn duplicate_check(&self) -> Option<DuplicateCheck> {
        self.check_after_fetch.then(|| DuplicateCheck {
            threshold_secs: self.threshold_secs,
            lookback_secs: self.lookback_days * 24 * 3600,
        })
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| anyhow!("db_dir must be specified via --db-dir or in config file"))?;
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }
        // The store location recorded in checkpoints derives from this path,
        // so every entry point has to spell it the same way.
        let db_dir = db_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve db_dir {:?}", db_dir))?;

        let port = file.port.unwrap_or(cli.port);

        let lastfm_file = file.lastfm.unwrap_or_default();
        let api_key = lastfm_file
            .api_key
            .or_else(|| cli.lastfm_api_key.clone())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("last.fm api key must be specified via --lastfm-api-key, LASTFM_API_KEY or [lastfm] api_key"))?;
        let username = lastfm_file
            .username
            .or_else(|| cli.lastfm_username.clone())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow!("last.fm username must be specified via --lastfm-username or [lastfm] username"))?;
        let base_url = lastfm_file
            .base_url
            .or_else(|| cli.lastfm_base_url.clone())
            .unwrap_or_else(|| LASTFM_API_BASE.to_string());

        let fetch_file = file.fetch.unwrap_or_default();
        let defaults = FetchSettings::default();
        let fetch = FetchSettings {
            throttle_secs: fetch_file
                .throttle_secs
                .or(cli.throttle_secs)
                .unwrap_or(defaults.throttle_secs),
            max_retries: fetch_file.max_retries.unwrap_or(defaults.max_retries),
            page_size: fetch_file.page_size.unwrap_or(defaults.page_size),
        };
        let request_limit = fetch_file
            .request_limit
            .or(cli.request_limit)
            .filter(|limit| *limit > 0);
        if fetch.page_size == 0 || fetch.page_size > MAX_PAGE_SIZE {
            bail!("fetch.page_size must be between 1 and {}", MAX_PAGE_SIZE);
        }

        let scheduler_file = file.scheduler.unwrap_or_default();
        let defaults = SchedulerSettings::default();
        let secs_or = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_secs).unwrap_or(default)
        };
        let scheduler = SchedulerSettings {
            tick: secs_or(scheduler_file.tick_secs, defaults.tick),
            cooldown: secs_or(scheduler_file.cooldown_secs, defaults.cooldown),
            active_interval: secs_or(scheduler_file.active_interval_secs, defaults.active_interval),
            inactive_interval: secs_or(
                scheduler_file
                    .inactive_interval_secs
                    .or(cli.inactive_interval_secs),
                defaults.inactive_interval,
            ),
        };
        if scheduler.tick.is_zero() {
            bail!("scheduler.tick_secs must be greater than 0");
        }

        let duplicates_file = file.duplicates.unwrap_or_default();
        let defaults = DuplicateSettings::default();
        let duplicates = DuplicateSettings {
            check_after_fetch: duplicates_file
                .check_after_fetch
                .unwrap_or(cli.check_duplicates),
            threshold_secs: duplicates_file.threshold_secs.unwrap_or(defaults.threshold_secs),
            lookback_days: duplicates_file.lookback_days.unwrap_or(defaults.lookback_days),
        };

        Ok(Self {
            db_dir,
            port,
            lastfm: LastFmSettings {
                api_key,
                username,
                base_url,
            },
            fetch,
            request_limit,
            scheduler,
            duplicates,
        })
    }

    pub fn scrobble_db_path(&self) -> PathBuf {
        self.db_dir.join("scrobbles.db")
    }

    /// Directory holding the checkpoint and last-run files.
    pub fn state_dir(&self) -> PathBuf {
        self.db_dir.clone()
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            request_limit: self.request_limit,
            duplicate_check: self.duplicates.duplicate_check(),
        }
    }
}
