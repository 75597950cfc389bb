use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML configuration. Every value present here wins over the
/// corresponding command line argument.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    pub port: Option<u16>,

    pub lastfm: Option<LastFmConfig>,
    pub fetch: Option<FetchConfig>,
    pub scheduler: Option<SchedulerConfig>,
    pub duplicates: Option<DuplicatesConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LastFmConfig {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub throttle_secs: Option<u64>,
    /// 0 disables the ceiling.
    pub request_limit: Option<u32>,
    pub max_retries: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_secs: Option<u64>,
    pub cooldown_secs: Option<u64>,
    pub active_interval_secs: Option<u64>,
    pub inactive_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DuplicatesConfig {
    pub check_after_fetch: Option<bool>,
    pub threshold_secs: Option<i64>,
    pub lookback_days: Option<i64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
