use std::time::Duration;

use crate::db::PoolSettings;
use crate::jobs::PollerConfig;
use crate::reports::ReportLimits;

// Runtime configuration, read once from the environment (and `.env`).

// Every knob has a JOBDOCTOR_* name; a few also accept the bare name.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub pool: PoolSettings,
    pub source_url: String,
    pub source_timeout: Duration,
    pub poll_interval: Duration,
    pub name_max_len: usize,
    pub min_detail_columns: i32,
    pub analysis_concurrency: usize,
    pub admin_addr: Option<String>,
    pub migrate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let pool = PoolSettings::from_env();

        let source_url = env_or_fallback("JOBDOCTOR_SOURCE_URL", "SOURCE_URL")
            .ok_or_else(|| anyhow::anyhow!("JOBDOCTOR_SOURCE_URL is missing"))?;

        let source_timeout = Duration::from_secs(
            env_parse("JOBDOCTOR_SOURCE_TIMEOUT_SECS")
                .unwrap_or(30_u64)
                .clamp(1, 600),
        );

        let poll_interval = Duration::from_secs(
            env_or_fallback("JOBDOCTOR_POLL_INTERVAL_SECS", "POLL_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(5 * 60_u64)
                .max(1),
        );

        // anything shorter can't hold a character plus the "..." marker
        let name_max_len = env_parse("JOBDOCTOR_NAME_MAX_LEN")
            .unwrap_or(100_usize)
            .max(4);

        let min_detail_columns = env_parse("JOBDOCTOR_MIN_DETAIL_COLUMNS")
            .unwrap_or(1_i32)
            .max(1);

        let analysis_concurrency = env_parse("JOBDOCTOR_ANALYSIS_CONCURRENCY")
            .unwrap_or(1_usize)
            .clamp(1, 64);

        let admin_addr = env_or_fallback("JOBDOCTOR_ADMIN_ADDR", "ADMIN_ADDR")
            .and_then(|s| normalize_optional_addr(&s));

        let migrate_on_startup = env_bool("JOBDOCTOR_MIGRATE_ON_STARTUP").unwrap_or(false);

        Ok(Self {
            database_url,
            pool,
            source_url,
            source_timeout,
            poll_interval,
            name_max_len,
            min_detail_columns,
            analysis_concurrency,
            admin_addr,
            migrate_on_startup,
        })
    }

    /// The subset the poll loop itself consumes.
    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval,
            limits: ReportLimits {
                name_max_len: self.name_max_len,
                min_detail_columns: self.min_detail_columns,
            },
            analysis_concurrency: self.analysis_concurrency,
        }
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}
