use crate::cache::CacheConfig;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Prefix shared by every environment variable gridstat reads
pub const ENV_PREFIX: &str = "GRIDSTAT_";

const DEFAULT_CACHE_TTL_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_QSTAT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_QDEL_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_FAILURE_ALERT_THRESHOLD: u32 = 5;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct GridConfig {
    pub qstat_path: String,
    pub qdel_path: String,
    pub qstat_timeout: Duration,
    pub qdel_timeout: Duration,
    /// Serve generated data instead of running qstat/qdel
    pub test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub request_timeout: Duration,
    pub failure_alert_threshold: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub grid: GridConfig,
    pub cache: CacheSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; keys are given without
    /// the `GRIDSTAT_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        let millis = |name: &str, default: u64| -> Result<Duration> {
            Ok(Duration::from_millis(parsed(&var, name)?.unwrap_or(default)))
        };

        Ok(Self {
            server: ServerConfig {
                port: parsed(&var, "PORT")?.unwrap_or(3000),
            },
            grid: GridConfig {
                qstat_path: var("QSTAT_PATH").unwrap_or_else(|| "qstat".to_string()),
                qdel_path: var("QDEL_PATH").unwrap_or_else(|| "qdel".to_string()),
                qstat_timeout: millis("QSTAT_TIMEOUT_MS", DEFAULT_QSTAT_TIMEOUT_MS)?,
                qdel_timeout: millis("QDEL_TIMEOUT_MS", DEFAULT_QDEL_TIMEOUT_MS)?,
                test_mode: var("TEST").map(|v| v.trim() == "true").unwrap_or(false),
            },
            cache: CacheSettings {
                ttl: millis("CACHE_TTL_MS", DEFAULT_CACHE_TTL_MS)?,
                request_timeout: millis("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?,
                failure_alert_threshold: parsed(&var, "FAILURE_ALERT_THRESHOLD")?
                    .unwrap_or(DEFAULT_FAILURE_ALERT_THRESHOLD),
            },
        })
    }

    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache.ttl,
            request_timeout: self.cache.request_timeout,
            failure_alert_threshold: self.cache.failure_alert_threshold,
        }
    }
}

fn parsed<T, F>(var: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("{}{} has an invalid value '{}'", ENV_PREFIX, name, value))
        })
        .transpose()
}
