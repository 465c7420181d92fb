use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool and query settings for [`crate::Database`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub max_idle_time: Duration,
    pub query_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("social.db"),
            max_open_conns: 30,
            max_idle_conns: 30,
            max_idle_time: Duration::from_secs(15 * 60),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl DbConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup, falling back to defaults for
    /// absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            path: lookup("SOCIAL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            max_open_conns: parse(&lookup, "SOCIAL_DB_MAX_OPEN_CONNS")?
                .unwrap_or(defaults.max_open_conns),
            max_idle_conns: parse(&lookup, "SOCIAL_DB_MAX_IDLE_CONNS")?
                .unwrap_or(defaults.max_idle_conns),
            max_idle_time: parse(&lookup, "SOCIAL_DB_MAX_IDLE_TIME_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_idle_time),
            query_timeout: parse(&lookup, "SOCIAL_DB_QUERY_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.query_timeout),
        })
    }
}

/// Invitation lifetime for new accounts, from `SOCIAL_INVITE_TTL_HOURS`.
pub fn invite_ttl_from_env() -> Result<chrono::Duration> {
    let hours: i64 = env_var("SOCIAL_INVITE_TTL_HOURS")?.unwrap_or(72);
    Ok(chrono::Duration::hours(hours))
}

/// Reads and parses one environment variable. Unset is `None`; a value that
/// does not parse is an error naming the key.
pub fn env_var<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse(&|key: &str| std::env::var(key).ok(), key)
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("invalid {key}: {raw:?}")))
        .transpose()
}
