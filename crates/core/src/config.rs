use std::path::PathBuf;
use std::time::Duration;

use crate::errors::CoreError;

/// Default cache TTL: one hour keeps the metals.dev free tier usable.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Default per-request timeout for price fetches.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 30;

pub const ENV_API_KEY: &str = "METALS_API_KEY";
pub const ENV_CACHE_TTL: &str = "METALS_CACHE_TTL";
pub const ENV_FETCH_TIMEOUT: &str = "METALS_FETCH_TIMEOUT";
pub const ENV_DATA_DIR: &str = "METALSTACK_DATA_DIR";
pub const ENV_CACHE_DIR: &str = "METALSTACK_CACHE_DIR";

/// Runtime configuration, sourced from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    /// metals.dev API key; `None` when unset (commands that only touch the
    /// collection file still work).
    pub api_key: Option<String>,

    /// Seconds a cached snapshot or series stays fresh. Always ≥ 1.
    pub cache_ttl_seconds: u64,

    /// Upper bound on a single fetch; exceeding it is a `Timeout` failure.
    pub fetch_timeout: Duration,

    /// Holds `collection.json`, `settings.json` and the log file.
    pub data_dir: PathBuf,

    /// Holds `prices.json`.
    pub cache_dir: PathBuf,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("data_dir", &self.data_dir)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let cache_ttl_seconds = parse_positive(&lookup, ENV_CACHE_TTL, DEFAULT_CACHE_TTL_SECONDS)?;
        let timeout_seconds = parse_positive(&lookup, ENV_FETCH_TIMEOUT, DEFAULT_FETCH_TIMEOUT_SECONDS)?;

        let data_dir = match lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_dir(dirs::data_local_dir(), ".local/share")?,
        };
        let cache_dir = match lookup(ENV_CACHE_DIR).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_dir(dirs::cache_dir(), ".cache")?,
        };

        Ok(Self {
            api_key,
            cache_ttl_seconds,
            fetch_timeout: Duration::from_secs(timeout_seconds),
            data_dir,
            cache_dir,
        })
    }

    /// The API key, or a configuration error explaining how to get one.
    pub fn require_api_key(&self) -> Result<&str, CoreError> {
        self.api_key.as_deref().ok_or_else(|| {
            CoreError::Config(format!(
                "API key required. Set {ENV_API_KEY} environment variable. Get a free key at https://metals.dev"
            ))
        })
    }

    pub fn collection_path(&self) -> PathBuf {
        self.data_dir.join("collection.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("metalstack.log")
    }

    pub fn price_cache_path(&self) -> PathBuf {
        self.cache_dir.join("prices.json")
    }
}

fn parse_positive<F>(lookup: &F, key: &str, default: u64) -> Result<u64, CoreError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(CoreError::Config(format!(
            "{key} must be a whole number of seconds ≥ 1, got '{raw}'"
        ))),
    }
}

fn default_dir(platform_dir: Option<PathBuf>, home_fallback: &str) -> Result<PathBuf, CoreError> {
    platform_dir
        .or_else(|| dirs::home_dir().map(|home| home.join(home_fallback)))
        .map(|dir| dir.join("metalstack"))
        .ok_or_else(|| {
            CoreError::Config(format!(
                "Could not determine a home directory; set {ENV_DATA_DIR} and {ENV_CACHE_DIR}"
            ))
        })
}
