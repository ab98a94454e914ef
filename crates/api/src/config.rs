//! Process configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use threadline_runner::RunnerConfig;

pub const BIND_ADDR_ENV: &str = "THREADLINE_BIND_ADDR";
pub const MAX_ITERATIONS_ENV: &str = "THREADLINE_MAX_ITERATIONS";
pub const TIMEOUT_MS_ENV: &str = "THREADLINE_TIMEOUT_MS";
pub const PAGE_SIZE_ENV: &str = "THREADLINE_PAGE_SIZE";
pub const DATABASE_URL_ENV: &str = "THREADLINE_DATABASE_URL";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub runner: RunnerConfig,
    /// Postgres connection string; in-memory stores when unset.
    pub database_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            runner: RunnerConfig::default(),
            database_url: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparsable values are logged and
    /// replaced by defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = RunnerConfig::default();

        let max_iterations = parsed(&lookup, MAX_ITERATIONS_ENV, defaults.max_iterations);
        let page_size = parsed(&lookup, PAGE_SIZE_ENV, defaults.page_size);
        // 0 disables the wall-clock limit.
        let timeout = match lookup(TIMEOUT_MS_ENV) {
            None => defaults.timeout,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(e) => {
                    tracing::warn!(key = TIMEOUT_MS_ENV, value = %raw, error = %e, "invalid value; using default");
                    defaults.timeout
                }
            },
        };

        Self {
            bind_addr: lookup(BIND_ADDR_ENV)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            runner: defaults
                .with_max_iterations(max_iterations)
                .with_page_size(page_size)
                .with_timeout(timeout),
            database_url: lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty()),
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "invalid value; using default");
            default
        }
    }
}
