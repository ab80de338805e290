use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use serde::Deserialize;

use crate::fees::RATE_PER_DAY;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub late_fee_per_day: u64,
    pub banner_ttl_secs: u64,
    pub http_timeout_secs: u64,
    pub token_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables, applying defaults where appropriate.
    ///
    /// # Errors
    /// Returns an error if `LIBRARY_API_URL` is missing or if numeric parsing fails.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = std::env::var("LIBRARY_API_URL").context("LIBRARY_API_URL must be set")?;
        let late_fee_per_day = parse_var("LATE_FEE_PER_DAY", RATE_PER_DAY)?;
        let banner_ttl_secs = parse_var("BANNER_TTL_SECS", 3)?;
        let http_timeout_secs = parse_var("HTTP_TIMEOUT_SECS", 10)?;
        let token_path = std::env::var("TOKEN_PATH")
            .map_or_else(|_| PathBuf::from(".library-admin-token"), PathBuf::from);

        Ok(Self::new(api_url)
            .with_late_fee(late_fee_per_day)
            .with_banner_ttl_secs(banner_ttl_secs)
            .with_http_timeout_secs(http_timeout_secs)
            .with_token_path(token_path))
    }

    /// Configuration with defaults for everything but the API base URL.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            late_fee_per_day: RATE_PER_DAY,
            banner_ttl_secs: 3,
            http_timeout_secs: 10,
            token_path: PathBuf::from(".library-admin-token"),
        }
    }

    #[must_use]
    pub fn with_late_fee(mut self, per_day: u64) -> Self {
        self.late_fee_per_day = per_day;
        self
    }

    #[must_use]
    pub fn with_banner_ttl_secs(mut self, secs: u64) -> Self {
        self.banner_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_token_path(mut self, path: PathBuf) -> Self {
        self.token_path = path;
        self
    }

    #[must_use]
    pub fn banner_ttl(&self) -> Duration {
        Duration::from_secs(self.banner_ttl_secs)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_var(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a non-negative integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
