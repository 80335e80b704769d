use std::time::Duration;

use anyhow::{Context, Result};

/// Runtime configuration, loaded from the environment with the defaults
/// spec.md §6 fixes for wire compatibility with the reference
/// producer/worker scripts.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub lease_duration: Duration,
    pub sweep_interval: Duration,
    pub poll_deadline: Duration,
    pub max_tries: u32,
    pub retry_base: Duration,
    pub retry_cap: Duration,
    pub bind_addr: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
            poll_deadline: Duration::from_secs(30),
            max_tries: 3,
            retry_base: Duration::from_secs(5),
            retry_cap: Duration::from_secs(30),
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from environment variables, falling back to the
    /// spec-fixed defaults for anything unset. Loads a `.env` file first
    /// if present (development convenience).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            lease_duration: parse_secs_env("DISPATCHD_LEASE_DURATION_SECS", defaults.lease_duration)?,
            sweep_interval: parse_secs_env("DISPATCHD_SWEEP_INTERVAL_SECS", defaults.sweep_interval)?,
            poll_deadline: parse_secs_env("DISPATCHD_POLL_DEADLINE_SECS", defaults.poll_deadline)?,
            max_tries: std::env::var("DISPATCHD_MAX_TRIES")
                .ok()
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("DISPATCHD_MAX_TRIES must be a positive integer")?
                .unwrap_or(defaults.max_tries),
            retry_base: parse_secs_env("DISPATCHD_RETRY_BASE_SECS", defaults.retry_base)?,
            retry_cap: parse_secs_env("DISPATCHD_RETRY_CAP_SECS", defaults.retry_cap)?,
            bind_addr: std::env::var("DISPATCHD_BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }
}

fn parse_secs_env(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(v) => {
            let secs: u64 = v.parse().with_context(|| format!("{key} must be an integer number of seconds"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}
