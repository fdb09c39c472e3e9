//! Application configuration loaded from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use payflow_engine::EngineConfig;

/// Runtime configuration for the payflow server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Ledger backend: `memory` or a `sqlite:` URL.
    pub ledger_url: String,
    /// How long to wait for a gateway call before treating it as timed out.
    pub gateway_timeout_ms: u64,
    /// How long a request waits for a payment's lock before giving up.
    pub lock_timeout_ms: u64,
    /// How long an idempotent retry waits for the first request to finish.
    pub pending_wait_ms: u64,
    /// How many times a commit is retried after a version conflict.
    pub commit_retries: u32,
    /// How long completed idempotency records are kept.
    pub idempotency_ttl_secs: u64,
    /// How often expired idempotency records are purged.
    pub purge_interval_secs: u64,
    /// Emit logs as JSON instead of human-readable lines.
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: parsed("PORT", "3000")?,
            ledger_url: env::var("LEDGER_URL").unwrap_or_else(|_| "memory".to_string()),
            gateway_timeout_ms: parsed("GATEWAY_TIMEOUT_MS", "5000")?,
            lock_timeout_ms: parsed("LOCK_TIMEOUT_MS", "5000")?,
            pending_wait_ms: parsed("PENDING_WAIT_MS", "10000")?,
            commit_retries: parsed("COMMIT_RETRIES", "3")?,
            idempotency_ttl_secs: parsed("IDEMPOTENCY_TTL_SECS", "86400")?,
            purge_interval_secs: parsed("IDEMPOTENCY_PURGE_INTERVAL_SECS", "3600")?,
            log_json: parsed("LOG_JSON", "false")?,
        })
    }

    /// Engine tuning derived from this configuration.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            gateway_timeout: Duration::from_millis(self.gateway_timeout_ms),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            pending_wait: Duration::from_millis(self.pending_wait_ms),
            commit_retries: self.commit_retries,
            idempotency_ttl: Duration::from_secs(self.idempotency_ttl_secs),
        }
    }
}

fn parsed<T>(name: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid value for {name}"))
}
