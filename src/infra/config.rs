//! Centralized configuration (environment variables + defaults).

use anyhow::{anyhow, Context};
use std::time::Duration;

pub const DEFAULT_HTTP_BIND_ADDR: &str = "0.0.0.0:8081";
pub const DEFAULT_QUEUE_GROUP: &str = "ledger-workers";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `postgres://...` or `sqlite:...` (required, no default).
    pub database_url: String,
    pub db_max_connections: u32,
    /// Unset means the in-process channel, usable only when gateway and consumer share a process.
    pub nats_url: Option<String>,
    pub nats_subject: String,
    pub nats_queue_group: String,
    pub http_bind_addr: String,
    /// Max in-flight applications per consumer.
    pub worker_concurrency: usize,
    pub apply_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        let db_max_connections = parse_or(&get, "DB_MAX_CONNECTIONS", 5u32)?.max(1);
        let worker_concurrency = parse_or(&get, "WORKER_CONCURRENCY", 8usize)?.max(1);
        let apply_timeout_ms = parse_or(&get, "APPLY_TIMEOUT_MS", 5_000u64)?.max(1);

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(anyhow!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other)),
        };

        Ok(Self {
            database_url,
            db_max_connections,
            nats_url: get("NATS_URL"),
            nats_subject: get("NATS_SUBJECT")
                .unwrap_or_else(|| crate::domain::model::SUBJECT_TX_CREATED.to_string()),
            nats_queue_group: get("NATS_QUEUE_GROUP").unwrap_or_else(|| DEFAULT_QUEUE_GROUP.to_string()),
            http_bind_addr: get("HTTP_BIND_ADDR").unwrap_or_else(|| DEFAULT_HTTP_BIND_ADDR.to_string()),
            worker_concurrency,
            apply_timeout: Duration::from_millis(apply_timeout_ms),
            log_format,
        })
    }

    /// The NATS URL, for binaries that cannot fall back to the in-process channel.
    pub fn require_nats_url(&self) -> anyhow::Result<&str> {
        self.nats_url
            .as_deref()
            .ok_or_else(|| anyhow!("NATS_URL must be set (gateway and worker run in separate processes)"))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a valid number, got '{}'", key, raw)),
        None => Ok(default),
    }
}
