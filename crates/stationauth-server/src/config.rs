use serde::{Deserialize, Serialize};
use stationauth_audit::{AuditBackendKind, AuditConfig};
use stationauth_worker::WorkerConfig;
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Authorization endpoint settings
    #[serde(default)]
    pub front_door: FrontDoorConfig,
    /// Shared Redis connection settings
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub allowlist: AllowlistConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        if self.front_door.authorization_timeout_ms == 0 {
            return Err("front_door.authorization_timeout_ms must be > 0".into());
        }
        if self.queue.key.is_empty() {
            return Err("queue.key must not be empty".into());
        }
        if self.queue.poll_timeout_ms == 0 {
            return Err("queue.poll_timeout_ms must be > 0".into());
        }
        if self.queue.capacity == 0 {
            return Err("queue.capacity must be > 0".into());
        }

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }

        if !self.redis.enabled {
            if self.allowlist.backend == StoreBackend::Redis {
                return Err("allowlist.backend=redis requires redis.enabled=true".into());
            }
            if self.queue.backend == StoreBackend::Redis {
                return Err("queue.backend=redis requires redis.enabled=true".into());
            }
            if self.audit.backend == AuditBackendKind::Redis {
                return Err("audit.backend=redis requires redis.enabled=true".into());
            }
        }
        if self.redis.enabled && self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }

        self.worker.validate()?;
        self.audit
            .validate()
            .map_err(|e| format!("audit config error: {e}"))?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontDoorConfig {
    /// Lifetime of an accepted request; `expiry_time = now + this`
    #[serde(default = "default_authorization_timeout_ms")]
    pub authorization_timeout_ms: u64,
}

fn default_authorization_timeout_ms() -> u64 {
    5_000
}

impl Default for FrontDoorConfig {
    fn default() -> Self {
        Self {
            authorization_timeout_ms: default_authorization_timeout_ms(),
        }
    }
}

impl FrontDoorConfig {
    pub fn authorization_timeout(&self) -> Duration {
        Duration::from_millis(self.authorization_timeout_ms)
    }
}

/// Redis configuration
///
/// One pool is shared by the allowlist, the task queue and the audit backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Where a component keeps its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowlistConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// `memory` runs the worker inside the server process
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis list holding pending requests
    #[serde(default = "default_queue_key")]
    pub key: String,

    /// How long one dequeue blocks before re-checking for shutdown
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Bound of the in-process channel
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

fn default_queue_key() -> String {
    "stationauth:tasks".into()
}

fn default_poll_timeout_ms() -> u64 {
    1_000
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            key: default_queue_key(),
            poll_timeout_ms: default_poll_timeout_ms(),
            capacity: default_queue_capacity(),
        }
    }
}

impl QueueConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "stationauth.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));

        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., STATIONAUTH__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("STATIONAUTH")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
