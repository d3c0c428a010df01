use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of task invocations running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout for the single callback POST, independent of request expiry
    #[serde(default = "default_callback_timeout_ms")]
    pub callback_timeout_ms: u64,

    #[serde(default)]
    pub acl: AclClientConfig,
}

fn default_concurrency() -> usize {
    16
}

fn default_callback_timeout_ms() -> u64 {
    5_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            callback_timeout_ms: default_callback_timeout_ms(),
            acl: AclClientConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("worker.concurrency must be > 0".into());
        }
        if self.callback_timeout_ms == 0 {
            return Err("worker.callback_timeout_ms must be > 0".into());
        }
        self.acl.validate()
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }
}

/// Access-control store client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclClientConfig {
    /// Base URL of the ACL service
    #[serde(default = "default_acl_url")]
    pub url: String,

    /// Upper bound for one membership query; the remaining time until the
    /// request expires is used when it is shorter
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_acl_url() -> String {
    "http://localhost:5000".into()
}

fn default_query_timeout_ms() -> u64 {
    5_000
}

impl Default for AclClientConfig {
    fn default() -> Self {
        Self {
            url: default_acl_url(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl AclClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("worker.acl.url must not be empty".into());
        }
        if self.query_timeout_ms == 0 {
            return Err("worker.acl.query_timeout_ms must be > 0".into());
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
