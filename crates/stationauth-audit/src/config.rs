use serde::{Deserialize, Serialize};

/// Which audit backend a worker writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditBackendKind {
    /// Discard records
    #[default]
    None,
    /// Redis hash per record (uses the shared `[redis]` pool)
    Redis,
    /// Elasticsearch-compatible search index
    SearchIndex,
}

impl std::fmt::Display for AuditBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditBackendKind::None => write!(f, "none"),
            AuditBackendKind::Redis => write!(f, "redis"),
            AuditBackendKind::SearchIndex => write!(f, "search_index"),
        }
    }
}

/// Audit configuration
///
/// Can be set via environment variables, e.g.:
/// - STATIONAUTH__AUDIT__BACKEND=search_index
/// - STATIONAUTH__AUDIT__SEARCH_INDEX__URL=https://elastic:9200
/// - STATIONAUTH__AUDIT__SEARCH_INDEX__PASSWORD=...
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub backend: AuditBackendKind,

    #[serde(default)]
    pub search_index: SearchIndexConfig,
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.backend == AuditBackendKind::SearchIndex {
            if self.search_index.url.as_deref().unwrap_or("").is_empty() {
                return Err("audit.backend=search_index requires audit.search_index.url".into());
            }
            if self.search_index.index.is_empty() {
                return Err("audit.search_index.index must not be empty".into());
            }
            if self.search_index.timeout_ms == 0 {
                return Err("audit.search_index.timeout_ms must be > 0".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexConfig {
    /// Base URL of the search cluster, e.g. `https://localhost:9200`
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_search_username")]
    pub username: String,

    /// Basic auth password; no auth header is sent when unset
    #[serde(default)]
    pub password: Option<String>,

    /// PEM file with an extra CA certificate to trust
    #[serde(default)]
    pub ca_cert_path: Option<String>,

    #[serde(default = "default_search_index")]
    pub index: String,

    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_search_username() -> String {
    "elastic".into()
}

fn default_search_index() -> String {
    "log.authorize".into()
}

fn default_search_timeout_ms() -> u64 {
    10_000
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: default_search_username(),
            password: None,
            ca_cert_path: None,
            index: default_search_index(),
            timeout_ms: default_search_timeout_ms(),
        }
    }
}
