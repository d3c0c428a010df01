//! Search-index audit backend.
//!
//! Talks to an Elasticsearch-compatible REST API: the index is created with an
//! explicit mapping on connect, then every record becomes one document.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use stationauth_core::AuditRecord;

use crate::config::SearchIndexConfig;
use crate::error::AuditError;
use crate::logger::AuditBackend;

/// Document stored for one authorization event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationLogEntry {
    pub station_id: String,
    pub driver_token: String,
    pub status: String,
    pub callback_status: String,
    pub callback_url: String,
    pub start_time_ms: i64,
}

impl From<&AuditRecord> for AuthorizationLogEntry {
    fn from(record: &AuditRecord) -> Self {
        Self {
            station_id: record.station_id.to_string(),
            driver_token: record.driver_token.clone(),
            status: record.status.to_string(),
            callback_status: record.callback_status.clone(),
            callback_url: record.callback_url.clone(),
            start_time_ms: record.start_time_ms(),
        }
    }
}

fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "station_id": { "type": "keyword" },
                "driver_token": { "type": "keyword" },
                "status": { "type": "keyword" },
                "callback_status": { "type": "keyword" },
                "callback_url": { "type": "keyword" },
                "start_time_ms": { "type": "long" }
            }
        }
    })
}

pub struct SearchIndexAuditBackend {
    http_client: Client,
    base_url: String,
    index: String,
    username: String,
    password: Option<String>,
}

impl SearchIndexAuditBackend {
    /// Build the client from configuration without touching the network.
    pub async fn new(config: &SearchIndexConfig) -> Result<Self, AuditError> {
        let base_url = config
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AuditError::InvalidConfig("Missing search index url".into()))?
            .trim_end_matches('/')
            .to_string();

        let mut builder = Client::builder().timeout(Duration::from_millis(config.timeout_ms));
        if let Some(path) = &config.ca_cert_path {
            let pem = tokio::fs::read(path).await?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| AuditError::InvalidConfig(format!("CA certificate {path}: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let http_client = builder
            .build()
            .map_err(|e| AuditError::Connection(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Build the client and make sure the index exists.
    pub async fn connect(config: &SearchIndexConfig) -> Result<Self, AuditError> {
        let backend = Self::new(config).await?;
        backend.ensure_index().await?;
        tracing::info!(
            url = %backend.base_url,
            index = %backend.index,
            "Connected to search index"
        );
        Ok(backend)
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .http_client
            .request(method, format!("{}/{}", self.base_url, path));
        match &self.password {
            Some(password) => request.basic_auth(&self.username, Some(password)),
            None => request,
        }
    }

    /// Create the index with its mapping. An existing index is left alone.
    pub async fn ensure_index(&self) -> Result<(), AuditError> {
        let response = self
            .request(reqwest::Method::PUT, &self.index)
            .json(&index_mapping())
            .send()
            .await
            .map_err(|e| AuditError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(index = %self.index, "Created audit index");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
            tracing::debug!(index = %self.index, "Audit index already exists");
            return Ok(());
        }

        Err(AuditError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AuditBackend for SearchIndexAuditBackend {
    fn name(&self) -> &'static str {
        "search_index"
    }

    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let entry = AuthorizationLogEntry::from(record);
        let response = self
            .request(reqwest::Method::POST, &format!("{}/_doc", self.index))
            .json(&entry)
            .send()
            .await
            .map_err(|e| AuditError::WriteFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AuditError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}
