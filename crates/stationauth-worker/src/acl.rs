//! Access-control store query interface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AclError;

/// Membership query against a station's allowlist.
///
/// Implementations must honor `timeout`; the resolver also enforces it.
#[async_trait]
pub trait AccessControlStore: Send + Sync {
    async fn is_authorized(
        &self,
        station_id: Uuid,
        driver_token: &str,
        timeout: Duration,
    ) -> Result<bool, AclError>;
}

#[derive(Debug, Deserialize)]
struct AclResponse {
    authorized: bool,
}

/// Client for the ACL service's
/// `GET /station/{station_id}/driver/{driver_token}/acl` endpoint.
#[derive(Clone)]
pub struct HttpAccessControlStore {
    http_client: Client,
    base_url: String,
}

impl HttpAccessControlStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }

    fn acl_url(&self, station_id: Uuid, driver_token: &str) -> String {
        format!(
            "{}/station/{}/driver/{}/acl",
            self.base_url, station_id, driver_token
        )
    }
}

#[async_trait]
impl AccessControlStore for HttpAccessControlStore {
    async fn is_authorized(
        &self,
        station_id: Uuid,
        driver_token: &str,
        timeout: Duration,
    ) -> Result<bool, AclError> {
        let response = self
            .http_client
            .get(self.acl_url(station_id, driver_token))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AclError::Timeout
                } else {
                    AclError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AclError::Status(response.status().as_u16()));
        }

        let body: AclResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AclError::Timeout
            } else {
                AclError::Decode(e.to_string())
            }
        })?;

        Ok(body.authorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "valid_driver_token_12345";

    #[tokio::test]
    async fn test_member_and_non_member() {
        let server = MockServer::start().await;
        let allowed = Uuid::new_v4();
        let denied = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path(format!("/station/{allowed}/driver/{TOKEN}/acl")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"authorized": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/station/{denied}/driver/{TOKEN}/acl")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"authorized": false})))
            .mount(&server)
            .await;

        let store = HttpAccessControlStore::new(format!("{}/", server.uri()));
        let timeout = Duration::from_secs(2);
        assert!(store.is_authorized(allowed, TOKEN, timeout).await.unwrap());
        assert!(!store.is_authorized(denied, TOKEN, timeout).await.unwrap());
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"authorized": true}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let store = HttpAccessControlStore::new(server.uri());
        let err = store
            .is_authorized(Uuid::new_v4(), TOKEN, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_error_status_and_bad_body() {
        let server = MockServer::start().await;
        let broken = Uuid::new_v4();
        let garbled = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path(format!("/station/{broken}/driver/{TOKEN}/acl")))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/station/{garbled}/driver/{TOKEN}/acl")))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let store = HttpAccessControlStore::new(server.uri());
        let timeout = Duration::from_secs(2);
        assert!(matches!(
            store.is_authorized(broken, TOKEN, timeout).await,
            Err(AclError::Status(500))
        ));
        assert!(matches!(
            store.is_authorized(garbled, TOKEN, timeout).await,
            Err(AclError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let store = HttpAccessControlStore::new("http://127.0.0.1:1");
        let err = store
            .is_authorized(Uuid::new_v4(), TOKEN, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AclError::Transport(_) | AclError::Timeout));
    }
}
