//! Callback delivery.
//!
//! At most one POST per task invocation. Failures end up in the receipt,
//! never as errors: the decision has already been made.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use stationauth_core::{CallbackReceipt, DecisionPayload};
use tracing::{info, warn};

use crate::error::WorkerError;

#[async_trait]
pub trait CallbackDispatcher: Send + Sync {
    /// Deliver `payload` to `callback_url` and report what happened.
    async fn dispatch(&self, callback_url: &str, payload: &DecisionPayload) -> CallbackReceipt;
}

/// Delivers decisions as JSON over HTTP POST with a fixed timeout.
#[derive(Clone)]
pub struct HttpCallbackDispatcher {
    http_client: Client,
    timeout: Duration,
}

impl HttpCallbackDispatcher {
    pub fn new(timeout: Duration) -> Result<Self, WorkerError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::HttpClient(e.to_string()))?;
        Ok(Self {
            http_client,
            timeout,
        })
    }
}

#[async_trait]
impl CallbackDispatcher for HttpCallbackDispatcher {
    async fn dispatch(&self, callback_url: &str, payload: &DecisionPayload) -> CallbackReceipt {
        let result = self
            .http_client
            .post(callback_url)
            .json(payload)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    info!(
                        station_id = %payload.station_id,
                        status = %payload.status,
                        http.status = status.as_u16(),
                        "Callback delivered"
                    );
                } else {
                    warn!(
                        station_id = %payload.station_id,
                        callback_url = %callback_url,
                        http.status = status.as_u16(),
                        "Callback endpoint answered with non-success status"
                    );
                }
                CallbackReceipt::Delivered(status.as_u16())
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("Request timed out after {}ms", self.timeout.as_millis())
                } else {
                    e.to_string()
                };
                warn!(
                    station_id = %payload.station_id,
                    callback_url = %callback_url,
                    error = %error,
                    "Failed to send callback"
                );
                CallbackReceipt::Failed(error)
            }
        }
    }
}
