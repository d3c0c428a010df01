use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::clock::Deadline;
use crate::error::CoreError;

/// Receipt description recorded when the callback URL failed validation and
/// no delivery was attempted.
pub const INVALID_CALLBACK_URL: &str = "Invalid callback URL";

/// One authorization request as produced by the front door.
///
/// Immutable once enqueued and consumed exactly once by a task invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub station_id: Uuid,
    pub driver_token: String,
    pub callback_url: String,
    /// After this instant the request is answered with `unknown`
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_time: OffsetDateTime,
}

impl AuthorizationRequest {
    pub fn new(
        station_id: Uuid,
        driver_token: impl Into<String>,
        callback_url: impl Into<String>,
        expiry_time: OffsetDateTime,
    ) -> Self {
        Self {
            station_id,
            driver_token: driver_token.into(),
            callback_url: callback_url.into(),
            expiry_time,
        }
    }

    pub fn deadline(&self) -> Deadline {
        Deadline::new(self.expiry_time)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Terminal decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Store answered and the token is on the station's allowlist
    Allowed,
    /// Store answered and the token is not on the allowlist
    NotAllowed,
    /// Token or callback URL failed local validation; the store was not asked
    Invalid,
    /// Request was stale or the store could not answer in time
    Unknown,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Allowed => "allowed",
            DecisionOutcome::NotAllowed => "not_allowed",
            DecisionOutcome::Invalid => "invalid",
            DecisionOutcome::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allowed" => Ok(DecisionOutcome::Allowed),
            "not_allowed" => Ok(DecisionOutcome::NotAllowed),
            "invalid" => Ok(DecisionOutcome::Invalid),
            "unknown" => Ok(DecisionOutcome::Unknown),
            other => Err(CoreError::UnknownOutcome(other.to_string())),
        }
    }
}

/// Body POSTed to the caller's callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPayload {
    pub station_id: Uuid,
    pub driver_token: String,
    pub status: DecisionOutcome,
}

impl DecisionPayload {
    pub fn new(request: &AuthorizationRequest, status: DecisionOutcome) -> Self {
        Self {
            station_id: request.station_id,
            driver_token: request.driver_token.clone(),
            status,
        }
    }
}

/// Result of the (at most one) callback delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackReceipt {
    /// The endpoint answered with this HTTP status
    Delivered(u16),
    /// Transport failure (timeout, connection refused, ...)
    Failed(String),
    /// URL failed validation, nothing was sent
    Skipped,
}

impl CallbackReceipt {
    /// Text stored in the audit record's `callback_status` field.
    pub fn describe(&self) -> String {
        match self {
            CallbackReceipt::Delivered(status) => status.to_string(),
            CallbackReceipt::Failed(error) => error.clone(),
            CallbackReceipt::Skipped => INVALID_CALLBACK_URL.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallbackReceipt::Delivered(status) if (200..300).contains(status))
    }
}

impl fmt::Display for CallbackReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Write-once record of one task invocation.
///
/// Identity is `(start_time, station_id, driver_token)`; redelivered requests
/// start at a different instant and therefore produce distinct records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    pub station_id: Uuid,
    pub driver_token: String,
    pub status: DecisionOutcome,
    pub callback_status: String,
    pub callback_url: String,
}

impl AuditRecord {
    pub fn new(
        start_time: OffsetDateTime,
        payload: DecisionPayload,
        receipt: &CallbackReceipt,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            start_time,
            station_id: payload.station_id,
            driver_token: payload.driver_token,
            status: payload.status,
            callback_status: receipt.describe(),
            callback_url: callback_url.into(),
        }
    }

    pub fn start_time_nanos(&self) -> i128 {
        self.start_time.unix_timestamp_nanos()
    }

    pub fn start_time_ms(&self) -> i64 {
        (self.start_time.unix_timestamp_nanos() / 1_000_000) as i64
    }

    /// Composite key used by key-value backends.
    pub fn key(&self) -> String {
        format!(
            "log:authorize:{}:{}:{}",
            self.start_time_nanos(),
            self.station_id,
            self.driver_token
        )
    }

    /// Flat field map shared by every backend.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("station_id", self.station_id.to_string()),
            ("driver_token", self.driver_token.clone()),
            ("status", self.status.to_string()),
            ("callback_status", self.callback_status.clone()),
            ("callback_url", self.callback_url.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    const STATION: &str = "6f1c2b9e-4a5d-4e7f-9a0b-1c2d3e4f5a6b";

    fn station() -> Uuid {
        Uuid::parse_str(STATION).unwrap()
    }

    #[test]
    fn test_outcome_wire_names() {
        assert_eq!(json!(DecisionOutcome::Allowed), json!("allowed"));
        assert_eq!(json!(DecisionOutcome::NotAllowed), json!("not_allowed"));
        assert_eq!(json!(DecisionOutcome::Invalid), json!("invalid"));
        assert_eq!(json!(DecisionOutcome::Unknown), json!("unknown"));
        assert_eq!(
            "not_allowed".parse::<DecisionOutcome>().unwrap(),
            DecisionOutcome::NotAllowed
        );
        assert!("maybe".parse::<DecisionOutcome>().is_err());
    }

    #[test]
    fn test_payload_json_shape() {
        let request = AuthorizationRequest::new(
            station(),
            "valid_driver_token_12345",
            "http://callback.url",
            datetime!(2024-05-01 12:00:05 UTC),
        );
        let payload = DecisionPayload::new(&request, DecisionOutcome::Allowed);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "station_id": STATION,
                "driver_token": "valid_driver_token_12345",
                "status": "allowed",
            })
        );
    }

    #[test]
    fn test_request_json_keeps_expiry_precision() {
        let request = AuthorizationRequest::new(
            station(),
            "valid_driver_token_12345",
            "http://callback.url",
            datetime!(2024-05-01 12:00:05.123456789 UTC),
        );
        let raw = request.to_json().unwrap();
        assert!(raw.contains("2024-05-01T12:00:05.123456789Z"));
        assert_eq!(AuthorizationRequest::from_json(&raw).unwrap(), request);
    }

    #[test]
    fn test_receipt_descriptions() {
        assert_eq!(CallbackReceipt::Delivered(200).describe(), "200");
        assert_eq!(
            CallbackReceipt::Failed("Request timed out".into()).describe(),
            "Request timed out"
        );
        assert_eq!(CallbackReceipt::Skipped.describe(), "Invalid callback URL");
        assert!(CallbackReceipt::Delivered(204).is_success());
        assert!(!CallbackReceipt::Delivered(500).is_success());
        assert!(!CallbackReceipt::Skipped.is_success());
    }

    #[test]
    fn test_audit_record_identity_and_fields() {
        let start = datetime!(2009-02-13 23:31:30 UTC);
        let request = AuthorizationRequest::new(
            station(),
            "valid_driver_token_12345",
            "http://callback.url",
            start + std::time::Duration::from_secs(5),
        );
        let record = AuditRecord::new(
            start,
            DecisionPayload::new(&request, DecisionOutcome::NotAllowed),
            &CallbackReceipt::Delivered(200),
            &request.callback_url,
        );

        assert_eq!(
            record.key(),
            format!("log:authorize:1234567890000000000:{STATION}:valid_driver_token_12345")
        );
        assert_eq!(record.start_time_ms(), 1_234_567_890_000);
        assert_eq!(
            record.fields(),
            vec![
                ("station_id", STATION.to_string()),
                ("driver_token", "valid_driver_token_12345".to_string()),
                ("status", "not_allowed".to_string()),
                ("callback_status", "200".to_string()),
                ("callback_url", "http://callback.url".to_string()),
            ]
        );
    }

    #[test]
    fn test_audit_records_for_redelivery_are_distinct() {
        let start = datetime!(2024-05-01 12:00:00 UTC);
        let request = AuthorizationRequest::new(
            station(),
            "valid_driver_token_12345",
            "http://callback.url",
            start,
        );
        let first = AuditRecord::new(
            start,
            DecisionPayload::new(&request, DecisionOutcome::Unknown),
            &CallbackReceipt::Delivered(200),
            &request.callback_url,
        );
        let second = AuditRecord {
            start_time: start + std::time::Duration::from_nanos(1),
            ..first.clone()
        };
        assert_ne!(first.key(), second.key());
    }
}
