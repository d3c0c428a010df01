use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use stationauth_core::AuthorizationRequest;
use thiserror::Error;
use uuid::Uuid;

use crate::server::AppState;

pub const ACCEPTED_MESSAGE: &str = "Request is being processed asynchronously. \
    The result will be sent to the provided callback URL.";

/// Errors surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid station_id: {0}")]
    InvalidStationId(String),

    #[error("Missing required parameter: callback_url")]
    MissingCallbackUrl,

    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    #[error("{0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidStationId(_) | Self::MissingCallbackUrl | Self::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

fn parse_station_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidStationId(raw.to_string()))
}

// ---- Front door ----

#[derive(Debug, Deserialize)]
struct AuthorizeBody {
    callback_url: Option<String>,
}

/// `application/json` or any `application/*+json`, ignoring case and parameters.
fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// `callback_url` comes from the JSON body for JSON requests, otherwise from
/// the query string.
fn callback_url(
    headers: &HeaderMap,
    params: &HashMap<String, String>,
    body: &[u8],
) -> Result<String, ApiError> {
    let url = if is_json(headers) {
        let parsed: AuthorizeBody =
            serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;
        parsed.callback_url
    } else {
        params.get("callback_url").cloned()
    };
    url.filter(|u| !u.is_empty())
        .ok_or(ApiError::MissingCallbackUrl)
}

/// Accept an authorization request and hand it to the worker.
///
/// Token and callback URL are not validated here; a bad one becomes an
/// `invalid` decision delivered through the callback.
pub async fn authorize(
    State(state): State<AppState>,
    Path((station_id, driver_token)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let station_id = parse_station_id(&station_id)?;
    let callback_url = callback_url(&headers, &params, &body)?;

    let expiry_time = state.clock.now() + state.authorization_timeout;
    let request = AuthorizationRequest::new(station_id, driver_token, callback_url, expiry_time);

    state.queue.enqueue(request).await.map_err(|e| {
        tracing::error!(
            station_id = %station_id,
            error = %e,
            "Failed to enqueue authorization request"
        );
        ApiError::Unavailable(format!("Authorization queue unavailable: {e}"))
    })?;

    tracing::debug!(station_id = %station_id, "Authorization request accepted");
    Ok((
        StatusCode::OK,
        Json(json!({ "status": "accepted", "message": ACCEPTED_MESSAGE })),
    ))
}

// ---- Allowlist administration ----

pub async fn acl_check(
    State(state): State<AppState>,
    Path((station_id, driver_token)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let station_id = parse_station_id(&station_id)?;
    let authorized = state
        .allowlist
        .contains(station_id, &driver_token)
        .await
        .map_err(|e| store_unavailable(station_id, e))?;
    Ok(Json(json!({ "authorized": authorized })))
}

pub async fn acl_add(
    State(state): State<AppState>,
    Path((station_id, driver_token)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let station_id = parse_station_id(&station_id)?;
    let added = state
        .allowlist
        .add(station_id, &driver_token)
        .await
        .map_err(|e| store_unavailable(station_id, e))?;
    tracing::info!(station_id = %station_id, added, "Driver added to allowlist");
    Ok(Json(json!({ "success": true, "new_size": added })))
}

pub async fn acl_remove(
    State(state): State<AppState>,
    Path((station_id, driver_token)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let station_id = parse_station_id(&station_id)?;
    let removed = state
        .allowlist
        .remove(station_id, &driver_token)
        .await
        .map_err(|e| store_unavailable(station_id, e))?;
    tracing::info!(station_id = %station_id, removed, "Driver removed from allowlist");
    Ok(Json(json!({ "success": true, "new_size": removed })))
}

fn store_unavailable(station_id: Uuid, e: crate::error::AllowlistError) -> ApiError {
    tracing::error!(station_id = %station_id, error = %e, "Allowlist store error");
    ApiError::Unavailable(e.to_string())
}
