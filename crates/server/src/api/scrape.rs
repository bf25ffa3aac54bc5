//! Scrape API handlers.
//!
//! `POST /scrape` starts an orchestration instance and answers `202` with a
//! poll location. Polling the location answers `202` until the instance is
//! terminal, then `200` with the connector records or `400` with the error
//! payload.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use scrapeflow_core::{
    AcceptedStatus, ErrorKind, ErrorPayload, GatewayError, GatewayResponse, PurgeOutcome,
    ScrapeRequest,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Error response
#[derive(Debug, Serialize)]
pub struct ScrapeErrorResponse {
    pub error: String,
}

impl ScrapeErrorResponse {
    fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a scrape.
///
/// The body is optional; an empty body scrapes every connector.
pub async fn start_scrape(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(message) => {
            warn!("Rejected scrape request: {}", message);
            let payload = ErrorPayload::new(ErrorKind::ParseError, message);
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    let base_url = base_url(&state, &headers);
    match state.gateway().start(&request, &base_url) {
        Ok(accepted) => accepted_response(accepted),
        Err(e) => gateway_error_response(e),
    }
}

/// Poll a scrape instance.
pub async fn get_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let base_url = base_url(&state, &headers);
    match state.gateway().poll(&id, &base_url) {
        Ok(GatewayResponse::Accepted(accepted)) => accepted_response(accepted),
        Ok(GatewayResponse::Completed(output)) => (StatusCode::OK, Json(output)).into_response(),
        Ok(GatewayResponse::Failed(payload)) => {
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        Ok(GatewayResponse::NotFound) => not_found(),
        Err(e) => gateway_error_response(e),
    }
}

/// Purge a terminal scrape instance.
pub async fn delete_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.gateway().purge(&id) {
        Ok(PurgeOutcome::Purged) => StatusCode::NO_CONTENT.into_response(),
        Ok(PurgeOutcome::NotFound) => not_found(),
        Ok(PurgeOutcome::NotTerminal(current)) => ScrapeErrorResponse {
            error: format!("Instance is {} and cannot be purged", current),
        }
        .with_status(StatusCode::CONFLICT),
        Err(e) => gateway_error_response(e),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_request(body: &[u8]) -> Result<ScrapeRequest, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ScrapeRequest::all());
    }
    serde_json::from_slice(body).map_err(|e| format!("Invalid request body: {}", e))
}

/// Base URL poll locations are built on: the configured public URL, else
/// the request's Host header, else the bind address.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    let server = &state.config().server;
    if let Some(public) = &server.public_base_url {
        return public.trim_end_matches('/').to_string();
    }

    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{}", host),
        None => format!("http://{}:{}", server.host, server.port),
    }
}

fn accepted_response(accepted: AcceptedStatus) -> Response {
    (
        StatusCode::ACCEPTED,
        [
            (header::LOCATION, accepted.status_query_get_uri.clone()),
            (header::RETRY_AFTER, accepted.retry_after_secs.to_string()),
        ],
        Json(accepted),
    )
        .into_response()
}

fn not_found() -> Response {
    ScrapeErrorResponse {
        error: "not found".to_string(),
    }
    .with_status(StatusCode::NOT_FOUND)
}

fn gateway_error_response(e: GatewayError) -> Response {
    error!("Scrape gateway error: {}", e);
    ScrapeErrorResponse {
        error: e.to_string(),
    }
    .with_status(StatusCode::INTERNAL_SERVER_ERROR)
}
