//! HTTP handlers for the contact endpoint.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::dispatch::{ContactMessage, Dispatcher};
use super::identity::resolve_identity;
use crate::ratelimit::{Decision, Policy, RateLimiter};

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    /// Policy handed to client mirrors
    pub client_limits: Policy,
    pub dispatcher: Arc<dyn Dispatcher>,
}

/// Contact form submission body.
#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default, rename = "type")]
    pub project_type: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Honeypot: the real form never sends this
    #[serde(default)]
    pub website: Option<String>,
}

/// Successful submission body.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub tracked_identities: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "formguard",
        version: env!("CARGO_PKG_VERSION"),
        tracked_identities: state.limiter.identity_count(),
    })
}

/// Policy a client mirror should run with.
pub async fn limits(State(state): State<Arc<AppState>>) -> Json<Policy> {
    Json(state.client_limits.clone())
}

/// Accept a contact form submission.
///
/// The identity's lock is held from the rate limit check until the
/// submission is recorded, so a concurrent request from the same sender
/// waits and then sees the updated log. Dispatch and record run in their own
/// task: a client that hangs up mid-dispatch still has its delivered
/// message counted.
pub async fn contact(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<ContactRequest>, JsonRejection>,
) -> Response {
    let identity = resolve_identity(&headers, peer.map(|ConnectInfo(addr)| addr));
    let mut permit = state.limiter.acquire(&identity).await;

    let decision = permit.check();
    if !decision.is_allowed() {
        warn!(
            identity = %identity,
            reason = %decision.reason(),
            retry_after_secs = decision.retry_after_secs(),
            "Submission rate limited"
        );
        return too_many_requests(decision);
    }

    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!(identity = %identity, error = %rejection, "Malformed submission body");
            return bad_request("Invalid request body", "INVALID_BODY");
        }
    };

    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.message.trim().is_empty() {
        return bad_request("Missing required fields", "MISSING_FIELDS");
    }

    if req.website.as_deref().is_some_and(|w| !w.is_empty()) {
        // Pretend success so the bot moves on, but still spend its quota.
        warn!(identity = %identity, "Honeypot field filled, discarding submission");
        permit.record();
        return ok();
    }

    let message = ContactMessage {
        name: req.name,
        email: req.email,
        telegram: req.telegram.filter(|t| !t.is_empty()),
        project_type: req.project_type.filter(|t| !t.is_empty()),
        message: req.message,
        sender: identity.clone(),
    };

    let dispatcher = Arc::clone(&state.dispatcher);
    let delivery = tokio::spawn(async move {
        let result = dispatcher.dispatch(&message).await;
        if result.is_ok() {
            permit.record();
        }
        result
    });

    match delivery.await {
        Ok(Ok(())) => {
            info!(identity = %identity, "Submission dispatched");
            ok()
        }
        Ok(Err(e)) => {
            error!(identity = %identity, error = %e, "Dispatch failed, quota not consumed");
            dispatch_failed()
        }
        Err(e) => {
            error!(identity = %identity, error = %e, "Dispatch task aborted");
            dispatch_failed()
        }
    }
}

fn ok() -> Response {
    (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
}

fn dispatch_failed() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: "Message could not be delivered".to_string(),
            code: "DISPATCH_FAILED".to_string(),
            reason: None,
            retry_after_secs: None,
        }),
    )
        .into_response()
}

fn bad_request(error: &str, code: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
            reason: None,
            retry_after_secs: None,
        }),
    )
        .into_response()
}

fn too_many_requests(decision: Decision) -> Response {
    let retry_secs = decision.retry_after_secs();
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_secs.to_string())],
        Json(ErrorResponse {
            error: decision.reason().message().to_string(),
            code: "RATE_LIMITED".to_string(),
            reason: Some(decision.reason().to_string()),
            retry_after_secs: Some(retry_secs),
        }),
    )
        .into_response()
}
