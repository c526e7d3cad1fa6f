// nestdb-server/src/auth.rs
// ============================================================================
// Module: Auth Endpoints
// Description: Login and logout over the session table.
// Purpose: Issue and revoke bearer tokens at /auth.
// Dependencies: axum, nestdb-core, serde_json
// ============================================================================

//! ## Overview
//! `POST /auth` with `{"username": ...}` issues a one-hour bearer token;
//! `DELETE /auth` revokes the presented token. Both fail closed: a missing
//! or empty username is a 400, an invalid token on logout is a 401.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use nestdb_core::sessions::SessionTable;
use serde_json::Value;

use crate::response::TokenResponse;
use crate::response::error_response;
use crate::response::options_response;
use crate::server::AppState;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Handles every request to `/auth`.
pub async fn handle(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match method {
        Method::POST => login(&state, &body),
        Method::DELETE => logout(&state, &headers),
        Method::OPTIONS => options_response(),
        other => {
            tracing::info!(method = %other, "unsupported method on /auth");
            error_response(StatusCode::BAD_REQUEST, &format!("unsupported method: {other}"))
        }
    }
}

// ============================================================================
// SECTION: Login / Logout
// ============================================================================

/// Issues a fresh token for the posted username.
fn login(state: &AppState, body: &Bytes) -> Response {
    let Ok(request) = serde_json::from_slice::<Value>(body) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid login format");
    };
    let username = request.get("username").and_then(Value::as_str).unwrap_or_default();
    if username.is_empty() {
        tracing::info!("login without username");
        return error_response(StatusCode::BAD_REQUEST, "no username in request body");
    }

    let token = state.sessions.login(username);
    tracing::info!(user = username, "login");
    (
        StatusCode::OK,
        Json(TokenResponse {
            token,
        }),
    )
        .into_response()
}

/// Revokes the presented bearer token.
fn logout(state: &AppState, headers: &HeaderMap) -> Response {
    let bearer = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    if let Err(err) = state.sessions.validate_bearer(bearer) {
        tracing::info!(error = %err, "logout rejected");
        return error_response(StatusCode::UNAUTHORIZED, &err.to_string());
    }
    match SessionTable::bearer_token(bearer) {
        Some(token) => {
            state.sessions.logout(token);
            tracing::info!("logout");
            StatusCode::NO_CONTENT.into_response()
        }
        None => error_response(StatusCode::UNAUTHORIZED, "missing or malformed bearer token"),
    }
}
