// nestdb-server/src/response.rs
// ============================================================================
// Module: Response Builders
// Description: JSON response envelopes and error bodies.
// Purpose: Keep every handler's response shape in one place.
// Dependencies: axum, serde, serde_json
// ============================================================================

//! ## Overview
//! Every JSON response is `application/json`; error bodies are the message
//! serialized as a JSON string. Create, overwrite, and delete responses
//! carry a `Location` header echoing the request path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Body of create/overwrite responses.
#[derive(Debug, Serialize)]
pub struct UriResponse {
    /// Request path of the affected resource.
    pub uri: String,
}

/// Body of PATCH responses.
#[derive(Debug, Serialize)]
pub struct PatchReply {
    /// Request path of the patched document.
    pub uri: String,
    /// True when the patch sequence was rejected.
    #[serde(rename = "patchFailed")]
    pub patch_failed: bool,
    /// Outcome message; the first failure reason when rejected.
    pub message: String,
}

/// Body of login responses.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Freshly issued bearer token.
    pub token: String,
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// An error response: status plus the message as a JSON string body.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(Value::String(message.to_string()))).into_response()
}

/// A `{uri}` response with the `Location` header set.
pub fn uri_response(status: StatusCode, path: &str) -> Response {
    let mut response = (
        status,
        Json(UriResponse {
            uri: path.to_string(),
        }),
    )
        .into_response();
    set_location(&mut response, path);
    response
}

/// An empty 204 with the `Location` header set.
pub fn no_content(path: &str) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    set_location(&mut response, path);
    response
}

/// A PATCH outcome response.
pub fn patch_response(status: StatusCode, reply: PatchReply) -> Response {
    let path = reply.uri.clone();
    let mut response = (status, Json(reply)).into_response();
    set_location(&mut response, &path);
    response
}

fn set_location(response: &mut Response, path: &str) {
    if let Ok(value) = HeaderValue::from_str(path) {
        response.headers_mut().insert(LOCATION, value);
    }
}

/// The OPTIONS preflight response: allow list plus CORS headers.
pub fn options_response() -> Response {
    const METHODS: &str = "GET,PUT,POST,PATCH,DELETE,OPTIONS";
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert("Allow", HeaderValue::from_static(METHODS));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static(METHODS),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("accept,Content-Type,Authorization"),
    );
    response
}
