// nestdb-server/src/dispatch.rs
// ============================================================================
// Module: Request Dispatcher
// Description: Method-by-resource routing for the /v1 tree.
// Purpose: Authenticate, resolve paths, and compose tree operations into
//          HTTP responses.
// Dependencies: axum, nestdb-core, serde_json
// ============================================================================

//! ## Overview
//! Every `/v1` request flows through one handler: OPTIONS short-circuits
//! with the allow list, everything else authenticates and then dispatches
//! on method and resource kind. GET reads or subscribes, PUT creates
//! databases/documents/collections through the parent resource, POST
//! creates randomly named documents, PATCH applies pointer edits, DELETE
//! removes. Document bodies are schema-validated at this boundary; patch
//! arrays are not (their result is validated before commit).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use nestdb_core::collection::Collection;
use nestdb_core::collection::CollectionError;
use nestdb_core::document::Document;
use nestdb_core::holder::HolderError;
use nestdb_core::patch::Patch;
use nestdb_core::path::Resource;
use nestdb_core::path::ResourceKind;
use nestdb_core::path::ResolveError;
use nestdb_core::path::cut;
use nestdb_core::path::percent_decode;
use nestdb_core::path::resolve;
use nestdb_core::subscribe::NameInterval;
use nestdb_core::subscribe::SubscriberEvent;
use nestdb_core::validate::DocumentValidator;
use serde_json::Value;

use crate::response::PatchReply;
use crate::response::error_response;
use crate::response::no_content;
use crate::response::options_response;
use crate::response::patch_response;
use crate::response::uri_response;
use crate::server::AppState;
use crate::sse::subscription_response;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Handles every request under `/v1`.
pub async fn handle(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return options_response();
    }

    let bearer = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    let user = match state.sessions.validate_bearer(bearer) {
        Ok(user) => user,
        Err(err) => {
            tracing::info!(error = %err, path = %uri.path(), "request rejected");
            return error_response(StatusCode::UNAUTHORIZED, &err.to_string());
        }
    };

    match method {
        Method::GET => get(&state, &uri).await,
        Method::PUT => put(&state, &uri, &user, &body),
        Method::POST => post(&state, &uri, &user, &body),
        Method::PATCH => patch(&state, &uri, &user, &body),
        Method::DELETE => delete(&state, &uri),
        other => {
            tracing::info!(method = %other, "unsupported method");
            error_response(StatusCode::BAD_REQUEST, &format!("unsupported method: {other}"))
        }
    }
}

// ============================================================================
// SECTION: GET
// ============================================================================

/// GET: list a collection, fetch a document, or open a subscription.
async fn get(state: &AppState, uri: &Uri) -> Response {
    match resolve(&state.root, uri.path()) {
        Ok((Resource::Collection(_), ResourceKind::DatabaseNoSlash)) => error_response(
            StatusCode::BAD_REQUEST,
            "invalid request: request does not support databases",
        ),
        Ok((Resource::Collection(collection), _)) => get_collection(&collection, uri).await,
        Ok((Resource::Document(document), _)) => get_document(&document, uri),
        Err(err) => resolve_error(&err),
    }
}

/// GET on a database or nested collection: range listing or subscription.
async fn get_collection(collection: &Collection, uri: &Uri) -> Response {
    let interval = parse_interval(query_param(uri, "interval").as_deref());
    let documents = collection.documents_in(&interval).await;

    if subscribe_requested(uri) {
        let (tx, rx) = collection.subscribers().subscribe(interval);
        for document in &documents {
            let _ = tx.send(SubscriberEvent::Update(document.view_json()));
        }
        return subscription_response(rx);
    }

    let views: Vec<_> = documents.iter().map(|document| document.view()).collect();
    tracing::debug!(path = %uri.path(), count = views.len(), "collection listed");
    (StatusCode::OK, Json(views)).into_response()
}

/// GET on a document: snapshot or subscription.
fn get_document(document: &Arc<Document>, uri: &Uri) -> Response {
    if subscribe_requested(uri) {
        let (tx, rx) = document.subscribers().subscribe(NameInterval::unbounded());
        let _ = tx.send(SubscriberEvent::Update(document.view_json()));
        return subscription_response(rx);
    }
    (StatusCode::OK, Json(document.view())).into_response()
}

// ============================================================================
// SECTION: PUT
// ============================================================================

/// PUT: create a database, create/replace a document, or create a nested
/// collection, depending on what the cut parent is.
fn put(state: &AppState, uri: &Uri, user: &str, body: &Bytes) -> Response {
    let cut_path = match cut(uri.path()) {
        Ok(cut_path) => cut_path,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    match cut_path.kind {
        ResourceKind::DatabaseNoSlash => match state.root.put_collection(&cut_path.name) {
            Ok(()) => {
                tracing::info!(database = %cut_path.name, "database created");
                uri_response(StatusCode::CREATED, uri.path())
            }
            Err(HolderError::Exists) => {
                error_response(StatusCode::BAD_REQUEST, "database already exists")
            }
        },
        ResourceKind::Database => error_response(
            StatusCode::BAD_REQUEST,
            "invalid request: invalid syntax for database",
        ),
        ResourceKind::Document => {
            let collection = match resolve_collection(state, &cut_path.parent) {
                Ok(collection) => collection,
                Err(response) => return *response,
            };
            let value = match parse_document_body(state.schema.as_ref(), body) {
                Ok(value) => value,
                Err(response) => return *response,
            };
            let timestamp = match parse_timestamp(uri) {
                Ok(timestamp) => timestamp,
                Err(response) => return *response,
            };
            match collection.put_document(&cut_path.name, uri.path(), &value, user, timestamp) {
                Ok(outcome) if outcome.created => {
                    tracing::info!(path = %uri.path(), "document created");
                    uri_response(StatusCode::CREATED, uri.path())
                }
                Ok(_) => {
                    tracing::info!(path = %uri.path(), "document overwritten");
                    uri_response(StatusCode::OK, uri.path())
                }
                Err(CollectionError::PreconditionFailed) => {
                    error_response(StatusCode::PRECONDITION_FAILED, "timestamp does not match")
                }
                Err(err) => internal_error(&err),
            }
        }
        ResourceKind::Collection => {
            let document = match resolve_document(state, &cut_path.parent) {
                Ok(document) => document,
                Err(response) => return *response,
            };
            match document.with_children(|children| children.put_collection(&cut_path.name)) {
                Ok(()) => {
                    tracing::info!(path = %uri.path(), "collection created");
                    uri_response(StatusCode::CREATED, uri.path())
                }
                Err(HolderError::Exists) => {
                    error_response(StatusCode::BAD_REQUEST, "collection already exists")
                }
            }
        }
    }
}

// ============================================================================
// SECTION: POST
// ============================================================================

/// POST: create a document under a random name in a database or collection.
fn post(state: &AppState, uri: &Uri, user: &str, body: &Bytes) -> Response {
    match resolve(&state.root, uri.path()) {
        Ok((Resource::Collection(_), ResourceKind::DatabaseNoSlash)) => error_response(
            StatusCode::BAD_REQUEST,
            "invalid request: request does not support databases",
        ),
        Ok((Resource::Collection(collection), _)) => {
            let value = match parse_document_body(state.schema.as_ref(), body) {
                Ok(value) => value,
                Err(response) => return *response,
            };
            let name = collection.post_document(uri.path(), &value, user);
            let location = format!("{}{name}", uri.path());
            tracing::info!(path = %location, "document created");
            uri_response(StatusCode::CREATED, &location)
        }
        Ok((Resource::Document(_), _)) => error_response(
            StatusCode::BAD_REQUEST,
            "invalid request: request does not support documents",
        ),
        Err(err) => resolve_error(&err),
    }
}

// ============================================================================
// SECTION: PATCH
// ============================================================================

/// PATCH: apply a patch array to an existing document.
fn patch(state: &AppState, uri: &Uri, user: &str, body: &Bytes) -> Response {
    let cut_path = match cut(uri.path()) {
        Ok(cut_path) => cut_path,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    if cut_path.kind != ResourceKind::Document {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid request: only documents can be patched",
        );
    }
    let collection = match resolve_collection(state, &cut_path.parent) {
        Ok(collection) => collection,
        Err(response) => return *response,
    };
    let patches: Vec<Patch> = match serde_json::from_slice(body) {
        Ok(patches) => patches,
        Err(err) => {
            tracing::info!(error = %err, "invalid patch body");
            return error_response(StatusCode::BAD_REQUEST, "invalid patch document format");
        }
    };

    match collection.patch_document(&cut_path.name, &patches, state.schema.as_ref(), user) {
        Ok(()) => {
            tracing::info!(path = %uri.path(), "document patched");
            patch_response(
                StatusCode::OK,
                PatchReply {
                    uri: uri.path().to_string(),
                    patch_failed: false,
                    message: "patches applied".to_string(),
                },
            )
        }
        Err(CollectionError::NotFound) => {
            error_response(StatusCode::NOT_FOUND, "document does not exist")
        }
        Err(CollectionError::PatchFailed(message)) => patch_response(
            StatusCode::BAD_REQUEST,
            PatchReply {
                uri: uri.path().to_string(),
                patch_failed: true,
                message,
            },
        ),
        Err(err) => internal_error(&err),
    }
}

// ============================================================================
// SECTION: DELETE
// ============================================================================

/// DELETE: remove a database, document, or nested collection.
fn delete(state: &AppState, uri: &Uri) -> Response {
    let cut_path = match cut(uri.path()) {
        Ok(cut_path) => cut_path,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    match cut_path.kind {
        ResourceKind::DatabaseNoSlash => {
            if state.root.delete_collection(&cut_path.name, uri.path()) {
                tracing::info!(database = %cut_path.name, "database deleted");
                no_content(uri.path())
            } else {
                error_response(StatusCode::NOT_FOUND, "database does not exist")
            }
        }
        ResourceKind::Database => error_response(
            StatusCode::BAD_REQUEST,
            "invalid request: invalid syntax for database",
        ),
        ResourceKind::Document => {
            let collection = match resolve_collection(state, &cut_path.parent) {
                Ok(collection) => collection,
                Err(response) => return *response,
            };
            if collection.delete_document(&cut_path.name, uri.path()) {
                tracing::info!(path = %uri.path(), "document deleted");
                no_content(uri.path())
            } else {
                error_response(StatusCode::NOT_FOUND, "document does not exist")
            }
        }
        ResourceKind::Collection => {
            let document = match resolve_document(state, &cut_path.parent) {
                Ok(document) => document,
                Err(response) => return *response,
            };
            let deleted =
                document.with_children(|children| children.delete_collection(&cut_path.name, uri.path()));
            if deleted {
                tracing::info!(path = %uri.path(), "collection deleted");
                no_content(uri.path())
            } else {
                error_response(StatusCode::NOT_FOUND, "collection does not exist")
            }
        }
    }
}

// ============================================================================
// SECTION: Resolution Helpers
// ============================================================================

/// Resolves a parent path that must be a database or nested collection.
fn resolve_collection(state: &AppState, path: &str) -> Result<Arc<Collection>, Box<Response>> {
    match resolve(&state.root, path) {
        Ok((Resource::Collection(collection), _)) => Ok(collection),
        Ok((Resource::Document(_), _)) => Err(Box::new(error_response(
            StatusCode::BAD_REQUEST,
            "invalid request: expected a collection path",
        ))),
        Err(err) => Err(Box::new(resolve_error(&err))),
    }
}

/// Resolves a parent path that must be a document.
fn resolve_document(state: &AppState, path: &str) -> Result<Arc<Document>, Box<Response>> {
    match resolve(&state.root, path) {
        Ok((Resource::Document(document), _)) => Ok(document),
        Ok((Resource::Collection(_), _)) => Err(Box::new(error_response(
            StatusCode::BAD_REQUEST,
            "invalid request: expected a document path",
        ))),
        Err(err) => Err(Box::new(resolve_error(&err))),
    }
}

/// Maps resolution failures onto the error table.
fn resolve_error(err: &ResolveError) -> Response {
    match err {
        ResolveError::Path(path_err) => {
            error_response(StatusCode::BAD_REQUEST, &path_err.to_string())
        }
        ResolveError::NotFound(_) => error_response(StatusCode::NOT_FOUND, &err.to_string()),
    }
}

/// 500 for decider errors that cannot occur on this code path.
fn internal_error(err: &CollectionError) -> Response {
    tracing::error!(error = %err, "unexpected collection error");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

// ============================================================================
// SECTION: Body & Query Parsing
// ============================================================================

/// Parses and schema-validates a document body.
fn parse_document_body(
    schema: &dyn DocumentValidator,
    body: &Bytes,
) -> Result<Value, Box<Response>> {
    let value: Value = serde_json::from_slice(body).map_err(|err| {
        tracing::info!(error = %err, "invalid document body");
        Box::new(error_response(StatusCode::BAD_REQUEST, "invalid document format"))
    })?;
    schema.validate(&value).map_err(|violation| {
        tracing::info!(error = %violation, "document rejected by schema");
        Box::new(error_response(
            StatusCode::BAD_REQUEST,
            "document did not conform to schema",
        ))
    })?;
    Ok(value)
}

/// Extracts a query parameter, percent-decoded.
fn query_param(uri: &Uri, name: &str) -> Option<String> {
    uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != name {
            return None;
        }
        percent_decode(value).ok()
    })
}

/// Returns true when the request asked for subscription mode.
fn subscribe_requested(uri: &Uri) -> bool {
    query_param(uri, "mode").as_deref() == Some("subscribe")
}

/// Parses the optional conditional-PUT timestamp.
fn parse_timestamp(uri: &Uri) -> Result<Option<i64>, Box<Response>> {
    match query_param(uri, "timestamp") {
        None => Ok(None),
        Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
            Box::new(error_response(StatusCode::BAD_REQUEST, "bad timestamp"))
        }),
    }
}

/// Parses `interval=[lo,hi]`; anything malformed falls back to unbounded.
fn parse_interval(raw: Option<&str>) -> NameInterval {
    let Some(raw) = raw else {
        return NameInterval::unbounded();
    };
    let Some(inner) = raw.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) else {
        tracing::debug!(interval = raw, "ignoring malformed interval");
        return NameInterval::unbounded();
    };
    let bounds: Vec<&str> = inner.split(',').collect();
    if bounds.len() != 2 {
        tracing::debug!(interval = raw, "ignoring malformed interval");
        return NameInterval::unbounded();
    }
    let bound = |value: &str| (!value.is_empty()).then(|| value.to_string());
    NameInterval {
        lo: bound(bounds[0]),
        hi: bound(bounds[1]),
    }
}
