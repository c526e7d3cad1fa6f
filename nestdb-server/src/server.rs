// nestdb-server/src/server.rs
// ============================================================================
// Module: Server
// Description: Router construction, shared state, and the serve loop.
// Purpose: Bind the HTTP surface over the data plane.
// Dependencies: axum, nestdb-core, tokio
// ============================================================================

//! ## Overview
//! The server owns three shared pieces: the root collection holder (the
//! databases), the compiled schema gate, and the session table. Every
//! request runs on its own tokio task; `Access-Control-Allow-Origin: *` is
//! stamped on every response by a middleware layer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::any;
use nestdb_core::holder::CollectionHolder;
use nestdb_core::sessions::INSTALLED_TTL;
use nestdb_core::sessions::SessionTable;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::auth;
use crate::dispatch;
use crate::schema::SchemaGate;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Serve-loop failures.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listener could not be bound.
    #[error("bind failed: {0}")]
    Bind(String),
    /// The accept loop failed.
    #[error("server failed: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// State shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Root holder containing the top-level databases.
    pub root: Arc<CollectionHolder>,
    /// Compiled document schema.
    pub schema: Arc<SchemaGate>,
    /// Process-wide session table.
    pub sessions: Arc<SessionTable>,
}

impl AppState {
    /// Builds fresh state around a compiled schema.
    #[must_use]
    pub fn new(schema: SchemaGate) -> Self {
        Self {
            root: Arc::new(CollectionHolder::new()),
            schema: Arc::new(schema),
            sessions: Arc::new(SessionTable::new()),
        }
    }

    /// Installs startup tokens (`username -> token`) with the 24 h TTL.
    pub fn install_tokens(&self, tokens: &HashMap<String, String>) {
        for (username, token) in tokens {
            self.sessions.install(username, token, INSTALLED_TTL);
        }
        if !tokens.is_empty() {
            tracing::info!(count = tokens.len(), "installed startup tokens");
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the application router: `/auth` plus the `/v1` tree.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/auth", any(auth::handle))
        .route("/v1", any(dispatch::handle))
        .route("/v1/", any(dispatch::handle))
        .route("/v1/{*rest}", any(dispatch::handle))
        .layer(middleware::from_fn(allow_any_origin))
        .with_state(state)
}

/// Stamps the CORS origin header on every response.
async fn allow_any_origin(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    response
}

// ============================================================================
// SECTION: Serve Loop
// ============================================================================

/// Binds the loopback listener and serves until the process exits.
pub async fn serve(state: AppState, port: u16) -> Result<(), ServeError> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| ServeError::Bind(err.to_string()))?;
    serve_on(state, listener).await
}

/// Serves on an already bound listener. Tests bind port 0 and pass it here.
pub async fn serve_on(state: AppState, listener: TcpListener) -> Result<(), ServeError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }
    axum::serve(listener, build_router(state))
        .await
        .map_err(|err| ServeError::Serve(err.to_string()))
}
