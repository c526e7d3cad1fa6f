// nestdb-server/src/lib.rs
// ============================================================================
// Module: nestdb Server
// Description: HTTP surface for the hierarchical JSON document database.
// Purpose: Dispatch /v1 and /auth requests over the nestdb-core data plane.
// Dependencies: axum, jsonschema, nestdb-core, tokio
// ============================================================================

//! ## Overview
//! This crate owns everything request-shaped: the method-by-resource
//! dispatcher, the compiled schema gate, SSE subscription streams, the auth
//! endpoints, and the serve loop. The document tree itself lives in
//! `nestdb-core`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod dispatch;
pub mod response;
pub mod schema;
pub mod server;
pub mod sse;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use response::PatchReply;
pub use response::TokenResponse;
pub use response::UriResponse;
pub use schema::SchemaError;
pub use schema::SchemaGate;
pub use server::AppState;
pub use server::ServeError;
pub use server::build_router;
pub use server::serve;
pub use server::serve_on;
