// nestdb-core/src/validate.rs
// ============================================================================
// Module: Document Validation Seam
// Description: Trait boundary between the tree and the compiled schema.
// Purpose: Let the data plane revalidate patched documents without owning
//          schema compilation.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Schema compilation lives in the transport crate; the data plane only
//! needs `validate(value) -> ok | rejection`. Patch application calls this
//! seam before committing a patched body.

use serde_json::Value;
use thiserror::Error;

/// A schema rejection with its human-readable reason.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SchemaViolation(pub String);

/// Validates document bodies against the configured schema.
pub trait DocumentValidator: Send + Sync {
    /// Returns `Ok` when `body` conforms to the schema.
    fn validate(&self, body: &Value) -> Result<(), SchemaViolation>;
}
