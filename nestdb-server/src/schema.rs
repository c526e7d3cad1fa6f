// nestdb-server/src/schema.rs
// ============================================================================
// Module: Schema Gate
// Description: Compile-once JSON Schema validation for document bodies.
// Purpose: Enforce schema conformance on PUT, POST, and patched documents.
// Dependencies: jsonschema, nestdb-core, serde_json
// ============================================================================

//! ## Overview
//! The schema is compiled once at startup (Draft 2020-12) and shared across
//! every request. The gate implements the data plane's validation seam so
//! patched documents are revalidated before commit; the dispatcher calls it
//! directly for PUT and POST bodies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonschema::Draft;
use jsonschema::Validator;
use nestdb_core::validate::DocumentValidator;
use nestdb_core::validate::SchemaViolation;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema compilation failures.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document itself is invalid.
    #[error("invalid schema: {0}")]
    Compile(String),
}

// ============================================================================
// SECTION: Schema Gate
// ============================================================================

/// A compiled document schema.
pub struct SchemaGate {
    /// Compiled validator.
    validator: Validator,
}

impl SchemaGate {
    /// Compiles `schema` under Draft 2020-12.
    pub fn compile(schema: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(schema)
            .map_err(|err| SchemaError::Compile(err.to_string()))?;
        Ok(Self {
            validator,
        })
    }
}

impl DocumentValidator for SchemaGate {
    fn validate(&self, body: &Value) -> Result<(), SchemaViolation> {
        self.validator
            .validate(body)
            .map_err(|err| SchemaViolation(err.to_string()))
    }
}

impl std::fmt::Debug for SchemaGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaGate").finish_non_exhaustive()
    }
}
