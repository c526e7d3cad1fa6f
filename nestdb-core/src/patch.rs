// nestdb-core/src/patch.rs
// ============================================================================
// Module: Patch Engine
// Description: JSON-pointer structural edits over immutable document values.
// Purpose: Apply ObjectAdd/ArrayAdd/ArrayRemove patches without mutating input.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A patch names an operation, a JSON-pointer path, and a value. Application
//! walks the pointer and produces a *new* document value; the input is never
//! mutated, so a failed patch sequence leaves the stored document untouched.
//! Array membership checks use value-based deep equality ([`json_equal`]),
//! which treats `42` and `42.0` as the same number.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::json::json_equal;

// ============================================================================
// SECTION: Patch Types
// ============================================================================

/// Supported patch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchOp {
    /// Add a key to an object; present keys are left unchanged.
    ObjectAdd,
    /// Append a value to an array unless a deep-equal element exists.
    ArrayAdd,
    /// Remove the first deep-equal element from an array.
    ArrayRemove,
}

/// A single structural edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    /// Operation to perform.
    pub op: PatchOp,
    /// JSON pointer to the target, starting with `/`.
    pub path: String,
    /// Value to add or remove.
    pub value: Value,
}

/// Reasons a patch cannot be applied.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The pointer did not start with a slash.
    #[error("patch path missing leading slash")]
    MissingSlash,
    /// An intermediate object key was absent.
    #[error("missing key \"{0}\" in path")]
    MissingKey(String),
    /// An array was indexed with something other than a valid position.
    #[error("invalid array index \"{0}\"")]
    BadIndex(String),
    /// The pointer terminated on an array index.
    #[error("patch path ends at an array index")]
    EndsAtIndex,
    /// The pointer passed through a scalar value.
    #[error("patch path traverses a scalar value")]
    ScalarOnPath,
    /// An array operation resolved to a non-array value.
    #[error("patch target is not an array")]
    NotAnArray,
    /// An `ObjectAdd` resolved to a non-object value.
    #[error("patch target is not an object")]
    NotAnObject,
}

// ============================================================================
// SECTION: Application
// ============================================================================

/// Applies one patch to `doc`, returning the patched copy.
///
/// Unchanged subtrees are cloned from the input; the input itself is never
/// modified.
pub fn apply_patch(doc: &Value, patch: &Patch) -> Result<Value, PatchError> {
    let pointer = patch.path.strip_prefix('/').ok_or(PatchError::MissingSlash)?;
    let segments: Vec<&str> = pointer.split('/').collect();
    apply(doc, &segments, patch)
}

/// Recursive application over the remaining pointer segments.
fn apply(node: &Value, segments: &[&str], patch: &Patch) -> Result<Value, PatchError> {
    match node {
        Value::Object(entries) => {
            let Some((key, rest)) = segments.split_first() else {
                // An array operation landed on an object.
                return Err(PatchError::NotAnArray);
            };
            if rest.is_empty() && patch.op == PatchOp::ObjectAdd {
                if entries.contains_key(*key) {
                    return Ok(node.clone());
                }
                let mut updated = entries.clone();
                updated.insert((*key).to_string(), patch.value.clone());
                return Ok(Value::Object(updated));
            }
            let child = entries
                .get(*key)
                .ok_or_else(|| PatchError::MissingKey((*key).to_string()))?;
            let patched = apply(child, rest, patch)?;
            let mut updated = entries.clone();
            updated.insert((*key).to_string(), patched);
            Ok(Value::Object(updated))
        }
        Value::Array(items) => {
            let Some((raw_index, rest)) = segments.split_first() else {
                return apply_terminal_array(items, patch).map(Value::Array);
            };
            let index: usize = raw_index
                .parse()
                .map_err(|_| PatchError::BadIndex((*raw_index).to_string()))?;
            if index >= items.len() {
                return Err(PatchError::BadIndex((*raw_index).to_string()));
            }
            if rest.is_empty() {
                return Err(PatchError::EndsAtIndex);
            }
            let patched = apply(&items[index], rest, patch)?;
            let mut updated = items.clone();
            updated[index] = patched;
            Ok(Value::Array(updated))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Err(PatchError::ScalarOnPath)
        }
    }
}

/// Array-terminal semantics for `ArrayAdd` / `ArrayRemove`.
fn apply_terminal_array(items: &[Value], patch: &Patch) -> Result<Vec<Value>, PatchError> {
    match patch.op {
        PatchOp::ArrayAdd => {
            if items.iter().any(|item| json_equal(item, &patch.value)) {
                return Ok(items.to_vec());
            }
            let mut updated = items.to_vec();
            updated.push(patch.value.clone());
            Ok(updated)
        }
        PatchOp::ArrayRemove => {
            let mut updated = items.to_vec();
            if let Some(position) =
                updated.iter().position(|item| json_equal(item, &patch.value))
            {
                updated.remove(position);
            }
            Ok(updated)
        }
        PatchOp::ObjectAdd => Err(PatchError::NotAnObject),
    }
}
