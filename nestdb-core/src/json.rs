// nestdb-core/src/json.rs
// ============================================================================
// Module: JSON Value Helpers
// Description: Deep equality and epoch timestamps shared across the crate.
// Purpose: Give patches and metadata one definition of value equality/time.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Patch deduplication and `ArrayRemove` matching compare JSON values by
//! *value*, not representation: `42` and `42.0` are equal. `serde_json`'s
//! derived equality distinguishes integer and float storage, so the numeric
//! case is handled explicitly here.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde_json::Value;

// ============================================================================
// SECTION: Deep Equality
// ============================================================================

/// Deep JSON equality with numeric comparison by value.
#[must_use]
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y || matches!((x.as_f64(), y.as_f64()), (Some(x), Some(y)) if x == y)
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs.iter().all(|(k, x)| ys.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
