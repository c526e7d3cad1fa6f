// nestdb-core/src/document.rs
// ============================================================================
// Module: Document
// Description: A JSON body with metadata, child collections, and subscribers.
// Purpose: Hold one document's state and its overwrite/patch operations.
// Dependencies: parking_lot, serde, serde_json
// ============================================================================

//! ## Overview
//! A document is the unit clients read and write: an arbitrary JSON value,
//! server-stamped metadata, a holder of named child collections, and the
//! set of SSE subscribers watching it. Overwriting stamps the modification
//! metadata and preserves authorship; only the PUT path additionally resets
//! the child collections (replacing a document removes what hangs below it).

// ============================================================================
// SECTION: Imports
// ============================================================================

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::holder::CollectionHolder;
use crate::json::now_ms;
use crate::patch::Patch;
use crate::patch::PatchError;
use crate::patch::apply_patch;
use crate::subscribe::SubscriberSet;

// ============================================================================
// SECTION: Metadata
// ============================================================================

/// Server-stamped document metadata, epoch milliseconds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// User that created the document; never changes afterwards.
    pub created_by: String,
    /// Creation time.
    pub created_at: i64,
    /// User behind the most recent overwrite or patch.
    pub last_modified_by: String,
    /// Time of the most recent overwrite or patch.
    pub last_modified_at: i64,
}

impl Meta {
    /// Fresh metadata for a document created by `user` right now.
    fn new(user: &str) -> Self {
        let now = now_ms();
        Self {
            created_by: user.to_string(),
            created_at: now,
            last_modified_by: user.to_string(),
            last_modified_at: now,
        }
    }
}

// ============================================================================
// SECTION: Document
// ============================================================================

/// Body and metadata, replaced together under one lock.
#[derive(Debug, Clone)]
struct DocRecord {
    /// The stored JSON value.
    body: Value,
    /// Server metadata.
    meta: Meta,
}

/// What a GET (and every update event) returns for a document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    /// Path relative to the containing database.
    pub path: String,
    /// The stored JSON value.
    pub doc: Value,
    /// Server metadata.
    pub meta: Meta,
}

/// One stored document.
pub struct Document {
    /// Path relative to the containing database, e.g. `/doc1/col/doc2`.
    path: String,
    /// Current body and metadata.
    record: RwLock<DocRecord>,
    /// Named child collections; reset by PUT overwrite.
    children: RwLock<CollectionHolder>,
    /// SSE subscribers watching this document.
    subscribers: SubscriberSet,
}

impl Document {
    /// Creates a document with fresh metadata authored by `user`.
    #[must_use]
    pub fn new(path: String, user: &str, body: Value) -> Self {
        Self {
            path,
            record: RwLock::new(DocRecord {
                body,
                meta: Meta::new(user),
            }),
            children: RwLock::new(CollectionHolder::new()),
            subscribers: SubscriberSet::new(),
        }
    }

    /// Path relative to the containing database.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Snapshot of path, body, and metadata.
    #[must_use]
    pub fn view(&self) -> DocumentView {
        let record = self.record.read();
        DocumentView {
            path: self.path.clone(),
            doc: record.body.clone(),
            meta: record.meta.clone(),
        }
    }

    /// The current view serialized to JSON.
    #[must_use]
    pub fn view_json(&self) -> String {
        serde_json::to_string(&self.view()).unwrap_or_else(|err| {
            tracing::error!(error = %err, path = %self.path, "document view serialization failed");
            Value::Null.to_string()
        })
    }

    /// Replaces the body and stamps the modification metadata.
    ///
    /// `createdBy`/`createdAt` are preserved; child collections are not
    /// touched here (see [`Document::reset_children`]).
    pub fn overwrite(&self, body: Value, user: &str) {
        let mut record = self.record.write();
        record.body = body;
        record.meta.last_modified_by = user.to_string();
        record.meta.last_modified_at = now_ms();
    }

    /// Drops every child collection. PUT-overwrite semantics.
    pub fn reset_children(&self) {
        *self.children.write() = CollectionHolder::new();
    }

    /// Applies `patches` left-to-right to a copy of the current body.
    ///
    /// The stored body is untouched; the caller commits the result via
    /// [`Document::overwrite`] after validation.
    pub fn patched_body(&self, patches: &[Patch]) -> Result<Value, PatchError> {
        let mut body = self.record.read().body.clone();
        for patch in patches {
            body = apply_patch(&body, patch)?;
        }
        Ok(body)
    }

    /// Time of the most recent modification, for conditional PUT.
    #[must_use]
    pub fn last_modified_at(&self) -> i64 {
        self.record.read().meta.last_modified_at
    }

    /// The user that created this document.
    #[must_use]
    pub fn created_by(&self) -> String {
        self.record.read().meta.created_by.clone()
    }

    /// Runs `f` against the child collection holder.
    pub fn with_children<T>(&self, f: impl FnOnce(&CollectionHolder) -> T) -> T {
        f(&self.children.read())
    }

    /// Subscribers watching this document.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").field("path", &self.path).finish_non_exhaustive()
    }
}
