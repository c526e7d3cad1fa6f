// nestdb-core/src/collection.rs
// ============================================================================
// Module: Collection
// Description: Ordered set of named documents plus its subscribers.
// Purpose: Implement the document write/read operations over the skip list.
// Dependencies: crate::document, crate::skiplist, crate::subscribe
// ============================================================================

//! ## Overview
//! A collection composes every document operation out of the skip-list
//! primitives: PUT and PATCH are upserts whose decider implements create,
//! conditional overwrite, and patch-then-commit; POST retries random names
//! against a collision-refusing decider; DELETE is a remove. Deciders record
//! the outcome and the caller notifies subscribers once the operation has
//! committed, so internal skip-list retries can never duplicate an event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::document::Document;
use crate::patch::Patch;
use crate::path::relative_doc_path;
use crate::sessions::generate_token;
use crate::skiplist::SkipList;
use crate::subscribe::NameInterval;
use crate::subscribe::SubscriberSet;
use crate::validate::DocumentValidator;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Collection operation failures.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Conditional PUT timestamp did not match the last modification.
    #[error("timestamp does not match the document's last modification")]
    PreconditionFailed,
    /// POST generated a name that is already taken.
    #[error("document already exists")]
    DocumentExists,
    /// The named document does not exist.
    #[error("document does not exist")]
    NotFound,
    /// A patch could not be applied; the document is unchanged.
    #[error("{0}")]
    PatchFailed(String),
}

// ============================================================================
// SECTION: Collection
// ============================================================================

/// Result of a PUT: whether a new document was created.
#[derive(Debug, Clone, Copy)]
pub struct PutOutcome {
    /// True for create (201), false for overwrite (200).
    pub created: bool,
}

/// Ordered set of named documents.
#[derive(Debug, Default)]
pub struct Collection {
    /// Documents sorted by name.
    documents: SkipList<String, Arc<Document>>,
    /// SSE subscribers watching this collection.
    subscribers: SubscriberSet,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: SkipList::new(),
            subscribers: SubscriberSet::new(),
        }
    }

    /// Looks up a document by name.
    #[must_use]
    pub fn find_document(&self, name: &str) -> Option<Arc<Document>> {
        self.documents.find(&name.to_string())
    }

    /// Range snapshot of the documents whose names fall in `interval`.
    pub async fn documents_in(&self, interval: &NameInterval) -> Vec<Arc<Document>> {
        self.documents
            .query(interval.lo.as_ref(), interval.hi.as_ref())
            .await
            .into_iter()
            .map(|(_, document)| document)
            .collect()
    }

    /// Creates or overwrites the document under `name`.
    ///
    /// `timestamp` carries the conditional-PUT precondition: when present
    /// and not `-1`, an overwrite is refused unless it equals the current
    /// `lastModifiedAt`. Overwrite preserves authorship metadata and resets
    /// the document's child collections; both the document's and this
    /// collection's subscribers are notified after the write commits.
    pub fn put_document(
        &self,
        name: &str,
        request_path: &str,
        body: &Value,
        user: &str,
        timestamp: Option<i64>,
    ) -> Result<PutOutcome, CollectionError> {
        let doc_path = relative_doc_path(request_path);
        let mut committed: Option<(bool, String, Option<Arc<Document>>)> = None;
        self.documents.upsert(name.to_string(), |_, current| match current {
            Some(existing) => {
                if let Some(expected) = timestamp {
                    if expected != -1 && expected != existing.last_modified_at() {
                        return Err(CollectionError::PreconditionFailed);
                    }
                }
                existing.overwrite(body.clone(), user);
                existing.reset_children();
                committed = Some((false, existing.view_json(), Some(Arc::clone(existing))));
                Ok(Arc::clone(existing))
            }
            None => {
                let document = Arc::new(Document::new(doc_path.clone(), user, body.clone()));
                committed = Some((true, document.view_json(), None));
                Ok(document)
            }
        })?;

        let Some((created, payload, overwritten)) = committed else {
            // The upsert returned Ok, so the decider ran exactly once.
            return Ok(PutOutcome {
                created: false,
            });
        };
        if let Some(document) = overwritten {
            document.subscribers().notify_update(name, &payload);
        }
        self.subscribers.notify_update(name, &payload);
        Ok(PutOutcome {
            created,
        })
    }

    /// Creates a document under a fresh random name and returns the name.
    ///
    /// Names are 128-bit lower-hex strings; generation retries until an
    /// unused one inserts. Collection subscribers are notified of the new
    /// document.
    pub fn post_document(&self, request_path: &str, body: &Value, user: &str) -> String {
        loop {
            let name = generate_token();
            let doc_path = relative_doc_path(&format!("{request_path}{name}"));
            let mut payload = String::new();
            let inserted = self.documents.upsert(name.clone(), |_, current| match current {
                Some(_) => Err(CollectionError::DocumentExists),
                None => {
                    let document = Arc::new(Document::new(doc_path.clone(), user, body.clone()));
                    payload = document.view_json();
                    Ok(document)
                }
            });
            if inserted.is_ok() {
                self.subscribers.notify_update(&name, &payload);
                return name;
            }
        }
    }

    /// Removes the document under `name`.
    ///
    /// The document's subscribers receive a final delete for `request_path`
    /// and their queues close; collection subscribers whose interval covers
    /// `name` receive the delete as well. Returns false when no such
    /// document exists.
    pub fn delete_document(&self, name: &str, request_path: &str) -> bool {
        match self.documents.remove(&name.to_string()) {
            Some(document) => {
                document.subscribers().close(request_path);
                self.subscribers.notify_delete(name, request_path);
                true
            }
            None => false,
        }
    }

    /// Applies a patch sequence to the document under `name`.
    ///
    /// The patched body is validated before commit; any failure leaves the
    /// document unchanged and surfaces as [`CollectionError::PatchFailed`].
    /// Patching stamps modification metadata but keeps child collections.
    pub fn patch_document(
        &self,
        name: &str,
        patches: &[Patch],
        validator: &dyn DocumentValidator,
        user: &str,
    ) -> Result<(), CollectionError> {
        let mut committed: Option<(String, Arc<Document>)> = None;
        self.documents.upsert(name.to_string(), |_, current| {
            let Some(document) = current else {
                return Err(CollectionError::NotFound);
            };
            let patched = document
                .patched_body(patches)
                .map_err(|err| CollectionError::PatchFailed(err.to_string()))?;
            validator
                .validate(&patched)
                .map_err(|violation| CollectionError::PatchFailed(violation.to_string()))?;
            document.overwrite(patched, user);
            committed = Some((document.view_json(), Arc::clone(document)));
            Ok(Arc::clone(document))
        })?;

        if let Some((payload, document)) = committed {
            document.subscribers().notify_update(name, &payload);
            self.subscribers.notify_update(name, &payload);
        }
        Ok(())
    }

    /// Subscribers watching this collection.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }
}
