// nestdb-core/tests/collection.rs
// ============================================================================
// Module: Collection & Document Tests
// Description: Document lifecycle operations and subscriber notification.
// Purpose: Validate put/post/patch/delete semantics over the ordered map.
// Dependencies: nestdb-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Drives the collection operations end to end in memory: creation vs
//! overwrite metadata stamping, conditional PUT preconditions, child reset
//! on overwrite, random-name POST, patch commit and rollback, and the
//! update/delete events each mutation fans out to subscribers.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

use nestdb_core::collection::Collection;
use nestdb_core::collection::CollectionError;
use nestdb_core::patch::Patch;
use nestdb_core::patch::PatchOp;
use nestdb_core::subscribe::NameInterval;
use nestdb_core::subscribe::SubscriberEvent;
use nestdb_core::validate::DocumentValidator;
use nestdb_core::validate::SchemaViolation;
use serde_json::Value;
use serde_json::json;
use tokio::sync::mpsc::error::TryRecvError;

/// Validator that accepts every body.
struct AcceptAll;

impl DocumentValidator for AcceptAll {
    fn validate(&self, _body: &Value) -> Result<(), SchemaViolation> {
        Ok(())
    }
}

/// Validator that rejects every body.
struct RejectAll;

impl DocumentValidator for RejectAll {
    fn validate(&self, _body: &Value) -> Result<(), SchemaViolation> {
        Err(SchemaViolation("body rejected".to_string()))
    }
}

fn object_add(path: &str, value: Value) -> Patch {
    Patch {
        op: PatchOp::ObjectAdd,
        path: path.to_string(),
        value,
    }
}

/// Verifies create stamps metadata and the database-relative path.
#[test]
fn put_creates_with_metadata() {
    let collection = Collection::new();
    let outcome = collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"prop": 100}), "alice", None)
        .expect("create");
    assert!(outcome.created);

    let document = collection.find_document("doc1").expect("find");
    let view = document.view();
    assert_eq!(view.path, "/doc1");
    assert_eq!(view.doc, json!({"prop": 100}));
    assert_eq!(view.meta.created_by, "alice");
    assert_eq!(view.meta.last_modified_by, "alice");
    assert!(view.meta.created_at <= view.meta.last_modified_at);
}

/// Verifies overwrite preserves authorship and advances modification time.
#[test]
fn put_overwrite_preserves_authorship() {
    let collection = Collection::new();
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"v": 1}), "alice", None)
        .expect("create");
    let created_at = collection.find_document("doc1").expect("find").view().meta.created_at;

    let outcome = collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"v": 2}), "bob", None)
        .expect("overwrite");
    assert!(!outcome.created);

    let document = collection.find_document("doc1").expect("find");
    let view = document.view();
    assert_eq!(view.doc, json!({"v": 2}));
    assert_eq!(view.meta.created_by, "alice");
    assert_eq!(view.meta.created_at, created_at);
    assert_eq!(view.meta.last_modified_by, "bob");
    assert!(view.meta.last_modified_at >= created_at);
    assert_eq!(document.created_by(), "alice");
}

/// Verifies overwrite removes the document's nested collections.
#[test]
fn put_overwrite_resets_children() {
    let collection = Collection::new();
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({}), "alice", None)
        .expect("create");
    let document = collection.find_document("doc1").expect("find");
    document.with_children(|children| children.put_collection("col1")).expect("create col");
    assert!(document.with_children(|children| children.find_collection("col1")).is_some());

    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({}), "alice", None)
        .expect("overwrite");
    assert!(document.with_children(|children| children.find_collection("col1")).is_none());
}

/// Verifies the conditional PUT timestamp gate.
#[test]
fn conditional_put_checks_last_modified() {
    let collection = Collection::new();
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"v": 1}), "alice", None)
        .expect("create");
    let stamped = collection.find_document("doc1").expect("find").last_modified_at();

    let err = collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"v": 2}), "alice", Some(stamped - 1))
        .expect_err("mismatch");
    assert!(matches!(err, CollectionError::PreconditionFailed));
    assert_eq!(
        collection.find_document("doc1").expect("find").view().doc,
        json!({"v": 1})
    );

    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"v": 2}), "alice", Some(stamped))
        .expect("matching timestamp");
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"v": 3}), "alice", Some(-1))
        .expect("unconditional sentinel");
    assert_eq!(
        collection.find_document("doc1").expect("find").view().doc,
        json!({"v": 3})
    );
}

/// Verifies POST creates a 32-hex-character name and stores the body.
#[test]
fn post_creates_random_hex_name() {
    let collection = Collection::new();
    let name = collection.post_document("/v1/db1/", &json!({"posted": true}), "alice");
    assert_eq!(name.len(), 32);
    assert!(name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let document = collection.find_document(&name).expect("find");
    assert_eq!(document.view().doc, json!({"posted": true}));
    assert_eq!(document.path(), format!("/{name}"));
}

/// Verifies delete removes exactly once.
#[test]
fn delete_document_removes_once() {
    let collection = Collection::new();
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({}), "alice", None)
        .expect("create");
    assert!(collection.delete_document("doc1", "/v1/db1/doc1"));
    assert!(collection.find_document("doc1").is_none());
    assert!(!collection.delete_document("doc1", "/v1/db1/doc1"));
}

/// Verifies a successful patch commits and stamps metadata.
#[test]
fn patch_commits_and_stamps() {
    let collection = Collection::new();
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"prop": 100}), "alice", None)
        .expect("create");

    collection
        .patch_document("doc1", &[object_add("/a", json!(1))], &AcceptAll, "bob")
        .expect("patch");

    let view = collection.find_document("doc1").expect("find").view();
    assert_eq!(view.doc, json!({"prop": 100, "a": 1}));
    assert_eq!(view.meta.created_by, "alice");
    assert_eq!(view.meta.last_modified_by, "bob");
}

/// Verifies patching keeps nested collections (unlike PUT overwrite).
#[test]
fn patch_keeps_children() {
    let collection = Collection::new();
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({}), "alice", None)
        .expect("create");
    let document = collection.find_document("doc1").expect("find");
    document.with_children(|children| children.put_collection("col1")).expect("create col");

    collection
        .patch_document("doc1", &[object_add("/a", json!(1))], &AcceptAll, "alice")
        .expect("patch");
    assert!(document.with_children(|children| children.find_collection("col1")).is_some());
}

/// Verifies a failing patch sequence leaves the document unchanged.
#[test]
fn patch_failure_rolls_back() {
    let collection = Collection::new();
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"prop": 100}), "alice", None)
        .expect("create");

    let patches = [
        object_add("/a", json!(1)),
        object_add("/missing/deep", json!(2)),
    ];
    let err = collection
        .patch_document("doc1", &patches, &AcceptAll, "bob")
        .expect_err("patch fails");
    assert!(matches!(err, CollectionError::PatchFailed(_)));

    let view = collection.find_document("doc1").expect("find").view();
    assert_eq!(view.doc, json!({"prop": 100}));
    assert_eq!(view.meta.last_modified_by, "alice");
}

/// Verifies schema rejection of the patched result is a patch failure.
#[test]
fn patch_schema_rejection_rolls_back() {
    let collection = Collection::new();
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"prop": 100}), "alice", None)
        .expect("create");

    let err = collection
        .patch_document("doc1", &[object_add("/a", json!(1))], &RejectAll, "bob")
        .expect_err("schema rejects");
    assert!(matches!(err, CollectionError::PatchFailed(ref message) if message == "body rejected"));
    assert_eq!(
        collection.find_document("doc1").expect("find").view().doc,
        json!({"prop": 100})
    );
}

/// Verifies patching an absent document reports not-found.
#[test]
fn patch_missing_document_not_found() {
    let collection = Collection::new();
    let err = collection
        .patch_document("nope", &[object_add("/a", json!(1))], &AcceptAll, "alice")
        .expect_err("missing");
    assert!(matches!(err, CollectionError::NotFound));
    assert!(collection.find_document("nope").is_none());
}

/// Verifies collection subscribers see interval-filtered updates and deletes.
#[test]
fn collection_subscribers_filtered_by_interval() {
    let collection = Collection::new();
    let (_tx, mut rx) = collection.subscribers().subscribe(NameInterval {
        lo: Some("a".to_string()),
        hi: Some("z".to_string()),
    });

    collection
        .put_document("doc2", "/v1/db1/doc2", &json!({"in": true}), "alice", None)
        .expect("create inside interval");
    match rx.try_recv().expect("update event") {
        SubscriberEvent::Update(payload) => assert!(payload.contains("\"in\":true")),
        other => panic!("unexpected event: {other:?}"),
    }

    collection
        .put_document("00-out", "/v1/db1/00-out", &json!({}), "alice", None)
        .expect("create outside interval");
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    assert!(collection.delete_document("doc2", "/v1/db1/doc2"));
    match rx.try_recv().expect("delete event") {
        SubscriberEvent::Delete(path) => assert_eq!(path, "/v1/db1/doc2"),
        other => panic!("unexpected event: {other:?}"),
    }
}

/// Verifies document subscribers see overwrites and a closing delete.
#[test]
fn document_subscribers_update_then_close() {
    let collection = Collection::new();
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"v": 1}), "alice", None)
        .expect("create");
    let document = collection.find_document("doc1").expect("find");
    let (tx, mut rx) = document.subscribers().subscribe(NameInterval::unbounded());
    // Drop the snapshot sender so closing the set closes the stream.
    drop(tx);

    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({"v": 2}), "alice", None)
        .expect("overwrite");
    match rx.try_recv().expect("update event") {
        SubscriberEvent::Update(payload) => assert!(payload.contains("\"v\":2")),
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(collection.delete_document("doc1", "/v1/db1/doc1"));
    match rx.try_recv().expect("delete event") {
        SubscriberEvent::Delete(path) => assert_eq!(path, "/v1/db1/doc1"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
}

/// Verifies a collection subscriber is pruned after its receiver drops.
#[test]
fn dropped_subscribers_are_pruned() {
    let collection = Collection::new();
    let (tx, rx) = collection.subscribers().subscribe(NameInterval::unbounded());
    assert_eq!(collection.subscribers().len(), 1);

    drop(rx);
    drop(tx);
    collection
        .put_document("doc1", "/v1/db1/doc1", &json!({}), "alice", None)
        .expect("create");
    assert!(collection.subscribers().is_empty());
}
