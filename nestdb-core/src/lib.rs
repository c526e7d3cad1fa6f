// nestdb-core/src/lib.rs
// ============================================================================
// Module: nestdb Core
// Description: Data plane for the hierarchical JSON document database.
// Purpose: Provide the ordered map, document tree, patches, subscriptions,
//          and sessions the transport layer composes.
// Dependencies: arc-swap, parking_lot, rand, serde, serde_json, thiserror,
//               tokio
// ============================================================================

//! ## Overview
//! nestdb stores JSON documents in named databases; a document may carry
//! named collections of further documents, recursively. This crate is the
//! data plane: the concurrent skip list backing every collection, the
//! document/collection/holder tree, the JSON-pointer patch engine, the
//! path resolver, the subscription registry, and the session table. The
//! HTTP surface lives in `nestdb-server`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod collection;
pub mod document;
pub mod holder;
pub mod json;
pub mod patch;
pub mod path;
pub mod sessions;
pub mod skiplist;
pub mod subscribe;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use collection::Collection;
pub use collection::CollectionError;
pub use collection::PutOutcome;
pub use document::Document;
pub use document::DocumentView;
pub use document::Meta;
pub use holder::CollectionHolder;
pub use holder::HolderError;
pub use json::json_equal;
pub use json::now_ms;
pub use patch::Patch;
pub use patch::PatchError;
pub use patch::PatchOp;
pub use patch::apply_patch;
pub use path::ClassifiedPath;
pub use path::CutPath;
pub use path::PathError;
pub use path::ResolveError;
pub use path::Resource;
pub use path::ResourceKind;
pub use path::classify;
pub use path::cut;
pub use path::relative_doc_path;
pub use path::resolve;
pub use sessions::INSTALLED_TTL;
pub use sessions::LOGIN_TTL;
pub use sessions::SessionError;
pub use sessions::SessionTable;
pub use sessions::generate_token;
pub use skiplist::MAX_LEVEL;
pub use skiplist::SkipList;
pub use subscribe::NameInterval;
pub use subscribe::SubscriberEvent;
pub use subscribe::SubscriberSet;
pub use validate::DocumentValidator;
pub use validate::SchemaViolation;
