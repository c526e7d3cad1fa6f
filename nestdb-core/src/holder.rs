// nestdb-core/src/holder.rs
// ============================================================================
// Module: Collection Holder
// Description: Named collections under the root or under one document.
// Purpose: Manage create/find/delete of collections in sorted order.
// Dependencies: crate::collection, crate::skiplist
// ============================================================================

//! ## Overview
//! A holder is an ordered map from collection name to collection. The root
//! holder contains the top-level databases; every document carries its own
//! holder for nested collections. Creation refuses duplicates; deletion
//! severs the whole subtree at the holder's key and closes the removed
//! collection's subscriber queues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::collection::Collection;
use crate::skiplist::SkipList;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Holder operation failures.
#[derive(Debug, Error)]
pub enum HolderError {
    /// A collection with the requested name already exists.
    #[error("collection already exists")]
    Exists,
}

// ============================================================================
// SECTION: Collection Holder
// ============================================================================

/// Ordered map of named collections.
#[derive(Debug, Default)]
pub struct CollectionHolder {
    /// Collections sorted by name.
    collections: SkipList<String, Arc<Collection>>,
}

impl CollectionHolder {
    /// Creates an empty holder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: SkipList::new(),
        }
    }

    /// Looks up a collection by name.
    #[must_use]
    pub fn find_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.find(&name.to_string())
    }

    /// Creates an empty collection under `name`; refuses duplicates.
    pub fn put_collection(&self, name: &str) -> Result<(), HolderError> {
        self.collections.upsert(name.to_string(), |_, current| match current {
            Some(_) => Err(HolderError::Exists),
            None => Ok(Arc::new(Collection::new())),
        })?;
        Ok(())
    }

    /// Removes the collection under `name`, severing its subtree.
    ///
    /// The removed collection's subscribers receive a final delete event
    /// for `path` and their queues are closed. Returns false when no such
    /// collection exists.
    pub fn delete_collection(&self, name: &str, path: &str) -> bool {
        match self.collections.remove(&name.to_string()) {
            Some(collection) => {
                collection.subscribers().close(path);
                true
            }
            None => false,
        }
    }
}
