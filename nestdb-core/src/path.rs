// nestdb-core/src/path.rs
// ============================================================================
// Module: Path Resolver
// Description: Classification and traversal of /v1/... request paths.
// Purpose: Turn URL paths into typed walks over the collection tree.
// Dependencies: crate::collection, crate::document, crate::holder, thiserror
// ============================================================================

//! ## Overview
//! Request paths alternate collection and document segments below a version
//! prefix. Stripping `/v1/` and splitting on `/` classifies a path as a
//! database without trailing slash (the PUT/DELETE form), a database, a
//! nested collection, or a document; everything else is a malformed path.
//! Resolution walks the root holder alternating collection and document
//! lookups; `cut` peels the final segment off so mutating verbs can address
//! a child through its parent. Segments are percent-decoded before use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::collection::Collection;
use crate::document::Document;
use crate::holder::CollectionHolder;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Malformed-path failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The path did not start with the version prefix.
    #[error("path missing version prefix")]
    NoVersion,
    /// Slash placement does not match any resource form.
    #[error("malformed slash in path")]
    BadSlash,
    /// A resource name between slashes was empty.
    #[error("empty resource name in path")]
    BlankSegment,
    /// A percent escape was not two hex digits or decoded to invalid UTF-8.
    #[error("invalid percent encoding in path")]
    BadEncoding,
}

/// Traversal failures: either a malformed path or a missing resource.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The path itself was malformed.
    #[error(transparent)]
    Path(#[from] PathError),
    /// A segment on the path does not exist; carries the kind the full
    /// path addressed, for accurate status reporting.
    #[error("{}", not_found_message(.0))]
    NotFound(ResourceKind),
}

const fn not_found_message(kind: &ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Database | ResourceKind::DatabaseNoSlash => "database does not exist",
        ResourceKind::Collection => "collection does not exist",
        ResourceKind::Document => "document does not exist",
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// What a request path addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `/v1/db` — the form PUT and DELETE use for a top-level database.
    DatabaseNoSlash,
    /// `/v1/db/`.
    Database,
    /// `/v1/db/doc/col/` (any even depth).
    Collection,
    /// `/v1/db/doc` (any odd depth, no trailing slash).
    Document,
}

/// A resolved resource: a collection (database or nested) or a document.
#[derive(Debug, Clone)]
pub enum Resource {
    /// A database or nested collection.
    Collection(Arc<Collection>),
    /// A document.
    Document(Arc<Document>),
}

/// A classified path: decoded segment names plus the addressed kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPath {
    /// Percent-decoded resource names, database first.
    pub names: Vec<String>,
    /// The kind the full path addresses.
    pub kind: ResourceKind,
}

/// Classifies a request path and decodes its segments.
pub fn classify(path: &str) -> Result<ClassifiedPath, PathError> {
    let rest = path.strip_prefix("/v1/").ok_or(PathError::NoVersion)?;
    let raw: Vec<&str> = rest.split('/').collect();
    let trailing = raw.last() == Some(&"");
    let names = if trailing { &raw[..raw.len() - 1] } else { &raw[..] };

    if names.is_empty() {
        return Err(PathError::BadSlash);
    }
    if names.iter().any(|name| name.is_empty()) {
        return Err(PathError::BlankSegment);
    }

    let kind = match (trailing, names.len()) {
        (false, 1) => ResourceKind::DatabaseNoSlash,
        (true, 1) => ResourceKind::Database,
        // A collection path holds an odd run of names: db doc col ... col.
        (true, n) if n % 2 == 1 => ResourceKind::Collection,
        (false, n) if n % 2 == 0 => ResourceKind::Document,
        _ => return Err(PathError::BadSlash),
    };

    let names = names
        .iter()
        .map(|name| percent_decode(name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ClassifiedPath {
        names,
        kind,
    })
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Walks the tree to the resource a path addresses.
///
/// Odd positions resolve collections on the current holder, even positions
/// resolve documents on the current collection. Any missing segment reports
/// the kind of the full path (the form the original handlers used for their
/// not-found responses).
pub fn resolve(
    root: &CollectionHolder,
    path: &str,
) -> Result<(Resource, ResourceKind), ResolveError> {
    let classified = classify(path)?;
    let kind = classified.kind;
    let missing = || ResolveError::NotFound(kind);

    let mut names = classified.names.iter();
    let first = names.next().ok_or(PathError::BadSlash)?;
    let mut collection = root.find_collection(first).ok_or_else(missing)?;

    loop {
        let Some(doc_name) = names.next() else {
            return Ok((Resource::Collection(collection), kind));
        };
        let document = collection.find_document(doc_name).ok_or_else(missing)?;
        let Some(col_name) = names.next() else {
            return Ok((Resource::Document(document), kind));
        };
        collection = document
            .with_children(|children| children.find_collection(col_name))
            .ok_or_else(missing)?;
    }
}

// ============================================================================
// SECTION: Cut
// ============================================================================

/// A path cut at its final segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutPath {
    /// Path of the parent resource; empty for top-level databases. Keeps
    /// the trailing slash for document parents (a collection) and drops
    /// two segments for collection parents (a document).
    pub parent: String,
    /// Decoded name of the final segment.
    pub name: String,
    /// Kind of the final segment.
    pub kind: ResourceKind,
}

/// Splits a path into its parent path and final resource name.
pub fn cut(path: &str) -> Result<CutPath, PathError> {
    let classified = classify(path)?;
    let rest = path.strip_prefix("/v1/").ok_or(PathError::NoVersion)?;
    let raw: Vec<&str> = rest.split('/').collect();

    match classified.kind {
        ResourceKind::DatabaseNoSlash | ResourceKind::Database => Ok(CutPath {
            parent: String::new(),
            name: classified.names[0].clone(),
            kind: classified.kind,
        }),
        ResourceKind::Document => {
            // Parent is the containing collection; keep the trailing slash.
            let parent_names = &raw[..raw.len() - 1];
            Ok(CutPath {
                parent: format!("/v1/{}/", parent_names.join("/")),
                name: classified.names[classified.names.len() - 1].clone(),
                kind: ResourceKind::Document,
            })
        }
        ResourceKind::Collection => {
            // Parent is the containing document; drop the name and the
            // trailing empty segment.
            let parent_names = &raw[..raw.len() - 2];
            Ok(CutPath {
                parent: format!("/v1/{}", parent_names.join("/")),
                name: classified.names[classified.names.len() - 1].clone(),
                kind: ResourceKind::Collection,
            })
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Path of a document relative to its database: strips `/v1/<db>`.
#[must_use]
pub fn relative_doc_path(path: &str) -> String {
    let rest = path.strip_prefix("/v1/").unwrap_or(path);
    match rest.split_once('/') {
        Some((_, below_db)) => format!("/{below_db}"),
        None => String::from("/"),
    }
}

/// Decodes `%xx` escapes in one path segment.
pub fn percent_decode(segment: &str) -> Result<String, PathError> {
    if !segment.contains('%') {
        return Ok(segment.to_string());
    }
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut position = 0;
    while position < bytes.len() {
        if bytes[position] == b'%' {
            let escape = bytes.get(position + 1..position + 3).ok_or(PathError::BadEncoding)?;
            let hex = std::str::from_utf8(escape).map_err(|_| PathError::BadEncoding)?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| PathError::BadEncoding)?;
            decoded.push(byte);
            position += 3;
        } else {
            decoded.push(bytes[position]);
            position += 1;
        }
    }
    String::from_utf8(decoded).map_err(|_| PathError::BadEncoding)
}
