//! Entity store adapter interface
//!
//! The engine talks to the hosted document database only through
//! [`EntityStore`]. The database offers single-document writes and nothing
//! else: no multi-document transactions, no foreign keys, no conditional
//! updates.

use crate::filter::Filter;
use async_trait::async_trait;
use relink_model::RecordKind;
use serde_json::{Map, Value};
use std::fmt;

/// A schemaless stored document (always a JSON object)
pub type Document = Value;

/// Shallow field replacement applied by [`EntityStore::update`]
pub type Patch = Map<String, Value>;

/// Document collections owned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Projects,
    Povs,
    Trrs,
    Scenarios,
}

impl Collection {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Povs => "povs",
            Collection::Trrs => "trrs",
            Collection::Scenarios => "scenarios",
        }
    }

    /// Collection holding records of `kind`
    #[inline]
    #[must_use]
    pub fn of(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Project => Collection::Projects,
            RecordKind::Pov => Collection::Povs,
            RecordKind::Trr => Collection::Trrs,
            RecordKind::Scenario => Collection::Scenarios,
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Collection::Projects => RecordKind::Project,
            Collection::Povs => RecordKind::Pov,
            Collection::Trrs => RecordKind::Trr,
            Collection::Scenarios => RecordKind::Scenario,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Store failures
///
/// These are never retried inside the engine; they propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Update target does not exist
    #[error("{collection} document {id} not found")]
    NotFound { collection: Collection, id: String },

    /// Create with an id that is already taken
    #[error("{collection} document {id} already exists")]
    AlreadyExists { collection: Collection, id: String },

    /// Document is not a JSON object
    #[error("invalid {collection} document: {reason}")]
    InvalidDocument {
        collection: Collection,
        reason: String,
    },

    /// Stored document does not match its record shape
    #[error("cannot decode {collection} document {id}: {source}")]
    Decode {
        collection: Collection,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Record could not be encoded as a document
    #[error("cannot encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// Connectivity or backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the failure is transient from the caller's point of view
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

/// Document store operations consumed by the engine
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Persist a new document and return its id
    ///
    /// If the document carries a string `id` field it is used as-is.
    async fn create(&self, collection: Collection, doc: Document) -> Result<String, StoreError>;

    /// Fetch one document by id
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Fetch every document matching `filter`
    async fn query(&self, collection: Collection, filter: &Filter)
        -> Result<Vec<Document>, StoreError>;

    /// Replace the fields named in `patch` on an existing document
    async fn update(&self, collection: Collection, id: &str, patch: Patch)
        -> Result<(), StoreError>;
}
