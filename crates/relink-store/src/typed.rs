//! Typed access on top of [`EntityStore`]
//!
//! Decodes documents into [`StoredRecord`]s. A document that does not match
//! its record shape surfaces as [`StoreError::Decode`].

use crate::adapter::{Collection, Document, EntityStore, StoreError};
use crate::filter::Filter;
use relink_model::StoredRecord;

/// Encode a record as a store document
///
/// # Errors
/// Returns [`StoreError::Encode`] if serialization fails
pub fn encode<T: StoredRecord>(record: &T) -> Result<Document, StoreError> {
    serde_json::to_value(record).map_err(StoreError::Encode)
}

/// Decode a store document into a record
///
/// # Errors
/// Returns [`StoreError::Decode`] if the document does not match `T`
pub fn decode<T: StoredRecord>(doc: Document) -> Result<T, StoreError> {
    let id = doc
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or("<missing>")
        .to_string();
    serde_json::from_value(doc).map_err(|source| StoreError::Decode {
        collection: Collection::of(T::KIND),
        id,
        source,
    })
}

/// Persist a new record
///
/// # Errors
/// Propagates encode and store failures
pub async fn insert<T: StoredRecord>(store: &dyn EntityStore, record: &T) -> Result<String, StoreError> {
    let doc = encode(record)?;
    store.create(Collection::of(T::KIND), doc).await
}

/// Fetch and decode one record
///
/// # Errors
/// Propagates store and decode failures
pub async fn fetch<T: StoredRecord>(store: &dyn EntityStore, id: &str) -> Result<Option<T>, StoreError> {
    match store.get(Collection::of(T::KIND), id).await? {
        Some(doc) => decode(doc).map(Some),
        None => Ok(None),
    }
}

/// Fetch and decode every record matching `filter`
///
/// # Errors
/// Fails on the first document that cannot be decoded
pub async fn fetch_where<T: StoredRecord>(
    store: &dyn EntityStore,
    filter: &Filter,
) -> Result<Vec<T>, StoreError> {
    store
        .query(Collection::of(T::KIND), filter)
        .await?
        .into_iter()
        .map(decode::<T>)
        .collect()
}
