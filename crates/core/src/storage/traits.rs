use async_trait::async_trait;

use super::{Document, Fields, Query, Result};

/// A remote document store addressed by collection name.
///
/// Implementations own the wire protocol; callers only see documents as
/// JSON field maps keyed by a store-generated id.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Runs a filtered query against a collection.
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    /// Inserts a new document and returns its generated id.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Merges `partial` into the document with the given id.
    async fn update(&self, collection: &str, id: &str, partial: Fields) -> Result<()>;

    /// Deletes a document by its id.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}
