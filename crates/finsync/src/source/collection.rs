use std::cmp::Reverse;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use finsync_core::records::Record;
use finsync_core::storage::{Fields, Filter, Query, RecordSource, Result};

/// Typed access to one remote collection.
///
/// Queries only ever send equality filters; ordering happens client-side on
/// each record's canonical date, newest first. Documents that fail to decode
/// are logged and skipped so one bad record cannot blank a whole snapshot.
pub struct Collection<R: Record> {
    source: Arc<dyn RecordSource>,
    filters: Vec<Filter>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Collection<R> {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            filters: Vec::new(),
            _record: PhantomData,
        }
    }

    /// Restricts every fetch to documents whose `field` equals `value`.
    pub fn with_equality(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push(Filter::eq(field, value));
        self
    }

    /// Fetches the full collection.
    pub async fn fetch_all(&self) -> Result<Vec<R>> {
        let query = self
            .filters
            .iter()
            .cloned()
            .fold(Query::all(), |query, filter| query.filter(filter));

        let documents = self.source.query(R::COLLECTION, &query).await?;
        let fetched = documents.len();

        let mut records: Vec<R> = documents
            .into_iter()
            .filter_map(|document| {
                let id = document.id.clone();
                match R::from_document(document) {
                    Ok(record) => Some(record),
                    Err(err) => {
                        tracing::warn!(
                            collection = R::COLLECTION,
                            document_id = %id,
                            error = %err,
                            "Skipping undecodable document"
                        );
                        None
                    }
                }
            })
            .collect();

        // Stable sort: records without a parsable date keep remote order at the end.
        records.sort_by_key(|r| Reverse(r.sort_key()));

        tracing::trace!(
            collection = R::COLLECTION,
            fetched,
            decoded = records.len(),
            "Fetched collection"
        );
        Ok(records)
    }

    /// Inserts a record and returns the generated id.
    pub async fn insert(&self, record: &R) -> Result<String> {
        let fields = record.to_fields()?;
        self.source.insert(R::COLLECTION, fields).await
    }

    pub async fn update(&self, id: &str, partial: Fields) -> Result<()> {
        self.source.update(R::COLLECTION, id, partial).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.source.delete(R::COLLECTION, id).await
    }
}

impl<R: Record> Clone for Collection<R> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            filters: self.filters.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for Collection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &R::COLLECTION)
            .field("filters", &self.filters)
            .finish()
    }
}
