//! In-process record source.
//!
//! Stores documents in `BTreeMap`s wrapped in `Arc<RwLock<_>>`. Supports the
//! full query contract, including range filters and ordering, so it can stand
//! in for a remote document store in tests and offline development. Data is
//! lost when the source is dropped.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use finsync_core::storage::{
    compare_values, Direction, Document, Fields, Query, RecordSource, RepositoryError, Result,
};

type CollectionData = BTreeMap<String, Fields>;

#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    collections: Arc<RwLock<HashMap<String, CollectionData>>>,
}

impl InMemoryRecordSource {
    /// Creates a new empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents stored in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, BTreeMap::len)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

fn not_found(collection: &str, id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(data) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut documents: Vec<Document> = data
            .iter()
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .filter(|document| query.matches(document))
            .collect();

        if let Some(order) = &query.order_by {
            documents.sort_by(|a, b| {
                let ordering = match (a.get(&order.field), b.get(&order.field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            documents.truncate(limit);
        }

        Ok(documents)
    }

    async fn insert(&self, collection: &str, mut fields: Fields) -> Result<String> {
        fields.remove("id");
        let id = Uuid::new_v4().to_string();

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, partial: Fields) -> Result<()> {
        let mut collections = self.collections.write().await;
        let fields = collections
            .get_mut(collection)
            .and_then(|data| data.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;

        for (key, value) in partial {
            if key != "id" {
                fields.insert(key, value);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(collection)
            .and_then(|data| data.remove(id))
            .map(|_| ())
            .ok_or_else(|| not_found(collection, id))
    }
}
