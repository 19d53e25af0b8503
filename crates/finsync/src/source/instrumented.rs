//! Record source decorator for simulating a flaky or slow remote.
//!
//! Wraps any [`RecordSource`], counts the queries it sees per collection and
//! can take the remote offline or hold queries until released. Used to
//! exercise degraded mode, single-flight refreshes and timeouts without a
//! real backend. Only built for tests or with the `testing` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use finsync_core::storage::{Document, Fields, Query, RecordSource, RepositoryError, Result};

/// Where a held query parks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hold {
    Off,
    BeforeRead,
    AfterRead,
}

pub struct InstrumentedSource {
    inner: Arc<dyn RecordSource>,
    queries: Mutex<HashMap<String, usize>>,
    mutations: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
    held: watch::Sender<Hold>,
}

impl InstrumentedSource {
    pub fn new(inner: Arc<dyn RecordSource>) -> Self {
        let (held, _) = watch::channel(Hold::Off);
        Self {
            inner,
            queries: Mutex::new(HashMap::new()),
            mutations: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            held,
        }
    }

    /// Number of queries issued against `collection`, including failed ones.
    pub fn queries(&self, collection: &str) -> usize {
        count(&self.queries, collection)
    }

    /// Number of inserts, updates and deletes issued against `collection`.
    pub fn mutations(&self, collection: &str) -> usize {
        count(&self.mutations, collection)
    }

    /// While offline every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes queries wait until [`release`](Self::release) is called.
    pub fn hold(&self) {
        self.held.send_replace(Hold::BeforeRead);
    }

    /// Like [`hold`](Self::hold), but queries read their documents first and
    /// return that result once released, even if the collection changed
    /// in between.
    pub fn hold_results(&self) {
        self.held.send_replace(Hold::AfterRead);
    }

    pub fn release(&self) {
        self.held.send_replace(Hold::Off);
    }

    async fn wait_unless_held(&self, stage: Hold) {
        let mut held = self.held.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = held.wait_for(|held| *held != stage).await;
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("remote is offline".to_string()));
        }
        Ok(())
    }
}

fn count(counter: &Mutex<HashMap<String, usize>>, collection: &str) -> usize {
    let counter = counter.lock().unwrap_or_else(PoisonError::into_inner);
    counter.get(collection).copied().unwrap_or(0)
}

fn bump(counter: &Mutex<HashMap<String, usize>>, collection: &str) {
    let mut counter = counter.lock().unwrap_or_else(PoisonError::into_inner);
    *counter.entry(collection.to_string()).or_default() += 1;
}

#[async_trait]
impl RecordSource for InstrumentedSource {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        bump(&self.queries, collection);
        self.wait_unless_held(Hold::BeforeRead).await;

        self.check_online()?;
        let documents = self.inner.query(collection, query).await?;

        self.wait_unless_held(Hold::AfterRead).await;
        Ok(documents)
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String> {
        bump(&self.mutations, collection);
        self.check_online()?;
        self.inner.insert(collection, fields).await
    }

    async fn update(&self, collection: &str, id: &str, partial: Fields) -> Result<()> {
        bump(&self.mutations, collection);
        self.check_online()?;
        self.inner.update(collection, id, partial).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        bump(&self.mutations, collection);
        self.check_online()?;
        self.inner.delete(collection, id).await
    }
}
