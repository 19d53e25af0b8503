#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use finsync::cache::ManualClock;
use finsync::source::{InMemoryRecordSource, InstrumentedSource};
use finsync::store::MemoryStore;
use finsync::{Config, FinanceCaches};
use finsync_core::storage::{Fields, RecordSource};

/// Remote, local store and clock shared by every `FinanceCaches` a test
/// builds, so a second instance behaves like the app after a restart.
pub struct Harness {
    pub remote: Arc<InMemoryRecordSource>,
    pub source: Arc<InstrumentedSource>,
    pub store: MemoryStore,
    pub clock: ManualClock,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        let remote = Arc::new(InMemoryRecordSource::new());
        Self {
            source: Arc::new(InstrumentedSource::new(remote.clone())),
            remote,
            store: MemoryStore::new(),
            clock: ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap()),
            config: Config::from_lookup(|_| None),
        }
    }

    pub fn caches(&self) -> FinanceCaches {
        FinanceCaches::with_clock(
            self.source.clone(),
            Arc::new(self.store.clone()),
            Arc::new(self.clock.clone()),
            &self.config,
        )
    }

    /// Inserts an expense directly into the remote, bypassing any cache.
    pub async fn seed_expense(&self, date: &str, tag: &str) -> String {
        self.seed(
            "expenses",
            json!({"date": date, "tag": tag, "description": "", "price": "12.50"}),
        )
        .await
    }

    pub async fn seed(&self, collection: &str, value: Value) -> String {
        self.remote
            .insert(collection, fields(value))
            .await
            .unwrap()
    }
}

pub fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

/// Lets the debounce window elapse and the refreshes it triggers finish.
/// Only meaningful in `start_paused` tests.
pub async fn settle(config: &Config) {
    tokio::time::sleep(config.debounce() + Duration::from_millis(50)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
