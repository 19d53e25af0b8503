use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use finsync_core::cache::{
    deserialize_records, deserialize_timestamp, last_refresh_key, serialize_records,
    serialize_timestamp, snapshot_key, LocalStore,
};
use finsync_core::calc;
use finsync_core::records::{Goal, Period, Record};
use finsync_core::storage::Fields;

use crate::bus::{ChangeBus, SubscriptionId};
use crate::source::Collection;

use super::{CacheError, Clock, Result};

/// Maximum snapshot age before a non-forced refresh hits the network.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Upper bound on a single remote query.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub stale_threshold: Duration,
    pub refresh_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

/// Lifecycle of a cache.
///
/// `Uninitialized → Loading → Ready`, then `Ready → Loading → Ready` on every
/// refresh. A failed refresh that falls back to the persisted snapshot lands
/// in `Degraded` until the next successful one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Uninitialized,
    Loading,
    Ready,
    Degraded,
}

/// What a call to `initialize` or `refresh` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh persisted snapshot was adopted without network I/O.
    Restored { count: usize },
    /// The snapshot is within the staleness threshold; nothing was fetched.
    CacheHit,
    /// The remote query succeeded and replaced the snapshot.
    Refreshed { count: usize },
    /// The remote query failed and the persisted snapshot was adopted.
    Degraded { count: usize },
}

/// Which completed refresh a caller waiting on the refresh lock may adopt
/// instead of fetching.
#[derive(Debug, Clone, Copy)]
enum Join {
    /// Any refresh that completed after the caller arrived, including one
    /// already in flight.
    InFlight,
    /// Only a refresh that started after the caller arrived. Used after a
    /// change, since an in-flight fetch may have read the remote before it.
    Started,
}

struct CacheState<R> {
    snapshot: Arc<[R]>,
    last_refreshed_at: Option<DateTime<Utc>>,
    status: CacheStatus,
    loading: bool,
}

struct Inner<R: Record> {
    collection: Collection<R>,
    store: Arc<dyn LocalStore>,
    bus: ChangeBus,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    state: RwLock<CacheState<R>>,
    /// Serializes refreshes; waiters may adopt the outcome of one they queued behind.
    refresh_lock: tokio::sync::Mutex<()>,
    /// Sequence number of the last fetch that started.
    started: AtomicU64,
    /// Sequence number of the last fetch that completed.
    completed: AtomicU64,
    last_outcome: Mutex<Option<(u64, Result<RefreshOutcome>)>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

/// In-memory snapshot of one remote collection.
///
/// Reads are synchronous and never wait on I/O: they see whatever snapshot
/// is current, including the previous one while a refresh is in flight.
/// The snapshot is only ever replaced whole, never merged.
///
/// Mutations go to the remote source first. On success the cache publishes a
/// change notification and force-refreshes; records are never inserted into
/// the snapshot locally.
pub struct DomainCache<R: Record> {
    inner: Arc<Inner<R>>,
}

impl<R: Record> Clone for DomainCache<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Clears the loading flag however the refresh future ends, including when
/// it is dropped mid-flight.
struct LoadingGuard<'a, R: Record> {
    inner: &'a Inner<R>,
}

impl<'a, R: Record> LoadingGuard<'a, R> {
    fn start(inner: &'a Inner<R>) -> Self {
        write(&inner.state).loading = true;
        Self { inner }
    }
}

impl<R: Record> Drop for LoadingGuard<'_, R> {
    fn drop(&mut self) {
        write(&self.inner.state).loading = false;
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<R: Record> DomainCache<R> {
    pub fn new(
        collection: Collection<R>,
        store: Arc<dyn LocalStore>,
        bus: ChangeBus,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                collection,
                store,
                bus,
                clock,
                settings,
                state: RwLock::new(CacheState {
                    snapshot: Arc::from(Vec::new()),
                    last_refreshed_at: None,
                    status: CacheStatus::Uninitialized,
                    loading: false,
                }),
                refresh_lock: tokio::sync::Mutex::new(()),
                started: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                last_outcome: Mutex::new(None),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Subscribes to the change bus so every notification round triggers a
    /// forced refresh. Idempotent.
    pub fn attach(&self) -> SubscriptionId {
        let mut subscription = lock(&self.inner.subscription);
        if let Some(id) = *subscription {
            return id;
        }

        let weak = Arc::downgrade(&self.inner);
        let id = self.inner.bus.register(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let cache = DomainCache { inner };
            tokio::spawn(async move {
                if let Err(err) = cache.refresh_after_change().await {
                    tracing::warn!(
                        kind = R::COLLECTION,
                        error = %err,
                        "Refresh triggered by change notification failed"
                    );
                }
            });
        });
        *subscription = Some(id);
        id
    }

    /// Stops reacting to change notifications. Returns false if the cache
    /// was not attached.
    pub fn detach(&self) -> bool {
        match lock(&self.inner.subscription).take() {
            Some(id) => self.inner.bus.unregister(id),
            None => false,
        }
    }

    /// Loads the persisted snapshot. A snapshot younger than the staleness
    /// threshold is adopted without network I/O; a missing, corrupt or stale
    /// one leads to a forced refresh.
    pub async fn initialize(&self) -> Result<RefreshOutcome> {
        let records = self.load_persisted_records().await;
        let refreshed_at = self.load_persisted_timestamp().await;

        if let (Some(records), Some(refreshed_at)) = (records, refreshed_at) {
            let count = records.len();
            if self.is_within_threshold(refreshed_at) {
                self.replace(records.into(), Some(refreshed_at), CacheStatus::Ready);
                tracing::debug!(kind = R::COLLECTION, count, "Restored persisted snapshot");
                return Ok(RefreshOutcome::Restored { count });
            }

            // Serve the stale copy while the refresh runs.
            let status = self.settled_status();
            self.replace(records.into(), Some(refreshed_at), status);
            tracing::debug!(kind = R::COLLECTION, count, "Persisted snapshot is stale");
        }

        self.refresh(true).await
    }

    /// Re-fetches the collection unless `force` is false and the snapshot
    /// is still fresh.
    ///
    /// Concurrent calls do not issue duplicate queries: a caller that arrives
    /// while a refresh is running waits for it and returns its outcome.
    pub async fn refresh(&self, force: bool) -> Result<RefreshOutcome> {
        self.refresh_joining(force, Join::InFlight).await
    }

    /// Forced refresh that reflects every change made before the call. A
    /// fetch already in flight is waited for but not adopted.
    async fn refresh_after_change(&self) -> Result<RefreshOutcome> {
        self.refresh_joining(true, Join::Started).await
    }

    async fn refresh_joining(&self, force: bool, join: Join) -> Result<RefreshOutcome> {
        if !force && self.is_fresh() {
            tracing::trace!(kind = R::COLLECTION, "Cache hit, skipping refresh");
            return Ok(RefreshOutcome::CacheHit);
        }

        let observed = match join {
            Join::InFlight => self.inner.completed.load(Ordering::Acquire),
            Join::Started => self.inner.started.load(Ordering::Acquire),
        };
        let _guard = self.inner.refresh_lock.lock().await;

        if let Some((seq, outcome)) = lock(&self.inner.last_outcome).clone() {
            if seq > observed {
                tracing::trace!(kind = R::COLLECTION, ?join, "Joined refresh");
                return outcome;
            }
        }

        if !force && self.is_fresh() {
            return Ok(RefreshOutcome::CacheHit);
        }

        let seq = self.inner.started.fetch_add(1, Ordering::AcqRel) + 1;
        let outcome = self.fetch_and_replace().await;
        *lock(&self.inner.last_outcome) = Some((seq, outcome.clone()));
        self.inner.completed.store(seq, Ordering::Release);
        outcome
    }

    /// Records of the current snapshot that fall in `period`. Records whose
    /// date string does not parse are left out.
    pub fn get_by_period(&self, period: Period) -> Vec<R> {
        self.snapshot()
            .iter()
            .filter(|record| match record.matches_period(period) {
                Ok(matches) => matches,
                Err(err) => {
                    tracing::trace!(
                        kind = R::COLLECTION,
                        id = record.id(),
                        error = %err,
                        "Excluding record with malformed date"
                    );
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// Read-only view of the current snapshot.
    pub fn snapshot(&self) -> Arc<[R]> {
        read(&self.inner.state).snapshot.clone()
    }

    pub fn status(&self) -> CacheStatus {
        let state = read(&self.inner.state);
        if state.loading {
            CacheStatus::Loading
        } else {
            state.status
        }
    }

    pub fn is_loading(&self) -> bool {
        read(&self.inner.state).loading
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        read(&self.inner.state).last_refreshed_at
    }

    /// Inserts a record remotely, then notifies and force-refreshes.
    /// Returns the generated id.
    pub async fn add(&self, record: &R) -> Result<String> {
        let id = self.inner.collection.insert(record).await.map_err(|err| {
            tracing::warn!(kind = R::COLLECTION, error = %err, "Failed to add record");
            CacheError::Remote(err)
        })?;

        tracing::debug!(kind = R::COLLECTION, id = %id, "Record added");
        self.after_mutation().await;
        Ok(id)
    }

    /// Deletes a record remotely, then notifies and force-refreshes.
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.inner.collection.remove(id).await.map_err(|err| {
            tracing::warn!(kind = R::COLLECTION, id, error = %err, "Failed to remove record");
            CacheError::Remote(err)
        })?;

        tracing::debug!(kind = R::COLLECTION, id, "Record removed");
        self.after_mutation().await;
        Ok(())
    }

    /// Applies a partial update remotely, then notifies and force-refreshes.
    pub async fn update(&self, id: &str, partial: Fields) -> Result<()> {
        self.inner
            .collection
            .update(id, partial)
            .await
            .map_err(|err| {
                tracing::warn!(kind = R::COLLECTION, id, error = %err, "Failed to update record");
                CacheError::Remote(err)
            })?;

        tracing::debug!(kind = R::COLLECTION, id, "Record updated");
        self.after_mutation().await;
        Ok(())
    }

    /// Applies several partial updates in order, with a single notification
    /// and refresh at the end. Stops at the first failure and returns it;
    /// updates applied before the failure are still followed by a refresh.
    pub async fn update_many(&self, updates: Vec<(String, Fields)>) -> Result<usize> {
        let mut applied = 0;
        let mut failure = None;

        for (id, partial) in updates {
            match self.inner.collection.update(&id, partial).await {
                Ok(()) => applied += 1,
                Err(err) => {
                    tracing::warn!(
                        kind = R::COLLECTION,
                        id = %id,
                        error = %err,
                        "Failed to update record"
                    );
                    failure = Some(CacheError::Remote(err));
                    break;
                }
            }
        }

        if applied > 0 {
            tracing::debug!(kind = R::COLLECTION, applied, "Records updated");
            self.after_mutation().await;
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(applied),
        }
    }

    async fn after_mutation(&self) {
        self.inner.bus.publish();
        if let Err(err) = self.refresh_after_change().await {
            tracing::warn!(kind = R::COLLECTION, error = %err, "Refresh after mutation failed");
        }
    }

    async fn fetch_and_replace(&self) -> Result<RefreshOutcome> {
        let _loading = LoadingGuard::start(&self.inner);
        let timeout = self.inner.settings.refresh_timeout;

        let cause = match tokio::time::timeout(timeout, self.inner.collection.fetch_all()).await {
            Ok(Ok(records)) => {
                let now = self.inner.clock.now();
                let count = records.len();
                let snapshot: Arc<[R]> = records.into();

                self.replace(snapshot.clone(), Some(now), CacheStatus::Ready);
                self.persist(&snapshot, now).await;

                tracing::debug!(kind = R::COLLECTION, count, "Refreshed from remote");
                return Ok(RefreshOutcome::Refreshed { count });
            }
            Ok(Err(err)) => CacheError::Remote(err),
            Err(_) => CacheError::Timeout {
                kind: R::COLLECTION,
                after: timeout,
            },
        };

        self.fall_back(cause).await
    }

    async fn fall_back(&self, cause: CacheError) -> Result<RefreshOutcome> {
        tracing::warn!(
            kind = R::COLLECTION,
            error = %cause,
            "Refresh failed, falling back to persisted snapshot"
        );

        match self.load_persisted_records().await {
            Some(records) => {
                let count = records.len();
                self.replace(records.into(), None, CacheStatus::Degraded);
                Ok(RefreshOutcome::Degraded { count })
            }
            None => {
                write(&self.inner.state).status = CacheStatus::Degraded;
                tracing::error!(
                    kind = R::COLLECTION,
                    error = %cause,
                    "Refresh failed and no persisted snapshot exists"
                );
                Err(CacheError::NoFallback {
                    kind: R::COLLECTION,
                    cause: Box::new(cause),
                })
            }
        }
    }

    /// Swaps the snapshot in one assignment. `last_refreshed_at` never moves
    /// backwards.
    fn replace(
        &self,
        snapshot: Arc<[R]>,
        refreshed_at: Option<DateTime<Utc>>,
        status: CacheStatus,
    ) {
        let mut state = write(&self.inner.state);
        state.snapshot = snapshot;
        if let Some(at) = refreshed_at {
            state.last_refreshed_at = Some(state.last_refreshed_at.map_or(at, |prev| prev.max(at)));
        }
        state.status = status;
    }

    /// Writes snapshot then timestamp. The timestamp is skipped if the
    /// snapshot write fails so a restart never pairs old data with a new time.
    async fn persist(&self, snapshot: &[R], refreshed_at: DateTime<Utc>) {
        let encoded = match serialize_records(snapshot) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(kind = R::COLLECTION, error = %err, "Failed to encode snapshot");
                return;
            }
        };

        let store = &self.inner.store;
        if let Err(err) = store.set(&snapshot_key(R::COLLECTION), &encoded).await {
            tracing::warn!(kind = R::COLLECTION, error = %err, "Failed to persist snapshot");
            return;
        }

        let timestamp = serialize_timestamp(refreshed_at);
        if let Err(err) = store.set(&last_refresh_key(R::COLLECTION), &timestamp).await {
            tracing::warn!(kind = R::COLLECTION, error = %err, "Failed to persist refresh time");
        }
    }

    async fn load_persisted_records(&self) -> Option<Vec<R>> {
        match self.inner.store.get(&snapshot_key(R::COLLECTION)).await {
            Ok(Some(value)) => match deserialize_records(&value) {
                Ok(records) => Some(records),
                Err(err) => {
                    tracing::warn!(
                        kind = R::COLLECTION,
                        error = %err,
                        "Persisted snapshot is corrupt"
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(
                    kind = R::COLLECTION,
                    error = %err,
                    "Failed to read persisted snapshot"
                );
                None
            }
        }
    }

    async fn load_persisted_timestamp(&self) -> Option<DateTime<Utc>> {
        match self.inner.store.get(&last_refresh_key(R::COLLECTION)).await {
            Ok(Some(value)) => match deserialize_timestamp(&value) {
                Ok(timestamp) => Some(timestamp),
                Err(err) => {
                    tracing::warn!(
                        kind = R::COLLECTION,
                        error = %err,
                        "Persisted refresh time is corrupt"
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(
                    kind = R::COLLECTION,
                    error = %err,
                    "Failed to read persisted refresh time"
                );
                None
            }
        }
    }

    fn settled_status(&self) -> CacheStatus {
        read(&self.inner.state).status
    }

    fn is_fresh(&self) -> bool {
        self.last_refreshed_at()
            .is_some_and(|at| self.is_within_threshold(at))
    }

    fn is_within_threshold(&self, refreshed_at: DateTime<Utc>) -> bool {
        let threshold =
            TimeDelta::from_std(self.inner.settings.stale_threshold).unwrap_or(TimeDelta::MAX);
        self.inner.clock.now().signed_duration_since(refreshed_at) < threshold
    }
}

impl DomainCache<Goal> {
    /// The goal snapshot keyed by `monthYear` period.
    pub fn grouped_by_period(&self) -> BTreeMap<Period, Vec<Goal>> {
        calc::goals::group_by_period(&self.snapshot())
    }
}

impl<R: Record> fmt::Debug for DomainCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = read(&self.inner.state);
        f.debug_struct("DomainCache")
            .field("kind", &R::COLLECTION)
            .field("records", &state.snapshot.len())
            .field("status", &state.status)
            .field("loading", &state.loading)
            .field("last_refreshed_at", &state.last_refreshed_at)
            .finish()
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::source::{InMemoryRecordSource, InstrumentedSource};
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, TimeZone};
    use finsync_core::records::Expense;
    use finsync_core::storage::RecordSource;
    use rust_decimal_macros::dec;
    use serde_json::json;

    struct Fixture {
        remote: Arc<InMemoryRecordSource>,
        source: Arc<InstrumentedSource>,
        store: MemoryStore,
        clock: ManualClock,
        bus: ChangeBus,
    }

    impl Fixture {
        fn new() -> Self {
            let remote = Arc::new(InMemoryRecordSource::new());
            Self {
                source: Arc::new(InstrumentedSource::new(remote.clone())),
                remote,
                store: MemoryStore::new(),
                clock: ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap()),
                bus: ChangeBus::default(),
            }
        }

        fn cache<R: Record>(&self) -> DomainCache<R> {
            self.cache_with(CacheSettings::default())
        }

        fn cache_with<R: Record>(&self, settings: CacheSettings) -> DomainCache<R> {
            DomainCache::new(
                Collection::new(self.source.clone()),
                Arc::new(self.store.clone()),
                self.bus.clone(),
                Arc::new(self.clock.clone()),
                settings,
            )
        }

        async fn seed_expense(&self, date: NaiveDate, tag: &str) -> String {
            let expense = Expense::new(date, tag, "", dec!(10));
            Collection::<Expense>::new(self.remote.clone())
                .insert(&expense)
                .await
                .unwrap()
        }

        async fn persist<R: Record>(&self, records: &[R], at: DateTime<Utc>) {
            let encoded = serialize_records(records).unwrap();
            self.store
                .set(&snapshot_key(R::COLLECTION), &encoded)
                .await
                .unwrap();
            self.store
                .set(&last_refresh_key(R::COLLECTION), &serialize_timestamp(at))
                .await
                .unwrap();
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tags(records: &[Expense]) -> Vec<&str> {
        records.iter().map(|e| e.tag.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initialize_without_persisted_snapshot_fetches() {
        let fx = Fixture::new();
        fx.seed_expense(date(2025, 1, 15), "food").await;
        let cache: DomainCache<Expense> = fx.cache();

        assert_eq!(cache.status(), CacheStatus::Uninitialized);
        let outcome = cache.initialize().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Refreshed { count: 1 });
        assert_eq!(cache.status(), CacheStatus::Ready);
        assert_eq!(cache.last_refreshed_at(), Some(fx.clock.now()));
        assert_eq!(fx.source.queries("expenses"), 1);

        let persisted = fx.store.get("cached_expenses").await.unwrap().unwrap();
        let decoded: Vec<Expense> = deserialize_records(&persisted).unwrap();
        assert_eq!(decoded, cache.snapshot().to_vec());
        let stamp = fx.store.get("last_refresh_expenses").await.unwrap();
        let stamp = deserialize_timestamp(&stamp.unwrap()).unwrap();
        assert_eq!(stamp, fx.clock.now());
    }

    #[tokio::test]
    async fn test_initialize_restores_fresh_snapshot_without_network() {
        let fx = Fixture::new();
        let persisted = vec![Expense::new(date(2025, 1, 2), "rent", "", dec!(900)).with_id("e1")];
        fx.persist(&persisted, fx.clock.now() - TimeDelta::minutes(2))
            .await;
        let cache: DomainCache<Expense> = fx.cache();

        let outcome = cache.initialize().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Restored { count: 1 });
        assert_eq!(fx.source.queries("expenses"), 0);
        assert_eq!(cache.snapshot().to_vec(), persisted);
        assert_eq!(cache.status(), CacheStatus::Ready);
    }

    #[tokio::test]
    async fn test_initialize_refreshes_stale_snapshot() {
        let fx = Fixture::new();
        fx.seed_expense(date(2025, 1, 15), "remote").await;
        let persisted = vec![Expense::new(date(2025, 1, 2), "local", "", dec!(1)).with_id("e1")];
        fx.persist(&persisted, fx.clock.now() - TimeDelta::minutes(6))
            .await;
        let cache: DomainCache<Expense> = fx.cache();

        let outcome = cache.initialize().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Refreshed { count: 1 });
        assert_eq!(tags(&cache.snapshot()), vec!["remote"]);
        assert_eq!(cache.last_refreshed_at(), Some(fx.clock.now()));
    }

    #[tokio::test]
    async fn test_initialize_ignores_corrupt_snapshot() {
        let fx = Fixture::new();
        fx.seed_expense(date(2025, 1, 15), "remote").await;
        fx.store.set("cached_expenses", "{not json").await.unwrap();
        let stamp = serialize_timestamp(fx.clock.now());
        fx.store.set("last_refresh_expenses", &stamp).await.unwrap();
        let cache: DomainCache<Expense> = fx.cache();

        let outcome = cache.initialize().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Refreshed { count: 1 });
        assert_eq!(tags(&cache.snapshot()), vec!["remote"]);
    }

    #[tokio::test]
    async fn test_refresh_respects_stale_threshold() {
        let fx = Fixture::new();
        fx.seed_expense(date(2025, 1, 15), "food").await;
        let cache: DomainCache<Expense> = fx.cache();
        cache.refresh(true).await.unwrap();

        fx.clock.advance(Duration::from_secs(299));
        assert_eq!(
            cache.refresh(false).await.unwrap(),
            RefreshOutcome::CacheHit
        );
        assert_eq!(fx.source.queries("expenses"), 1);

        fx.clock.advance(Duration::from_secs(1));
        assert_eq!(
            cache.refresh(false).await.unwrap(),
            RefreshOutcome::Refreshed { count: 1 }
        );
        assert_eq!(fx.source.queries("expenses"), 2);
    }

    #[tokio::test]
    async fn test_forced_refresh_ignores_threshold() {
        let fx = Fixture::new();
        let cache: DomainCache<Expense> = fx.cache();
        cache.refresh(true).await.unwrap();
        cache.refresh(true).await.unwrap();

        assert_eq!(fx.source.queries("expenses"), 2);
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot_wholesale() {
        let fx = Fixture::new();
        let gone = fx.seed_expense(date(2025, 1, 10), "gone").await;
        fx.seed_expense(date(2025, 1, 11), "kept").await;
        let cache: DomainCache<Expense> = fx.cache();
        cache.refresh(true).await.unwrap();
        assert_eq!(cache.snapshot().len(), 2);

        fx.remote.delete("expenses", &gone).await.unwrap();
        cache.refresh(true).await.unwrap();

        assert_eq!(tags(&cache.snapshot()), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_last_refreshed_at_never_moves_backwards() {
        let fx = Fixture::new();
        let cache: DomainCache<Expense> = fx.cache();
        cache.refresh(true).await.unwrap();
        let first = cache.last_refreshed_at().unwrap();

        fx.clock.set(first - TimeDelta::hours(1));
        cache.refresh(true).await.unwrap();

        assert_eq!(cache.last_refreshed_at(), Some(first));
    }

    #[tokio::test]
    async fn test_get_by_period_filters_on_month_and_year() {
        let fx = Fixture::new();
        fx.seed_expense(date(2025, 1, 15), "mid").await;
        fx.seed_expense(date(2025, 2, 1), "next").await;
        fx.seed_expense(date(2025, 1, 31), "end").await;
        fx.seed_expense(date(2024, 1, 15), "last-year").await;
        let cache: DomainCache<Expense> = fx.cache();
        cache.refresh(true).await.unwrap();

        let january = cache.get_by_period(Period::new(2025, 1).unwrap());

        assert_eq!(tags(&january), vec!["end", "mid"]);
    }

    #[tokio::test]
    async fn test_get_by_period_excludes_malformed_dates() {
        let fx = Fixture::new();
        fx.seed_expense(date(2025, 1, 15), "ok").await;
        let broken = json!({"date": "someday", "tag": "broken", "price": "1"});
        fx.remote
            .insert("expenses", broken.as_object().unwrap().clone())
            .await
            .unwrap();
        let cache: DomainCache<Expense> = fx.cache();
        cache.refresh(true).await.unwrap();

        let january = Period::new(2025, 1).unwrap();
        assert_eq!(cache.snapshot().len(), 2);
        assert_eq!(tags(&cache.get_by_period(january)), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_persisted_snapshot() {
        let fx = Fixture::new();
        let persisted = vec![Expense::new(date(2025, 1, 2), "local", "", dec!(1)).with_id("e1")];
        let stamp = fx.clock.now() - TimeDelta::hours(3);
        fx.persist(&persisted, stamp).await;
        fx.source.set_offline(true);
        let cache: DomainCache<Expense> = fx.cache();

        let outcome = cache.initialize().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Degraded { count: 1 });
        assert_eq!(cache.status(), CacheStatus::Degraded);
        assert_eq!(cache.snapshot().to_vec(), persisted);
        assert_eq!(cache.last_refreshed_at(), Some(stamp));
    }

    #[tokio::test]
    async fn test_failed_refresh_without_fallback_is_an_error() {
        let fx = Fixture::new();
        fx.source.set_offline(true);
        let cache: DomainCache<Expense> = fx.cache();

        let err = cache.initialize().await.unwrap_err();

        match err {
            CacheError::NoFallback { kind, cause } => {
                assert_eq!(kind, "expenses");
                assert!(matches!(*cause, CacheError::Remote(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(cache.status(), CacheStatus::Degraded);
        assert!(cache.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_from_degraded_on_next_success() {
        let fx = Fixture::new();
        fx.persist::<Expense>(&[], fx.clock.now() - TimeDelta::hours(1))
            .await;
        fx.source.set_offline(true);
        let cache: DomainCache<Expense> = fx.cache();
        cache.initialize().await.unwrap();
        assert_eq!(cache.status(), CacheStatus::Degraded);

        fx.source.set_offline(false);
        cache.refresh(true).await.unwrap();

        assert_eq!(cache.status(), CacheStatus::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_query() {
        let fx = Fixture::new();
        fx.seed_expense(date(2025, 1, 15), "food").await;
        let cache: DomainCache<Expense> = fx.cache();
        fx.source.hold();

        let first = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh(true).await }
        });
        let second = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh(true).await }
        });

        while fx.source.queries("expenses") == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        fx.source.release();

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(first, RefreshOutcome::Refreshed { count: 1 });
        assert_eq!(second, first);
        assert_eq!(fx.source.queries("expenses"), 1);
    }

    #[tokio::test]
    async fn test_mutation_during_refresh_does_not_adopt_stale_result() {
        let fx = Fixture::new();
        let cache: DomainCache<Expense> = fx.cache();
        fx.source.hold_results();

        let pending = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh(true).await }
        });
        while fx.source.queries("expenses") == 0 {
            tokio::task::yield_now().await;
        }

        let added = tokio::spawn({
            let cache = cache.clone();
            async move {
                let expense = Expense::new(date(2025, 1, 5), "coffee", "", dec!(3.5));
                cache.add(&expense).await
            }
        });
        while fx.source.mutations("expenses") == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        fx.source.release();

        let stale = pending.await.unwrap().unwrap();
        let id = added.await.unwrap().unwrap();

        assert_eq!(stale, RefreshOutcome::Refreshed { count: 0 });
        assert_eq!(cache.snapshot().len(), 1);
        assert_eq!(cache.snapshot()[0].id, id);
        assert_eq!(fx.source.queries("expenses"), 2);
    }

    #[tokio::test]
    async fn test_reads_serve_previous_snapshot_while_loading() {
        let fx = Fixture::new();
        fx.seed_expense(date(2025, 1, 15), "old").await;
        let cache: DomainCache<Expense> = fx.cache();
        cache.refresh(true).await.unwrap();
        fx.seed_expense(date(2025, 1, 16), "new").await;
        fx.source.hold();

        let pending = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh(true).await }
        });
        while !cache.is_loading() {
            tokio::task::yield_now().await;
        }

        assert_eq!(cache.status(), CacheStatus::Loading);
        assert_eq!(tags(&cache.snapshot()), vec!["old"]);

        fx.source.release();
        pending.await.unwrap().unwrap();

        assert!(!cache.is_loading());
        assert_eq!(tags(&cache.snapshot()), vec!["new", "old"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_times_out() {
        let fx = Fixture::new();
        let settings = CacheSettings {
            refresh_timeout: Duration::from_secs(5),
            ..CacheSettings::default()
        };
        let cache: DomainCache<Expense> = fx.cache_with(settings);
        fx.source.hold();

        let err = cache.refresh(true).await.unwrap_err();

        let CacheError::NoFallback { cause, .. } = err else {
            panic!("expected NoFallback, got {err:?}");
        };
        assert_eq!(
            *cause,
            CacheError::Timeout {
                kind: "expenses",
                after: Duration::from_secs(5),
            }
        );
        assert!(!cache.is_loading());
    }

    #[tokio::test]
    async fn test_add_refreshes_from_remote() {
        let fx = Fixture::new();
        let cache: DomainCache<Expense> = fx.cache();
        cache.initialize().await.unwrap();

        let id = cache
            .add(&Expense::new(date(2025, 1, 5), "coffee", "", dec!(3.5)))
            .await
            .unwrap();

        assert_eq!(cache.snapshot().len(), 1);
        assert_eq!(cache.snapshot()[0].id, id);
        assert_eq!(fx.source.queries("expenses"), 2);
    }

    #[tokio::test]
    async fn test_update_and_remove_refresh_from_remote() {
        let fx = Fixture::new();
        let id = fx.seed_expense(date(2025, 1, 15), "food").await;
        let cache: DomainCache<Expense> = fx.cache();
        cache.initialize().await.unwrap();

        let partial = json!({"tag": "groceries"}).as_object().unwrap().clone();
        cache.update(&id, partial).await.unwrap();
        assert_eq!(tags(&cache.snapshot()), vec!["groceries"]);

        cache.remove(&id).await.unwrap();
        assert!(cache.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_snapshot_untouched() {
        let fx = Fixture::new();
        fx.seed_expense(date(2025, 1, 15), "food").await;
        let cache: DomainCache<Expense> = fx.cache();
        cache.initialize().await.unwrap();
        let before = cache.snapshot();

        let err = cache.remove("missing").await.unwrap_err();

        assert!(matches!(
            err,
            CacheError::Remote(finsync_core::storage::RepositoryError::NotFound { .. })
        ));
        assert_eq!(cache.snapshot().to_vec(), before.to_vec());
        assert_eq!(fx.source.queries("expenses"), 1);
    }

    #[tokio::test]
    async fn test_update_many_stops_at_first_failure() {
        let fx = Fixture::new();
        let a = fx.seed_expense(date(2025, 1, 15), "a").await;
        let cache: DomainCache<Expense> = fx.cache();
        cache.initialize().await.unwrap();

        let patch = |tag: &str| json!({ "tag": tag }).as_object().unwrap().clone();
        let err = cache
            .update_many(vec![
                (a.clone(), patch("a2")),
                ("missing".to_string(), patch("x")),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Remote(_)));
        assert_eq!(tags(&cache.snapshot()), vec!["a2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attached_cache_refreshes_on_notification() {
        let fx = Fixture::new();
        let cache: DomainCache<Expense> = fx.cache();
        cache.attach();
        cache.initialize().await.unwrap();
        fx.seed_expense(date(2025, 1, 15), "elsewhere").await;

        fx.bus.publish();
        tokio::time::sleep(Duration::from_millis(150)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(tags(&cache.snapshot()), vec!["elsewhere"]);
        assert_eq!(fx.source.queries("expenses"), 2);
    }

    #[tokio::test]
    async fn test_attach_is_idempotent_and_detach_unregisters() {
        let fx = Fixture::new();
        let cache: DomainCache<Expense> = fx.cache();

        let id = cache.attach();
        assert_eq!(cache.attach(), id);
        assert_eq!(fx.bus.subscriber_count(), 1);

        assert!(cache.detach());
        assert!(!cache.detach());
        assert_eq!(fx.bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_goals_grouped_by_period() {
        let fx = Fixture::new();
        let january = Period::new(2025, 1).unwrap();
        let february = Period::new(2025, 2).unwrap();
        let goals: Collection<Goal> = Collection::new(fx.remote.clone());
        for (text, period) in [("save", january), ("run", february), ("read", january)] {
            goals
                .insert(&Goal::new(text, period, fx.clock.now()))
                .await
                .unwrap();
        }
        let cache: DomainCache<Goal> = fx.cache();
        cache.refresh(true).await.unwrap();

        let grouped = cache.grouped_by_period();

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&january].len(), 2);
        assert_eq!(grouped[&february].len(), 1);
    }
}
