//! Composition root for the sync layer.
//!
//! [`FinanceCaches`] owns one [`ChangeBus`] and the three domain caches,
//! subscribes every cache to the bus and hands out the backfill job. Each
//! instance is fully isolated, so tests can build as many as they like.

use std::sync::Arc;

use chrono::NaiveDate;

use finsync_core::cache::LocalStore;
use finsync_core::records::{Expense, Goal, Investment};
use finsync_core::storage::RecordSource;

use crate::backfill::{BackfillJob, BackfillOutcome};
use crate::bus::ChangeBus;
use crate::cache::{Clock, DomainCache, RefreshOutcome, Result, SystemClock};
use crate::config::Config;
use crate::source::Collection;

/// Outcome of initializing every cache. One failing cache does not stop the
/// others from loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub expenses: Result<RefreshOutcome>,
    pub goals: Result<RefreshOutcome>,
    pub investments: Result<RefreshOutcome>,
}

impl InitReport {
    pub fn is_ok(&self) -> bool {
        self.expenses.is_ok() && self.goals.is_ok() && self.investments.is_ok()
    }
}

/// The expense, goal and investment caches sharing one change bus.
#[derive(Clone)]
pub struct FinanceCaches {
    bus: ChangeBus,
    store: Arc<dyn LocalStore>,
    expenses: DomainCache<Expense>,
    goals: DomainCache<Goal>,
    investments: DomainCache<Investment>,
}

impl FinanceCaches {
    /// Builds the caches over the given remote source and local store.
    pub fn new(source: Arc<dyn RecordSource>, store: Arc<dyn LocalStore>, config: &Config) -> Self {
        Self::with_clock(source, store, Arc::new(SystemClock), config)
    }

    /// Same as [`new`](Self::new) with an explicit clock for refresh
    /// timestamps and staleness checks.
    pub fn with_clock(
        source: Arc<dyn RecordSource>,
        store: Arc<dyn LocalStore>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let bus = ChangeBus::new(config.debounce());
        let settings = config.cache_settings();

        let mut investments = Collection::new(source.clone());
        if let Some(user_id) = &config.user_id {
            investments = investments.with_equality("userId", user_id.as_str());
        }

        let caches = Self {
            expenses: DomainCache::new(
                Collection::new(source.clone()),
                store.clone(),
                bus.clone(),
                clock.clone(),
                settings,
            ),
            goals: DomainCache::new(
                Collection::new(source),
                store.clone(),
                bus.clone(),
                clock.clone(),
                settings,
            ),
            investments: DomainCache::new(investments, store.clone(), bus.clone(), clock, settings),
            bus,
            store,
        };

        caches.attach();
        caches
    }

    /// Builds the caches over a SQLite local store at `config.local_store_path`.
    #[cfg(feature = "sqlite")]
    pub async fn open(source: Arc<dyn RecordSource>, config: &Config) -> Result<Self> {
        let store = crate::store::SqliteStore::new(&config.local_store_path).await?;
        Ok(Self::new(source, Arc::new(store), config))
    }

    /// Initializes all three caches concurrently.
    pub async fn initialize_all(&self) -> InitReport {
        let (expenses, goals, investments) = tokio::join!(
            self.expenses.initialize(),
            self.goals.initialize(),
            self.investments.initialize(),
        );

        let report = InitReport {
            expenses,
            goals,
            investments,
        };
        if report.is_ok() {
            tracing::info!("All caches initialized");
        } else {
            tracing::warn!(?report, "Some caches failed to initialize");
        }
        report
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn expenses(&self) -> &DomainCache<Expense> {
        &self.expenses
    }

    pub fn goals(&self) -> &DomainCache<Goal> {
        &self.goals
    }

    pub fn investments(&self) -> &DomainCache<Investment> {
        &self.investments
    }

    /// The recurring-investment backfill job bound to these caches.
    pub fn backfill(&self) -> BackfillJob {
        BackfillJob::new(self.investments.clone(), self.store.clone())
    }

    /// Runs the recurring-investment backfill unless it already ran `today`.
    pub async fn run_daily_backfill(&self, today: NaiveDate) -> Result<BackfillOutcome> {
        self.backfill().run_once_per_day(today).await
    }

    /// Subscribes every cache to the bus. Called on construction; only needed
    /// again after [`detach`](Self::detach).
    pub fn attach(&self) {
        self.expenses.attach();
        self.goals.attach();
        self.investments.attach();
    }

    /// Unsubscribes every cache from the bus. Reads keep working; change
    /// notifications stop triggering refreshes.
    pub fn detach(&self) {
        self.expenses.detach();
        self.goals.detach();
        self.investments.detach();
    }
}

impl std::fmt::Debug for FinanceCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinanceCaches")
            .field("bus", &self.bus)
            .field("expenses", &self.expenses)
            .field("goals", &self.goals)
            .field("investments", &self.investments)
            .finish()
    }
}
