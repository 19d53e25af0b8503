use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Default debounce window between the last publish and the notification.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Identity of a registered callback, used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Debounced publish/subscribe registry with no event payload.
///
/// `publish` never runs callbacks inline. It (re)starts a single shared
/// timer; when the timer fires, every callback registered at that moment is
/// invoked once, in registration order. A callback that panics is logged and
/// does not prevent the others from running.
///
/// Cloning is cheap and clones share the same registry.
#[derive(Clone)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    debounce: Duration,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
    rounds: AtomicU64,
}

impl ChangeBus {
    /// Creates a bus with the given debounce window.
    pub fn new(debounce: Duration) -> Self {
        Self {
            inner: Arc::new(BusInner {
                debounce,
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                timer: Mutex::new(None),
                rounds: AtomicU64::new(0),
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Registers a callback and returns its identity.
    pub fn register<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        tracing::trace!(subscription = id.0, "Registered change subscriber");
        id
    }

    /// Unregisters a callback. Returns false if it was not registered.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        let removed = subscribers.len() != before;
        if removed {
            tracing::trace!(subscription = id.0, "Unregistered change subscriber");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of notification rounds fired so far.
    pub fn rounds(&self) -> u64 {
        self.inner.rounds.load(Ordering::Acquire)
    }

    /// Announces a change. Starts or resets the debounce timer.
    ///
    /// Must be called from within a tokio runtime; outside one the
    /// announcement is dropped with a warning.
    pub fn publish(&self) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("Change published outside a tokio runtime, dropping notification");
            return;
        };

        let weak: Weak<BusInner> = Arc::downgrade(&self.inner);
        let debounce = self.inner.debounce;

        let mut timer = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = timer.take() {
            pending.abort();
        }
        *timer = Some(handle.spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(inner) = weak.upgrade() {
                inner.notify_all();
            }
        }));
    }
}

impl BusInner {
    fn notify_all(&self) {
        // Snapshot so callbacks may register/unregister without deadlocking.
        let subscribers: Vec<(SubscriptionId, Callback)> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let round = self.rounds.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(
            round,
            subscribers = subscribers.len(),
            "Dispatching change notification"
        );

        for (id, callback) in subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                tracing::warn!(subscription = id.0, "Change subscriber panicked");
            }
        }
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("debounce", &self.inner.debounce)
            .field("subscribers", &self.subscriber_count())
            .field("rounds", &self.rounds())
            .finish()
    }
}
