//! Store Implementation
//!
//! A Store owns the current state snapshot of one scope and is the only way
//! to change it.
//!
//! # How Stores Work
//!
//! 1. `dispatch` runs the reducer against the current snapshot while holding
//!    the state write lock, so two dispatches never interleave.
//!
//! 2. If the reducer returned a new snapshot it replaces the old one in a
//!    single pointer swap. Readers see either the old or the new `Arc`.
//!
//! 3. The action log is appended before the write lock is released, so log
//!    order is commit order.
//!
//! 4. Subscribers are notified synchronously after the lock is released, so
//!    a subscriber may read the store or dispatch again. Each commit carries
//!    a sequence number and deliveries are serialized: when dispatches race,
//!    a snapshot older than one already delivered is skipped, never
//!    delivered late. A subscriber that dispatches from inside a
//!    notification sees the nested snapshot delivered first.
//!
//! # Thread Safety
//!
//! Clones of a store share the same state, subscribers and log. The handle is
//! `Send + Sync` and can be passed to other tasks.

use std::cell::Cell;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, trace, warn};

use super::log::{ActionLog, ActionLogEntry, LogOutcome};
use super::reducer::{Action, Reducer};
use super::subscriber::{SubscriberId, SubscriberList};
use crate::config::StoreConfig;

/// Counter for generating unique store IDs.
static STORE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_store_id() -> u64 {
    STORE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A new snapshot was committed and subscribers were notified.
    Applied,
    /// The reducer kept the current snapshot. Nobody was notified.
    Unchanged,
}

impl From<DispatchOutcome> for LogOutcome {
    fn from(outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Applied => LogOutcome::Applied,
            DispatchOutcome::Unchanged => LogOutcome::Unchanged,
        }
    }
}

/// Holder of one state snapshot plus the dispatch/subscribe contract.
///
/// # Example
///
/// ```rust,ignore
/// let store = Store::new(DirectoryReducer, DirectoryState::default());
///
/// store.subscribe(|state| println!("{} records", state.records.len()));
/// store.dispatch(DirectoryAction::ToggleViewMode)?;
/// ```
pub struct Store<R: Reducer> {
    id: u64,
    reducer: Arc<R>,
    state: Arc<RwLock<Arc<R::State>>>,
    subscribers: Arc<SubscriberList<Arc<R::State>>>,
    log: Arc<Mutex<ActionLog>>,
    /// Sequence number of the last committed snapshot. Written under the
    /// state write lock.
    commits: Arc<AtomicU64>,
    /// Sequence number of the last delivered snapshot. Reentrant so that a
    /// subscriber can dispatch again.
    delivered: Arc<ReentrantMutex<Cell<u64>>>,
}

impl<R: Reducer> Store<R> {
    /// Create a store with the default configuration.
    pub fn new(reducer: R, initial: R::State) -> Self {
        Self::with_config(reducer, initial, &StoreConfig::default())
    }

    pub fn with_config(reducer: R, initial: R::State, config: &StoreConfig) -> Self {
        Self {
            id: next_store_id(),
            reducer: Arc::new(reducer),
            state: Arc::new(RwLock::new(Arc::new(initial))),
            subscribers: Arc::new(SubscriberList::new()),
            log: Arc::new(Mutex::new(ActionLog::with_capacity(
                config.action_log_capacity,
            ))),
            commits: Arc::new(AtomicU64::new(0)),
            delivered: Arc::new(ReentrantMutex::new(Cell::new(0))),
        }
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<R::State> {
        Arc::clone(&self.state.read())
    }

    /// Apply an action.
    ///
    /// Rejections leave state untouched and come back as `Err`; they are
    /// recorded in the action log like any other dispatch.
    pub fn dispatch(&self, action: R::Action) -> Result<DispatchOutcome, R::Error> {
        if !action.is_recognized() {
            warn!(store = self.id, kind = action.kind(), "unrecognized action ignored");
        }

        let transition = {
            let mut current = self.state.write();
            let transition = match self.reducer.reduce(&current, &action) {
                Ok(next) if Arc::ptr_eq(&next, &current) => Ok(None),
                Ok(next) => {
                    *current = Arc::clone(&next);
                    let sequence = self.commits.fetch_add(1, Ordering::Relaxed) + 1;
                    Ok(Some((sequence, next)))
                }
                Err(err) => Err(err),
            };
            let outcome = match &transition {
                Ok(Some(_)) => LogOutcome::Applied,
                Ok(None) => LogOutcome::Unchanged,
                Err(_) => LogOutcome::Rejected,
            };
            self.record(&action, outcome);
            transition
        };

        match transition {
            Ok(Some((sequence, next))) => {
                debug!(store = self.id, kind = action.kind(), sequence, "transition committed");
                self.deliver(sequence, &next);
                Ok(DispatchOutcome::Applied)
            }
            Ok(None) => Ok(DispatchOutcome::Unchanged),
            Err(err) => {
                warn!(store = self.id, kind = action.kind(), error = %err, "action rejected");
                Err(err)
            }
        }
    }

    /// Notify subscribers of the snapshot committed as `sequence`, unless a
    /// later one has already gone out.
    fn deliver(&self, sequence: u64, snapshot: &Arc<R::State>) {
        let delivered = self.delivered.lock();
        if sequence <= delivered.get() {
            trace!(store = self.id, sequence, "skipping overtaken snapshot");
            return;
        }
        delivered.set(sequence);

        trace!(
            store = self.id,
            subscribers = self.subscribers.len(),
            "notifying subscribers"
        );
        self.subscribers.notify(snapshot);
    }

    /// Register a listener called with every committed snapshot.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&Arc<R::State>) + Send + Sync + 'static,
    {
        self.subscribers.add(listener)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// The retained tail of dispatched actions, oldest first.
    pub fn action_log(&self) -> Vec<ActionLogEntry> {
        self.log.lock().entries()
    }

    pub fn clear_action_log(&self) {
        self.log.lock().clear();
    }

    fn record(&self, action: &R::Action, outcome: LogOutcome) {
        self.log
            .lock()
            .record(action.kind(), action.payload(), outcome);
    }
}

impl<R: Reducer> Clone for Store<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            reducer: Arc::clone(&self.reducer),
            state: Arc::clone(&self.state),
            subscribers: Arc::clone(&self.subscribers),
            log: Arc::clone(&self.log),
            commits: Arc::clone(&self.commits),
            delivered: Arc::clone(&self.delivered),
        }
    }
}

impl<R: Reducer> Debug for Store<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FnReducer;
    use std::sync::atomic::AtomicI32;

    #[derive(Debug, Clone)]
    enum Counter {
        Add(i32),
        Noop,
        Unknown,
    }

    impl Action for Counter {
        fn kind(&self) -> &str {
            match self {
                Counter::Add(_) => "add",
                Counter::Noop => "noop",
                Counter::Unknown => "mystery",
            }
        }

        fn payload(&self) -> Option<serde_json::Value> {
            match self {
                Counter::Add(n) => Some(serde_json::json!(n)),
                _ => None,
            }
        }

        fn is_recognized(&self) -> bool {
            !matches!(self, Counter::Unknown)
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("negative increment {0}")]
    struct Negative(i32);

    fn counter_store() -> Store<impl Reducer<State = i32, Action = Counter, Error = Negative>> {
        let reducer = FnReducer::new(|state: &Arc<i32>, action: &Counter| match action {
            Counter::Add(n) if *n < 0 => Err(Negative(*n)),
            Counter::Add(n) => Ok(Arc::new(**state + n)),
            Counter::Noop | Counter::Unknown => Ok(Arc::clone(state)),
        });
        Store::new(reducer, 0)
    }

    #[test]
    fn dispatch_applies_transition() {
        let store = counter_store();
        assert_eq!(store.dispatch(Counter::Add(2)).unwrap(), DispatchOutcome::Applied);
        assert_eq!(store.dispatch(Counter::Add(3)).unwrap(), DispatchOutcome::Applied);
        assert_eq!(*store.state(), 5);
    }

    #[test]
    fn rejection_leaves_state_and_is_returned() {
        let store = counter_store();
        store.dispatch(Counter::Add(4)).unwrap();
        let before = store.state();

        let err = store.dispatch(Counter::Add(-1)).unwrap_err();
        assert_eq!(err.0, -1);
        assert!(Arc::ptr_eq(&before, &store.state()));
        assert_eq!(
            store.action_log().last().map(|e| e.outcome),
            Some(LogOutcome::Rejected)
        );
    }

    #[test]
    fn identity_transition_does_not_notify() {
        let store = counter_store();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        store.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(store.dispatch(Counter::Noop).unwrap(), DispatchOutcome::Unchanged);
        assert_eq!(store.dispatch(Counter::Unknown).unwrap(), DispatchOutcome::Unchanged);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        store.dispatch(Counter::Add(1)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribers_see_committed_snapshot() {
        let store = counter_store();
        let seen = Arc::new(AtomicI32::new(-1));
        let seen_clone = seen.clone();
        let reader = store.clone();
        store.subscribe(move |snapshot| {
            // The store already holds the snapshot being delivered.
            assert!(Arc::ptr_eq(snapshot, &reader.state()));
            seen_clone.store(**snapshot, Ordering::SeqCst);
        });

        store.dispatch(Counter::Add(9)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let store = counter_store();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let id = store.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.dispatch(Counter::Add(1)).unwrap();
        assert!(store.unsubscribe(id));
        store.dispatch(Counter::Add(1)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_may_dispatch_again() {
        let store = counter_store();
        let inner = store.clone();
        store.subscribe(move |snapshot| {
            if **snapshot == 1 {
                inner.dispatch(Counter::Add(10)).unwrap();
            }
        });

        store.dispatch(Counter::Add(1)).unwrap();
        assert_eq!(*store.state(), 11);
    }

    #[test]
    fn racing_dispatches_never_deliver_older_snapshots() {
        let store = counter_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |snapshot| sink.lock().push(**snapshot));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let store = store.clone();
                scope.spawn(move || {
                    for _ in 0..200 {
                        store.dispatch(Counter::Add(1)).unwrap();
                    }
                });
            }
        });

        let seen = seen.lock();
        assert_eq!(*store.state(), 800);
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "out of order: {seen:?}");
        assert_eq!(seen.last(), Some(&800));
        assert!(store.action_log().windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn log_records_every_dispatch_with_payload() {
        let store = counter_store();
        store.dispatch(Counter::Add(1)).unwrap();
        store.dispatch(Counter::Noop).unwrap();

        let log = store.action_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, "add");
        assert_eq!(log[0].payload, Some(serde_json::json!(1)));
        assert_eq!(log[1].outcome, LogOutcome::Unchanged);

        store.clear_action_log();
        assert!(store.action_log().is_empty());
    }

    #[test]
    fn clone_shares_state() {
        let store1 = counter_store();
        let store2 = store1.clone();

        store1.dispatch(Counter::Add(42)).unwrap();
        assert_eq!(*store2.state(), 42);
        assert_eq!(store1.id(), store2.id());
    }
}
