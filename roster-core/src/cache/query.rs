//! Query Cache Implementation
//!
//! A keyed fetch-and-cache layer shared by every consumer of the same data.
//!
//! # How Ensure Works
//!
//! 1. A fresh entry is returned immediately; the fetcher is not called.
//!
//! 2. Otherwise the first caller becomes the *leader* for the key: it marks
//!    the entry loading, bumps the key's generation and runs its fetcher.
//!
//! 3. Callers arriving while the leader is in flight become *followers*.
//!    They wait on the slot's `watch` channel and return the entry the leader
//!    settled, so one fetch serves all of them.
//!
//! 4. `invalidate` and `confirm` bump the key's generation and drop the
//!    channel, so followers of an overtaken fetch wake at once and start over
//!    instead of waiting for a response nobody will use.
//!
//! 5. A leader whose generation is still current settles the entry. An
//!    overtaken leader keeps its response only if nothing newer has settled
//!    and no newer fetch is running; the entry then stays stale. Otherwise it
//!    hands back the newer entry, or joins the newer fetch.
//!
//! 6. If the leader is dropped mid-flight the entry leaves the loading state
//!    and the followers wake up; one of them takes over with its own fetcher.
//!
//! # Failure Semantics
//!
//! A failed fetch is recorded in the entry's `error` field and any previous
//! `data` is kept. `ensure` never returns an error of its own.
//!
//! # Thread Safety
//!
//! Slots live in a `DashMap`. No slot guard is ever held across an `.await`,
//! and subscribers are notified after guards are released.

use std::fmt::{self, Debug};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::entry::{CacheEntry, FetchError};
use crate::config::CacheConfig;
use crate::store::{SubscriberId, SubscriberList};

/// Bounds required of cache keys.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<K> CacheKey for K where K: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Per-key bookkeeping.
struct Slot<T> {
    entry: CacheEntry<T>,

    /// Bumped whenever an in-flight response must no longer be applied.
    generation: u64,

    /// Generation at which the entry last settled.
    settled: u64,

    /// Present while a leader is fetching. Followers subscribe and wake when
    /// it is dropped, either by the leader settling or by an overtake.
    inflight: Option<watch::Sender<()>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            entry: CacheEntry::default(),
            generation: 0,
            settled: 0,
            inflight: None,
        }
    }
}

enum Step<T> {
    Hit(CacheEntry<T>),
    Follow(u64, watch::Receiver<()>),
    Lead(LeaderGuard),
}

/// Held by the leader while it fetches.
///
/// Dropping it without settling (the leader's future was cancelled) clears
/// the loading flag and the slot's sender, which wakes followers.
struct LeaderGuard {
    clear: Option<Box<dyn FnOnce() + Send>>,
    generation: u64,
}

impl LeaderGuard {
    fn disarm(mut self) {
        self.clear = None;
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if let Some(clear) = self.clear.take() {
            clear();
        }
    }
}

/// Fetch-and-cache layer keyed by query identity.
///
/// Cloning the cache yields another handle to the same entries.
///
/// # Example
///
/// ```rust,ignore
/// let cache: QueryCache<QueryKey, Vec<Record>> = QueryCache::new();
///
/// let entry = cache.ensure(QueryKey::List, || backend.list()).await;
/// if let Some(error) = &entry.error {
///     // render an inline message with a retry button
/// }
/// ```
pub struct QueryCache<K: CacheKey, T: Clone + Send + Sync + 'static> {
    slots: Arc<DashMap<K, Slot<T>>>,
    subscribers: Arc<SubscriberList<K>>,
    stale_after: Option<Duration>,
}

impl<K, T> QueryCache<K, T>
where
    K: CacheKey,
    T: Clone + Send + Sync + 'static,
{
    /// Create a cache whose entries stay fresh until invalidated.
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    pub fn with_config(config: &CacheConfig) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            subscribers: Arc::new(SubscriberList::new()),
            stale_after: config.stale_after(),
        }
    }

    /// Return the entry for `key`, fetching it first unless it is fresh.
    ///
    /// At most one fetch per key is in flight; concurrent callers share it.
    pub async fn ensure<F, Fut, E>(&self, key: K, fetcher: F) -> CacheEntry<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut fetcher = Some(fetcher);

        loop {
            match self.step(&key) {
                Step::Hit(entry) => {
                    trace!(key = ?key, "cache hit");
                    return entry;
                }
                Step::Follow(generation, mut rx) => {
                    trace!(key = ?key, generation, "joining in-flight fetch");
                    // Resolves once the slot's sender is dropped.
                    let _ = rx.changed().await;

                    if let Some(slot) = self.slots.get(&key) {
                        if slot.settled == generation {
                            return slot.entry.clone();
                        }
                    }
                    // The fetch we waited on was cancelled or overtaken.
                }
                Step::Lead(guard) => {
                    // The fetcher is spent if we already led and were overtaken
                    // by a fetch that has since been cancelled.
                    let Some(fetch) = fetcher.take() else {
                        return self.get(&key).unwrap_or_default();
                    };
                    if let Some(entry) = self.lead(&key, guard, fetch).await {
                        return entry;
                    }
                    // A newer fetch is in flight; wait for it.
                }
            }
        }
    }

    /// Decide what an `ensure` call does next, under the slot lock.
    fn step(&self, key: &K) -> Step<T> {
        let mut slot = self.slots.entry(key.clone()).or_insert_with(Slot::new);

        if slot.entry.is_fresh(self.stale_after) {
            return Step::Hit(slot.entry.clone());
        }
        if let Some(tx) = &slot.inflight {
            return Step::Follow(slot.generation, tx.subscribe());
        }

        slot.generation += 1;
        let generation = slot.generation;
        let (tx, _) = watch::channel(());
        slot.inflight = Some(tx);
        slot.entry.is_loading = true;

        let slots = Arc::clone(&self.slots);
        let key = key.clone();
        Step::Lead(LeaderGuard {
            clear: Some(Box::new(move || {
                if let Some(mut slot) = slots.get_mut(&key) {
                    if slot.generation == generation {
                        slot.inflight = None;
                        slot.entry.is_loading = false;
                    }
                }
            })),
            generation,
        })
    }

    /// Run the fetcher and settle the slot.
    ///
    /// Returns `None` when the response was overtaken and a newer fetch is
    /// still running, so the caller should follow that one.
    async fn lead<F, Fut, E>(
        &self,
        key: &K,
        guard: LeaderGuard,
        fetcher: F,
    ) -> Option<CacheEntry<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let generation = guard.generation;
        debug!(key = ?key, generation, "fetching");
        self.subscribers.notify(key);

        let outcome = fetcher().await.map_err(FetchError::new);

        let settled = match self.slots.get_mut(key) {
            Some(mut slot) => {
                let current = slot.generation == generation;
                if current || (slot.settled < generation && slot.inflight.is_none()) {
                    match outcome {
                        Ok(data) => {
                            slot.entry.data = Some(data);
                            slot.entry.error = None;
                            slot.entry.pending = false;
                            slot.entry.last_fetched_at = Some(Instant::now());
                            // An overtaken response may predate the invalidation.
                            slot.entry.stale = !current;
                        }
                        Err(error) => {
                            warn!(key = ?key, error = %error, "fetch failed");
                            slot.entry.error = Some(error);
                        }
                    }
                    if current {
                        // Dropping the sender wakes followers.
                        slot.inflight = None;
                        slot.entry.is_loading = false;
                    } else {
                        debug!(key = ?key, generation, current = slot.generation, "keeping overtaken response as stale");
                    }
                    slot.settled = generation;
                    Some((slot.entry.clone(), true))
                } else if slot.inflight.is_some() {
                    debug!(key = ?key, generation, current = slot.generation, "following newer fetch");
                    None
                } else {
                    debug!(key = ?key, generation, current = slot.generation, "discarding superseded response");
                    Some((slot.entry.clone(), false))
                }
            }
            None => {
                debug!(key = ?key, "entry removed while fetching");
                let mut entry = CacheEntry::default();
                match outcome {
                    Ok(data) => entry.data = Some(data),
                    Err(error) => entry.error = Some(error),
                }
                Some((entry, false))
            }
        };

        guard.disarm();

        let (entry, applied) = settled?;
        if applied {
            self.subscribers.notify(key);
        }
        Some(entry)
    }

    /// Mark `key` stale so the next `ensure` fetches again.
    ///
    /// Does not fetch by itself. Callers waiting on a fetch already in flight
    /// for `key` wake and start over. That fetch's response can still fill
    /// the entry if nothing newer arrives first, but never makes it fresh.
    /// Returns `false` if nothing was cached under `key`.
    pub fn invalidate(&self, key: &K) -> bool {
        let found = match self.slots.get_mut(key) {
            Some(mut slot) => {
                slot.entry.stale = true;
                slot.generation += 1;
                // Dropping the sender wakes followers.
                if slot.inflight.take().is_some() {
                    slot.entry.is_loading = false;
                }
                true
            }
            None => false,
        };

        if found {
            debug!(key = ?key, "invalidated");
            self.subscribers.notify(key);
        }
        found
    }

    /// Invalidate every key for which `predicate` holds.
    pub fn invalidate_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let keys: Vec<K> = self
            .slots
            .iter()
            .filter(|slot| predicate(slot.key()))
            .map(|slot| slot.key().clone())
            .collect();

        keys.iter().filter(|key| self.invalidate(key)).count()
    }

    /// Apply an optimistic update to `key` now.
    ///
    /// The entry is tagged `pending` until a fetch or `confirm` replaces it.
    /// Returns the previous data so the caller can roll back with `confirm`
    /// or `restore`; the cache never rolls back by itself.
    ///
    /// `updater` runs on a copy of the current data with no lock held, so it
    /// may read this cache.
    pub fn mutate<F>(&self, key: K, updater: F) -> Option<T>
    where
        F: FnOnce(Option<&T>) -> T,
    {
        let current = self.slots.get(&key).and_then(|slot| slot.entry.data.clone());
        let next = updater(current.as_ref());

        let previous = {
            let mut slot = self.slots.entry(key.clone()).or_insert_with(Slot::new);
            slot.entry.pending = true;
            slot.entry.data.replace(next)
        };

        trace!(key = ?key, "optimistic update applied");
        self.subscribers.notify(&key);
        previous
    }

    /// Like [`mutate`](Self::mutate), but only when `key` already holds data.
    ///
    /// Returns the replaced data, or `None` if nothing was changed.
    pub fn mutate_if_present<F>(&self, key: &K, updater: F) -> Option<T>
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.slots.get(key)?.entry.data.clone()?;
        let next = updater(&current);

        let previous = {
            let mut slot = self.slots.get_mut(key)?;
            // Cleared while the updater ran.
            if slot.entry.data.is_none() {
                return None;
            }
            slot.entry.pending = true;
            slot.entry.data.replace(next)
        };

        trace!(key = ?key, "optimistic update applied");
        self.subscribers.notify(key);
        previous
    }

    /// Replace `key` with authoritative data from the backend.
    ///
    /// Any fetch still in flight for `key` is overtaken, and callers waiting
    /// on it get the confirmed entry.
    pub fn confirm(&self, key: K, data: T) {
        {
            let mut slot = self.slots.entry(key.clone()).or_insert_with(Slot::new);
            slot.generation += 1;
            slot.settled = slot.generation;
            slot.inflight = None;
            slot.entry = CacheEntry {
                data: Some(data),
                last_fetched_at: Some(Instant::now()),
                ..CacheEntry::default()
            };
        }

        trace!(key = ?key, "confirmed");
        self.subscribers.notify(&key);
    }

    /// Put back data saved from [`mutate`](Self::mutate) after a failed
    /// backend call, clearing the `pending` tag.
    ///
    /// Restoring `None` drops the cached data. The entry is marked stale so
    /// the next `ensure` checks with the backend again.
    pub fn restore(&self, key: K, previous: Option<T>) {
        let found = match self.slots.get_mut(&key) {
            Some(mut slot) => {
                slot.entry.data = previous;
                slot.entry.pending = false;
                slot.entry.stale = true;
                true
            }
            None => false,
        };

        if found {
            trace!(key = ?key, "optimistic update rolled back");
            self.subscribers.notify(&key);
        }
    }

    /// Current entry for `key`, without fetching.
    pub fn get(&self, key: &K) -> Option<CacheEntry<T>> {
        self.slots.get(key).map(|slot| slot.entry.clone())
    }

    /// Drop the entry for `key`. A fetch in flight settles into nothing.
    pub fn remove(&self, key: &K) -> Option<CacheEntry<T>> {
        let removed = self.slots.remove(key).map(|(_, slot)| slot.entry);
        if removed.is_some() {
            self.subscribers.notify(key);
        }
        removed
    }

    pub fn keys(&self) -> Vec<K> {
        self.slots.iter().map(|slot| slot.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Register a listener called with the key of every entry that changes.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.subscribers.add(listener)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.remove(id)
    }
}

impl<K, T> Default for QueryCache<K, T>
where
    K: CacheKey,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Clone for QueryCache<K, T>
where
    K: CacheKey,
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            subscribers: Arc::clone(&self.subscribers),
            stale_after: self.stale_after,
        }
    }
}

impl<K, T> Debug for QueryCache<K, T>
where
    K: CacheKey,
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("keys", &self.keys())
            .field("stale_after", &self.stale_after)
            .field("subscriber_count", &self.subscribers.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntryStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    #[derive(Debug, thiserror::Error)]
    #[error("backend unavailable")]
    struct Unavailable;

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> std::future::Ready<Result<u32, Unavailable>> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(value))
        }
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_fetching() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.ensure("list", counting_fetch(&calls, 1)).await;
        let second = cache.ensure("list", counting_fetch(&calls, 2)).await;

        assert_eq!(first.data, Some(1));
        assert_eq!(second.data, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.status(), EntryStatus::Success);
    }

    #[tokio::test]
    async fn failure_is_stored_and_keeps_previous_data() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.ensure("list", counting_fetch(&calls, 7)).await;
        cache.invalidate(&"list");

        let entry = cache
            .ensure("list", || async { Err::<u32, _>(Unavailable) })
            .await;

        assert_eq!(entry.data, Some(7));
        assert!(!entry.is_loading);
        assert_eq!(entry.error.as_ref().map(|e| e.to_string()).as_deref(), Some("backend unavailable"));
        assert!(entry.error.as_ref().and_then(|e| e.downcast_ref::<Unavailable>()).is_some());
    }

    #[tokio::test]
    async fn failed_entry_refetches_on_next_ensure() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.ensure("list", || async { Err::<u32, _>(Unavailable) }).await;
        let entry = cache.ensure("list", counting_fetch(&calls, 3)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(entry.data, Some(3));
        assert!(entry.error.is_none());
    }

    #[tokio::test]
    async fn concurrent_ensure_is_single_flight() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let leader_calls = calls.clone();
        let leader = cache.ensure("list", move || async move {
            leader_calls.fetch_add(1, Ordering::SeqCst);
            let _ = gate.await;
            Ok::<_, Unavailable>(10)
        });
        let follower_a = cache.ensure("list", counting_fetch(&calls, 20));
        let follower_b = cache.ensure("list", counting_fetch(&calls, 30));

        let release_later = async move {
            tokio::task::yield_now().await;
            let _ = release.send(());
        };

        let (a, b, c, ()) = tokio::join!(leader, follower_a, follower_b, release_later);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.data, Some(10));
        assert_eq!(b.data, Some(10));
        assert_eq!(c.data, Some(10));
    }

    #[tokio::test]
    async fn invalidate_marks_stale_without_fetching() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert!(!cache.invalidate(&"list"));

        cache.ensure("list", counting_fetch(&calls, 1)).await;
        assert!(cache.invalidate(&"list"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let entry = cache.get(&"list").unwrap();
        assert!(entry.stale);
        assert_eq!(entry.data, Some(1));

        let entry = cache.ensure("list", counting_fetch(&calls, 2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(entry.data, Some(2));
        assert!(!entry.stale);
    }

    #[tokio::test]
    async fn response_overtaken_by_invalidate_is_discarded() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        let (release, gate) = oneshot::channel::<()>();

        let slow = cache.ensure("list", move || async move {
            let _ = gate.await;
            Ok::<_, Unavailable>(1)
        });

        let meddle = {
            let cache = cache.clone();
            async move {
                tokio::task::yield_now().await;
                cache.invalidate(&"list");
                let fresh = cache
                    .ensure("list", || async { Ok::<_, Unavailable>(2) })
                    .await;
                let _ = release.send(());
                fresh
            }
        };

        let (overtaken, fresh) = tokio::join!(slow, meddle);
        assert_eq!(fresh.data, Some(2));
        assert_eq!(overtaken.data, Some(2));
        assert_eq!(cache.get(&"list").and_then(|e| e.data), Some(2));
    }

    #[tokio::test]
    async fn response_overtaken_only_by_invalidate_is_kept_stale() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let slow = cache.ensure("list", move || async move {
            let _ = gate.await;
            Ok::<_, Unavailable>(1)
        });

        let meddle = {
            let cache = cache.clone();
            async move {
                tokio::task::yield_now().await;
                assert!(cache.invalidate(&"list"));
                let _ = release.send(());
            }
        };

        let (entry, ()) = tokio::join!(slow, meddle);
        assert_eq!(entry.status(), EntryStatus::Success);
        assert_eq!(entry.data, Some(1));
        assert!(entry.stale);

        let cached = cache.get(&"list").unwrap();
        assert_eq!(cached.data, Some(1));
        assert!(!cached.is_loading);

        // Still stale, so the next read goes back to the backend.
        let entry = cache.ensure("list", counting_fetch(&calls, 2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(entry.data, Some(2));
        assert!(!entry.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_wakes_followers_of_overtaken_fetch() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        let (release, gate) = oneshot::channel::<()>();

        let slow = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .ensure("list", move || async move {
                        let _ = gate.await;
                        Ok::<_, Unavailable>(1)
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;

        let follower = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .ensure("list", || async { Ok::<_, Unavailable>(2) })
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert!(cache.get(&"list").unwrap().is_loading);

        cache.invalidate(&"list");

        // The slow fetch is still parked on its gate.
        let entry = tokio::time::timeout(Duration::from_secs(5), follower)
            .await
            .expect("follower stayed parked behind the overtaken fetch")
            .unwrap();
        assert_eq!(entry.data, Some(2));
        assert!(!entry.stale);

        let _ = release.send(());
        let overtaken = slow.await.unwrap();
        assert_eq!(overtaken.data, Some(2));
        assert_eq!(cache.get(&"list").and_then(|e| e.data), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_wakes_followers_with_confirmed_entry() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();

        let _slow = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .ensure("list", || std::future::pending::<Result<u32, Unavailable>>())
                    .await
            }
        });
        tokio::task::yield_now().await;

        let follower = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .ensure("list", || async { Ok::<_, Unavailable>(2) })
                    .await
            }
        });
        tokio::task::yield_now().await;

        cache.confirm("list", 7);

        let entry = tokio::time::timeout(Duration::from_secs(5), follower)
            .await
            .expect("follower stayed parked behind the overtaken fetch")
            .unwrap();
        assert_eq!(entry.data, Some(7));
    }

    #[tokio::test]
    async fn cancelled_leader_releases_followers() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();

        {
            let never = cache.ensure("list", || std::future::pending::<Result<u32, Unavailable>>());
            // Poll once so the leader registers, then drop it.
            let _ = tokio::time::timeout(Duration::from_millis(1), never).await;
        }

        let entry = cache.get(&"list").unwrap();
        assert!(!entry.is_loading);

        let entry = cache.ensure("list", || async { Ok::<_, Unavailable>(5) }).await;
        assert_eq!(entry.data, Some(5));
    }

    #[tokio::test]
    async fn mutate_is_optimistic_and_confirm_wins() {
        let cache: QueryCache<&'static str, Vec<u32>> = QueryCache::new();
        cache.ensure("list", || async { Ok::<_, Unavailable>(vec![1, 2]) }).await;

        let previous = cache.mutate("list", |current| {
            let mut next = current.cloned().unwrap_or_default();
            next.push(99);
            next
        });
        assert_eq!(previous, Some(vec![1, 2]));

        let optimistic = cache.get(&"list").unwrap();
        assert!(optimistic.pending);
        assert_eq!(optimistic.data, Some(vec![1, 2, 99]));

        // The backend assigned a different value than we guessed.
        cache.confirm("list", vec![1, 2, 3]);
        let confirmed = cache.get(&"list").unwrap();
        assert!(!confirmed.pending);
        assert_eq!(confirmed.data, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn mutate_if_present_skips_empty_keys() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        assert_eq!(cache.mutate_if_present(&"count", |n| n + 1), None);
        assert!(cache.get(&"count").is_none());

        cache.confirm("count", 4);
        assert_eq!(cache.mutate_if_present(&"count", |n| n + 1), Some(4));

        let entry = cache.get(&"count").unwrap();
        assert_eq!(entry.data, Some(5));
        assert!(entry.pending);
    }

    #[tokio::test]
    async fn updaters_may_read_the_cache() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        cache.confirm("base", 10);
        cache.confirm("count", 1);

        let previous = cache.mutate("count", |n| {
            n.copied().unwrap_or(0) + cache.get(&"base").and_then(|e| e.data).unwrap_or(0)
        });
        assert_eq!(previous, Some(1));

        let previous = cache.mutate_if_present(&"count", |n| {
            n + cache.get(&"count").and_then(|e| e.data).unwrap_or(0)
        });
        assert_eq!(previous, Some(11));
        assert_eq!(cache.get(&"count").and_then(|e| e.data), Some(22));
    }

    #[tokio::test]
    async fn restore_rolls_back_and_marks_stale() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        cache.ensure("count", || async { Ok::<_, Unavailable>(1) }).await;

        let previous = cache.mutate("count", |n| n.copied().unwrap_or(0) + 1);
        cache.restore("count", previous);

        let entry = cache.get(&"count").unwrap();
        assert_eq!(entry.data, Some(1));
        assert!(!entry.pending);
        assert!(entry.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_configured_age() {
        let cache: QueryCache<&'static str, u32> = QueryCache::with_config(&CacheConfig {
            stale_after_ms: Some(1_000),
        });
        let calls = Arc::new(AtomicUsize::new(0));

        cache.ensure("list", counting_fetch(&calls, 1)).await;
        cache.ensure("list", counting_fetch(&calls, 1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        cache.ensure("list", counting_fetch(&calls, 2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn subscribers_hear_about_changes() {
        let cache: QueryCache<&'static str, u32> = QueryCache::new();
        let heard = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let heard_clone = heard.clone();
        let id = cache.subscribe(move |key| heard_clone.lock().push(*key));

        cache.ensure("a", || async { Ok::<_, Unavailable>(1) }).await;
        cache.invalidate(&"a");
        cache.remove(&"a");
        assert!(cache.unsubscribe(id));
        cache.confirm("b", 2);

        // loading + settled + invalidated + removed
        assert_eq!(*heard.lock(), vec!["a", "a", "a", "a"]);
    }

    #[tokio::test]
    async fn invalidate_where_selects_keys() {
        let cache: QueryCache<String, u32> = QueryCache::new();
        cache.confirm("list".to_string(), 1);
        cache.confirm("item:1".to_string(), 1);
        cache.confirm("item:2".to_string(), 2);

        let hit = cache.invalidate_where(|key| key.starts_with("item:"));
        assert_eq!(hit, 2);
        assert!(!cache.get(&"list".to_string()).unwrap().stale);
        assert!(cache.get(&"item:2".to_string()).unwrap().stale);
        assert_eq!(cache.len(), 3);
    }
}
