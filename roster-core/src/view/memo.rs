//! Keyed Memoization
//!
//! A `Memo` remembers the last value it computed and the inputs that value
//! came from.
//!
//! # Lookup
//!
//! `get(inputs)` returns the cached value when `inputs` equals the cached
//! inputs and the memo is clean. Otherwise it recomputes and replaces both.
//!
//! Inputs are compared with `PartialEq`. Wrap large collections in
//! [`Identity`] so that comparison is a pointer check rather than a deep walk.
//!
//! # Locking
//!
//! A memo may be shared between threads. The computation runs with the
//! memo's lock held and must not read the same memo.

use std::fmt::{self, Debug};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Source of memo ids.
static MEMO_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_memo_id() -> u64 {
    MEMO_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Whether a memo's cached value may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value matches the cached inputs.
    Clean,

    /// The memo must recompute on next access.
    Dirty,
}

/// An `Arc` compared by address instead of by value.
pub struct Identity<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Identity<T> {
    pub fn new(value: &Arc<T>) -> Self {
        Self(Arc::clone(value))
    }
}

impl<T: ?Sized> Clone for Identity<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for Identity<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for Identity<T> {}

impl<T: ?Sized> Deref for Identity<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

impl<T: ?Sized> Debug for Identity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({:p})", Arc::as_ptr(&self.0))
    }
}

struct MemoInner<K, V> {
    state: MemoState,
    cached: Option<(K, V)>,
}

/// A cached derived value that recomputes only when its inputs change.
///
/// - `K`: the inputs. Compared with the previous inputs on every access.
/// - `V`: the computed value. Returned by clone, so keep it cheap (an `Arc`).
pub struct Memo<K, V>
where
    K: PartialEq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    id: u64,

    compute: Arc<dyn Fn(&K) -> V + Send + Sync>,

    inner: Arc<Mutex<MemoInner<K, V>>>,

    /// Number of times the computation has run.
    compute_count: Arc<AtomicU64>,
}

impl<K, V> Memo<K, V>
where
    K: PartialEq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Wrap `compute`. Nothing runs until the first `get`.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        Self {
            id: next_memo_id(),
            compute: Arc::new(compute),
            inner: Arc::new(Mutex::new(MemoInner {
                state: MemoState::Dirty,
                cached: None,
            })),
            compute_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared by clones.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the value for `inputs`, recomputing only if they changed.
    pub fn get(&self, inputs: K) -> V {
        let mut inner = self.inner.lock();

        if inner.state == MemoState::Clean {
            if let Some((cached_inputs, value)) = &inner.cached {
                if *cached_inputs == inputs {
                    return value.clone();
                }
            }
        }

        let value = (self.compute)(&inputs);
        self.compute_count.fetch_add(1, Ordering::Relaxed);
        inner.cached = Some((inputs, value.clone()));
        inner.state = MemoState::Clean;
        value
    }

    /// Force a recomputation on next access.
    pub fn mark_dirty(&self) {
        self.inner.lock().state = MemoState::Dirty;
    }

    pub fn state(&self) -> MemoState {
        self.inner.lock().state
    }

    /// Whether anything has been computed yet.
    pub fn has_value(&self) -> bool {
        self.inner.lock().cached.is_some()
    }

    /// Number of times the computation has run.
    pub fn compute_count(&self) -> u64 {
        self.compute_count.load(Ordering::Relaxed)
    }
}

impl<K, V> Clone for Memo<K, V>
where
    K: PartialEq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            compute: Arc::clone(&self.compute),
            inner: Arc::clone(&self.inner),
            compute_count: Arc::clone(&self.compute_count),
        }
    }
}

impl<K, V> Debug for Memo<K, V>
where
    K: PartialEq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("compute_count", &self.compute_count())
            .finish()
    }
}
