//! Cache entries and fetch errors.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// A failed fetch, as stored in a cache entry.
///
/// Cheap to clone so entries can be handed out by value. The original error
/// is kept and can be recovered with [`FetchError::downcast_ref`].
#[derive(Clone)]
pub struct FetchError(Arc<dyn Error + Send + Sync>);

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);

impl FetchError {
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// An error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FetchError").field(&self.0).finish()
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

/// Coarse status of an entry, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Never fetched and nothing cached.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last fetch failed.
    Error,
    /// Holding data from a fetch, a confirmation or an optimistic update.
    Success,
}

/// Snapshot of one keyed query.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Last known data. Survives failed refetches.
    pub data: Option<T>,
    pub is_loading: bool,
    /// Error from the most recent settlement, cleared by the next success.
    pub error: Option<FetchError>,
    /// When data last arrived from the backend.
    pub last_fetched_at: Option<Instant>,
    /// `data` is an optimistic guess that the backend has not confirmed.
    pub pending: bool,
    /// Invalidated since the last successful fetch.
    pub stale: bool,
}

impl<T> CacheEntry<T> {
    pub fn status(&self) -> EntryStatus {
        if self.is_loading {
            EntryStatus::Loading
        } else if self.error.is_some() {
            EntryStatus::Error
        } else if self.data.is_some() {
            EntryStatus::Success
        } else {
            EntryStatus::Idle
        }
    }

    /// Whether `ensure` may serve this entry without fetching.
    pub fn is_fresh(&self, stale_after: Option<Duration>) -> bool {
        if self.is_loading || self.stale || self.error.is_some() || self.data.is_none() {
            return false;
        }
        match (self.last_fetched_at, stale_after) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(at), Some(max_age)) => at.elapsed() < max_age,
        }
    }
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
            last_fetched_at: None,
            pending: false,
            stale: false,
        }
    }
}
