//! Cached access to the record backend.
//!
//! Reads go through [`QueryCache`]s, so concurrent screens asking for the
//! same list share one request. Writes are optimistic: the cached data is
//! updated before the backend answers, then either confirmed or rolled back.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use super::record::{NewRecord, Record, RecordId, RecordPatch};
use crate::backend::{BackendError, RecordBackend};
use crate::cache::{CacheEntry, QueryCache};
use crate::config::CacheConfig;

/// Identity of a directory query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// The whole record collection.
    List,
    /// One record.
    Item(RecordId),
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::List => f.write_str("list"),
            QueryKey::Item(id) => write!(f, "item:{id}"),
        }
    }
}

/// Directory data access on top of a [`RecordBackend`].
pub struct DirectoryClient<B: RecordBackend> {
    backend: Arc<B>,
    lists: QueryCache<QueryKey, Vec<Record>>,
    items: QueryCache<QueryKey, Record>,
}

impl<B: RecordBackend> DirectoryClient<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &CacheConfig::default())
    }

    pub fn with_config(backend: B, config: &CacheConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            lists: QueryCache::with_config(config),
            items: QueryCache::with_config(config),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Cache holding [`QueryKey::List`].
    pub fn lists(&self) -> &QueryCache<QueryKey, Vec<Record>> {
        &self.lists
    }

    /// Cache holding [`QueryKey::Item`] entries.
    pub fn items(&self) -> &QueryCache<QueryKey, Record> {
        &self.items
    }

    /// The record collection, fetched unless the cached copy is fresh.
    pub async fn list(&self) -> CacheEntry<Vec<Record>> {
        self.lists.ensure(QueryKey::List, || self.backend.list()).await
    }

    pub async fn record(&self, id: RecordId) -> CacheEntry<Record> {
        self.items
            .ensure(QueryKey::Item(id), || self.backend.get(id))
            .await
    }

    /// Refetch the collection regardless of freshness.
    pub async fn refresh(&self) -> CacheEntry<Vec<Record>> {
        self.lists.invalidate(&QueryKey::List);
        self.list().await
    }

    /// Mark every cached query stale.
    pub fn invalidate_all(&self) -> usize {
        self.lists.invalidate_where(|_| true) + self.items.invalidate_where(|_| true)
    }

    /// Create a record.
    ///
    /// A provisional copy (id [`RecordId::PROVISIONAL`]) is appended to the
    /// cached list at once. On success it is swapped for the backend's record
    /// and the list is marked stale; on failure the list is rolled back.
    pub async fn create(&self, new: NewRecord) -> Result<Record, BackendError> {
        let provisional = new.clone().into_record(RecordId::PROVISIONAL);
        let previous = self.lists.mutate(QueryKey::List, |current| {
            let mut next = current.cloned().unwrap_or_default();
            next.push(provisional);
            next
        });

        match self.backend.create(new).await {
            Ok(record) => {
                info!(id = %record.id, "record created");
                self.lists.mutate_if_present(&QueryKey::List, |current| {
                    swap_provisional(current, &record)
                });
                self.lists.invalidate(&QueryKey::List);
                self.items.confirm(QueryKey::Item(record.id), record.clone());
                Ok(record)
            }
            Err(error) => {
                warn!(error = %error, "create failed, rolling back");
                self.lists.restore(QueryKey::List, previous);
                Err(error)
            }
        }
    }

    /// Apply `patch` to record `id`, optimistically in both caches.
    pub async fn update(&self, id: RecordId, patch: RecordPatch) -> Result<Record, BackendError> {
        let item_key = QueryKey::Item(id);
        let previous_item = self.items.mutate_if_present(&item_key, |record| patch.apply(record));
        let previous_list = self.lists.mutate_if_present(&QueryKey::List, |records| {
            records
                .iter()
                .map(|r| if r.id == id { patch.apply(r) } else { r.clone() })
                .collect()
        });

        match self.backend.update(id, patch).await {
            Ok(record) => {
                info!(%id, "record updated");
                self.items.confirm(item_key, record.clone());
                self.lists.invalidate(&QueryKey::List);
                Ok(record)
            }
            Err(error) => {
                warn!(%id, error = %error, "update failed, rolling back");
                if previous_item.is_some() {
                    self.items.restore(item_key, previous_item);
                }
                if previous_list.is_some() {
                    self.lists.restore(QueryKey::List, previous_list);
                }
                Err(error)
            }
        }
    }

    /// Delete record `id`, dropping it from the cached list at once.
    pub async fn delete(&self, id: RecordId) -> Result<(), BackendError> {
        let previous_list = self.lists.mutate_if_present(&QueryKey::List, |records| {
            records.iter().filter(|r| r.id != id).cloned().collect()
        });

        match self.backend.delete(id).await {
            Ok(()) => {
                info!(%id, "record deleted");
                self.items.remove(&QueryKey::Item(id));
                self.lists.invalidate(&QueryKey::List);
                Ok(())
            }
            Err(error) => {
                warn!(%id, error = %error, "delete failed, rolling back");
                if previous_list.is_some() {
                    self.lists.restore(QueryKey::List, previous_list);
                }
                Err(error)
            }
        }
    }
}

/// Replace the first provisional record in `records` with `confirmed`.
fn swap_provisional(records: &[Record], confirmed: &Record) -> Vec<Record> {
    let mut next = records.to_vec();
    match next.iter_mut().find(|r| r.id.is_provisional()) {
        Some(slot) => *slot = confirmed.clone(),
        None => next.push(confirmed.clone()),
    }
    next
}

impl<B: RecordBackend> Clone for DirectoryClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            lists: self.lists.clone(),
            items: self.items.clone(),
        }
    }
}

impl<B: RecordBackend> fmt::Debug for DirectoryClient<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("lists", &self.lists)
            .field("items", &self.items)
            .finish()
    }
}
