//! Async Data Cache
//!
//! Keyed entries holding the result of a backend query together with its
//! loading and error flags. Consumers ask for data with
//! [`QueryCache::ensure`], mark data out of date with
//! [`QueryCache::invalidate`], and apply optimistic edits with
//! [`QueryCache::mutate`] ahead of the backend's confirmation.
//!
//! Backend failures are data, not control flow: they land in
//! [`CacheEntry::error`] and the caller decides when to retry.

mod entry;
mod query;

pub use entry::{CacheEntry, EntryStatus, FetchError};
pub use query::{CacheKey, QueryCache};
