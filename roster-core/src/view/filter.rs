//! Filtering projections.
//!
//! `project` selects the items whose searchable fields contain a query as a
//! case-insensitive substring. It never touches its input and preserves the
//! input order. `FilteredView` memoizes it on the identity of the collection
//! and the query text.

use std::cmp::Ordering;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use super::memo::{Identity, Memo};

/// Items that can be matched against a free-text query.
pub trait Searchable {
    /// The fields a query is matched against.
    fn search_fields(&self) -> SmallVec<[&str; 4]>;
}

/// Check whether any searchable field of `item` contains `needle`.
///
/// `needle` must already be lowercase.
pub fn matches<T: Searchable>(item: &T, needle: &str) -> bool {
    item.search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Items of `items` matching `query`, in their original order.
///
/// An empty query returns `items` itself, not a copy.
pub fn project<T>(items: &Arc<Vec<T>>, query: &str) -> Arc<Vec<T>>
where
    T: Searchable + Clone,
{
    if query.is_empty() {
        return Arc::clone(items);
    }

    let needle = query.to_lowercase();
    let selected: Vec<T> = items
        .iter()
        .filter(|item| matches(*item, &needle))
        .cloned()
        .collect();

    trace!(total = items.len(), selected = selected.len(), "projection computed");
    Arc::new(selected)
}

/// Like [`project`], then stably sorted with `compare`.
pub fn project_sorted<T, F>(items: &Arc<Vec<T>>, query: &str, compare: F) -> Arc<Vec<T>>
where
    T: Searchable + Clone,
    F: Fn(&T, &T) -> Ordering,
{
    let mut selected = project(items, query).as_ref().clone();
    selected.sort_by(compare);
    Arc::new(selected)
}

/// A memoized [`project`].
///
/// Recomputes only when handed a different collection `Arc` or a different
/// query; unrelated reads get the previous result back.
pub struct FilteredView<T>
where
    T: Searchable + Clone + Send + Sync + 'static,
{
    memo: Memo<(Identity<Vec<T>>, String), Arc<Vec<T>>>,
}

impl<T> FilteredView<T>
where
    T: Searchable + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            memo: Memo::new(|(items, query): &(Identity<Vec<T>>, String)| {
                project(items, query)
            }),
        }
    }

    pub fn get(&self, items: &Arc<Vec<T>>, query: &str) -> Arc<Vec<T>> {
        self.memo.get((Identity::new(items), query.to_string()))
    }

    /// Number of times the projection has actually run.
    pub fn compute_count(&self) -> u64 {
        self.memo.compute_count()
    }
}

impl<T> Default for FilteredView<T>
where
    T: Searchable + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FilteredView<T>
where
    T: Searchable + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            memo: self.memo.clone(),
        }
    }
}
