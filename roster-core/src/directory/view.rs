//! The visible slice of the directory.

use std::sync::Arc;

use super::record::{Record, SortKey};
use super::state::DirectoryState;
use crate::view::{project, project_sorted, Identity, Memo};

type VisibleInputs = (Identity<Vec<Record>>, String, Option<SortKey>);

/// Records matching the state's filter text, optionally sorted.
///
/// Memoized on the identity of `records`, the filter text and the sort key,
/// so selecting a record or toggling the view mode does not recompute.
#[derive(Clone, Debug)]
pub struct DirectoryView {
    memo: Memo<VisibleInputs, Arc<Vec<Record>>>,
}

impl DirectoryView {
    pub fn new() -> Self {
        Self {
            memo: Memo::new(|(records, query, sort): &VisibleInputs| match sort {
                Some(key) => project_sorted(records, query, |a, b| key.compare(a, b)),
                None => project(records, query),
            }),
        }
    }

    /// Records visible in `state`, in insertion order unless `sort` is given.
    pub fn visible(&self, state: &DirectoryState, sort: Option<SortKey>) -> Arc<Vec<Record>> {
        self.memo.get((
            Identity::new(&state.records),
            state.filter_text.clone(),
            sort,
        ))
    }

    pub fn compute_count(&self) -> u64 {
        self.memo.compute_count()
    }
}

impl Default for DirectoryView {
    fn default() -> Self {
        Self::new()
    }
}
