//! Derived Views
//!
//! Read-only projections of store state. A projection is a pure function of
//! a snapshot plus UI-only parameters such as filter text; it never writes
//! back to the store.
//!
//! Projections are memoized: a [`Memo`] caches its last result together with
//! the inputs it came from, and recomputes only when handed different inputs.
//! Collections are compared by `Arc` identity ([`Identity`]), which is cheap
//! and matches the store's copy-on-write snapshots: a transition that does
//! not touch a collection keeps the same `Arc`.

mod filter;
mod memo;

pub use filter::{matches, project, project_sorted, FilteredView, Searchable};
pub use memo::{Identity, Memo, MemoState};
