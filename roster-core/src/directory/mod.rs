//! Directory Domain
//!
//! The people directory built on the generic layers: a reducer-driven
//! [`DirectoryStore`] for UI state, a memoized [`DirectoryView`] of the
//! records matching the current filter, and a [`DirectoryClient`] that
//! caches backend reads and applies writes optimistically.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = DirectoryStore::new(DirectoryReducer, DirectoryState::new(records));
//! let view = DirectoryView::new();
//!
//! store.dispatch(DirectoryAction::SetFilterText("eng".into()))?;
//! for record in view.visible(&store.state(), Some(SortKey::Name)).iter() {
//!     println!("{} ({})", record.name, record.role);
//! }
//! ```

pub mod action;
mod client;
mod error;
mod record;
mod state;
mod view;

pub use action::{ActionEnvelope, DirectoryAction};
pub use client::{DirectoryClient, QueryKey};
pub use error::DirectoryError;
pub use record::{NewRecord, Record, RecordId, RecordPatch, SortKey};
pub use state::{DirectoryReducer, DirectoryState, ViewMode};
pub use view::DirectoryView;

use crate::store::Store;

/// A store holding [`DirectoryState`].
pub type DirectoryStore = Store<DirectoryReducer>;
