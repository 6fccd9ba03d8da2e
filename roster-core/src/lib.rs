//! Roster Core
//!
//! This crate provides the state layer for the Roster people directory.
//! It implements:
//!
//! - A reducer store holding immutable state snapshots
//! - Memoized derived views over store state
//! - An async query cache with single-flight fetching and optimistic updates
//! - The directory domain on top of all three
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `store`: Store, reducers, subscribers, action log and scoped provision
//! - `view`: Memoization and filtering projections
//! - `cache`: Keyed query cache and its entries
//! - `backend`: The record service the directory talks to
//! - `directory`: Records, actions, reducer, visible view and cached client
//! - `config`: Settings for stores and caches
//!
//! # Example
//!
//! ```rust,ignore
//! use roster_core::directory::{DirectoryAction, DirectoryReducer, DirectoryState, DirectoryStore};
//!
//! let store = DirectoryStore::new(DirectoryReducer, DirectoryState::default());
//!
//! store.subscribe(|state| println!("filter: {:?}", state.filter_text));
//! store.dispatch(DirectoryAction::SetFilterText("eng".into()))?;
//! // prints: filter: "eng"
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod directory;
pub mod store;
pub mod view;

pub use config::{ConfigError, RosterConfig};
