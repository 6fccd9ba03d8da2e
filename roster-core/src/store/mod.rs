//! Reducer Store
//!
//! This module implements the state container: a store holding one immutable
//! snapshot, reducers that compute the next snapshot from an action, the
//! subscriber list notified on each committed transition, and the bounded
//! action log.
//!
//! # Concepts
//!
//! ## Store
//!
//! A Store owns the current snapshot of a scope. The only way to change it is
//! `dispatch`, which runs the reducer and swaps the snapshot atomically.
//!
//! ## Reducer
//!
//! A Reducer is a pure function `(state, action) -> state`. Returning the
//! current `Arc` unchanged is an identity transition; returning an error
//! rejects the action.
//!
//! ## Subscribers
//!
//! Listeners registered with `subscribe` are called synchronously with each
//! committed snapshot, after the store's locks are released.
//!
//! ## Context
//!
//! `StoreContext` scopes a store to a region of code on the current thread,
//! mirroring a provider boundary. Dispatching through the context with no
//! store provided panics.

mod context;
mod log;
mod reducer;
#[allow(clippy::module_inception)]
mod store;
mod subscriber;

pub use context::StoreContext;
pub use log::{ActionLog, ActionLogEntry, LogOutcome, DEFAULT_LOG_CAPACITY};
pub use reducer::{Action, FnReducer, Reducer};
pub use store::{DispatchOutcome, Store};
pub use subscriber::{Subscriber, SubscriberId, SubscriberList};
