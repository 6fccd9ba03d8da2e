//! Store Context
//!
//! Scopes a store to a region of code, the way a provider component scopes a
//! store to a subtree. Code inside the region reaches the store through
//! `StoreContext::current` or `StoreContext::dispatch` instead of receiving
//! the handle explicitly.
//!
//! # Implementation
//!
//! We use a thread-local stack of provided stores. `enter` pushes a clone of
//! the store handle and returns a guard; dropping the guard pops it. Lookups
//! walk the stack from the innermost entry outwards and return the first
//! store of the requested reducer type, so nested providers shadow outer ones.
//!
//! The context never owns the store's lifetime: the handle on the stack is a
//! clone, and the caller keeps its own.

use std::any::Any;
use std::cell::RefCell;

use super::reducer::Reducer;
use super::store::{DispatchOutcome, Store};

thread_local! {
    static STORE_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

/// An entry in the provider stack.
struct ContextEntry {
    store_id: u64,
    /// A `Store<R>` for some reducer `R`.
    store: Box<dyn Any>,
}

/// Guard that pops the provided store when dropped.
///
/// This keeps the stack balanced even if the scoped code panics.
pub struct StoreContext {
    store_id: u64,
}

impl StoreContext {
    /// Provide `store` until the returned guard is dropped.
    pub fn enter<R: Reducer>(store: &Store<R>) -> Self {
        STORE_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                store_id: store.id(),
                store: Box::new(store.clone()),
            });
        });

        Self {
            store_id: store.id(),
        }
    }

    /// Check whether any store is provided on this thread.
    pub fn is_active() -> bool {
        STORE_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Number of nested providers on this thread.
    pub fn depth() -> usize {
        STORE_STACK.with(|stack| stack.borrow().len())
    }

    /// The innermost provided store driven by reducer `R`, if any.
    pub fn current<R: Reducer>() -> Option<Store<R>> {
        STORE_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .rev()
                .find_map(|entry| entry.store.downcast_ref::<Store<R>>())
                .cloned()
        })
    }

    /// Dispatch to the innermost provided store driven by reducer `R`.
    ///
    /// # Panics
    ///
    /// Panics when no such store is provided. That is a wiring bug, not a
    /// runtime condition, and it should surface during development.
    pub fn dispatch<R: Reducer>(action: R::Action) -> Result<DispatchOutcome, R::Error> {
        // The borrow on the stack is released before dispatching so that
        // subscribers may enter nested contexts.
        match Self::current::<R>() {
            Some(store) => store.dispatch(action),
            None => panic!(
                "dispatch of `{:?}` outside of any provided `{}` store",
                action,
                std::any::type_name::<R>()
            ),
        }
    }
}

impl Drop for StoreContext {
    fn drop(&mut self) {
        STORE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.store_id, self.store_id,
                    "StoreContext mismatch: expected store {}, got {}",
                    self.store_id, entry.store_id
                );
            }
        });
    }
}
