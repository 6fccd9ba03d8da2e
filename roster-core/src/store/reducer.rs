//! Reducers and actions.
//!
//! A reducer is a pure function from the current snapshot and an action to
//! the next snapshot. Returning the very same `Arc` signals an identity
//! transition; returning `Err` rejects the action and leaves state alone.

use std::error::Error;
use std::fmt::Debug;
use std::sync::Arc;

/// Values that can be dispatched to a store.
///
/// Actions must be cheap to clone so they can be logged and replayed.
pub trait Action: Clone + Debug + Send + Sync + 'static {
    /// Tag used by the action log and in diagnostics.
    fn kind(&self) -> &str;

    /// Serialized payload for the action log, if any.
    fn payload(&self) -> Option<serde_json::Value> {
        None
    }

    /// `false` for actions whose kind the reducer does not know.
    ///
    /// Unrecognized actions reduce to the identity transition.
    fn is_recognized(&self) -> bool {
        true
    }
}

/// A pure state transition function.
pub trait Reducer: Send + Sync + 'static {
    type State: Debug + Send + Sync + 'static;
    type Action: Action;
    type Error: Error + Send + Sync + 'static;

    /// Compute the snapshot that follows `state` once `action` is applied.
    ///
    /// Must not have side effects. `state` is shared with readers and must
    /// never be mutated in place.
    fn reduce(
        &self,
        state: &Arc<Self::State>,
        action: &Self::Action,
    ) -> Result<Arc<Self::State>, Self::Error>;
}

/// Any `Fn(&Arc<S>, &A) -> Result<Arc<S>, E>` is a reducer.
pub struct FnReducer<S, A, E, F> {
    reduce: F,
    _marker: std::marker::PhantomData<fn(S, A) -> E>,
}

impl<S, A, E, F> FnReducer<S, A, E, F>
where
    F: Fn(&Arc<S>, &A) -> Result<Arc<S>, E>,
{
    pub fn new(reduce: F) -> Self {
        Self {
            reduce,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<S, A, E, F> Reducer for FnReducer<S, A, E, F>
where
    S: Debug + Send + Sync + 'static,
    A: Action,
    E: Error + Send + Sync + 'static,
    F: Fn(&Arc<S>, &A) -> Result<Arc<S>, E> + Send + Sync + 'static,
{
    type State = S;
    type Action = A;
    type Error = E;

    fn reduce(&self, state: &Arc<S>, action: &A) -> Result<Arc<S>, E> {
        (self.reduce)(state, action)
    }
}
