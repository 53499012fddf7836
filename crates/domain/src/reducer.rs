//! Reducers fold one event into a state.

use std::marker::PhantomData;

use event_store::Event;

use crate::error::ReduceError;

/// Combines a prior state and one event into a new state.
///
/// Reducers must be deterministic: replaying the same events from the same
/// initial state always yields the same state. Returning an error rejects
/// the event; the prior state is left untouched.
pub trait Reducer<P, S>: Send + Sync {
    /// Folds `event` into `state`.
    fn reduce(&self, event: &Event<P>, state: &S) -> Result<S, ReduceError>;
}

impl<P, S> Reducer<P, S> for Box<dyn Reducer<P, S>> {
    fn reduce(&self, event: &Event<P>, state: &S) -> Result<S, ReduceError> {
        (**self).reduce(event, state)
    }
}

/// Reducer backed by a fallible function.
pub struct FnReducer<F> {
    f: F,
}

/// Builds a reducer from a fallible function.
pub fn from_fn<P, S, F>(f: F) -> FnReducer<F>
where
    F: Fn(&Event<P>, &S) -> Result<S, ReduceError> + Send + Sync,
{
    FnReducer { f }
}

impl<P, S, F> Reducer<P, S> for FnReducer<F>
where
    F: Fn(&Event<P>, &S) -> Result<S, ReduceError> + Send + Sync,
{
    fn reduce(&self, event: &Event<P>, state: &S) -> Result<S, ReduceError> {
        (self.f)(event, state)
    }
}

/// Reducer backed by a total function.
pub struct Infallible<F> {
    f: F,
}

/// Builds a reducer from a function that accepts every event.
pub fn infallible<P, S, F>(f: F) -> Infallible<F>
where
    F: Fn(&Event<P>, &S) -> S + Send + Sync,
{
    Infallible { f }
}

impl<P, S, F> Reducer<P, S> for Infallible<F>
where
    F: Fn(&Event<P>, &S) -> S + Send + Sync,
{
    fn reduce(&self, event: &Event<P>, state: &S) -> Result<S, ReduceError> {
        Ok((self.f)(event, state))
    }
}

/// A list of reducers applied in order for every event.
pub struct Combined<P, S> {
    reducers: Vec<Box<dyn Reducer<P, S>>>,
    _phantom: PhantomData<fn(&P, &S)>,
}

/// Chains reducers: for each event, the first reducer sees the prior
/// state, every following reducer sees the state produced by the one
/// before it. The first error stops the chain.
pub fn combine_reducers<P, S>(reducers: Vec<Box<dyn Reducer<P, S>>>) -> Combined<P, S> {
    Combined {
        reducers,
        _phantom: PhantomData,
    }
}

impl<P, S: Clone> Reducer<P, S> for Combined<P, S> {
    fn reduce(&self, event: &Event<P>, state: &S) -> Result<S, ReduceError> {
        let mut next = state.clone();
        for reducer in &self.reducers {
            next = reducer.reduce(event, &next)?;
        }
        Ok(next)
    }
}
