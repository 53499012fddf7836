//! Aggregates, commands and preconditions for the event-sourcing kernel.
//!
//! - [`Aggregate`]: identity, initial/current state and an ordered event log
//!   folded through a [`Reducer`]
//! - [`Command`]: validates its parameters and produces event(s)
//! - [`Preconditions`]: ordered, fail-fast validator chains
//! - [`CommandDrivenAggregate`]: executes commands atomically and publishes
//!   [`Notification`]s
//! - [`Registry`]: tag-keyed factories for runtime dispatch
//! - [`tally`]: a small reference domain

pub mod aggregate;
pub mod command;
pub mod command_driven;
pub mod error;
pub mod notify;
pub mod precondition;
pub mod reducer;
pub mod registry;
pub mod tally;

pub use aggregate::Aggregate;
pub use command::{Command, Committed, Produced};
pub use command_driven::CommandDrivenAggregate;
pub use error::{AggregateError, CommandError, ReduceError};
pub use notify::{Notification, SubscriptionId};
pub use precondition::{
    Preconditions, Validator, missing_args, require_defined, validate, validate_args_are_defined,
};
pub use reducer::{Combined, FnReducer, Infallible, Reducer, combine_reducers, from_fn, infallible};
pub use registry::{Registry, RegistryError};
