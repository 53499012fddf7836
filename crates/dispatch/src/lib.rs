//! Serialized command execution.
//!
//! [`CommandQueue`] runs queued invocations one at a time in FIFO order and
//! hands back a [`Completion`] per invocation. [`AggregateHandle`] puts one
//! command-driven aggregate behind its own queue so concurrent callers never
//! interleave commands on it.

pub mod error;
pub mod handle;
pub mod queue;

pub use error::{DispatchError, QueueError, Result};
pub use handle::AggregateHandle;
pub use queue::{CommandQueue, Completion, DEFAULT_CAPACITY};
