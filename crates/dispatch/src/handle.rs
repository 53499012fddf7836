//! Per-aggregate serialized access.

use std::sync::{Arc, Mutex};

use common::AggregateId;
use domain::{Command, CommandDrivenAggregate, Committed, Notification, SubscriptionId};
use event_store::Event;
use tokio::sync::oneshot;

use crate::error::{DispatchError, QueueError};
use crate::queue::{CommandQueue, DEFAULT_CAPACITY};

type Shared<P, S> = Arc<Mutex<CommandDrivenAggregate<P, S>>>;

/// Shared handle to one command-driven aggregate.
///
/// Every operation, reads included, goes through the aggregate's own
/// [`CommandQueue`], so commands issued concurrently from many tasks are
/// executed one at a time in the order they were submitted. Clones share
/// the same aggregate and queue.
pub struct AggregateHandle<P, S> {
    id: AggregateId,
    aggregate: Shared<P, S>,
    queue: Arc<CommandQueue<String, (), ()>>,
}

impl<P, S> Clone for AggregateHandle<P, S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            aggregate: Arc::clone(&self.aggregate),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<P, S> AggregateHandle<P, S>
where
    P: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    /// Wraps an aggregate behind a queue of [`DEFAULT_CAPACITY`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(aggregate: CommandDrivenAggregate<P, S>) -> Self {
        Self::with_capacity(aggregate, DEFAULT_CAPACITY)
    }

    /// Wraps an aggregate behind a queue holding up to `capacity` operations.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_capacity(aggregate: CommandDrivenAggregate<P, S>, capacity: usize) -> Self {
        Self {
            id: aggregate.id().clone(),
            aggregate: Arc::new(Mutex::new(aggregate)),
            queue: Arc::new(CommandQueue::with_capacity(capacity)),
        }
    }

    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    /// Executes a command once every previously submitted operation is done.
    #[tracing::instrument(skip_all, fields(aggregate_id = %self.id, command = command.name()))]
    pub async fn execute<C>(&self, command: C) -> Result<Committed<P, S>, DispatchError<C::Error>>
    where
        C: Command<Payload = P> + Send + 'static,
    {
        let name = command.name().to_string();
        let committed = self
            .submit(name, move |aggregate| aggregate.execute_command(command))
            .await??;
        Ok(committed)
    }

    /// Returns a copy of the current state.
    pub async fn state(&self) -> Result<S, QueueError> {
        self.submit("state".to_string(), |aggregate| aggregate.state().clone())
            .await
    }

    /// Returns a copy of the event log.
    pub async fn events(&self) -> Result<Vec<Event<P>>, QueueError> {
        self.submit("events".to_string(), |aggregate| aggregate.events().to_vec())
            .await
    }

    /// Runs `f` against the aggregate in queue order.
    pub async fn with_aggregate<R>(
        &self,
        f: impl FnOnce(&mut CommandDrivenAggregate<P, S>) -> R + Send + 'static,
    ) -> Result<R, QueueError>
    where
        R: Send + 'static,
    {
        self.submit("with_aggregate".to_string(), f).await
    }

    /// Registers a notification handler on the aggregate.
    pub async fn subscribe(
        &self,
        handler: impl Fn(&Notification<P, S>) + Send + Sync + 'static,
    ) -> Result<SubscriptionId, QueueError> {
        self.submit("subscribe".to_string(), move |aggregate| {
            aggregate.subscribe(handler)
        })
        .await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, QueueError> {
        self.submit("unsubscribe".to_string(), move |aggregate| {
            aggregate.unsubscribe(id)
        })
        .await
    }

    /// Returns the number of operations waiting or running.
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Runs the operations already submitted, then refuses new ones.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }

    async fn submit<R>(
        &self,
        label: String,
        f: impl FnOnce(&mut CommandDrivenAggregate<P, S>) -> R + Send + 'static,
    ) -> Result<R, QueueError>
    where
        R: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let aggregate = Arc::clone(&self.aggregate);
        let aggregate_id = self.id.to_string();

        self.queue
            .enqueue(label, (), move |_, ()| {
                // Command panics are caught by the aggregate, so a poisoned lock
                // means a `with_aggregate` closure panicked mid-mutation.
                let result = match aggregate.lock() {
                    Ok(mut aggregate) => Ok(f(&mut aggregate)),
                    Err(_) => Err(QueueError::Poisoned { aggregate_id }),
                };
                let _ = sender.send(result);
            })?
            .await?;

        receiver.await.map_err(|_| QueueError::WorkerStopped)?
    }
}

impl<P, S> std::fmt::Debug for AggregateHandle<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateHandle")
            .field("id", &self.id)
            .field("queue", &self.queue)
            .finish()
    }
}
