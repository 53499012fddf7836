//! Aggregates driven by commands.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::instrument;

use common::AggregateId;
use event_store::{Event, EventNumber};

use crate::aggregate::Aggregate;
use crate::command::{Command, Committed};
use crate::error::{AggregateError, CommandError};
use crate::notify::{Notification, Subscribers, SubscriptionId};
use crate::reducer::Reducer;

/// An aggregate that only changes through commands.
///
/// A command either commits every event it produced, advancing log and
/// state together, or has no effect at all. Failed commands never leave a
/// partial fold behind: after a rollback the log and state are identical to
/// what they were before the call.
pub struct CommandDrivenAggregate<P, S> {
    aggregate: Aggregate<P, S>,
    subscribers: Subscribers<P, S>,
}

impl<P: Clone, S: Clone> CommandDrivenAggregate<P, S> {
    /// Creates a fresh command-driven aggregate.
    pub fn new(
        id: impl Into<AggregateId>,
        initial_state: S,
        reducer: impl Reducer<P, S> + 'static,
    ) -> Self {
        Self::from_aggregate(Aggregate::new(id, initial_state, reducer))
    }

    /// Wraps an existing aggregate.
    pub fn from_aggregate(aggregate: Aggregate<P, S>) -> Self {
        Self {
            aggregate,
            subscribers: Subscribers::new(),
        }
    }

    /// Returns the wrapped aggregate.
    pub fn aggregate(&self) -> &Aggregate<P, S> {
        &self.aggregate
    }

    /// Unwraps the aggregate, dropping all subscriptions.
    pub fn into_aggregate(self) -> Aggregate<P, S> {
        self.aggregate
    }

    pub fn id(&self) -> &AggregateId {
        self.aggregate.id()
    }

    pub fn state(&self) -> &S {
        self.aggregate.state()
    }

    pub fn events(&self) -> &[Event<P>] {
        self.aggregate.events()
    }

    pub fn version(&self) -> EventNumber {
        self.aggregate.version()
    }

    pub fn is_fresh(&self) -> bool {
        self.aggregate.is_fresh()
    }

    /// Accepts one event directly, bypassing commands.
    ///
    /// No notification is published.
    pub fn add_event(&mut self, event: Event<P>) -> Result<&S, AggregateError> {
        self.aggregate.add_event(event)
    }

    /// Rebuilds state from stored events. See [`Aggregate::rehydrate`].
    pub fn rehydrate(
        &mut self,
        events: impl IntoIterator<Item = Event<P>>,
    ) -> Result<&S, AggregateError> {
        self.aggregate.rehydrate(events)
    }

    /// Discards the log and reverts to the initial state.
    pub fn reset(&mut self) {
        self.aggregate.reset();
    }

    /// Registers a notification handler.
    ///
    /// Handlers run synchronously inside `execute_command`, after the
    /// command has committed or failed. They must not block.
    pub fn subscribe(
        &mut self,
        handler: impl Fn(&Notification<P, S>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribers.subscribe(handler)
    }

    /// Removes a handler. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Executes a command and applies its events atomically.
    ///
    /// Steps:
    /// 1. run the command; a refusal is returned as [`CommandError::Rejected`]
    /// 2. refuse a success that produced no events ([`CommandError::EmptyBatch`])
    /// 3. apply the events in order; if any is refused, truncate the log and
    ///    restore the state captured before step 3 ([`CommandError::Apply`])
    ///
    /// A panic in the command or in the reducer is caught here and reported
    /// as [`CommandError::Panicked`], after the same rollback as step 3.
    ///
    /// On success one `Update` notification per committed event is
    /// published, each carrying the state right after that event. On failure
    /// a single `Error` notification is published.
    #[instrument(skip_all, fields(aggregate_id = %self.aggregate.id(), command = command.name()))]
    pub fn execute_command<C>(
        &mut self,
        command: C,
    ) -> Result<Committed<P, S>, CommandError<C::Error>>
    where
        C: Command<Payload = P>,
    {
        let name = command.name().to_string();
        let notify = !self.subscribers.is_empty();
        let args = if notify {
            serde_json::to_value(command.params()).unwrap_or(Value::Null)
        } else {
            Value::Null
        };

        let produced = match panic::catch_unwind(AssertUnwindSafe(|| command.execute())) {
            Ok(Ok(produced)) => produced,
            Ok(Err(source)) => {
                return Err(self.fail(
                    CommandError::Rejected {
                        command: name,
                        source,
                    },
                    args,
                ));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                return Err(self.fail(CommandError::Panicked { command: name, message }, args));
            }
        };

        if produced.is_empty() {
            return Err(self.fail(CommandError::EmptyBatch { command: name }, args));
        }

        let pre_len = self.aggregate.events().len();
        let pre_state = self.aggregate.state().clone();

        let aggregate = &mut self.aggregate;
        let applied = panic::catch_unwind(AssertUnwindSafe(
            || -> Result<Vec<S>, AggregateError> {
                let mut states = Vec::new();
                for event in produced.into_events() {
                    let state = aggregate.add_event(event)?;
                    if notify {
                        states.push(state.clone());
                    }
                }
                Ok(states)
            },
        ));

        let states = match applied {
            Ok(Ok(states)) => states,
            Ok(Err(source)) => {
                self.rollback(pre_len, pre_state);
                return Err(self.fail(
                    CommandError::Apply {
                        command: name,
                        source,
                    },
                    args,
                ));
            }
            Err(payload) => {
                self.rollback(pre_len, pre_state);
                let message = panic_message(payload.as_ref());
                return Err(self.fail(CommandError::Panicked { command: name, message }, args));
            }
        };

        let events = self.aggregate.events()[pre_len..].to_vec();
        let committed = Committed {
            events,
            state: self.aggregate.state().clone(),
            version: self.aggregate.version(),
        };

        metrics::counter!("kernel_commands_committed_total").increment(1);
        tracing::debug!(
            events = committed.events.len(),
            version = %committed.version,
            "command committed"
        );

        for (event, state) in committed.events.iter().zip(states) {
            self.subscribers.publish(&Notification::Update {
                event: event.clone(),
                state,
            });
        }

        Ok(committed)
    }

    fn rollback(&mut self, len: usize, state: S) {
        let applied = self.aggregate.events().len() - len;
        self.aggregate.restore(len, state);
        metrics::counter!("kernel_rollbacks_total").increment(1);
        tracing::warn!(applied, "rolled back partially applied command");
    }

    fn fail<E>(&self, error: CommandError<E>, args: Value) -> CommandError<E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        metrics::counter!("kernel_commands_failed_total").increment(1);
        tracing::error!(%error, "command failed");

        if !self.subscribers.is_empty() {
            self.subscribers.publish(&Notification::Error {
                command: error.command().to_string(),
                args,
                error: error.to_string(),
            });
        }
        error
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<P, S: std::fmt::Debug> std::fmt::Debug for CommandDrivenAggregate<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDrivenAggregate")
            .field("aggregate", &self.aggregate)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use common::AppError;

    use super::*;
    use crate::command::Produced;
    use crate::error::ReduceError;
    use crate::reducer::from_fn;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        total: i64,
    }

    const UNLUCKY: i64 = 13;
    const CURSED: i64 = 99;

    fn counter() -> CommandDrivenAggregate<i64, Counter> {
        CommandDrivenAggregate::new(
            "counter-1",
            Counter::default(),
            from_fn(|event: &Event<i64>, state: &Counter| {
                if *event.payload() == UNLUCKY {
                    return Err(ReduceError::new("unlucky amount"));
                }
                if *event.payload() == CURSED {
                    panic!("cursed amount");
                }
                Ok(Counter {
                    total: state.total + event.payload(),
                })
            }),
        )
    }

    struct Emit {
        amounts: Vec<i64>,
    }

    impl Command for Emit {
        type Payload = i64;
        type Params = Vec<i64>;
        type Error = AppError;

        fn name(&self) -> &str {
            "Emit"
        }

        fn params(&self) -> &Vec<i64> {
            &self.amounts
        }

        fn execute(self) -> Result<Produced<i64>, AppError> {
            Ok(self
                .amounts
                .into_iter()
                .map(|amount| Event::new("Add", amount))
                .collect::<Vec<_>>()
                .into())
        }
    }

    struct EmitOne(i64);

    impl Command for EmitOne {
        type Payload = i64;
        type Params = i64;
        type Error = AppError;

        fn name(&self) -> &str {
            "EmitOne"
        }

        fn params(&self) -> &i64 {
            &self.0
        }

        fn execute(self) -> Result<Produced<i64>, AppError> {
            Ok(Event::new("Add", self.0).into())
        }
    }

    struct Refuse;

    impl Command for Refuse {
        type Payload = i64;
        type Params = ();
        type Error = AppError;

        fn name(&self) -> &str {
            "Refuse"
        }

        fn params(&self) -> &() {
            &()
        }

        fn execute(self) -> Result<Produced<i64>, AppError> {
            Err(AppError::new("not today"))
        }
    }

    struct Explode;

    impl Command for Explode {
        type Payload = i64;
        type Params = ();
        type Error = AppError;

        fn name(&self) -> &str {
            "Explode"
        }

        fn params(&self) -> &() {
            &()
        }

        fn execute(self) -> Result<Produced<i64>, AppError> {
            panic!("command bug")
        }
    }

    fn recorder(
        aggregate: &mut CommandDrivenAggregate<i64, Counter>,
    ) -> (SubscriptionId, Arc<Mutex<Vec<Notification<i64, Counter>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = aggregate.subscribe(move |notification| {
            sink.lock().unwrap().push(notification.clone());
        });
        (id, seen)
    }

    #[test]
    fn single_event_command_commits() {
        let mut aggregate = counter();
        let committed = aggregate.execute_command(EmitOne(5)).unwrap();

        assert_eq!(committed.state, Counter { total: 5 });
        assert_eq!(committed.version, EventNumber::first());
        assert_eq!(committed.events.len(), 1);
        assert_eq!(committed.events[0].aggregate_id(), Some(aggregate.id()));
        assert_eq!(aggregate.state(), &Counter { total: 5 });
    }

    #[test]
    fn batch_commits_all_events() {
        let mut aggregate = counter();
        let committed = aggregate
            .execute_command(Emit {
                amounts: vec![1, 2, 3],
            })
            .unwrap();

        assert_eq!(committed.state.total, 6);
        assert_eq!(committed.version, EventNumber::new(3));
        let numbers: Vec<u64> = committed
            .events
            .iter()
            .map(|event| event.event_number().as_u64())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn failing_event_rolls_back_the_whole_batch() {
        for position in 0..4 {
            let mut aggregate = counter();
            aggregate.execute_command(EmitOne(100)).unwrap();
            let before_len = aggregate.events().len();
            let before_state = aggregate.state().clone();

            let mut amounts = vec![1, 2, 3, 4];
            amounts[position] = UNLUCKY;
            let err = aggregate.execute_command(Emit { amounts }).unwrap_err();

            assert!(matches!(err, CommandError::Apply { .. }));
            assert_eq!(aggregate.events().len(), before_len);
            assert_eq!(aggregate.state(), &before_state);
            assert_eq!(aggregate.aggregate().replayed_state().unwrap(), before_state);
        }
    }

    #[test]
    fn panicking_command_is_reported_as_a_failure() {
        let mut aggregate = counter();
        aggregate.execute_command(EmitOne(4)).unwrap();
        let (_, seen) = recorder(&mut aggregate);

        let err = aggregate.execute_command(Explode).unwrap_err();

        assert!(matches!(
            err,
            CommandError::Panicked { ref command, ref message }
                if command == "Explode" && message == "command bug"
        ));
        assert_eq!(aggregate.events().len(), 1);
        assert_eq!(aggregate.state().total, 4);
        assert!(matches!(
            seen.lock().unwrap().as_slice(),
            [Notification::Error { command, .. }] if command == "Explode"
        ));

        aggregate.execute_command(EmitOne(1)).unwrap();
        assert_eq!(aggregate.state().total, 5);
    }

    #[test]
    fn reducer_panic_rolls_back_the_whole_batch() {
        let mut aggregate = counter();
        aggregate.execute_command(EmitOne(100)).unwrap();

        let err = aggregate
            .execute_command(Emit {
                amounts: vec![1, 2, CURSED],
            })
            .unwrap_err();

        assert!(matches!(err, CommandError::Panicked { ref message, .. } if message == "cursed amount"));
        assert_eq!(aggregate.events().len(), 1);
        assert_eq!(aggregate.state(), &Counter { total: 100 });
        assert_eq!(aggregate.aggregate().replayed_state().unwrap(), Counter { total: 100 });

        let committed = aggregate.execute_command(EmitOne(2)).unwrap();
        assert_eq!(committed.version, EventNumber::new(2));
    }

    #[test]
    fn rolled_back_numbers_are_reused() {
        let mut aggregate = counter();
        aggregate
            .execute_command(Emit {
                amounts: vec![1, UNLUCKY],
            })
            .unwrap_err();

        let committed = aggregate.execute_command(EmitOne(2)).unwrap();
        assert_eq!(committed.version, EventNumber::first());
    }

    #[test]
    fn empty_batch_is_rejected_without_change() {
        let mut aggregate = counter();
        aggregate.execute_command(EmitOne(7)).unwrap();

        let err = aggregate
            .execute_command(Emit { amounts: vec![] })
            .unwrap_err();

        assert!(matches!(err, CommandError::EmptyBatch { ref command } if command == "Emit"));
        assert_eq!(aggregate.events().len(), 1);
        assert_eq!(aggregate.state().total, 7);
    }

    #[test]
    fn rejected_command_leaves_aggregate_untouched() {
        let mut aggregate = counter();
        let err = aggregate.execute_command(Refuse).unwrap_err();

        assert_eq!(err.command(), "Refuse");
        assert_eq!(err.to_string(), "Command Refuse rejected: not today");
        assert!(aggregate.is_fresh());
    }

    #[test]
    fn updates_carry_the_state_after_each_event() {
        let mut aggregate = counter();
        let (_, seen) = recorder(&mut aggregate);

        aggregate
            .execute_command(Emit {
                amounts: vec![2, 3],
            })
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let totals: Vec<i64> = seen
            .iter()
            .map(|notification| match notification {
                Notification::Update { state, .. } => state.total,
                Notification::Error { .. } => panic!("unexpected error notification"),
            })
            .collect();
        assert_eq!(totals, vec![2, 5]);
    }

    #[test]
    fn failures_publish_one_error_with_args() {
        let mut aggregate = counter();
        let (_, seen) = recorder(&mut aggregate);

        aggregate
            .execute_command(Emit {
                amounts: vec![1, UNLUCKY],
            })
            .unwrap_err();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let Notification::Error { command, args, .. } = &seen[0] else {
            panic!("expected an error notification");
        };
        assert_eq!(command, "Emit");
        assert_eq!(args, &serde_json::json!([1, UNLUCKY]));
    }

    #[test]
    fn unsubscribed_handlers_stop_receiving() {
        let mut aggregate = counter();
        let (id, seen) = recorder(&mut aggregate);

        aggregate.execute_command(EmitOne(1)).unwrap();
        assert!(aggregate.unsubscribe(id));
        assert!(!aggregate.unsubscribe(id));
        aggregate.execute_command(EmitOne(1)).unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(aggregate.subscriber_count(), 0);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let mut aggregate = counter();
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            aggregate.subscribe(move |_| order.lock().unwrap().push(label));
        }

        aggregate.execute_command(EmitOne(1)).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }
}
