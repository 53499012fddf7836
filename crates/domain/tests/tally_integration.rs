//! Integration tests for the tally reference domain.
//!
//! These tests drive the kernel through commands, persist the committed
//! events into an in-memory event source and rebuild aggregates from it.

use std::sync::{Arc, Mutex};

use common::AggregateId;
use domain::tally::{self, AddAll, AddAmount, CloseTally, Tally, TallyCommand, TallyEvent};
use domain::{Aggregate, CommandError, Notification, infallible};
use event_store::{Event, EventNumber, EventSource, EventSourceExt, InMemoryEventSource};

mod scenario {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Total {
        total: i64,
    }

    #[test]
    fn add_add_reset() {
        let mut aggregate = Aggregate::new(
            "scenario",
            Total::default(),
            infallible(|event: &Event<i64>, state: &Total| {
                if event.event_type() == "Add" {
                    Total {
                        total: state.total + event.payload(),
                    }
                } else {
                    state.clone()
                }
            }),
        );

        assert_eq!(aggregate.add_event(Event::new("Add", 5)).unwrap(), &Total { total: 5 });
        assert_eq!(aggregate.events()[0].event_number(), EventNumber::new(1));

        assert_eq!(aggregate.add_event(Event::new("Add", -3)).unwrap(), &Total { total: 2 });
        assert_eq!(aggregate.events()[1].event_number(), EventNumber::new(2));

        aggregate.reset();
        assert_eq!(aggregate.state(), &Total { total: 0 });
        assert!(aggregate.events().is_empty());
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn add_batch_and_close() {
        let mut tally = tally::new_tally("tally-1");

        tally.execute_command(AddAmount::new(10)).unwrap();
        tally.execute_command(AddAll::new([1, 2, 3])).unwrap();
        let committed = tally.execute_command(CloseTally).unwrap();

        assert_eq!(
            committed.state,
            Tally {
                total: 16,
                entries: 4,
                closed: true
            }
        );
        assert_eq!(committed.version, EventNumber::new(5));
    }

    #[test]
    fn closed_tally_rejects_further_amounts() {
        let mut tally = tally::new_tally("tally-1");
        tally.execute_command(AddAmount::new(1)).unwrap();
        tally.execute_command(CloseTally).unwrap();

        let err = tally.execute_command(AddAmount::new(2)).unwrap_err();
        assert!(matches!(err, CommandError::Apply { .. }));
        assert_eq!(tally.state().total, 1);
        assert_eq!(tally.events().len(), 2);

        assert!(tally.execute_command(CloseTally).is_err());
    }

    #[test]
    fn overflowing_batch_is_all_or_nothing() {
        let mut tally = tally::new_tally("tally-1");
        tally.execute_command(AddAmount::new(1)).unwrap();
        let before = *tally.state();

        let err = tally
            .execute_command(AddAll::new([5, i64::MAX, 7]))
            .unwrap_err();

        assert!(matches!(err, CommandError::Apply { .. }));
        assert_eq!(tally.state(), &before);
        assert_eq!(tally.events().len(), 1);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let mut tally = tally::new_tally("tally-1");
        let err = tally.execute_command(AddAll::default()).unwrap_err();

        assert!(matches!(err, CommandError::EmptyBatch { .. }));
        assert!(tally.is_fresh());
    }

    #[test]
    fn precondition_failure_is_reported() {
        let mut tally = tally::new_tally("tally-1");
        let err = tally
            .execute_command(AddAmount { amount: None })
            .unwrap_err();

        let CommandError::Rejected { command, source } = err else {
            panic!("expected a rejection");
        };
        assert_eq!(command, "AddAmount");
        assert_eq!(
            source.reason(),
            "Undefined arguments were passed into the command: amount"
        );
    }

    #[test]
    fn registry_commands_drive_the_aggregate() {
        let registry = tally::command_registry();
        let mut tally = tally::new_tally("tally-1");

        let script = [
            ("AddAmount", serde_json::json!({"amount": 3})),
            ("AddAll", serde_json::json!({"amounts": [4, 5]})),
            ("CloseTally", serde_json::Value::Null),
        ];
        for (tag, args) in script {
            let command: TallyCommand = registry.create(tag, args).unwrap();
            tally.execute_command(command).unwrap();
        }

        assert_eq!(tally.state().total, 12);
        assert!(tally.state().closed);
    }

    #[test]
    fn notifications_follow_commits_and_failures() {
        let mut tally = tally::new_tally("tally-1");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tally.subscribe(move |notification| {
            let label = match notification {
                Notification::Update { event, state } => {
                    format!("update {} {}", event.event_type(), state.total)
                }
                Notification::Error { command, .. } => format!("error {command}"),
            };
            sink.lock().unwrap().push(label);
        });

        tally.execute_command(TallyCommand::add_all([2, 3])).unwrap();
        tally.execute_command(TallyCommand::add(0)).unwrap_err();
        tally.execute_command(TallyCommand::close()).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "update Add 2".to_string(),
                "update Add 5".to_string(),
                "error AddAmount".to_string(),
                "update Close 5".to_string(),
            ]
        );
    }
}

mod replay {
    use super::*;

    async fn run_and_store(
        id: &AggregateId,
        source: &InMemoryEventSource<TallyEvent>,
        commands: Vec<TallyCommand>,
    ) -> Tally {
        let mut tally = tally::new_tally(id.clone());
        for command in commands {
            if let Ok(committed) = tally.execute_command(command) {
                source.append(committed.events).await.unwrap();
            }
        }
        *tally.state()
    }

    #[tokio::test]
    async fn replay_reaches_the_same_state() {
        let id = AggregateId::new();
        let source = InMemoryEventSource::new();

        let original = run_and_store(
            &id,
            &source,
            vec![
                TallyCommand::add(5),
                TallyCommand::add(-3),
                TallyCommand::add_all([10, 0]),
                TallyCommand::add_all([7, 8]),
                TallyCommand::add_all(Vec::new()),
                TallyCommand::close(),
                TallyCommand::add(1),
            ],
        )
        .await;

        let stored = source.events_for(&id).await.unwrap();
        assert_eq!(stored.len(), 5);

        let mut rebuilt = tally::new_tally(id.clone());
        rebuilt.rehydrate(stored.clone()).unwrap();
        assert_eq!(rebuilt.state(), &original);
        assert_eq!(rebuilt.version(), EventNumber::new(5));

        let mut reset = tally::new_tally(id.clone());
        reset.execute_command(TallyCommand::add(99)).unwrap();
        reset.reset();
        for event in stored {
            reset.add_event(event).unwrap();
        }
        assert_eq!(reset.state(), &original);
    }

    #[tokio::test]
    async fn stored_events_belong_to_one_aggregate() {
        let source = InMemoryEventSource::new();
        let first = AggregateId::from("first");
        let second = AggregateId::from("second");

        run_and_store(&first, &source, vec![TallyCommand::add(1), TallyCommand::add(2)]).await;
        run_and_store(&second, &source, vec![TallyCommand::add(3)]).await;

        assert_eq!(source.last_event_number(&first).await.unwrap(), Some(EventNumber::new(2)));
        assert!(source.contains(&second).await.unwrap());

        let mut wrong = tally::new_tally(second.clone());
        assert!(wrong.rehydrate(source.events_for(&first).await.unwrap()).is_err());
        assert!(wrong.is_fresh());
    }

    #[test]
    fn stored_events_round_trip_through_json() {
        let mut tally = tally::new_tally("tally-json");
        let committed = tally.execute_command(AddAll::new([4, 6])).unwrap();

        let json = serde_json::to_string(&committed.events).unwrap();
        let restored: Vec<Event<TallyEvent>> = serde_json::from_str(&json).unwrap();

        let mut rebuilt = tally::new_tally("tally-json");
        rebuilt.rehydrate(restored).unwrap();
        assert_eq!(rebuilt.state(), tally.state());
    }
}
