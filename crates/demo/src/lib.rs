//! Runs a script of tally commands through the event-sourcing kernel.
//!
//! Each step becomes a registry lookup, a queued command execution and,
//! on commit, an append to an in-memory event source. After the script a
//! fresh aggregate is rehydrated from the stored events and compared with
//! the live one.

pub mod config;
pub mod error;

use serde::Serialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use common::AggregateId;
use dispatch::{AggregateHandle, DispatchError};
use domain::Notification;
use domain::tally::{self, Tally, TallyCommand, TallyEvent};
use event_store::{EventSource, InMemoryEventSource};

pub use config::Config;
pub use error::{DemoError, Result};

/// Script used when none is given on the command line.
pub const DEFAULT_SCRIPT: &[&str] = &["5", "-3", "10,20,30", "0", "none", "4,0", "close", "7"];

/// Installs the global tracing subscriber.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.log_json.then(|| tracing_subscriber::fmt::layer().json());
    let text = (!config.log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()?;
    Ok(())
}

/// Turns one script step into a registry tag and its JSON arguments.
///
/// - `close` closes the tally
/// - `none` adds an undefined amount
/// - `a,b,c` adds every amount as one batch
/// - `n` adds a single amount
pub fn parse_step(step: &str) -> Result<(&'static str, Value)> {
    let step = step.trim();
    let invalid = |reason: String| DemoError::InvalidStep {
        step: step.to_string(),
        reason,
    };

    match step {
        "close" => Ok(("CloseTally", Value::Null)),
        "none" => Ok(("AddAmount", json!({}))),
        batch if batch.contains(',') => {
            let amounts = batch
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| part.trim().parse::<i64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| invalid(e.to_string()))?;
            Ok(("AddAll", json!({ "amounts": amounts })))
        }
        single => {
            let amount: i64 = single.parse().map_err(|e| invalid(format!("{e}")))?;
            Ok(("AddAmount", json!({ "amount": amount })))
        }
    }
}

/// What happened to one script step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    Committed { events: usize, version: u64, total: i64 },
    Rejected { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: String,
    pub command: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Summary of a demo run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub aggregate_id: AggregateId,
    pub steps: Vec<StepReport>,
    pub final_state: Tally,
    pub version: u64,
    pub stored_events: usize,
    pub replay_matches: bool,
}

impl Report {
    pub fn committed(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step.outcome, StepOutcome::Committed { .. }))
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.steps.len() - self.committed()
    }
}

/// Runs `script` against a fresh tally and checks replay equivalence.
#[tracing::instrument(skip_all, fields(aggregate_id = %config.aggregate_id, steps = script.len()))]
pub async fn run<S: AsRef<str>>(config: &Config, script: &[S]) -> Result<Report> {
    let id = config.aggregate_id.clone();
    let handle = AggregateHandle::with_capacity(tally::new_tally(id.clone()), config.queue_capacity);
    let source: InMemoryEventSource<TallyEvent> = InMemoryEventSource::new();
    let registry = tally::command_registry();

    handle
        .subscribe(|notification| match notification {
            Notification::Update { event, state } => tracing::info!(
                event_type = event.event_type(),
                event_number = %event.event_number(),
                total = state.total,
                "tally updated"
            ),
            Notification::Error { command, error, .. } => {
                tracing::warn!(%command, %error, "tally command failed")
            }
        })
        .await?;

    let mut steps = Vec::with_capacity(script.len());
    for step in script {
        let step = step.as_ref();
        let (tag, args) = parse_step(step)?;
        let command: TallyCommand = registry.create(tag, args)?;

        let outcome = match handle.execute(command).await {
            Ok(committed) => {
                let events = committed.events.len();
                source.append(committed.events).await?;
                StepOutcome::Committed {
                    events,
                    version: committed.version.as_u64(),
                    total: committed.state.total,
                }
            }
            Err(DispatchError::Command(error)) => StepOutcome::Rejected {
                error: error.to_string(),
            },
            Err(DispatchError::Queue(error)) => return Err(error.into()),
        };

        steps.push(StepReport {
            step: step.to_string(),
            command: tag.to_string(),
            outcome,
        });
    }

    let final_state = handle.state().await?;
    let version = handle.events().await?.len() as u64;
    handle.shutdown().await;

    let stored = source.events_for(&id).await?;
    let stored_events = stored.len();
    let mut replayed = tally::new_tally(id.clone());
    replayed.rehydrate(stored)?;
    let replay_matches = *replayed.state() == final_state;

    if replay_matches {
        tracing::info!(stored_events, "replay matches the live aggregate");
    } else {
        tracing::error!(stored_events, "replay diverged from the live aggregate");
    }

    Ok(Report {
        aggregate_id: id,
        steps,
        final_state,
        version,
        stored_events,
        replay_matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_step_kind() {
        assert_eq!(parse_step("close").unwrap(), ("CloseTally", Value::Null));
        assert_eq!(parse_step("none").unwrap(), ("AddAmount", json!({})));
        assert_eq!(
            parse_step(" 12 ").unwrap(),
            ("AddAmount", json!({"amount": 12}))
        );
        assert_eq!(
            parse_step("1, 2,3").unwrap(),
            ("AddAll", json!({"amounts": [1, 2, 3]}))
        );
        assert_eq!(parse_step(",").unwrap(), ("AddAll", json!({"amounts": []})));
    }

    #[test]
    fn rejects_garbage_steps() {
        assert!(matches!(
            parse_step("twelve"),
            Err(DemoError::InvalidStep { ref step, .. }) if step == "twelve"
        ));
        assert!(parse_step("1,x").is_err());
    }

    #[test]
    fn report_counts_outcomes() {
        let report = Report {
            aggregate_id: AggregateId::from("t"),
            steps: vec![
                StepReport {
                    step: "1".to_string(),
                    command: "AddAmount".to_string(),
                    outcome: StepOutcome::Committed {
                        events: 1,
                        version: 1,
                        total: 1,
                    },
                },
                StepReport {
                    step: "0".to_string(),
                    command: "AddAmount".to_string(),
                    outcome: StepOutcome::Rejected {
                        error: "zero".to_string(),
                    },
                },
            ],
            final_state: Tally::default(),
            version: 1,
            stored_events: 1,
            replay_matches: true,
        };

        assert_eq!(report.committed(), 1);
        assert_eq!(report.rejected(), 1);

        let json = serde_json::to_value(&report.steps[1]).unwrap();
        assert_eq!(
            json,
            json!({"step": "0", "command": "AddAmount", "status": "rejected", "error": "zero"})
        );
    }
}
