//! Tally commands.

use std::sync::LazyLock;

use common::{AppError, ok};
use event_store::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{Command, Produced};
use crate::precondition::{Preconditions, require_defined};
use crate::registry::{Registry, RegistryError};

use super::TallyEvent;

/// Adds one amount to the tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAmount {
    pub amount: Option<i64>,
}

impl AddAmount {
    pub fn new(amount: i64) -> Self {
        Self {
            amount: Some(amount),
        }
    }
}

static ADD_AMOUNT_PRECONDITIONS: LazyLock<Preconditions<AddAmount, AppError>> =
    LazyLock::new(|| {
        Preconditions::new()
            .with(require_defined(&["amount"]))
            .with(|args: &AddAmount| {
                (args.amount == Some(0)).then(|| AppError::new("Amount must not be zero"))
            })
    });

impl Command for AddAmount {
    type Payload = TallyEvent;
    type Params = Self;
    type Error = AppError;

    fn name(&self) -> &str {
        "AddAmount"
    }

    fn params(&self) -> &Self {
        self
    }

    fn execute(self) -> Result<Produced<TallyEvent>, AppError> {
        ADD_AMOUNT_PRECONDITIONS.validate(&self)?;
        let Some(amount) = self.amount else {
            unreachable!("require_defined refuses a missing amount");
        };
        ok(Event::from(TallyEvent::Added { amount }).into())
    }
}

/// Adds several amounts, all or nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAll {
    pub amounts: Vec<i64>,
}

impl AddAll {
    pub fn new(amounts: impl IntoIterator<Item = i64>) -> Self {
        Self {
            amounts: amounts.into_iter().collect(),
        }
    }
}

static ADD_ALL_PRECONDITIONS: LazyLock<Preconditions<AddAll, AppError>> = LazyLock::new(|| {
    Preconditions::new().with(|args: &AddAll| {
        let position = args.amounts.iter().position(|amount| *amount == 0)?;
        Some(
            AppError::new("Amount must not be zero")
                .with_detail(format!("amounts[{position}] is zero")),
        )
    })
});

impl Command for AddAll {
    type Payload = TallyEvent;
    type Params = Self;
    type Error = AppError;

    fn name(&self) -> &str {
        "AddAll"
    }

    fn params(&self) -> &Self {
        self
    }

    /// An empty list produces an empty batch, which the aggregate refuses.
    fn execute(self) -> Result<Produced<TallyEvent>, AppError> {
        ADD_ALL_PRECONDITIONS.validate(&self)?;
        let events: Vec<Event<TallyEvent>> = self
            .amounts
            .into_iter()
            .map(|amount| TallyEvent::Added { amount }.into())
            .collect();
        ok(Produced::Batch(events))
    }
}

/// Closes the tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTally;

impl Command for CloseTally {
    type Payload = TallyEvent;
    type Params = Self;
    type Error = AppError;

    fn name(&self) -> &str {
        "CloseTally"
    }

    fn params(&self) -> &Self {
        self
    }

    fn execute(self) -> Result<Produced<TallyEvent>, AppError> {
        ok(Event::from(TallyEvent::Closed).into())
    }
}

/// Any tally command, for callers that pick the command at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args")]
pub enum TallyCommand {
    AddAmount(AddAmount),
    AddAll(AddAll),
    CloseTally(CloseTally),
}

impl TallyCommand {
    pub fn add(amount: i64) -> Self {
        TallyCommand::AddAmount(AddAmount::new(amount))
    }

    pub fn add_all(amounts: impl IntoIterator<Item = i64>) -> Self {
        TallyCommand::AddAll(AddAll::new(amounts))
    }

    pub fn close() -> Self {
        TallyCommand::CloseTally(CloseTally)
    }
}

impl Command for TallyCommand {
    type Payload = TallyEvent;
    type Params = Self;
    type Error = AppError;

    fn name(&self) -> &str {
        match self {
            TallyCommand::AddAmount(command) => command.name(),
            TallyCommand::AddAll(command) => command.name(),
            TallyCommand::CloseTally(command) => command.name(),
        }
    }

    fn params(&self) -> &Self {
        self
    }

    fn execute(self) -> Result<Produced<TallyEvent>, AppError> {
        match self {
            TallyCommand::AddAmount(command) => command.execute(),
            TallyCommand::AddAll(command) => command.execute(),
            TallyCommand::CloseTally(command) => command.execute(),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(type_name: &str, args: Value) -> Result<T, RegistryError> {
    serde_json::from_value(args).map_err(|e| RegistryError::invalid_arguments(type_name, e))
}

/// Registry building tally commands from a tag and JSON arguments.
///
/// Tags: `AddAmount` (`{"amount": n}`), `AddAll` (`{"amounts": [..]}`),
/// `CloseTally` (no arguments).
pub fn command_registry() -> Registry<TallyCommand> {
    Registry::new()
        .with("AddAmount", |args: Value| {
            parse("AddAmount", args).map(TallyCommand::AddAmount)
        })
        .with("AddAll", |args: Value| parse("AddAll", args).map(TallyCommand::AddAll))
        .with("CloseTally", |_: Value| Ok(TallyCommand::close()))
}

/// Registry building tally events from their tag and JSON data.
pub fn event_registry() -> Registry<Event<TallyEvent>> {
    #[derive(Deserialize)]
    struct Added {
        amount: i64,
    }

    Registry::new()
        .with(super::events::ADD, |args: Value| {
            let Added { amount } = parse(super::events::ADD, args)?;
            Ok(Event::from(TallyEvent::Added { amount }))
        })
        .with(super::events::CLOSE, |_: Value| Ok(Event::from(TallyEvent::Closed)))
}
