//! Precondition validator chains.

use common::AppError;
use serde::Serialize;
use serde_json::Value;

/// A pure check against command arguments.
///
/// Returns `None` when the precondition holds, or the error describing the
/// violation.
pub type Validator<A, E> = Box<dyn Fn(&A) -> Option<E> + Send + Sync>;

/// Runs validators in order and reports the first violation.
///
/// Validators after the first failing one are not evaluated.
pub fn validate<A, E>(validators: &[Validator<A, E>], args: &A) -> Result<(), E> {
    for validator in validators {
        if let Some(error) = validator(args) {
            return Err(error);
        }
    }
    Ok(())
}

/// An ordered chain of preconditions.
///
/// Order matters: for arguments violating several preconditions, the one
/// registered first is reported.
pub struct Preconditions<A, E> {
    validators: Vec<Validator<A, E>>,
}

impl<A, E> Preconditions<A, E> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Appends a validator to the chain.
    pub fn with(mut self, validator: impl Fn(&A) -> Option<E> + Send + Sync + 'static) -> Self {
        self.push(validator);
        self
    }

    /// Appends a validator to the chain.
    pub fn push(&mut self, validator: impl Fn(&A) -> Option<E> + Send + Sync + 'static) {
        self.validators.push(Box::new(validator));
    }

    /// Returns the number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Returns true if the chain has no validators.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Checks `args` against the chain, stopping at the first violation.
    pub fn validate(&self, args: &A) -> Result<(), E> {
        validate(&self.validators, args)
    }
}

impl<A, E> Default for Preconditions<A, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the names in `arg_names` that are absent or null in `args`.
///
/// Arguments are inspected through their serde representation, so an
/// `Option` field set to `None` counts as missing.
pub fn missing_args<A: Serialize>(
    args: &A,
    arg_names: &[&str],
) -> Result<Vec<String>, serde_json::Error> {
    let value = serde_json::to_value(args)?;
    Ok(arg_names
        .iter()
        .filter(|name| value.get(**name).is_none_or(Value::is_null))
        .map(|name| name.to_string())
        .collect())
}

/// Checks that every named argument is present and not null.
///
/// The error lists all missing names, comma separated. Arguments that
/// cannot be serialized are reported as such.
pub fn validate_args_are_defined<A: Serialize>(args: &A, arg_names: &[&str]) -> Option<AppError> {
    let missing = match missing_args(args, arg_names) {
        Ok(missing) => missing,
        Err(error) => {
            tracing::warn!(%error, "command arguments could not be serialized");
            return Some(
                AppError::new("Command arguments could not be inspected")
                    .with_detail(error.to_string()),
            );
        }
    };
    if missing.is_empty() {
        return None;
    }

    let names = missing.join(",");
    Some(
        AppError::new(format!(
            "Undefined arguments were passed into the command: {names}"
        ))
        .with_detail(format!("{names} was undefined")),
    )
}

/// Builds a validator that requires the given arguments to be defined.
pub fn require_defined<A: Serialize + 'static>(arg_names: &[&str]) -> Validator<A, AppError> {
    let arg_names: Vec<String> = arg_names.iter().map(|name| name.to_string()).collect();
    Box::new(move |args: &A| {
        let names: Vec<&str> = arg_names.iter().map(String::as_str).collect();
        validate_args_are_defined(args, &names)
    })
}
