//! Tag-keyed factories for commands and events.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("No factory registered for type {0}")]
    UnknownType(String),

    #[error("Invalid arguments for {type_name}: {reason}")]
    InvalidArguments { type_name: String, reason: String },
}

impl RegistryError {
    pub fn invalid_arguments(type_name: impl Into<String>, reason: impl ToString) -> Self {
        RegistryError::InvalidArguments {
            type_name: type_name.into(),
            reason: reason.to_string(),
        }
    }
}

type Factory<T, A> = Box<dyn Fn(A) -> Result<T, RegistryError> + Send + Sync>;

/// Maps a type tag to a factory building a value from arguments.
///
/// Lookups of unregistered tags return [`RegistryError::UnknownType`].
pub struct Registry<T, A = Value> {
    factories: BTreeMap<String, Factory<T, A>>,
}

impl<T, A> Registry<T, A> {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registers a factory, replacing any previous one under the same tag.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        factory: impl Fn(A) -> Result<T, RegistryError> + Send + Sync + 'static,
    ) {
        let type_name = type_name.into();
        if self.factories.insert(type_name.clone(), Box::new(factory)).is_some() {
            tracing::debug!(%type_name, "factory replaced");
        }
    }

    pub fn with(
        mut self,
        type_name: impl Into<String>,
        factory: impl Fn(A) -> Result<T, RegistryError> + Send + Sync + 'static,
    ) -> Self {
        self.register(type_name, factory);
        self
    }

    /// Builds a value with the factory registered under `type_name`.
    pub fn create(&self, type_name: &str, args: A) -> Result<T, RegistryError> {
        let factory = self.get_type(type_name)?;
        factory(args)
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn get_type(
        &self,
        type_name: &str,
    ) -> Result<&(dyn Fn(A) -> Result<T, RegistryError> + Send + Sync), RegistryError> {
        self.factories
            .get(type_name)
            .map(|factory| factory.as_ref())
            .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))
    }

    /// Returns the registered tags in sorted order.
    pub fn list_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<T, A> Default for Registry<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A> std::fmt::Debug for Registry<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.list_types())
            .finish()
    }
}
