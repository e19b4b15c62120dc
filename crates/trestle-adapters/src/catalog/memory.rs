//! In-memory blueprint catalogue.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use trestle_core::{
    application::{ApplicationError, ports::BlueprintLoader},
    domain::{Blueprint, DomainValidator as validator},
    error::TrestleResult,
};

/// Thread-safe in-memory catalogue, keyed by blueprint name.
///
/// Used for embedding blueprints in a binary and as a test double.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    inner: Arc<RwLock<BTreeMap<String, Blueprint>>>,
}

impl InMemoryCatalog {
    /// Create a new empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a blueprint, replacing any with the same name.
    pub fn insert(&self, blueprint: Blueprint) -> TrestleResult<()> {
        validator::validate_blueprint(&blueprint)?;
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.insert(blueprint.id.name().to_string(), blueprint);
        Ok(())
    }

    pub fn with(self, blueprint: Blueprint) -> TrestleResult<Self> {
        self.insert(blueprint)?;
        Ok(self)
    }

    /// Remove a blueprint by name.
    pub fn remove(&self, name: &str) -> TrestleResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ApplicationError::BlueprintNotFound { name: name.into() }.into())
    }

    /// Get the number of blueprints.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.len()).unwrap_or(0)
    }

    /// Check if catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlueprintLoader for InMemoryCatalog {
    fn load(&self, name: &str) -> TrestleResult<Blueprint> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner
            .get(name)
            .cloned()
            .ok_or_else(|| ApplicationError::BlueprintNotFound { name: name.into() }.into())
    }

    fn list(&self) -> TrestleResult<Vec<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.keys().cloned().collect())
    }
}
