use std::collections::HashMap;
use std::sync::RwLock;

use tracing::trace;

use crate::{
    application::{ApplicationError, ports::BlueprintLoader},
    domain::Blueprint,
    error::TrestleResult,
};

/// Memoizing decorator over any [`BlueprintLoader`].
///
/// Blueprints are immutable once loaded, so a cached copy is always valid
/// for the lifetime of the process. Listing is never cached.
pub struct CachedLoader<L> {
    inner: L,
    cache: RwLock<HashMap<String, Blueprint>>,
}

impl<L: BlueprintLoader> CachedLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Number of cached blueprints.
    pub fn cached(&self) -> TrestleResult<usize> {
        Ok(self
            .cache
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?
            .len())
    }
}

impl<L: BlueprintLoader> BlueprintLoader for CachedLoader<L> {
    fn load(&self, name: &str) -> TrestleResult<Blueprint> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| ApplicationError::StoreLockError)?;
            if let Some(blueprint) = cache.get(name) {
                trace!(blueprint = name, "Cache hit");
                return Ok(blueprint.clone());
            }
        }

        let blueprint = self.inner.load(name)?;
        self.cache
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?
            .insert(name.to_string(), blueprint.clone());
        Ok(blueprint)
    }

    fn list(&self) -> TrestleResult<Vec<String>> {
        self.inner.list()
    }
}
