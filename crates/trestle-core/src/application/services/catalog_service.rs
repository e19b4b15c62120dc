//! Catalog Service - blueprint lookup and listing.
//!
//! Separated from `GenerationService` for single responsibility: this one
//! only reads the catalogue, it never writes anything.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{
    application::ports::BlueprintLoader,
    domain::{Architecture, Blueprint},
    error::TrestleResult,
};

/// DTO for blueprint listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlueprintInfo {
    /// `name@version`.
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub architecture: Option<Architecture>,
    pub tags: Vec<String>,
    pub variables: usize,
    pub files: usize,
}

impl From<&Blueprint> for BlueprintInfo {
    fn from(blueprint: &Blueprint) -> Self {
        Self {
            id: blueprint.id.to_string(),
            name: blueprint.id.name().to_string(),
            display_name: blueprint.metadata.display_name.clone(),
            description: blueprint.metadata.description.clone(),
            architecture: blueprint.metadata.architecture,
            tags: blueprint.metadata.tags.clone(),
            variables: blueprint.variables.len(),
            files: blueprint.files.len(),
        }
    }
}

/// One catalogue entry that failed to load while listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenBlueprint {
    pub name: String,
    pub reason: String,
}

/// Result of listing a catalogue: good entries plus the ones that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogListing {
    pub blueprints: Vec<BlueprintInfo>,
    pub broken: Vec<BrokenBlueprint>,
}

/// Service for catalogue queries.
pub struct CatalogService {
    loader: Box<dyn BlueprintLoader>,
}

impl CatalogService {
    pub fn new(loader: Box<dyn BlueprintLoader>) -> Self {
        Self { loader }
    }

    /// Load and validate a blueprint by name.
    #[instrument(skip(self))]
    pub fn load(&self, name: &str) -> TrestleResult<Blueprint> {
        let blueprint = self.loader.load(name)?;
        debug!(id = %blueprint.id, "Blueprint loaded");
        Ok(blueprint)
    }

    /// List every blueprint, sorted by name.
    ///
    /// One broken entry does not hide the rest of the catalogue.
    #[instrument(skip(self))]
    pub fn list(&self) -> TrestleResult<CatalogListing> {
        let mut listing = CatalogListing::default();
        for name in self.loader.list()? {
            match self.loader.load(&name) {
                Ok(blueprint) => listing.blueprints.push(BlueprintInfo::from(&blueprint)),
                Err(e) => {
                    warn!(blueprint = %name, error = %e, "Skipping broken blueprint");
                    listing.broken.push(BrokenBlueprint {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        listing.blueprints.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    /// Blueprints carrying `tag`.
    pub fn find_by_tag(&self, tag: &str) -> TrestleResult<Vec<BlueprintInfo>> {
        Ok(self
            .list()?
            .blueprints
            .into_iter()
            .filter(|info| info.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .collect())
    }
}
