use std::collections::BTreeMap;

use crate::domain::{
    entities::common::{Permissions, RelativePath},
    error::DomainError,
};

/// The set of files one run will produce, before any content is rendered.
///
/// Built during planning from the file entries whose conditions held. It
/// contains no business logic beyond the uniqueness check.
#[derive(Debug, Clone, Default)]
pub struct ProjectStructure {
    pub(crate) files: Vec<PlannedFile>,
}

impl ProjectStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, entry: usize, destination: RelativePath, permissions: Permissions) {
        self.files.push(PlannedFile {
            entry,
            destination,
            permissions,
        });
    }

    /// Destinations must be pairwise distinct.
    ///
    /// Runs single-threaded, before anything is staged.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen: BTreeMap<&RelativePath, usize> = BTreeMap::new();
        for file in &self.files {
            if seen.insert(&file.destination, file.entry).is_some() {
                return Err(DomainError::DuplicateDestination {
                    path: file.destination.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn files(&self) -> impl Iterator<Item = &PlannedFile> {
        self.files.iter()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// Index into `Blueprint::files`.
    pub entry: usize,
    pub destination: RelativePath,
    pub permissions: Permissions,
}
