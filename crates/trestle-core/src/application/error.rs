//! Application layer errors.
//!
//! These errors represent failures in orchestration and in the ports, not
//! business logic. Business logic errors are `DomainError` from
//! `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors raised by ports and application services.
#[derive(Debug, Error, Clone)]
pub enum ApplicationError {
    /// No blueprint with this name in the catalogue.
    #[error("Blueprint '{name}' not found")]
    BlueprintNotFound { name: String },

    /// A blueprint exists but its manifest could not be read or parsed.
    #[error("Failed to load blueprint '{name}': {reason}")]
    BlueprintLoad { name: String, reason: String },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// A process could not be spawned or waited on.
    #[error("Failed to run '{program}': {reason}")]
    ProcessFailed { program: String, reason: String },

    /// The manifest writer could not update the project manifest.
    #[error("Failed to update {manifest}: {reason}")]
    ManifestFailed { manifest: String, reason: String },

    /// Store access failed (lock poisoned, etc.).
    #[error("Blueprint cache error")]
    StoreLockError,

    /// Port/Adapter not configured.
    #[error("Required adapter not configured: {name}")]
    AdapterNotConfigured { name: &'static str },
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::BlueprintNotFound { name } => vec![
                format!("No blueprint named '{name}' in the catalogue"),
                "Try: trestle list to see available blueprints".into(),
                "Or point --catalog at the directory that contains it".into(),
            ],
            Self::BlueprintLoad { .. } => vec![
                "Check blueprint.toml for syntax errors".into(),
                "Try: trestle validate <DIR> for a full report".into(),
            ],
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
                "Ensure the parent directory exists".into(),
            ],
            Self::ProcessFailed { program, .. } => vec![
                format!("Make sure '{program}' is installed and on PATH"),
                "Or skip hooks with --no-hooks".into(),
            ],
            Self::StoreLockError => vec![
                "The blueprint cache is locked".into(),
                "Try again in a moment".into(),
            ],
            Self::AdapterNotConfigured { name } => vec![
                format!("Required component not configured: {name}"),
                "This is likely a configuration error".into(),
            ],
            Self::ManifestFailed { .. } => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BlueprintNotFound { .. } => ErrorCategory::NotFound,
            Self::BlueprintLoad { .. } => ErrorCategory::Validation,
            Self::FilesystemError { .. }
            | Self::ProcessFailed { .. }
            | Self::ManifestFailed { .. }
            | Self::StoreLockError => ErrorCategory::Internal,
            Self::AdapterNotConfigured { .. } => ErrorCategory::Configuration,
        }
    }
}
