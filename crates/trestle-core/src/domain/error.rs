// ============================================================================
// domain/error.rs - STRUCTURAL ERRORS
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// Raised while building or validating a blueprint, and while rendering
/// destination paths. All errors are:
/// - Cloneable (collected into reports)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Blueprint shape
    // ========================================================================
    #[error("Invalid blueprint: {0}")]
    InvalidBlueprint(String),

    #[error("Blueprint '{blueprint}' declares no files")]
    EmptyBlueprint { blueprint: String },

    #[error("Required field missing: {field}")]
    MissingRequiredField { field: &'static str },

    #[error("Variable '{name}' is declared more than once")]
    DuplicateVariable { name: String },

    #[error("Variable '{name}' is invalid: {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("Destination '{path}' is produced by more than one file entry")]
    DuplicateDestination { path: String },

    // ========================================================================
    // Paths
    // ========================================================================
    #[error("Unsafe destination '{path}': {reason}")]
    UnsafeDestination { path: String, reason: String },

    // ========================================================================
    // References and syntax
    // ========================================================================
    #[error("{location} references undeclared variable '{name}'")]
    UnresolvedReference { location: String, name: String },

    #[error("Default of '{variable}' references '{referenced}', which is declared later")]
    ForwardReference {
        variable: String,
        referenced: String,
    },

    #[error("Invalid expression in {location}: {message}")]
    InvalidExpression { location: String, message: String },

    #[error("Invalid template in {location}: {message}")]
    InvalidTemplate { location: String, message: String },

    // ========================================================================
    // Dependencies
    // ========================================================================
    #[error("Invalid version constraint '{constraint}' for '{module}': {reason}")]
    InvalidVersion {
        module: String,
        constraint: String,
        reason: String,
    },

    #[error("Dependency '{module}' is pinned to both '{first}' and '{second}'")]
    DependencyConflict {
        module: String,
        first: String,
        second: String,
    },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidBlueprint(msg) => vec![
                "Check the blueprint manifest".into(),
                format!("Details: {msg}"),
            ],
            Self::EmptyBlueprint { blueprint } => vec![
                format!("Blueprint '{blueprint}' has nothing to generate"),
                "Add [[files]] entries or a files/ directory".into(),
            ],
            Self::DuplicateVariable { name } => {
                vec![format!("Remove or rename the second declaration of '{name}'")]
            }
            Self::DuplicateDestination { path } => vec![
                format!("Two file entries render to '{path}'"),
                "Give one of them a condition or a different destination".into(),
            ],
            Self::UnsafeDestination { .. } => vec![
                "Destinations must stay inside the output directory".into(),
                "Remove leading '/' and any '..' components".into(),
            ],
            Self::UnresolvedReference { name, .. } => vec![
                format!("Declare '{name}' in [[variables]]"),
                "Or fix the spelling of the reference".into(),
            ],
            Self::ForwardReference { variable, referenced } => vec![format!(
                "Move the declaration of '{referenced}' above '{variable}'"
            )],
            Self::InvalidVersion { .. } => vec![
                "Use semver requirement syntax, e.g. \"1.0\", \"^0.4\", \"=1.2.3\"".into(),
            ],
            Self::DependencyConflict { module, .. } => vec![
                format!("Only one entry may pin '{module}'"),
                "Drop the `pinned` flag or the exact '=' constraint on one of them".into(),
            ],
            _ => vec!["See the blueprint documentation for more details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DependencyConflict { .. } | Self::DuplicateDestination { .. } => {
                ErrorCategory::Conflict
            }
            Self::MissingRequiredField { .. } => ErrorCategory::Internal,
            _ => ErrorCategory::Validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    Internal,
}
