//! Generation outcome types.

use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::domain::{
    BlueprintId, ExpressionError, RelativePath, ResolvedDependency, TemplateError,
    ValidationError, ValidationReport,
};

/// Orchestrator stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resolve,
    Plan,
    Stage,
    Commit,
    Merge,
    Hooks,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolve => "resolve",
            Self::Plan => "plan",
            Self::Stage => "stage",
            Self::Commit => "commit",
            Self::Merge => "merge",
            Self::Hooks => "hooks",
        })
    }
}

/// Everything that can go wrong during a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("variable validation failed:\n{}", ValidationReport(.0))]
    Validation(Vec<ValidationError>),

    #[error("{location}: {source}")]
    Expression {
        location: String,
        source: ExpressionError,
    },

    #[error("rendering {file}: {source}")]
    Render {
        file: String,
        source: TemplateError,
    },

    #[error("{file} renders to unsafe destination '{path}': {reason}")]
    UnsafeDestination {
        file: String,
        path: String,
        reason: String,
    },

    #[error("more than one file renders to '{path}'")]
    DuplicateDestination { path: String },

    #[error("'{path}' already exists; pass overwrite to replace it")]
    DestinationExists { path: String },

    #[error("dependency '{module}' is pinned to both '{first}' and '{second}'")]
    DependencyConflict {
        module: String,
        first: String,
        second: String,
    },

    #[error("staging {path}: {reason}")]
    Staging { path: String, reason: String },

    #[error("commit failed at {path}: {reason}")]
    Commit { path: PathBuf, reason: String },

    #[error("rollback incomplete at {path}: {reason}")]
    Rollback { path: PathBuf, reason: String },

    #[error("updating {manifest}: {reason}")]
    Manifest { manifest: String, reason: String },

    #[error("hook '{hook}' failed: {reason}")]
    Hook { hook: String, reason: String },

    #[error("cancelled before {stage}")]
    Cancelled { stage: Stage },
}

impl GenerationError {
    /// Stage the error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Validation(_) => Stage::Resolve,
            Self::Expression { .. }
            | Self::UnsafeDestination { .. }
            | Self::DuplicateDestination { .. }
            | Self::DestinationExists { .. }
            | Self::DependencyConflict { .. } => Stage::Plan,
            Self::Render { .. } | Self::Staging { .. } => Stage::Stage,
            Self::Commit { .. } | Self::Rollback { .. } => Stage::Commit,
            Self::Manifest { .. } => Stage::Merge,
            Self::Hook { .. } => Stage::Hooks,
            Self::Cancelled { stage } => *stage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Every stage finished; non-required hooks may still have failed.
    Completed,
    /// Output was committed, or staging failed after planning; see errors.
    PartiallyFailed,
    /// Nothing was committed.
    Aborted,
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::PartiallyFailed => "partially failed",
            Self::Aborted => "aborted",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: RelativePath,
    pub size: u64,
    pub executable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
    /// Could not be started.
    Errored,
    /// Not run because an earlier required hook failed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookOutcome {
    pub name: String,
    pub command: String,
    pub required: bool,
    pub status: HookStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl HookOutcome {
    pub(crate) fn skipped(name: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            command: String::new(),
            required,
            status: HookStatus::Skipped,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }
}

/// Report of one generation run. Never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub blueprint: BlueprintId,
    pub output_dir: PathBuf,
    pub status: GenerationStatus,
    pub files: Vec<WrittenFile>,
    pub dependencies: Vec<ResolvedDependency>,
    pub hooks: Vec<HookOutcome>,
    #[serde(serialize_with = "messages")]
    pub errors: Vec<GenerationError>,
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        self.status == GenerationStatus::Completed
    }
}

fn messages<S: Serializer>(errors: &[GenerationError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}
