//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `trestle-adapters` crate provides implementations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::application::cancellation::CancellationToken;
use crate::domain::{Blueprint, ResolvedDependency};
use crate::error::TrestleResult;

/// Port for filesystem operations.
///
/// Implemented by:
/// - `trestle_adapters::filesystem::LocalFilesystem` (production)
/// - `trestle_adapters::filesystem::MemoryFilesystem` (testing, fault injection)
///
/// ## Design Notes
///
/// - Content is bytes; literal blueprint files need not be UTF-8
/// - Permissions are capability-based, not Unix-specific
/// - `rename` must be atomic for a single path where the platform allows it
pub trait Filesystem: Send + Sync {
    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> TrestleResult<()>;

    /// Write content to a file, replacing it if present.
    fn write_file(&self, path: &Path, content: &[u8]) -> TrestleResult<()>;

    /// Read a whole file.
    fn read_file(&self, path: &Path) -> TrestleResult<Vec<u8>>;

    /// Set or clear the executable bit.
    fn set_permissions(&self, path: &Path, executable: bool) -> TrestleResult<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> TrestleResult<()>;

    /// Remove a directory and all contents.
    fn remove_dir_all(&self, path: &Path) -> TrestleResult<()>;

    /// Move a file or directory.
    fn rename(&self, from: &Path, to: &Path) -> TrestleResult<()>;
}

/// A command to execute, already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(argv: Vec<String>, working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let mut argv = argv.into_iter();
        Self {
            program: argv.next().unwrap_or_default(),
            args: argv.collect(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
            timeout,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Program and arguments joined for display.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Exited,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub termination: Termination,
    pub duration: Duration,
}

impl ProcessOutput {
    /// Exited normally with status 0.
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited && self.exit_code == Some(0)
    }
}

/// Port for running hook commands.
///
/// Implemented by:
/// - `trestle_adapters::process::SystemProcessRunner` (production)
/// - `trestle_adapters::process::ScriptedProcessRunner` (testing)
///
/// A non-zero exit is a normal `Ok` outcome; `Err` means the process could
/// not be started or observed at all.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command: &CommandSpec, cancel: &CancellationToken)
    -> TrestleResult<ProcessOutput>;
}

/// Port for writing merged dependencies into a project manifest.
///
/// Implemented by:
/// - `trestle_adapters::manifest::CargoManifestWriter` (`Cargo.toml`)
pub trait ManifestWriter: Send + Sync {
    /// File name relative to the output root, e.g. `Cargo.toml`.
    fn manifest_name(&self) -> &str;

    /// Produce the updated manifest text.
    ///
    /// `existing` is `None` when the generated project has no manifest yet.
    fn apply(
        &self,
        existing: Option<&str>,
        dependencies: &[ResolvedDependency],
    ) -> TrestleResult<String>;
}

/// Port for blueprint lookup.
///
/// Implemented by:
/// - `trestle_adapters::blueprint_loader::ManifestLoader` (directory catalogue)
/// - `trestle_adapters::catalog::InMemoryCatalog` (testing, embedding)
/// - `crate::application::CachedLoader` (memoizing decorator)
pub trait BlueprintLoader: Send + Sync {
    /// Load and validate one blueprint by name.
    fn load(&self, name: &str) -> TrestleResult<Blueprint>;

    /// Names of every blueprint in the catalogue, sorted.
    fn list(&self) -> TrestleResult<Vec<String>>;
}
