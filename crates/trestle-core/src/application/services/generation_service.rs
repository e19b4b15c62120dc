//! Generation Service - the main application orchestrator.
//!
//! Turns a blueprint, a set of overrides and an output directory into a
//! generated project. The run is a state machine:
//!
//! ```text
//! Resolve ─► Plan ─► Stage ─► Commit ─► Merge ─► Hooks ─► Report
//!    │         │        │        │         │        │
//!    └─Aborted─┘        │        └Aborted  └────────┴─► PartiallyFailed
//!                       └─► PartiallyFailed (nothing committed)
//! ```
//!
//! | Stage   | Failure effect                                               |
//! |---------|--------------------------------------------------------------|
//! | Resolve | `Aborted`, filesystem untouched                              |
//! | Plan    | `Aborted`, filesystem untouched                              |
//! | Stage   | `PartiallyFailed`, staging removed, destination untouched    |
//! | Commit  | rollback, then `Aborted`                                     |
//! | Merge   | recorded, `PartiallyFailed`, hooks still run                 |
//! | Hooks   | optional: recorded; required: later hooks skipped, `PartiallyFailed` |
//!
//! Cancellation is observed before every stage and before each hook. Before
//! Commit it yields `Aborted`; after Commit it yields `PartiallyFailed` with
//! the committed files still reported.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    application::{
        cancellation::CancellationToken,
        ports::{CommandSpec, Filesystem, ManifestWriter, ProcessRunner, Termination},
        services::report::{
            GenerationError, GenerationResult, GenerationStatus, HookOutcome, HookStatus, Stage,
            WrittenFile,
        },
    },
    domain::{
        Blueprint, DomainError, DomainValidator, FileContent, HookSpec, Overrides, Permissions, PlannedFile,
        ProjectStructure, RelativePath, ResolvedDependency, ResolvedVariables, TemplateError,
        merge_dependencies, render_destination, resolve,
    },
};

/// Knobs the caller controls per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Timeout for hooks that do not declare their own.
    pub hook_timeout: Duration,
    pub run_hooks: bool,
    /// Render files on rayon workers.
    pub parallel: bool,
    /// Replace files that already exist in the output directory.
    pub overwrite: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            hook_timeout: Duration::from_secs(120),
            run_hooks: true,
            parallel: true,
            overwrite: false,
        }
    }
}

/// Main generation service.
pub struct GenerationService {
    filesystem: Box<dyn Filesystem>,
    process_runner: Box<dyn ProcessRunner>,
    manifest_writer: Option<Box<dyn ManifestWriter>>,
    options: GenerationOptions,
}

/// What planning decided, before anything touches the filesystem.
struct Plan<'a> {
    structure: ProjectStructure,
    dependencies: Vec<ResolvedDependency>,
    hooks: Vec<&'a HookSpec>,
}

struct StagedFile {
    planned: PlannedFile,
    size: u64,
}

/// Undo log for the file-by-file commit.
enum CommitStep {
    CreatedDir(PathBuf),
    BackedUp { original: PathBuf, backup: PathBuf },
    Moved(PathBuf),
}

impl GenerationService {
    /// Create a new generation service with the given adapters.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let service = GenerationService::new(
    ///     Box::new(LocalFilesystem::new()),
    ///     Box::new(SystemProcessRunner::new()),
    /// )
    /// .with_manifest_writer(Box::new(CargoManifestWriter::new()));
    /// ```
    pub fn new(filesystem: Box<dyn Filesystem>, process_runner: Box<dyn ProcessRunner>) -> Self {
        Self {
            filesystem,
            process_runner,
            manifest_writer: None,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_manifest_writer(mut self, writer: Box<dyn ManifestWriter>) -> Self {
        self.manifest_writer = Some(writer);
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Generate a project from `blueprint` into `output_dir`.
    ///
    /// Never returns `Err`: every failure is described in the result.
    #[instrument(
        skip_all,
        fields(
            blueprint = %blueprint.id,
            output = %output_dir.as_ref().display()
        )
    )]
    pub fn generate(
        &self,
        blueprint: &Blueprint,
        overrides: &Overrides,
        output_dir: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> GenerationResult {
        let output_dir = output_dir.as_ref();
        let mut result = GenerationResult {
            blueprint: blueprint.id.clone(),
            output_dir: output_dir.to_path_buf(),
            status: GenerationStatus::Completed,
            files: Vec::new(),
            dependencies: Vec::new(),
            hooks: Vec::new(),
            errors: Vec::new(),
        };

        // 1. Resolve
        if let Some(aborted) = self.checkpoint(cancel, Stage::Resolve, &mut result) {
            return aborted;
        }
        info!(stage = %Stage::Resolve, "Resolving variables");
        let vars = match resolve(&blueprint.variables, overrides) {
            Ok(vars) => vars,
            Err(errors) => {
                warn!(count = errors.len(), "Variable validation failed");
                return abort(result, vec![GenerationError::Validation(errors)]);
            }
        };

        // 2. Plan
        if let Some(aborted) = self.checkpoint(cancel, Stage::Plan, &mut result) {
            return aborted;
        }
        info!(stage = %Stage::Plan, "Planning output");
        let plan = match self.plan(blueprint, &vars, output_dir) {
            Ok(plan) => plan,
            Err(errors) => {
                warn!(count = errors.len(), "Planning failed");
                return abort(result, errors);
            }
        };
        info!(
            files = plan.structure.file_count(),
            dependencies = plan.dependencies.len(),
            hooks = plan.hooks.len(),
            "Plan ready"
        );

        // 3. Stage
        if let Some(aborted) = self.checkpoint(cancel, Stage::Stage, &mut result) {
            return aborted;
        }
        let staging_dir = staging_path(output_dir, "staging");
        // Ancestors of the output that staging may create and a failure must remove.
        let created_parent = output_dir
            .parent()
            .and_then(|parent| self.first_missing_ancestor(parent));
        let cleanup = |staging_dir: &Path| {
            self.discard(staging_dir);
            if let Some(dir) = &created_parent {
                self.discard(dir);
            }
        };
        info!(stage = %Stage::Stage, dir = %staging_dir.display(), "Staging files");
        let staged = match self.stage(blueprint, &vars, &plan.structure, &staging_dir) {
            Ok(staged) => staged,
            Err(errors) => {
                warn!(count = errors.len(), "Staging failed, nothing committed");
                cleanup(&staging_dir);
                result.errors = errors;
                result.status = GenerationStatus::PartiallyFailed;
                return result;
            }
        };

        // 4. Commit
        if cancel.is_cancelled() {
            cleanup(&staging_dir);
            return abort(
                result,
                vec![GenerationError::Cancelled {
                    stage: Stage::Commit,
                }],
            );
        }
        info!(stage = %Stage::Commit, "Committing output");
        if let Err(errors) = self.commit(&staged, &staging_dir, output_dir) {
            error!("Commit failed, output rolled back");
            cleanup(&staging_dir);
            return abort(result, errors);
        }
        self.discard(&staging_dir);
        result.files = staged
            .iter()
            .map(|s| WrittenFile {
                path: s.planned.destination.clone(),
                size: s.size,
                executable: s.planned.permissions.executable_flag(),
            })
            .collect();

        // 5. Merge dependencies
        if self.checkpoint(cancel, Stage::Merge, &mut result).is_some() {
            result.status = GenerationStatus::PartiallyFailed;
            return result;
        }
        if !plan.dependencies.is_empty() {
            info!(stage = %Stage::Merge, count = plan.dependencies.len(), "Merging dependencies");
            match self.merge_manifest(&plan.dependencies, output_dir, &mut result) {
                Ok(()) => result.dependencies = plan.dependencies.clone(),
                Err(e) => {
                    warn!(error = %e, "Dependency merge failed");
                    result.errors.push(e);
                    result.status = GenerationStatus::PartiallyFailed;
                }
            }
        }

        // 6. Hooks
        if self.options.run_hooks {
            self.run_hooks(blueprint, &plan.hooks, &vars, output_dir, cancel, &mut result);
        } else if !plan.hooks.is_empty() {
            info!(count = plan.hooks.len(), "Hooks disabled, skipping");
        }

        // 7. Report
        info!(status = %result.status, files = result.files.len(), "Generation finished");
        result
    }

    /// `Some(aborted result)` if the run was cancelled before `stage`.
    fn checkpoint(
        &self,
        cancel: &CancellationToken,
        stage: Stage,
        result: &mut GenerationResult,
    ) -> Option<GenerationResult> {
        if !cancel.is_cancelled() {
            return None;
        }
        warn!(stage = %stage, "Run cancelled");
        result.errors.push(GenerationError::Cancelled { stage });
        result.status = GenerationStatus::Aborted;
        Some(result.clone())
    }

    // -------------------------------------------------------------------------
    // Plan
    // -------------------------------------------------------------------------

    fn plan<'a>(
        &self,
        blueprint: &'a Blueprint,
        vars: &ResolvedVariables,
        output_dir: &Path,
    ) -> Result<Plan<'a>, Vec<GenerationError>> {
        let mut errors = Vec::new();
        let mut structure = ProjectStructure::new();

        for (index, file) in blueprint.files.iter().enumerate() {
            let location = format!("file '{}'", file.source);
            match included(file.condition.as_ref(), vars, &location) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(file = %file.source, "Condition false, skipping");
                    continue;
                }
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            }

            match render_destination(&file.destination, vars) {
                Ok(destination) => structure.add_file(
                    index,
                    destination,
                    Permissions::from_flag(file.executable),
                ),
                Err(TemplateError::UnsafeDestination { path, reason }) => {
                    errors.push(GenerationError::UnsafeDestination {
                        file: file.source.to_string(),
                        path,
                        reason,
                    });
                }
                Err(source) => errors.push(GenerationError::Render {
                    file: format!("destination of {location}"),
                    source,
                }),
            }
        }

        if let Err(DomainError::DuplicateDestination { path }) =
            DomainValidator::validate_project_structure(&structure)
        {
            errors.push(GenerationError::DuplicateDestination { path });
        }

        if !self.options.overwrite {
            for planned in structure.files() {
                let target = output_dir.join(planned.destination.as_path());
                if self.filesystem.exists(&target) {
                    errors.push(GenerationError::DestinationExists {
                        path: target.display().to_string(),
                    });
                }
            }
        }

        let mut satisfied = Vec::new();
        for dep in &blueprint.dependencies {
            let location = format!("dependency '{}'", dep.module);
            match included(dep.condition.as_ref(), vars, &location) {
                Ok(true) => satisfied.push(dep),
                Ok(false) => {}
                Err(e) => errors.push(e),
            }
        }
        let dependencies = match merge_dependencies(satisfied) {
            Ok(deps) => deps,
            Err(DomainError::DependencyConflict {
                module,
                first,
                second,
            }) => {
                errors.push(GenerationError::DependencyConflict {
                    module,
                    first,
                    second,
                });
                Vec::new()
            }
            Err(other) => {
                errors.push(GenerationError::DependencyConflict {
                    module: String::new(),
                    first: other.to_string(),
                    second: String::new(),
                });
                Vec::new()
            }
        };

        let mut hooks = Vec::new();
        for hook in &blueprint.hooks {
            let location = format!("hook '{}'", hook.name);
            match included(hook.condition.as_ref(), vars, &location) {
                Ok(true) => hooks.push(hook),
                Ok(false) => {}
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(Plan {
                structure,
                dependencies,
                hooks,
            })
        } else {
            Err(errors)
        }
    }

    // -------------------------------------------------------------------------
    // Stage
    // -------------------------------------------------------------------------

    fn stage(
        &self,
        blueprint: &Blueprint,
        vars: &ResolvedVariables,
        structure: &ProjectStructure,
        staging_dir: &Path,
    ) -> Result<Vec<StagedFile>, Vec<GenerationError>> {
        let planned: Vec<&PlannedFile> = structure.files().collect();
        let stage_one = |p: &&PlannedFile| self.stage_file(blueprint, vars, p, staging_dir);

        let outcomes: Vec<Result<StagedFile, GenerationError>> = if self.options.parallel {
            planned.par_iter().map(stage_one).collect()
        } else {
            planned.iter().map(stage_one).collect()
        };

        let mut staged = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(file) => staged.push(file),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(staged)
        } else {
            Err(errors)
        }
    }

    fn stage_file(
        &self,
        blueprint: &Blueprint,
        vars: &ResolvedVariables,
        planned: &PlannedFile,
        staging_dir: &Path,
    ) -> Result<StagedFile, GenerationError> {
        let entry = &blueprint.files[planned.entry];
        let content = match &entry.content {
            FileContent::Literal(bytes) => bytes.clone(),
            FileContent::Template(template) => template
                .render(vars)
                .map_err(|source| GenerationError::Render {
                    file: entry.source.to_string(),
                    source,
                })?
                .into_bytes(),
        };

        let path = staging_dir.join(planned.destination.as_path());
        let staging_error = |e: crate::error::TrestleError| GenerationError::Staging {
            path: planned.destination.to_string(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            self.filesystem
                .create_dir_all(parent)
                .map_err(staging_error)?;
        }
        self.filesystem
            .write_file(&path, &content)
            .map_err(staging_error)?;
        if planned.permissions.executable_flag() {
            self.filesystem
                .set_permissions(&path, true)
                .map_err(staging_error)?;
        }

        debug!(file = %planned.destination, bytes = content.len(), "Staged");
        Ok(StagedFile {
            planned: planned.clone(),
            size: content.len() as u64,
        })
    }

    /// Best-effort removal of a scratch directory.
    fn discard(&self, dir: &Path) {
        if !self.filesystem.exists(dir) {
            return;
        }
        if let Err(e) = self.filesystem.remove_dir_all(dir) {
            warn!(error = %e, path = %dir.display(), "Failed to remove scratch directory");
        }
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    fn commit(
        &self,
        staged: &[StagedFile],
        staging_dir: &Path,
        output_dir: &Path,
    ) -> Result<(), Vec<GenerationError>> {
        let mut journal = Vec::new();

        if !self.filesystem.exists(output_dir) && self.filesystem.exists(staging_dir) {
            if let Some(parent) = output_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = self.ensure_dir(parent, &mut journal) {
                    let mut errors = vec![e];
                    errors.extend(self.rollback(journal));
                    return Err(errors);
                }
            }
            match self.filesystem.rename(staging_dir, output_dir) {
                Ok(()) => {
                    debug!("Committed by directory rename");
                    return Ok(());
                }
                Err(e) => debug!(error = %e, "Directory rename failed, moving files one by one"),
            }
        }

        let backup_dir = staging_path(output_dir, "backup");
        // Zero planned files still leave an output directory for the manifest and hooks.
        let outcome = self.ensure_dir(output_dir, &mut journal).and_then(|()| {
            self.move_files(staged, staging_dir, output_dir, &backup_dir, &mut journal)
        });

        let result = match outcome {
            Ok(()) => Ok(()),
            Err(failure) => {
                let mut errors = vec![failure];
                errors.extend(self.rollback(journal));
                Err(errors)
            }
        };
        self.discard(&backup_dir);
        result
    }

    fn move_files(
        &self,
        staged: &[StagedFile],
        staging_dir: &Path,
        output_dir: &Path,
        backup_dir: &Path,
        journal: &mut Vec<CommitStep>,
    ) -> Result<(), GenerationError> {
        let commit_error = |path: &Path, e: crate::error::TrestleError| GenerationError::Commit {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        for file in staged {
            let relative = file.planned.destination.as_path();
            let from = staging_dir.join(relative);
            let to = output_dir.join(relative);

            if let Some(parent) = to.parent() {
                self.ensure_dir(parent, journal)?;
            }

            if self.filesystem.exists(&to) {
                let backup = backup_dir.join(relative);
                if let Some(parent) = backup.parent() {
                    self.filesystem
                        .create_dir_all(parent)
                        .map_err(|e| commit_error(parent, e))?;
                }
                self.filesystem
                    .rename(&to, &backup)
                    .map_err(|e| commit_error(&to, e))?;
                journal.push(CommitStep::BackedUp {
                    original: to.clone(),
                    backup,
                });
            }

            self.filesystem
                .rename(&from, &to)
                .map_err(|e| commit_error(&to, e))?;
            journal.push(CommitStep::Moved(to));
        }
        Ok(())
    }

    /// Create `dir` if needed, journaling the highest directory created.
    fn ensure_dir(&self, dir: &Path, journal: &mut Vec<CommitStep>) -> Result<(), GenerationError> {
        let Some(created) = self.first_missing_ancestor(dir) else {
            return Ok(());
        };
        self.filesystem
            .create_dir_all(dir)
            .map_err(|e| GenerationError::Commit {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        journal.push(CommitStep::CreatedDir(created));
        Ok(())
    }

    /// Highest ancestor of `dir` (inclusive) that does not exist yet.
    fn first_missing_ancestor(&self, dir: &Path) -> Option<PathBuf> {
        let mut missing = None;
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty()
                || ancestor.parent().is_none()
                || self.filesystem.exists(ancestor)
            {
                break;
            }
            missing = Some(ancestor.to_path_buf());
        }
        missing
    }

    fn rollback(&self, journal: Vec<CommitStep>) -> Vec<GenerationError> {
        let mut errors = Vec::new();
        for step in journal.into_iter().rev() {
            let (path, outcome) = match step {
                CommitStep::Moved(path) => {
                    let outcome = self.filesystem.remove_file(&path);
                    (path, outcome)
                }
                CommitStep::BackedUp { original, backup } => {
                    let outcome = self.filesystem.rename(&backup, &original);
                    (original, outcome)
                }
                CommitStep::CreatedDir(dir) => {
                    let outcome = self.filesystem.remove_dir_all(&dir);
                    (dir, outcome)
                }
            };
            if let Err(e) = outcome {
                error!(error = %e, path = %path.display(), "Rollback step failed");
                errors.push(GenerationError::Rollback {
                    path,
                    reason: e.to_string(),
                });
            }
        }
        errors
    }

    // -------------------------------------------------------------------------
    // Merge
    // -------------------------------------------------------------------------

    fn merge_manifest(
        &self,
        dependencies: &[ResolvedDependency],
        output_dir: &Path,
        result: &mut GenerationResult,
    ) -> Result<(), GenerationError> {
        let Some(writer) = &self.manifest_writer else {
            return Err(GenerationError::Manifest {
                manifest: "manifest".into(),
                reason: "no manifest writer configured".into(),
            });
        };
        let name = writer.manifest_name().to_string();
        let path = output_dir.join(&name);
        let manifest_error = |reason: String| GenerationError::Manifest {
            manifest: name.clone(),
            reason,
        };

        let existing = if self.filesystem.exists(&path) {
            let bytes = self
                .filesystem
                .read_file(&path)
                .map_err(|e| manifest_error(e.to_string()))?;
            Some(String::from_utf8(bytes).map_err(|e| manifest_error(e.to_string()))?)
        } else {
            None
        };

        let updated = writer
            .apply(existing.as_deref(), dependencies)
            .map_err(|e| manifest_error(e.to_string()))?;
        self.filesystem
            .write_file(&path, updated.as_bytes())
            .map_err(|e| manifest_error(e.to_string()))?;

        let size = updated.len() as u64;
        match result
            .files
            .iter_mut()
            .find(|f| f.path.as_path() == Path::new(&name))
        {
            Some(file) => file.size = size,
            None => {
                if let Ok(path) = RelativePath::sanitize(&name) {
                    result.files.push(WrittenFile {
                        path,
                        size,
                        executable: false,
                    });
                }
            }
        }
        debug!(manifest = %name, "Manifest updated");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Hooks
    // -------------------------------------------------------------------------

    fn run_hooks(
        &self,
        blueprint: &Blueprint,
        hooks: &[&HookSpec],
        vars: &ResolvedVariables,
        output_dir: &Path,
        cancel: &CancellationToken,
        result: &mut GenerationResult,
    ) {
        for (position, hook) in hooks.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(hook = %hook.name, "Run cancelled before hook");
                result.errors.push(GenerationError::Cancelled {
                    stage: Stage::Hooks,
                });
                result.status = GenerationStatus::PartiallyFailed;
                return;
            }

            info!(stage = %Stage::Hooks, hook = %hook.name, "Running hook");
            let outcome = self.run_hook(blueprint, hook, vars, output_dir, cancel);

            if outcome.status != HookStatus::Succeeded {
                let reason = describe_failure(&outcome);
                warn!(hook = %hook.name, required = hook.required, %reason, "Hook failed");
                result.errors.push(GenerationError::Hook {
                    hook: hook.name.clone(),
                    reason,
                });
                result.hooks.push(outcome);

                if hook.required {
                    result.status = GenerationStatus::PartiallyFailed;
                    for rest in &hooks[position + 1..] {
                        debug!(hook = %rest.name, "Skipped after required hook failure");
                        result
                            .hooks
                            .push(HookOutcome::skipped(&rest.name, rest.required));
                    }
                    return;
                }
                continue;
            }

            result.hooks.push(outcome);
        }
    }

    fn run_hook(
        &self,
        blueprint: &Blueprint,
        hook: &HookSpec,
        vars: &ResolvedVariables,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> HookOutcome {
        let mut outcome = HookOutcome::skipped(&hook.name, hook.required);
        outcome.status = HookStatus::Errored;

        let command = match self.prepare_hook(blueprint, hook, vars, output_dir) {
            Ok(command) => command,
            Err(reason) => {
                outcome.stderr = reason;
                return outcome;
            }
        };
        outcome.command = command.display_line();

        match self.process_runner.run(&command, cancel) {
            Ok(output) => {
                outcome.status = match output.termination {
                    Termination::TimedOut => HookStatus::TimedOut,
                    Termination::Cancelled => HookStatus::Cancelled,
                    Termination::Exited if output.success() => HookStatus::Succeeded,
                    Termination::Exited => HookStatus::Failed,
                };
                outcome.exit_code = output.exit_code;
                outcome.stdout = output.stdout;
                outcome.stderr = output.stderr;
                outcome.duration_ms = u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX);
            }
            Err(e) => outcome.stderr = e.to_string(),
        }
        outcome
    }

    fn prepare_hook(
        &self,
        blueprint: &Blueprint,
        hook: &HookSpec,
        vars: &ResolvedVariables,
        output_dir: &Path,
    ) -> Result<CommandSpec, String> {
        let argv = hook
            .command
            .iter()
            .map(|arg| arg.render(vars))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("rendering command: {e}"))?;

        let working_dir = match &hook.working_dir {
            None => output_dir.to_path_buf(),
            Some(template) => {
                let rendered = template
                    .render(vars)
                    .map_err(|e| format!("rendering working directory: {e}"))?;
                if matches!(rendered.trim(), "" | ".") {
                    output_dir.to_path_buf()
                } else {
                    let relative = RelativePath::sanitize(&rendered).map_err(|e| e.to_string())?;
                    output_dir.join(relative.as_path())
                }
            }
        };

        let timeout = hook.timeout.unwrap_or(self.options.hook_timeout);
        Ok(CommandSpec::new(argv, working_dir, timeout)
            .env("TRESTLE_BLUEPRINT", blueprint.id.to_string())
            .env("TRESTLE_OUTPUT_DIR", output_dir.display().to_string()))
    }
}

fn included(
    condition: Option<&crate::domain::Expression>,
    vars: &ResolvedVariables,
    location: &str,
) -> Result<bool, GenerationError> {
    match condition {
        None => Ok(true),
        Some(expr) => expr
            .evaluate(vars)
            .map_err(|source| GenerationError::Expression {
                location: format!("condition of {location}"),
                source,
            }),
    }
}

fn abort(mut result: GenerationResult, errors: Vec<GenerationError>) -> GenerationResult {
    result.errors.extend(errors);
    result.status = GenerationStatus::Aborted;
    result.files.clear();
    result.dependencies.clear();
    result
}

/// Sibling scratch directory, e.g. `.my-app.trestle-staging-<uuid>`.
fn staging_path(output_dir: &Path, purpose: &str) -> PathBuf {
    let name = output_dir
        .file_name()
        .map_or_else(|| "output".into(), |n| n.to_string_lossy().into_owned());
    let scratch = format!(".{name}.trestle-{purpose}-{}", Uuid::new_v4());
    match output_dir.parent() {
        Some(parent) => parent.join(scratch),
        None => PathBuf::from(scratch),
    }
}

fn describe_failure(outcome: &HookOutcome) -> String {
    match outcome.status {
        HookStatus::TimedOut => "timed out".into(),
        HookStatus::Cancelled => "cancelled".into(),
        HookStatus::Failed => match outcome.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".into(),
        },
        HookStatus::Errored => format!("could not run: {}", outcome.stderr.trim()),
        HookStatus::Succeeded | HookStatus::Skipped => String::new(),
    }
}
