//! Filesystem-based blueprint loader.
//!
//! Discovers and parses `blueprint.toml` manifests from a catalogue
//! directory, converting them into validated domain [`Blueprint`] values.
//!
//! # Directory layout expected
//!
//! ```text
//! blueprints/
//! ├── rust-service/
//! │   ├── blueprint.toml       ← manifest (required)
//! │   └── files/               ← file sources
//! │       ├── Cargo.toml
//! │       └── src/
//! │           └── main.rs
//! └── python-cli/
//!     ├── blueprint.toml
//!     └── files/
//! ```
//!
//! # `blueprint.toml` format
//!
//! ```toml
//! [blueprint]
//! name         = "rust-service"
//! version      = "1.2.0"
//! display_name = "Rust service"      # optional, defaults to name
//! description  = "HTTP service"      # optional
//! architecture = "layered"           # optional
//! tags         = ["rust", "http"]    # optional
//!
//! [[variables]]
//! name     = "project_name"
//! type     = "string"                # string | int | bool | enum | list
//! required = true
//! pattern  = "[a-z][a-z0-9-]*"       # full match
//!
//! [[variables]]
//! name    = "crate_name"
//! type    = "string"
//! default = "{{ project_name | snake_case }}"   # templated default
//!
//! # Optional. Without [[files]], every file under files/ is included with
//! # destination = source path.
//! [[files]]
//! source      = "src/main.rs"
//! destination = "src/{{ crate_name }}.rs"      # optional, defaults to source
//! when        = "with_cli == true"             # optional
//! executable  = false                          # optional
//! render      = true                           # optional, auto-detected
//!
//! [[dependencies]]
//! module   = "serde"
//! version  = "1.0"
//! kind     = "normal"                # normal | dev | build
//! features = ["derive"]
//! pinned   = false
//! when     = "with_serde"
//!
//! [[hooks]]
//! name         = "format"
//! command      = ["cargo", "fmt"]
//! working_dir  = "."
//! required     = false
//! timeout_secs = 60
//! ```

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use trestle_core::{
    application::{ApplicationError, ports::BlueprintLoader},
    domain::{
        Architecture, Blueprint, BlueprintId, BlueprintMetadata, DependencyKind, DependencySpec,
        DomainError, Expression, FileContent, FileEntry, HookSpec, RelativePath, Template, Value,
        VariableKind, VariableSpec,
    },
    error::{TrestleError, TrestleResult},
};

/// Manifest file name inside each blueprint directory.
pub const MANIFEST_FILE: &str = "blueprint.toml";

/// Directory holding file sources, relative to the blueprint directory.
pub const FILES_DIR: &str = "files";

// ── Manifest types ────────────────────────────────────────────────────────────

/// Deserialised representation of a `blueprint.toml` file.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BlueprintManifest {
    pub blueprint: BlueprintSection,
    #[serde(default)]
    pub variables: Vec<VariableEntry>,
    /// Explicit file list. Empty means "everything under `files/`".
    #[serde(default)]
    pub files: Vec<FileSection>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
    #[serde(default)]
    pub hooks: Vec<HookEntry>,
}

/// `[blueprint]` section: identity and display metadata.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BlueprintSection {
    pub name: String,
    pub version: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub architecture: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct VariableEntry {
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// A string default containing `{{` is treated as a template.
    pub default: Option<Value>,
    pub pattern: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_kind() -> String {
    "string".into()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileSection {
    pub source: String,
    pub destination: Option<String>,
    pub when: Option<String>,
    #[serde(default)]
    pub executable: bool,
    /// Force template rendering on or off. Unset: auto-detect.
    pub render: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DependencyEntry {
    pub module: String,
    pub version: String,
    pub kind: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
    pub when: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct HookEntry {
    pub name: String,
    pub command: Vec<String>,
    pub working_dir: Option<String>,
    pub when: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub timeout_secs: Option<u64>,
}

// ── Loader ────────────────────────────────────────────────────────────────────

/// Loads blueprints from a catalogue directory of `blueprint.toml` manifests.
///
/// Each immediate subdirectory containing a `blueprint.toml` is one
/// blueprint, named after the directory.
///
/// # Example
///
/// ```no_run
/// use trestle_adapters::ManifestLoader;
/// use trestle_core::application::ports::BlueprintLoader;
///
/// let loader = ManifestLoader::new("./blueprints");
/// let blueprint = loader.load("rust-service")?;
/// println!("Loaded {}", blueprint.id);
/// # Ok::<(), trestle_core::error::TrestleError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    catalog_dir: PathBuf,
}

impl ManifestLoader {
    /// Create a loader pointed at `catalog_dir`.
    ///
    /// The directory does not need to exist yet; `list` and `load` report it.
    pub fn new(catalog_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog_dir: catalog_dir.into(),
        }
    }

    pub fn catalog_dir(&self) -> &Path {
        &self.catalog_dir
    }

    /// Load a single blueprint directory, wherever it lives.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn load_dir(dir: impl AsRef<Path>) -> TrestleResult<Blueprint> {
        let dir = dir.as_ref();
        let label = dir
            .file_name()
            .map_or_else(|| dir.display().to_string(), |n| n.to_string_lossy().into_owned());

        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(load_error(
                &label,
                format!("missing {MANIFEST_FILE} in '{}'", dir.display()),
            ));
        }

        let raw = fs::read_to_string(&manifest_path).map_err(|e| {
            load_error(&label, format!("failed to read '{}': {e}", manifest_path.display()))
        })?;
        let manifest: BlueprintManifest = toml::from_str(&raw).map_err(|e| {
            load_error(&label, format!("failed to parse '{}': {e}", manifest_path.display()))
        })?;

        let blueprint = build_blueprint(dir, manifest).map_err(|e| match e {
            LoadError::Domain(e) => TrestleError::from(e),
            LoadError::Other(reason) => load_error(&label, reason),
        })?;
        debug!(
            id = %blueprint.id,
            files = blueprint.files.len(),
            variables = blueprint.variables.len(),
            "loaded blueprint"
        );
        Ok(blueprint)
    }
}

impl BlueprintLoader for ManifestLoader {
    #[instrument(skip(self), fields(catalog = %self.catalog_dir.display()))]
    fn load(&self, name: &str) -> TrestleResult<Blueprint> {
        let dir = self.catalog_dir.join(name);
        let unsafe_name = matches!(name, "" | "." | "..") || name.contains(['/', '\\']);
        if unsafe_name || !dir.join(MANIFEST_FILE).is_file() {
            return Err(ApplicationError::BlueprintNotFound { name: name.into() }.into());
        }
        Self::load_dir(dir)
    }

    #[instrument(skip(self), fields(catalog = %self.catalog_dir.display()))]
    fn list(&self) -> TrestleResult<Vec<String>> {
        let read_dir = fs::read_dir(&self.catalog_dir).map_err(|e| {
            TrestleError::from(ApplicationError::FilesystemError {
                path: self.catalog_dir.clone(),
                reason: format!("failed to read catalogue directory: {e}"),
            })
        })?;

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| {
                TrestleError::from(ApplicationError::FilesystemError {
                    path: self.catalog_dir.clone(),
                    reason: format!("failed to read directory entry: {e}"),
                })
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if !path.join(MANIFEST_FILE).is_file() {
                warn!(dir = %path.display(), "skipping directory without {MANIFEST_FILE}");
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

// ── Manifest → domain ─────────────────────────────────────────────────────────

/// Structural errors keep their domain type; everything else is a message.
#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{0}")]
    Other(String),
}

fn build_blueprint(dir: &Path, manifest: BlueprintManifest) -> Result<Blueprint, LoadError> {
    let section = manifest.blueprint;
    let mut metadata = BlueprintMetadata::new(
        section
            .display_name
            .unwrap_or_else(|| section.name.clone()),
    )
    .description(section.description.unwrap_or_default())
    .tags(section.tags);
    if let Some(author) = section.author {
        metadata = metadata.author(author);
    }
    if let Some(architecture) = section.architecture {
        metadata = metadata.architecture(architecture.parse::<Architecture>()?);
    }

    let mut builder = Blueprint::builder()
        .id(BlueprintId::new(section.name, section.version))
        .metadata(metadata);

    for entry in manifest.variables {
        builder = builder.variable(variable(entry)?);
    }
    for entry in files(dir, manifest.files)? {
        builder = builder.file(entry);
    }
    for entry in manifest.dependencies {
        builder = builder.dependency(dependency(entry)?);
    }
    for entry in manifest.hooks {
        builder = builder.hook(hook(entry)?);
    }

    Ok(builder.build()?)
}

fn variable(entry: VariableEntry) -> Result<VariableSpec, LoadError> {
    let kind: VariableKind = entry.kind.parse()?;
    let location = format!("default of variable '{}'", entry.name);
    let mut spec = VariableSpec::new(&entry.name, kind);

    if entry.required {
        spec = spec.required();
    }
    if let Some(description) = entry.description {
        spec = spec.describe(description);
    }
    match entry.default {
        Some(Value::String(text)) if looks_templated(&text) => {
            spec = spec.with_template_default(template(&text, &location)?);
        }
        Some(value) => spec = spec.with_default(value),
        None => {}
    }
    if let Some(pattern) = entry.pattern {
        spec = spec.with_pattern(&pattern)?;
    }
    if entry.min_length.is_some() || entry.max_length.is_some() {
        spec = spec.with_length(entry.min_length, entry.max_length);
    }
    if !entry.options.is_empty() {
        spec = spec.with_options(entry.options);
    }
    Ok(spec)
}

/// Explicit `[[files]]`, or every file under `files/` when none are declared.
fn files(dir: &Path, declared: Vec<FileSection>) -> Result<Vec<FileEntry>, LoadError> {
    let root = dir.join(FILES_DIR);
    let sections = if declared.is_empty() {
        discover(&root)?
            .into_iter()
            .map(|source| FileSection {
                source,
                destination: None,
                when: None,
                executable: false,
                render: None,
            })
            .collect()
    } else {
        declared
    };

    sections
        .into_iter()
        .map(|section| file_entry(&root, section))
        .collect()
}

fn discover(root: &Path) -> Result<Vec<String>, LoadError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut sources = BTreeSet::new();
    for walk_entry in WalkDir::new(root).min_depth(1) {
        let walk_entry =
            walk_entry.map_err(|e| LoadError::Other(format!("directory walk error: {e}")))?;
        if !walk_entry.file_type().is_file() {
            continue;
        }
        let relative = walk_entry.path().strip_prefix(root).map_err(|_| {
            LoadError::Other(format!(
                "failed to relativise '{}' against '{}'",
                walk_entry.path().display(),
                root.display()
            ))
        })?;
        sources.insert(normalize_path(&relative.to_string_lossy()));
    }
    Ok(sources.into_iter().collect())
}

fn file_entry(root: &Path, section: FileSection) -> Result<FileEntry, LoadError> {
    let source = RelativePath::sanitize(&section.source)?;
    let path = root.join(source.as_path());
    let bytes = fs::read(&path)
        .map_err(|e| LoadError::Other(format!("failed to read '{}': {e}", path.display())))?;

    let location = format!("file '{source}'");
    let content = match (section.render, String::from_utf8(bytes)) {
        (Some(false), Ok(text)) => FileContent::Literal(text.into_bytes()),
        (Some(false), Err(e)) => FileContent::Literal(e.into_bytes()),
        (Some(true), Ok(text)) => FileContent::Template(template(&text, &location)?),
        (Some(true), Err(_)) => {
            return Err(LoadError::Other(format!(
                "{location} is marked render = true but is not UTF-8"
            )));
        }
        (None, Ok(text)) if looks_templated(&text) => {
            FileContent::Template(template(&text, &location)?)
        }
        (None, Ok(text)) => FileContent::Literal(text.into_bytes()),
        (None, Err(e)) => FileContent::Literal(e.into_bytes()),
    };

    let destination = section
        .destination
        .unwrap_or_else(|| source.as_str().to_string());
    let destination = template(&destination, &format!("destination of {location}"))?;

    let mut entry = FileEntry::new(source, content, destination);
    if let Some(when) = section.when {
        entry = entry.when(expression(&when, &format!("condition of {location}"))?);
    }
    if section.executable {
        entry = entry.executable();
    }
    Ok(entry)
}

fn dependency(entry: DependencyEntry) -> Result<DependencySpec, LoadError> {
    let mut spec = DependencySpec::new(&entry.module, &entry.version)?
        .features(entry.features);
    if let Some(kind) = entry.kind {
        spec = spec.kind(kind.parse::<DependencyKind>()?);
    }
    if entry.pinned {
        spec = spec.pinned();
    }
    if let Some(when) = entry.when {
        let location = format!("condition of dependency '{}'", entry.module);
        spec = spec.when(expression(&when, &location)?);
    }
    Ok(spec)
}

fn hook(entry: HookEntry) -> Result<HookSpec, LoadError> {
    let location = format!("hook '{}'", entry.name);
    let command = entry
        .command
        .iter()
        .map(|arg| template(arg, &format!("command of {location}")))
        .collect::<Result<Vec<_>, _>>()?;

    let mut spec = HookSpec::new(&entry.name, command);
    if let Some(dir) = entry.working_dir {
        spec = spec.in_dir(template(&dir, &format!("working directory of {location}"))?);
    }
    if let Some(when) = entry.when {
        spec = spec.when(expression(&when, &format!("condition of {location}"))?);
    }
    if entry.required {
        spec = spec.required();
    }
    if let Some(secs) = entry.timeout_secs {
        spec = spec.timeout(Duration::from_secs(secs));
    }
    Ok(spec)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn template(source: &str, location: &str) -> Result<Template, DomainError> {
    Template::parse(source).map_err(|e| DomainError::InvalidTemplate {
        location: location.to_string(),
        message: e.to_string(),
    })
}

fn expression(source: &str, location: &str) -> Result<Expression, DomainError> {
    Expression::parse(source).map_err(|e| DomainError::InvalidExpression {
        location: location.to_string(),
        message: e.to_string(),
    })
}

fn looks_templated(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}

/// Normalise a path string to use forward slashes.
fn normalize_path(p: &str) -> String {
    p.replace('\\', "/")
}

fn load_error(name: &str, reason: String) -> TrestleError {
    ApplicationError::BlueprintLoad {
        name: name.to_string(),
        reason,
    }
    .into()
}
