// ============================================================================
// entities/blueprint.rs - THE BLUEPRINT AGGREGATE
// ============================================================================

//! A blueprint is a versioned, parameterized definition of a source tree.
//!
//! ## Aggregate Boundaries
//!
//! A `Blueprint` is a consistency boundary: variables, files, dependencies
//! and hooks are validated together, because a condition in one part may
//! reference a variable declared in another.
//!
//! ## Invariants (enforced by `validate()`)
//!
//! 1. `id.name`, `id.version` and `metadata.display_name` are non-empty
//! 2. Variable names are unique identifiers; `enum` variables have options
//! 3. Literal defaults coerce to their declared kind
//! 4. Every template and condition references only declared variables
//! 5. Templated defaults reference only variables declared earlier
//! 6. No two unconditional file entries share a destination template
//! 7. Hook commands are non-empty
//!
//! Parsing (expressions, templates, version requirements, patterns) happens
//! before a value of these types can exist, so a constructed blueprint never
//! holds unparsed text.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use regex::Regex;
use semver::VersionReq;
use serde::Serialize;

use super::common::RelativePath;
use crate::domain::error::DomainError;
use crate::domain::expression::Expression;
use crate::domain::template::{Template, is_identifier};
use crate::domain::value_objects::{Architecture, Value, VariableKind};
use crate::domain::variables::ValidationErrorKind;

// ============================================================================
// Identity and metadata
// ============================================================================

/// Unique identifier for a blueprint.
///
/// ## Format
///
/// Human-readable: `name@version` (e.g., `rust-service@1.2.0`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlueprintId {
    name: String,
    version: String,
}

impl BlueprintId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse from string format `name@version`.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.split_once('@') {
            Some((name, version)) if !name.is_empty() && !version.contains('@') => {
                Ok(Self::new(name, version))
            }
            _ => Err(DomainError::InvalidBlueprint(format!(
                "invalid blueprint id '{s}', expected 'name@version'"
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for BlueprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Human-readable metadata for UI/CLI display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlueprintMetadata {
    pub display_name: String,
    pub description: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub architecture: Option<Architecture>,
}

impl BlueprintMetadata {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = Some(architecture);
        self
    }
}

// ============================================================================
// Variables
// ============================================================================

/// Default for a variable: used as-is, or rendered from earlier variables.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Literal(Value),
    Template(Template),
}

/// A compiled validation pattern. The whole value must match.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationRule {
    pub pattern: Option<Pattern>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Allowed values; required for `enum` variables, optional otherwise.
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub kind: VariableKind,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub rule: ValidationRule,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: false,
            default: None,
            rule: ValidationRule::default(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn with_template_default(mut self, template: Template) -> Self {
        self.default = Some(DefaultValue::Template(template));
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, DomainError> {
        let compiled = Pattern::new(pattern).map_err(|e| DomainError::InvalidVariable {
            name: self.name.clone(),
            reason: format!("pattern '{pattern}' does not compile: {e}"),
        })?;
        self.rule.pattern = Some(compiled);
        Ok(self)
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.rule.min_length = min;
        self.rule.max_length = max;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Check an already-coerced value against the validation rule.
    pub fn check(&self, value: &Value) -> Result<(), ValidationErrorKind> {
        let rule = &self.rule;

        if !rule.options.is_empty() {
            let text = value.to_string();
            let allowed = match value {
                Value::List(items) => items
                    .iter()
                    .all(|item| rule.options.contains(&item.to_string())),
                _ => rule.options.contains(&text),
            };
            if !allowed {
                return Err(ValidationErrorKind::NotInOptions {
                    value: text,
                    options: rule.options.clone(),
                });
            }
        }

        if let Some(pattern) = &rule.pattern {
            let candidates: Vec<String> = match value {
                Value::List(items) => items.iter().map(ToString::to_string).collect(),
                other => vec![other.to_string()],
            };
            if let Some(bad) = candidates.into_iter().find(|c| !pattern.is_match(c)) {
                return Err(ValidationErrorKind::PatternMismatch {
                    value: bad,
                    pattern: pattern.source().to_string(),
                });
            }
        }

        if let Some(actual) = value.length() {
            if let Some(min) = rule.min_length.filter(|&min| actual < min) {
                return Err(ValidationErrorKind::TooShort { min, actual });
            }
            if let Some(max) = rule.max_length.filter(|&max| actual > max) {
                return Err(ValidationErrorKind::TooLong { max, actual });
            }
        }

        Ok(())
    }
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    /// Copied verbatim.
    Literal(Vec<u8>),
    /// Rendered against the resolved variables.
    Template(Template),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    /// Location inside the blueprint, for diagnostics.
    pub source: RelativePath,
    pub content: FileContent,
    pub destination: Template,
    pub condition: Option<Expression>,
    pub executable: bool,
}

impl FileEntry {
    pub fn new(source: RelativePath, content: FileContent, destination: Template) -> Self {
        Self {
            source,
            content,
            destination,
            condition: None,
            executable: false,
        }
    }

    pub fn when(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }
}

// ============================================================================
// Dependencies
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Normal,
    Dev,
    Build,
}

impl DependencyKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Dev => "dev",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DependencyKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" | "runtime" => Ok(Self::Normal),
            "dev" | "development" => Ok(Self::Dev),
            "build" => Ok(Self::Build),
            other => Err(DomainError::InvalidBlueprint(format!(
                "unknown dependency kind '{other}'; expected normal, dev or build"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DependencySpec {
    pub module: String,
    pub constraint: String,
    pub requirement: VersionReq,
    pub kind: DependencyKind,
    pub features: Vec<String>,
    pub pinned: bool,
    pub condition: Option<Expression>,
}

impl DependencySpec {
    /// Parse `constraint` as a semver requirement.
    pub fn new(module: impl Into<String>, constraint: &str) -> Result<Self, DomainError> {
        let module = module.into();
        let requirement =
            VersionReq::parse(constraint).map_err(|e| DomainError::InvalidVersion {
                module: module.clone(),
                constraint: constraint.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            module,
            constraint: constraint.trim().to_string(),
            requirement,
            kind: DependencyKind::Normal,
            features: Vec::new(),
            pinned: false,
            condition: None,
        })
    }

    pub fn kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    pub fn when(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Pinned explicitly, or by an exact `=x.y.z` requirement.
    pub fn is_pinned(&self) -> bool {
        self.pinned
            || matches!(
                self.requirement.comparators.as_slice(),
                [c] if c.op == semver::Op::Exact
            )
    }
}

// ============================================================================
// Hooks
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HookSpec {
    pub name: String,
    /// argv; every argument is a template.
    pub command: Vec<Template>,
    /// Relative to the output root; `.` when absent.
    pub working_dir: Option<Template>,
    pub condition: Option<Expression>,
    pub required: bool,
    pub timeout: Option<Duration>,
}

impl HookSpec {
    pub fn new(name: impl Into<String>, command: Vec<Template>) -> Self {
        Self {
            name: name.into(),
            command,
            working_dir: None,
            condition: None,
            required: false,
            timeout: None,
        }
    }

    pub fn in_dir(mut self, dir: Template) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn when(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Blueprint aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub id: BlueprintId,
    pub metadata: BlueprintMetadata,
    pub variables: Vec<VariableSpec>,
    pub files: Vec<FileEntry>,
    pub dependencies: Vec<DependencySpec>,
    pub hooks: Vec<HookSpec>,
}

impl Blueprint {
    pub fn builder() -> BlueprintBuilder {
        BlueprintBuilder::default()
    }

    /// Validate all invariants, stopping at the first violation.
    pub fn validate(&self) -> Result<(), DomainError> {
        match self.problems().into_iter().next() {
            Some(problem) => Err(problem),
            None => Ok(()),
        }
    }

    /// Every invariant violation, in declaration order.
    pub fn problems(&self) -> Vec<DomainError> {
        let mut problems = Vec::new();

        if self.id.name.trim().is_empty() {
            problems.push(DomainError::MissingRequiredField { field: "id.name" });
        }
        if self.id.version.trim().is_empty() {
            problems.push(DomainError::MissingRequiredField { field: "id.version" });
        }
        if self.metadata.display_name.trim().is_empty() {
            problems.push(DomainError::MissingRequiredField {
                field: "metadata.display_name",
            });
        }
        if self.files.is_empty() && self.dependencies.is_empty() && self.hooks.is_empty() {
            problems.push(DomainError::EmptyBlueprint {
                blueprint: self.id.to_string(),
            });
        }

        self.check_variables(&mut problems);
        self.check_references(&mut problems);
        self.check_destinations(&mut problems);

        for hook in &self.hooks {
            if hook.command.is_empty() {
                problems.push(DomainError::InvalidBlueprint(format!(
                    "hook '{}' has an empty command",
                    hook.name
                )));
            }
        }

        problems
    }

    fn check_variables(&self, problems: &mut Vec<DomainError>) {
        let mut seen = BTreeSet::new();

        for spec in &self.variables {
            if !is_identifier(&spec.name) {
                problems.push(DomainError::InvalidVariable {
                    name: spec.name.clone(),
                    reason: "not a valid identifier".into(),
                });
            }
            if !seen.insert(spec.name.as_str()) {
                problems.push(DomainError::DuplicateVariable {
                    name: spec.name.clone(),
                });
            }
            if spec.kind == VariableKind::Enum && spec.rule.options.is_empty() {
                problems.push(DomainError::InvalidVariable {
                    name: spec.name.clone(),
                    reason: "enum variables need a non-empty option set".into(),
                });
            }

            match &spec.default {
                Some(DefaultValue::Literal(value)) => {
                    if let Err(found) = spec.kind.coerce(value) {
                        problems.push(DomainError::InvalidVariable {
                            name: spec.name.clone(),
                            reason: format!("default is a {found}, expected {}", spec.kind),
                        });
                    }
                }
                Some(DefaultValue::Template(template)) => {
                    for name in template.references() {
                        if seen.contains(name.as_str()) && name != spec.name {
                            continue;
                        }
                        if self.variables.iter().any(|v| v.name == name) {
                            problems.push(DomainError::ForwardReference {
                                variable: spec.name.clone(),
                                referenced: name,
                            });
                        } else {
                            problems.push(DomainError::UnresolvedReference {
                                location: format!("default of variable '{}'", spec.name),
                                name,
                            });
                        }
                    }
                }
                None => {}
            }
        }
    }

    fn check_references(&self, problems: &mut Vec<DomainError>) {
        let declared: BTreeSet<&str> = self.variables.iter().map(|v| v.name.as_str()).collect();
        let mut check = |location: String, names: BTreeSet<String>| {
            for name in names {
                if !declared.contains(name.as_str()) {
                    problems.push(DomainError::UnresolvedReference {
                        location: location.clone(),
                        name,
                    });
                }
            }
        };

        for file in &self.files {
            let at = format!("file '{}'", file.source);
            check(format!("destination of {at}"), file.destination.references());
            if let FileContent::Template(t) = &file.content {
                check(format!("content of {at}"), t.references());
            }
            if let Some(c) = &file.condition {
                check(format!("condition of {at}"), c.references());
            }
        }

        for dep in &self.dependencies {
            if let Some(c) = &dep.condition {
                check(
                    format!("condition of dependency '{}'", dep.module),
                    c.references(),
                );
            }
        }

        for hook in &self.hooks {
            let at = format!("hook '{}'", hook.name);
            for arg in &hook.command {
                check(format!("command of {at}"), arg.references());
            }
            if let Some(dir) = &hook.working_dir {
                check(format!("working directory of {at}"), dir.references());
            }
            if let Some(c) = &hook.condition {
                check(format!("condition of {at}"), c.references());
            }
        }
    }

    fn check_destinations(&self, problems: &mut Vec<DomainError>) {
        let mut seen = BTreeSet::new();
        for file in self.files.iter().filter(|f| f.condition.is_none()) {
            let destination = file.destination.source().trim();
            if !seen.insert(destination) {
                problems.push(DomainError::DuplicateDestination {
                    path: destination.to_string(),
                });
            }
        }
    }
}

/// Fluent constructor; `build()` runs `validate()`.
#[derive(Debug, Default)]
pub struct BlueprintBuilder {
    id: Option<BlueprintId>,
    metadata: Option<BlueprintMetadata>,
    variables: Vec<VariableSpec>,
    files: Vec<FileEntry>,
    dependencies: Vec<DependencySpec>,
    hooks: Vec<HookSpec>,
}

impl BlueprintBuilder {
    pub fn id(mut self, id: BlueprintId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn metadata(mut self, metadata: BlueprintMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn variable(mut self, spec: VariableSpec) -> Self {
        self.variables.push(spec);
        self
    }

    pub fn file(mut self, entry: FileEntry) -> Self {
        self.files.push(entry);
        self
    }

    pub fn dependency(mut self, dep: DependencySpec) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn hook(mut self, hook: HookSpec) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<Blueprint, DomainError> {
        let id = self
            .id
            .ok_or(DomainError::MissingRequiredField { field: "id" })?;
        let metadata = self
            .metadata
            .ok_or(DomainError::MissingRequiredField { field: "metadata" })?;

        let blueprint = Blueprint {
            id,
            metadata,
            variables: self.variables,
            files: self.files,
            dependencies: self.dependencies,
            hooks: self.hooks,
        };
        blueprint.validate()?;
        Ok(blueprint)
    }
}
