//! Variable resolution: overrides, defaults and validation merged into one
//! immutable map.
//!
//! ## Resolution order
//!
//! Variables are processed in declaration order. For each one:
//!
//! 1. an override, coerced to the declared kind;
//! 2. else the default (templated defaults render against the variables
//!    resolved so far);
//! 3. else, if required, a `MissingRequired` error;
//! 4. else the kind's empty value.
//!
//! Every candidate value is validated. Errors accumulate across the whole
//! list; the caller either gets a complete map or every problem at once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::entities::blueprint::{DefaultValue, VariableSpec};
use crate::domain::value_objects::{Value, VariableKind};

/// User-supplied values keyed by variable name.
pub type Overrides = BTreeMap<String, Value>;

// ============================================================================
// Scope
// ============================================================================

/// Read-only name → value lookup used by expressions and templates.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Scope for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// The variable map for one generation run.
///
/// There is no mutating API: once resolved, the map is shared by reference
/// with every render, including those on parallel workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedVariables(BTreeMap<String, Value>);

impl ResolvedVariables {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Scope for ResolvedVariables {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

impl FromIterator<(String, Value)> for ResolvedVariables {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// One problem with one variable.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("variable '{variable}': {kind}")]
pub struct ValidationError {
    pub variable: String,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    fn new(variable: &str, kind: ValidationErrorKind) -> Self {
        Self {
            variable: variable.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationErrorKind {
    #[error("a value is required")]
    MissingRequired,

    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: VariableKind,
        found: &'static str,
    },

    #[error("'{value}' does not match pattern '{pattern}'")]
    PatternMismatch { value: String, pattern: String },

    #[error("length {actual} is below the minimum of {min}")]
    TooShort { min: usize, actual: usize },

    #[error("length {actual} exceeds the maximum of {max}")]
    TooLong { max: usize, actual: usize },

    #[error("'{value}' is not one of: {}", .options.join(", "))]
    NotInOptions { value: String, options: Vec<String> },

    #[error("no such variable is declared")]
    UnknownVariable,

    #[error("default could not be rendered: {message}")]
    DefaultRender { message: String },

    #[error("default references '{referenced}', which is declared later")]
    ForwardReference { referenced: String },
}

/// Display wrapper for a batch of validation errors, one per line.
pub struct ValidationReport<'a>(pub &'a [ValidationError]);

impl fmt::Display for ValidationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Resolution
// ============================================================================

#[instrument(skip_all, fields(variables = specs.len(), overrides = overrides.len()))]
pub fn resolve(
    specs: &[VariableSpec],
    overrides: &Overrides,
) -> Result<ResolvedVariables, Vec<ValidationError>> {
    let declared: BTreeSet<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    let mut errors: Vec<ValidationError> = overrides
        .keys()
        .filter(|name| !declared.contains(name.as_str()))
        .map(|name| ValidationError::new(name, ValidationErrorKind::UnknownVariable))
        .collect();

    let mut resolved = BTreeMap::new();

    for (index, spec) in specs.iter().enumerate() {
        let candidate = match (overrides.get(&spec.name), &spec.default) {
            (Some(value), _) => Some(value.clone()),
            (None, Some(DefaultValue::Literal(value))) => Some(value.clone()),
            (None, Some(DefaultValue::Template(template))) => {
                let mut blocked = false;
                for name in template.references() {
                    if resolved.contains_key(&name) {
                        continue;
                    }
                    blocked = true;
                    let later = specs[index..].iter().any(|s| s.name == name);
                    if later {
                        errors.push(ValidationError::new(
                            &spec.name,
                            ValidationErrorKind::ForwardReference { referenced: name },
                        ));
                    } else if !declared.contains(name.as_str()) {
                        errors.push(ValidationError::new(
                            &spec.name,
                            ValidationErrorKind::DefaultRender {
                                message: format!("unknown variable '{name}'"),
                            },
                        ));
                    }
                    // Otherwise an earlier variable failed and already reported.
                }
                if blocked {
                    continue;
                }
                match template.render(&resolved) {
                    Ok(text) => Some(Value::String(text)),
                    Err(e) => {
                        errors.push(ValidationError::new(
                            &spec.name,
                            ValidationErrorKind::DefaultRender {
                                message: e.to_string(),
                            },
                        ));
                        continue;
                    }
                }
            }
            (None, None) => None,
        };

        let value = match candidate {
            Some(raw) => match spec.kind.coerce(&raw) {
                Ok(value) => value,
                Err(found) => {
                    errors.push(ValidationError::new(
                        &spec.name,
                        ValidationErrorKind::TypeMismatch {
                            expected: spec.kind,
                            found,
                        },
                    ));
                    continue;
                }
            },
            None if spec.required => {
                errors.push(ValidationError::new(
                    &spec.name,
                    ValidationErrorKind::MissingRequired,
                ));
                continue;
            }
            None => spec.kind.empty_value(),
        };

        if let Err(kind) = spec.check(&value) {
            errors.push(ValidationError::new(&spec.name, kind));
            continue;
        }

        debug!(variable = %spec.name, value = %value, "Variable resolved");
        resolved.insert(spec.name.clone(), value);
    }

    if errors.is_empty() {
        Ok(ResolvedVariables(resolved))
    } else {
        Err(errors)
    }
}
