//! Domain value objects: Value, VariableKind, Architecture.
//!
//! # Design
//!
//! These are pure value types with equality-by-value and no identity. `Value` is the
//! only runtime data the engine ever carries for a variable; `VariableKind` is
//! the declared shape a blueprint promises for it.
//!
//! # Coercion
//!
//! Overrides usually arrive as strings (`--set Feature=true`), so every kind
//! knows how to coerce a loosely typed `Value` into its canonical form:
//!
//! | Kind     | Accepts                                   | Canonical      |
//! |----------|-------------------------------------------|----------------|
//! | `string` | string, int, bool                         | `Value::String`|
//! | `int`    | int, numeric string                       | `Value::Int`   |
//! | `bool`   | bool, `true/false/yes/no/on/off/1/0`      | `Value::Bool`  |
//! | `enum`   | string, int, bool                         | `Value::String`|
//! | `list`   | list, comma-separated string              | `Value::List`  |

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Value ────────────────────────────────────────────────────────────────────

/// A concrete variable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    /// Short type name used in diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::List(_) => "list",
        }
    }

    /// Truthiness used when a value stands alone in a condition.
    ///
    /// `true`, a non-empty string, a non-zero int and a non-empty list are
    /// truthy; everything else is falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::String(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
        }
    }

    /// `true` for `""`, `[]`. Scalars other than strings are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Bool(_) | Self::Int(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Length used by `min_length` / `max_length` validation.
    ///
    /// Strings count characters, lists count items.
    pub fn length(&self) -> Option<usize> {
        match self {
            Self::String(s) => Some(s.chars().count()),
            Self::List(items) => Some(items.len()),
            Self::Bool(_) | Self::Int(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

// ── VariableKind ─────────────────────────────────────────────────────────────

/// Declared semantic type of a blueprint variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    String,
    Int,
    Bool,
    /// A string restricted to the variable's option set.
    Enum,
    List,
}

impl VariableKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Enum => "enum",
            Self::List => "list",
        }
    }

    /// Value bound to an optional variable that has neither override nor default.
    pub fn empty_value(&self) -> Value {
        match self {
            Self::String | Self::Enum => Value::String(String::new()),
            Self::Int => Value::Int(0),
            Self::Bool => Value::Bool(false),
            Self::List => Value::List(Vec::new()),
        }
    }

    /// Coerce `value` into this kind's canonical representation.
    ///
    /// Returns the offending value's type name on mismatch so callers can
    /// build a precise diagnostic.
    pub fn coerce(&self, value: &Value) -> Result<Value, &'static str> {
        match (self, value) {
            (Self::String | Self::Enum, Value::String(_)) => Ok(value.clone()),
            (Self::String | Self::Enum, Value::Int(_) | Value::Bool(_)) => {
                Ok(Value::String(value.to_string()))
            }

            (Self::Int, Value::Int(_)) => Ok(value.clone()),
            (Self::Int, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| value.type_name()),

            (Self::Bool, Value::Bool(_)) => Ok(value.clone()),
            (Self::Bool, Value::String(s)) => parse_bool(s).map(Value::Bool).ok_or("string"),
            (Self::Bool, Value::Int(0)) => Ok(Value::Bool(false)),
            (Self::Bool, Value::Int(1)) => Ok(Value::Bool(true)),

            (Self::List, Value::List(_)) => Ok(value.clone()),
            (Self::List, Value::String(s)) => Ok(Value::List(
                s.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(Value::from)
                    .collect(),
            )),

            _ => Err(value.type_name()),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "int" | "integer" => Ok(Self::Int),
            "bool" | "boolean" => Ok(Self::Bool),
            "enum" | "choice" => Ok(Self::Enum),
            "list" | "array" => Ok(Self::List),
            other => Err(DomainError::InvalidBlueprint(format!(
                "unknown variable type '{other}'; expected one of: string, int, bool, enum, list"
            ))),
        }
    }
}

// ── Architecture ──────────────────────────────────────────────────────────────

/// Architecture tag a blueprint advertises in its identity.
///
/// Purely descriptive: the engine never branches on it, but catalogues list
/// and filter by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    /// Classic presentation → application → domain → infrastructure layering.
    Layered,
    /// Model-View-Controller.
    Mvc,
    /// Clean / Hexagonal / Onion (ports-and-adapters).
    Clean,
    /// Feature-first modular structure.
    FeatureModular,
    /// Single flat module, no imposed layering.
    Flat,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Layered => "layered",
            Self::Mvc => "mvc",
            Self::Clean => "clean",
            Self::FeatureModular => "feature-modular",
            Self::Flat => "flat",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "layered" => Ok(Self::Layered),
            "mvc" => Ok(Self::Mvc),
            "clean" | "hexagonal" | "onion" => Ok(Self::Clean),
            "feature-modular" | "modular" | "featuremodular" => Ok(Self::FeatureModular),
            "flat" | "simple" => Ok(Self::Flat),
            other => Err(DomainError::InvalidBlueprint(format!(
                "unknown architecture: {other}"
            ))),
        }
    }
}
