// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for Trestle.
//!
//! This module contains pure business logic: no filesystem, no processes, no
//! clocks. All I/O is handled via ports (traits) defined in the application
//! layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: No filesystem, network, or external calls
//! - **Few crates**: std, thiserror, regex (patterns), semver (versions)
//! - **Immutable values**: Blueprints and resolved variables are never mutated
//!   after construction
//!
//! ## Components
//!
//! | Module          | Role                                                    |
//! |-----------------|---------------------------------------------------------|
//! | `expression`    | condition grammar, parse once, evaluate many times      |
//! | `variables`     | overrides + defaults + validation → `ResolvedVariables` |
//! | `template`      | content and path templates, helpers                     |
//! | `dependencies`  | order-independent dependency merge                      |
//! | `entities`      | the `Blueprint` aggregate and the planned file set      |

pub mod dependencies;
pub mod entities;
pub mod error;
pub mod expression;
pub mod template;
pub mod value_objects;
pub mod variables;

mod validation;

pub use entities::{
    blueprint::{
        Blueprint, BlueprintBuilder, BlueprintId, BlueprintMetadata, DefaultValue,
        DependencyKind, DependencySpec, FileContent, FileEntry, HookSpec, Pattern,
        ValidationRule, VariableSpec,
    },
    common::{Permissions, RelativePath},
    project_structure::{PlannedFile, ProjectStructure},
};

pub use dependencies::{ResolvedDependency, merge as merge_dependencies};
pub use error::{DomainError, ErrorCategory};
pub use expression::{Expression, ExpressionError};
pub use template::{Helper, Template, TemplateError, render_destination};
pub use value_objects::{Architecture, Value, VariableKind};
pub use variables::{
    Overrides, ResolvedVariables, Scope, ValidationError, ValidationErrorKind, ValidationReport,
    resolve,
};

pub use validation::DomainValidator;
