//! Text templates for file contents, destination paths, hook arguments and
//! templated defaults.
//!
//! ## Syntax
//!
//! | Tag                                   | Effect                                   |
//! |---------------------------------------|------------------------------------------|
//! | `{{ Name }}`                          | substitute a variable                    |
//! | `{{ Name \| snake_case }}`            | substitute through helpers, left to right |
//! | `{{ "text" \| upper }}`               | substitute a literal                     |
//! | `{% if c %}…{% elif c %}…{% else %}…{% endif %}` | conditional, `c` is an [`Expression`] |
//! | `{% for item in List %}…{% endfor %}` | repeat the body per list item            |
//! | `{# note #}`                          | comment, removed                         |
//!
//! Lists substitute as `", "`-joined text. An unknown variable at render
//! time is an error, never an empty string.
//!
//! ## Paths
//!
//! [`render_destination`] renders a path template and then runs the result
//! through [`RelativePath::sanitize`], so a destination can never leave the
//! output directory.

mod filters;
mod parser;

use std::collections::BTreeSet;

use thiserror::Error;

pub use filters::Helper;
pub(crate) use parser::is_identifier;
pub use parser::{Node, Operand};

use crate::domain::entities::common::RelativePath;
use crate::domain::error::DomainError;
use crate::domain::expression::{Expression, ExpressionError};
use crate::domain::value_objects::Value;
use crate::domain::variables::Scope;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TemplateError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: unknown helper '{name}'")]
    UnknownHelper { line: usize, name: String },

    #[error("line {line}: {source}")]
    Expression {
        line: usize,
        source: ExpressionError,
    },

    #[error("line {line}: unknown variable '{name}'")]
    UnknownVariable { line: usize, name: String },

    #[error("line {line}: cannot iterate over '{name}', a {found} value")]
    NotIterable {
        line: usize,
        name: String,
        found: &'static str,
    },

    #[error("unsafe destination '{path}': {reason}")]
    UnsafeDestination { path: String, reason: String },
}

// ============================================================================
// Template
// ============================================================================

/// A parsed template. Parsing happens once, at blueprint load.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            source: source.to_string(),
            nodes: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// `true` when the template is plain text with no tags at all.
    pub fn is_static(&self) -> bool {
        self.nodes.iter().all(|n| matches!(n, Node::Text(_)))
    }

    /// Free variables, i.e. names not bound by an enclosing `for`.
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_references(&self.nodes, &mut Vec::new(), &mut out);
        out
    }

    pub fn render(&self, scope: &dyn Scope) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        render_nodes(&self.nodes, scope, &mut out)?;
        Ok(out)
    }
}

/// Parse and render in one step, returning the bytes to write.
pub fn render(source: &str, scope: &dyn Scope) -> Result<Vec<u8>, TemplateError> {
    Ok(Template::parse(source)?.render(scope)?.into_bytes())
}

/// Render a destination path and check it stays relative to the output root.
pub fn render_destination(
    template: &Template,
    scope: &dyn Scope,
) -> Result<RelativePath, TemplateError> {
    let rendered = template.render(scope)?;
    RelativePath::sanitize(&rendered).map_err(|e| match e {
        DomainError::UnsafeDestination { path, reason } => {
            TemplateError::UnsafeDestination { path, reason }
        }
        other => TemplateError::UnsafeDestination {
            path: rendered.clone(),
            reason: other.to_string(),
        },
    })
}

// ============================================================================
// Evaluation
// ============================================================================

/// A scope with one extra binding layered over a parent.
struct Shadowed<'a> {
    name: &'a str,
    value: &'a Value,
    parent: &'a dyn Scope,
}

impl Scope for Shadowed<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        if name == self.name {
            Some(self.value)
        } else {
            self.parent.lookup(name)
        }
    }
}

fn render_nodes(nodes: &[Node], scope: &dyn Scope, out: &mut String) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Substitute {
                line,
                value,
                helpers,
            } => {
                let mut text = match value {
                    Operand::Literal(s) => s.clone(),
                    Operand::Variable(name) => scope
                        .lookup(name)
                        .ok_or_else(|| TemplateError::UnknownVariable {
                            line: *line,
                            name: name.clone(),
                        })?
                        .to_string(),
                };
                for helper in helpers {
                    text = helper.apply(&text);
                }
                out.push_str(&text);
            }
            Node::If {
                line,
                branches,
                otherwise,
            } => {
                let mut taken = None;
                for (condition, body) in branches {
                    if eval(condition, scope, *line)? {
                        taken = Some(body);
                        break;
                    }
                }
                render_nodes(taken.unwrap_or(otherwise), scope, out)?;
            }
            Node::For {
                line,
                binding,
                iterable,
                body,
            } => {
                let value = scope
                    .lookup(iterable)
                    .ok_or_else(|| TemplateError::UnknownVariable {
                        line: *line,
                        name: iterable.clone(),
                    })?;
                let items = value.as_list().ok_or_else(|| TemplateError::NotIterable {
                    line: *line,
                    name: iterable.clone(),
                    found: value.type_name(),
                })?;
                for item in items {
                    let inner = Shadowed {
                        name: binding,
                        value: item,
                        parent: scope,
                    };
                    render_nodes(body, &inner, out)?;
                }
            }
        }
    }
    Ok(())
}

fn eval(condition: &Expression, scope: &dyn Scope, line: usize) -> Result<bool, TemplateError> {
    condition
        .evaluate(scope)
        .map_err(|source| TemplateError::Expression { line, source })
}

fn add(name: &str, bound: &[String], out: &mut BTreeSet<String>) {
    if !bound.iter().any(|b| b == name) {
        out.insert(name.to_string());
    }
}

fn collect_references(nodes: &[Node], bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Substitute { value, .. } => {
                if let Operand::Variable(name) = value {
                    add(name, bound, out);
                }
            }
            Node::If {
                branches,
                otherwise,
                ..
            } => {
                for (condition, body) in branches {
                    for name in condition.references() {
                        add(&name, bound, out);
                    }
                    collect_references(body, bound, out);
                }
                collect_references(otherwise, bound, out);
            }
            Node::For {
                binding,
                iterable,
                body,
                ..
            } => {
                add(iterable, bound, out);
                bound.push(binding.clone());
                collect_references(body, bound, out);
                bound.pop();
            }
        }
    }
}
