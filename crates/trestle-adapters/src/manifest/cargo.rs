//! `Cargo.toml` dependency writer built on `toml_edit`.
//!
//! Existing formatting, comments and unrelated keys survive. For each
//! resolved dependency:
//!
//! | Existing entry       | Result                                         |
//! |----------------------|------------------------------------------------|
//! | absent               | `name = "req"` or `{ version, features }`      |
//! | plain string         | replaced                                       |
//! | inline or full table | `version` replaced, `features` unioned         |

use std::collections::BTreeSet;

use toml_edit::{Array, DocumentMut, InlineTable, Item, Value, table, value};
use tracing::{debug, instrument};

use trestle_core::{
    application::{ApplicationError, ports::ManifestWriter},
    domain::{DependencyKind, ResolvedDependency},
    error::{TrestleError, TrestleResult},
};

const MANIFEST: &str = "Cargo.toml";

#[derive(Debug, Clone, Copy, Default)]
pub struct CargoManifestWriter;

impl CargoManifestWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ManifestWriter for CargoManifestWriter {
    fn manifest_name(&self) -> &str {
        MANIFEST
    }

    #[instrument(skip_all, fields(count = dependencies.len()))]
    fn apply(
        &self,
        existing: Option<&str>,
        dependencies: &[ResolvedDependency],
    ) -> TrestleResult<String> {
        let mut doc = match existing {
            Some(text) => text
                .parse::<DocumentMut>()
                .map_err(|e| failed(format!("existing manifest is not valid TOML: {e}")))?,
            None => DocumentMut::new(),
        };

        for dep in dependencies {
            let section = section_name(dep.kind);
            let table = doc
                .entry(section)
                .or_insert(table())
                .as_table_like_mut()
                .ok_or_else(|| failed(format!("[{section}] is not a table")))?;

            match table.get_mut(&dep.module) {
                Some(item) if item.is_table_like() => update_table(item, dep),
                Some(item) => *item = entry(dep),
                None => {
                    table.insert(&dep.module, entry(dep));
                }
            }
            debug!(module = %dep.module, section, constraint = %dep.constraint, "Dependency written");
        }

        Ok(doc.to_string())
    }
}

fn section_name(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::Normal => "dependencies",
        DependencyKind::Dev => "dev-dependencies",
        DependencyKind::Build => "build-dependencies",
    }
}

fn entry(dep: &ResolvedDependency) -> Item {
    if dep.features.is_empty() {
        return value(dep.constraint.as_str());
    }
    let mut table = InlineTable::new();
    table.insert("version", dep.constraint.as_str().into());
    table.insert("features", Value::Array(features(dep.features.iter())));
    Item::Value(Value::InlineTable(table))
}

fn update_table(item: &mut Item, dep: &ResolvedDependency) {
    let Some(table) = item.as_table_like_mut() else {
        return;
    };
    table.insert("version", value(dep.constraint.as_str()));

    if dep.features.is_empty() {
        return;
    }
    let mut merged: BTreeSet<String> = table
        .get("features")
        .and_then(Item::as_array)
        .map(|existing| {
            existing
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    merged.extend(dep.features.iter().cloned());
    table.insert("features", Item::Value(Value::Array(features(merged.iter()))));
}

fn features<'a>(names: impl Iterator<Item = &'a String>) -> Array {
    names.map(String::as_str).collect()
}

fn failed(reason: String) -> TrestleError {
    ApplicationError::ManifestFailed {
        manifest: MANIFEST.into(),
        reason,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dep(module: &str, constraint: &str, kind: DependencyKind, features: &[&str]) -> ResolvedDependency {
        ResolvedDependency {
            module: module.into(),
            kind,
            constraint: constraint.into(),
            features: features.iter().map(|s| s.to_string()).collect(),
            pinned: false,
        }
    }

    #[test]
    fn creates_sections_for_a_fresh_manifest() {
        let out = CargoManifestWriter::new()
            .apply(
                None,
                &[
                    dep("serde", "1.0", DependencyKind::Normal, &["derive"]),
                    dep("anyhow", "1", DependencyKind::Normal, &[]),
                    dep("tempfile", "3", DependencyKind::Dev, &[]),
                ],
            )
            .unwrap();

        let doc: DocumentMut = out.parse().unwrap();
        assert_eq!(doc["dependencies"]["anyhow"].as_str(), Some("1"));
        assert_eq!(
            doc["dependencies"]["serde"]["version"].as_str(),
            Some("1.0")
        );
        assert_eq!(doc["dev-dependencies"]["tempfile"].as_str(), Some("3"));
        assert!(doc.get("build-dependencies").is_none());
    }

    #[test]
    fn keeps_comments_and_unrelated_keys() {
        let existing = "\
[package]
name = \"demo\" # keep me
version = \"0.1.0\"

[dependencies]
log = \"0.4\"
";
        let out = CargoManifestWriter::new()
            .apply(
                Some(existing),
                &[dep("regex", "1.10", DependencyKind::Normal, &[])],
            )
            .unwrap();

        assert!(out.contains("name = \"demo\" # keep me"));
        assert!(out.contains("log = \"0.4\""));
        assert!(out.contains("regex = \"1.10\""));
    }

    #[test]
    fn table_entries_keep_extra_keys_and_union_features() {
        let existing = "\
[dependencies]
tokio = { version = \"1.0\", features = [\"rt\"], default-features = false }
";
        let out = CargoManifestWriter::new()
            .apply(
                Some(existing),
                &[dep("tokio", "1.38", DependencyKind::Normal, &["macros", "rt"])],
            )
            .unwrap();

        let doc: DocumentMut = out.parse().unwrap();
        let tokio = &doc["dependencies"]["tokio"];
        assert_eq!(tokio["version"].as_str(), Some("1.38"));
        assert_eq!(tokio["default-features"].as_bool(), Some(false));
        let features: Vec<&str> = tokio["features"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(features, vec!["macros", "rt"]);
    }

    #[test]
    fn invalid_existing_manifest_is_reported() {
        let err = CargoManifestWriter::new()
            .apply(Some("[dependencies\n"), &[dep("a", "1", DependencyKind::Normal, &[])])
            .unwrap_err();
        assert!(err.to_string().contains("Cargo.toml"));
    }
}
