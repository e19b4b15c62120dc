//! Dependency merging.
//!
//! Satisfied [`DependencySpec`]s are grouped by `(kind, module)` and each
//! group collapses to one [`ResolvedDependency`]:
//!
//! 1. a pinned spec wins (explicit `pinned`, or an exact `=x.y.z`);
//! 2. otherwise the requirement with the highest lower bound wins;
//! 3. ties are broken by the constraint text, greatest first;
//! 4. features of every spec in the group are unioned and sorted.
//!
//! Two pinned specs with different versions are a `DependencyConflict`.
//! Nothing depends on declaration order.

use std::collections::{BTreeMap, BTreeSet};

use semver::{Op, Version, VersionReq};
use serde::Serialize;

use crate::domain::entities::blueprint::{DependencyKind, DependencySpec};
use crate::domain::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
    pub module: String,
    pub kind: DependencyKind,
    pub constraint: String,
    pub features: Vec<String>,
    pub pinned: bool,
}

/// Smallest version a requirement can accept.
pub fn lower_bound(req: &VersionReq) -> Version {
    req.comparators
        .iter()
        .map(|c| {
            let mut v = Version::new(c.major, c.minor.unwrap_or(0), c.patch.unwrap_or(0));
            v.pre = c.pre.clone();
            match c.op {
                Op::Less | Op::LessEq => Version::new(0, 0, 0),
                Op::Greater => {
                    match (c.minor, c.patch) {
                        (None, _) => v.major += 1,
                        (Some(_), None) => v.minor += 1,
                        (Some(_), Some(_)) => v.patch += 1,
                    }
                    v
                }
                _ => v,
            }
        })
        .max()
        .unwrap_or_else(|| Version::new(0, 0, 0))
}

/// Merge the dependencies whose conditions held, sorted by `(kind, module)`.
pub fn merge<'a, I>(specs: I) -> Result<Vec<ResolvedDependency>, DomainError>
where
    I: IntoIterator<Item = &'a DependencySpec>,
{
    let mut groups: BTreeMap<(DependencyKind, &str), Vec<&DependencySpec>> = BTreeMap::new();
    for spec in specs {
        groups
            .entry((spec.kind, spec.module.as_str()))
            .or_default()
            .push(spec);
    }

    groups
        .into_iter()
        .map(|((kind, module), group)| merge_group(kind, module, &group))
        .collect()
}

fn rank(spec: &DependencySpec) -> (Version, String) {
    (lower_bound(&spec.requirement), spec.constraint.clone())
}

fn merge_group(
    kind: DependencyKind,
    module: &str,
    group: &[&DependencySpec],
) -> Result<ResolvedDependency, DomainError> {
    let pinned: Vec<&DependencySpec> = group.iter().copied().filter(|s| s.is_pinned()).collect();
    let pinned_versions: BTreeSet<Version> =
        pinned.iter().map(|s| lower_bound(&s.requirement)).collect();

    if pinned_versions.len() > 1 {
        let mut texts: Vec<&str> = pinned.iter().map(|s| s.constraint.as_str()).collect();
        texts.sort_unstable();
        texts.dedup();
        return Err(DomainError::DependencyConflict {
            module: module.to_string(),
            first: texts.first().copied().unwrap_or_default().to_string(),
            second: texts.last().copied().unwrap_or_default().to_string(),
        });
    }

    let candidates = if pinned.is_empty() { group } else { &pinned[..] };
    let winner = candidates
        .iter()
        .max_by_key(|s| rank(s))
        .ok_or_else(|| DomainError::InvalidBlueprint(format!("no specs for '{module}'")))?;

    let features: BTreeSet<&str> = group
        .iter()
        .flat_map(|s| s.features.iter().map(String::as_str))
        .collect();

    Ok(ResolvedDependency {
        module: module.to_string(),
        kind,
        constraint: winner.constraint.clone(),
        features: features.into_iter().map(str::to_string).collect(),
        pinned: !pinned.is_empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn dep(module: &str, constraint: &str) -> DependencySpec {
        DependencySpec::new(module, constraint).unwrap()
    }

    #[test]
    fn lower_bounds() {
        let lb = |s: &str| lower_bound(&VersionReq::parse(s).unwrap());
        assert_eq!(lb("1"), Version::new(1, 0, 0));
        assert_eq!(lb("^0.4.2"), Version::new(0, 4, 2));
        assert_eq!(lb(">=1.2, <2"), Version::new(1, 2, 0));
        assert_eq!(lb(">1.2"), Version::new(1, 3, 0));
        assert_eq!(lb("*"), Version::new(0, 0, 0));
    }

    #[test]
    fn higher_lower_bound_wins() {
        let a = dep("serde", "1.0.100");
        let b = dep("serde", "1.0.150");
        let merged = merge([&a, &b]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].constraint, "1.0.150");
        assert!(!merged[0].pinned);
    }

    #[test]
    fn pinned_wins_over_higher_version() {
        let a = dep("tokio", "1.40");
        let b = dep("tokio", "1.20").pinned();
        let merged = merge([&a, &b]).unwrap();
        assert_eq!(merged[0].constraint, "1.20");
        assert!(merged[0].pinned);
    }

    #[test]
    fn exact_requirement_counts_as_pinned() {
        let a = dep("clap", "4.5");
        let b = dep("clap", "=4.4.0");
        assert!(b.is_pinned());
        assert_eq!(merge([&a, &b]).unwrap()[0].constraint, "=4.4.0");
    }

    #[test]
    fn conflicting_pins_are_rejected() {
        let a = dep("log", "=0.4.20");
        let b = dep("log", "0.4.21").pinned();
        assert!(matches!(
            merge([&a, &b]),
            Err(DomainError::DependencyConflict { .. })
        ));
    }

    #[test]
    fn features_union_and_kinds_stay_separate() {
        let a = dep("serde", "1").features(["derive"]);
        let b = dep("serde", "1").features(["rc", "derive"]);
        let c = dep("serde", "1").kind(DependencyKind::Dev);
        let merged = merge([&c, &a, &b]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, DependencyKind::Normal);
        assert_eq!(merged[0].features, vec!["derive", "rc"]);
        assert_eq!(merged[1].kind, DependencyKind::Dev);
    }

    proptest! {
        #[test]
        fn merge_is_order_independent(
            v1 in (0u64..5, 0u64..20, 0u64..50),
            v2 in (0u64..5, 0u64..20, 0u64..50),
        ) {
            let a = dep("A", &format!("{}.{}.{}", v1.0, v1.1, v1.2));
            let b = dep("A", &format!("{}.{}.{}", v2.0, v2.1, v2.2));

            let forward = merge([&a, &b]).unwrap();
            let backward = merge([&b, &a]).unwrap();
            prop_assert_eq!(&forward, &backward);

            let expected = if Version::new(v1.0, v1.1, v1.2) >= Version::new(v2.0, v2.1, v2.2) {
                &a.constraint
            } else {
                &b.constraint
            };
            prop_assert_eq!(&forward[0].constraint, expected);
        }
    }
}
