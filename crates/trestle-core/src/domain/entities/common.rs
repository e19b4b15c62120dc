use super::DomainError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A filesystem path guaranteed to stay inside its root.
///
/// Invariant: never absolute, never empty, no `.` or `..` components, `/`
/// separators only. Enforced at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RelativePath(PathBuf);

impl RelativePath {
    /// Normalize `raw` and check it cannot escape the root it is joined to.
    ///
    /// `\` is treated as a separator, empty and `.` components are dropped.
    pub fn sanitize(raw: &str) -> Result<Self, DomainError> {
        let unsafe_path = |reason: &str| DomainError::UnsafeDestination {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let unified = raw.trim().replace('\\', "/");
        if unified.starts_with('/') || has_drive_prefix(&unified) {
            return Err(unsafe_path("path is absolute"));
        }

        let mut parts = Vec::new();
        for component in unified.split('/') {
            match component {
                "" | "." => {}
                ".." => return Err(unsafe_path("path contains '..'")),
                part => parts.push(part),
            }
        }

        if parts.is_empty() {
            return Err(unsafe_path("path is empty"));
        }
        Ok(Self(PathBuf::from(parts.join("/"))))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap_or("")
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl AsRef<Path> for RelativePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Capability-based permissions model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    executable: bool,
}

impl Permissions {
    pub const fn read_write() -> Self {
        Self { executable: false }
    }

    pub const fn executable() -> Self {
        Self { executable: true }
    }

    pub const fn from_flag(executable: bool) -> Self {
        Self { executable }
    }

    pub const fn executable_flag(&self) -> bool {
        self.executable
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::read_write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_normalizes_separators_and_dots() {
        let p = RelativePath::sanitize(r"src\./bin//main.rs").unwrap();
        assert_eq!(p.as_str(), "src/bin/main.rs");
    }

    #[test]
    fn sanitize_rejects_escapes() {
        for raw in ["../../etc/passwd", "a/../b", "/etc", "C:/Windows", "", " ./ "] {
            assert!(
                matches!(
                    RelativePath::sanitize(raw),
                    Err(DomainError::UnsafeDestination { .. })
                ),
                "{raw:?} should be rejected"
            );
        }
    }
}
