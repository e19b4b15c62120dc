//! In-memory filesystem adapter for testing.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use trestle_core::{
    application::{ApplicationError, ports::Filesystem},
    error::{TrestleError, TrestleResult},
};

/// In-memory filesystem for testing.
///
/// Clones share state, so a test can keep a handle after boxing one into a
/// service. [`fail_on`](Self::fail_on) makes any mutating operation touching
/// a path fail, which is how commit rollback is exercised.
#[derive(Debug, Clone)]
pub struct MemoryFilesystem {
    inner: Arc<RwLock<MemoryFilesystemInner>>,
}

#[derive(Debug, Default)]
struct MemoryFilesystemInner {
    files: BTreeMap<PathBuf, Vec<u8>>,
    directories: BTreeSet<PathBuf>,
    executables: HashSet<PathBuf>,
    failures: HashSet<PathBuf>,
}

impl MemoryFilesystemInner {
    fn check(&self, path: &Path, operation: &str) -> TrestleResult<()> {
        if self.failures.contains(path) {
            return Err(failure(path, &format!("injected failure during {operation}")));
        }
        Ok(())
    }

    fn parent_exists(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.directories.contains(parent),
            _ => true,
        }
    }
}

impl MemoryFilesystem {
    /// Create a new empty memory filesystem.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryFilesystemInner::default())),
        }
    }

    /// Seed a file, creating its parent directories (testing helper).
    pub fn with_file(self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Self {
        let path = path.as_ref();
        if let Ok(mut inner) = self.inner.write() {
            if let Some(parent) = path.parent() {
                insert_ancestors(&mut inner.directories, parent);
            }
            inner
                .files
                .insert(path.to_path_buf(), content.as_ref().to_vec());
        }
        self
    }

    /// Make every mutating operation on `path` fail.
    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failures.insert(path.into());
        }
    }

    /// File content as UTF-8 (testing helper).
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let inner = self.inner.read().ok()?;
        let bytes = inner.files.get(path.as_ref())?;
        String::from_utf8(bytes.clone()).ok()
    }

    /// Check if a file is marked executable.
    pub fn is_executable(&self, path: impl AsRef<Path>) -> bool {
        self.inner
            .read()
            .map(|inner| inner.executables.contains(path.as_ref()))
            .unwrap_or(false)
    }

    /// All files, sorted.
    pub fn list_files(&self) -> Vec<PathBuf> {
        self.inner
            .read()
            .map(|inner| inner.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All directories, sorted.
    pub fn list_dirs(&self) -> Vec<PathBuf> {
        self.inner
            .read()
            .map(|inner| inner.directories.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear all contents.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.files.clear();
            inner.directories.clear();
            inner.executables.clear();
            inner.failures.clear();
        }
    }
}

impl Default for MemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for MemoryFilesystem {
    fn create_dir_all(&self, path: &Path) -> TrestleResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.check(path, "create_dir_all")?;
        if inner.files.contains_key(path) {
            return Err(failure(path, "a file exists at this path"));
        }
        insert_ancestors(&mut inner.directories, path);
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> TrestleResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.check(path, "write_file")?;

        if !inner.parent_exists(path) {
            return Err(failure(path, "Parent directory does not exist"));
        }
        if inner.directories.contains(path) {
            return Err(failure(path, "a directory exists at this path"));
        }

        inner.files.insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn read_file(&self, path: &Path) -> TrestleResult<Vec<u8>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| failure(path, "No such file"))
    }

    fn set_permissions(&self, path: &Path, executable: bool) -> TrestleResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.check(path, "set_permissions")?;
        if !inner.files.contains_key(path) {
            return Err(failure(path, "No such file"));
        }

        if executable {
            inner.executables.insert(path.to_path_buf());
        } else {
            inner.executables.remove(path);
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner
            .read()
            .map(|inner| inner.files.contains_key(path) || inner.directories.contains(path))
            .unwrap_or(false)
    }

    fn remove_file(&self, path: &Path) -> TrestleResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.check(path, "remove_file")?;
        inner
            .files
            .remove(path)
            .ok_or_else(|| failure(path, "No such file"))?;
        inner.executables.remove(path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> TrestleResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.check(path, "remove_dir_all")?;

        inner.directories.retain(|p| !p.starts_with(path));
        inner.files.retain(|p, _| !p.starts_with(path));
        inner.executables.retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> TrestleResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.check(from, "rename")?;
        inner.check(to, "rename")?;

        if !inner.parent_exists(to) {
            return Err(failure(to, "Parent directory does not exist"));
        }

        if let Some(content) = inner.files.remove(from) {
            let executable = inner.executables.remove(from);
            inner.files.insert(to.to_path_buf(), content);
            if executable {
                inner.executables.insert(to.to_path_buf());
            }
            return Ok(());
        }

        if !inner.directories.contains(from) {
            return Err(failure(from, "No such file or directory"));
        }
        if inner.directories.contains(to) || inner.files.contains_key(to) {
            return Err(failure(to, "destination already exists"));
        }

        let rebase = |p: &Path| p.strip_prefix(from).ok().map(|rest| to.join(rest));

        let dirs: Vec<PathBuf> = inner
            .directories
            .iter()
            .filter(|p| p.starts_with(from))
            .cloned()
            .collect();
        for dir in dirs {
            inner.directories.remove(&dir);
            if let Some(moved) = rebase(&dir) {
                inner.directories.insert(moved);
            }
        }

        let files: Vec<PathBuf> = inner
            .files
            .keys()
            .filter(|p| p.starts_with(from))
            .cloned()
            .collect();
        for file in files {
            let executable = inner.executables.remove(&file);
            if let (Some(content), Some(moved)) = (inner.files.remove(&file), rebase(&file)) {
                if executable {
                    inner.executables.insert(moved.clone());
                }
                inner.files.insert(moved, content);
            }
        }
        Ok(())
    }
}

fn insert_ancestors(directories: &mut BTreeSet<PathBuf>, path: &Path) {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        directories.insert(current.clone());
    }
}

fn failure(path: &Path, reason: &str) -> TrestleError {
    ApplicationError::FilesystemError {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
    .into()
}
