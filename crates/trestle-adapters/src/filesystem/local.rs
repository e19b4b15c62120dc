//! Local filesystem adapter using std::fs.

use std::io;
use std::path::Path;

use trestle_core::{
    application::{ApplicationError, ports::Filesystem},
    error::{TrestleError, TrestleResult},
};

/// Production filesystem implementation using `std::fs`.
#[derive(Debug, Clone, Copy)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Create a new local filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for LocalFilesystem {
    fn create_dir_all(&self, path: &Path) -> TrestleResult<()> {
        std::fs::create_dir_all(path).map_err(|e| map_io_error(path, e, "create directory"))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> TrestleResult<()> {
        std::fs::write(path, content).map_err(|e| map_io_error(path, e, "write file"))
    }

    fn read_file(&self, path: &Path) -> TrestleResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| map_io_error(path, e, "read file"))
    }

    fn set_permissions(&self, path: &Path, executable: bool) -> TrestleResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata =
                std::fs::metadata(path).map_err(|e| map_io_error(path, e, "get metadata"))?;
            let mut perms = metadata.permissions();
            let mode = perms.mode();
            perms.set_mode(if executable {
                mode | 0o111
            } else {
                mode & !0o111
            });
            std::fs::set_permissions(path, perms)
                .map_err(|e| map_io_error(path, e, "set permissions"))?;
        }
        #[cfg(not(unix))]
        {
            // No executable bit outside unix.
            let _ = (path, executable);
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_file(&self, path: &Path) -> TrestleResult<()> {
        std::fs::remove_file(path).map_err(|e| map_io_error(path, e, "remove file"))
    }

    fn remove_dir_all(&self, path: &Path) -> TrestleResult<()> {
        std::fs::remove_dir_all(path).map_err(|e| map_io_error(path, e, "remove directory"))
    }

    fn rename(&self, from: &Path, to: &Path) -> TrestleResult<()> {
        std::fs::rename(from, to).map_err(|e| {
            map_io_error(
                from,
                e,
                &format!("move to '{}'", to.display()),
            )
        })
    }
}

fn map_io_error(path: &Path, e: io::Error, operation: &str) -> TrestleError {
    ApplicationError::FilesystemError {
        path: path.to_path_buf(),
        reason: format!("Failed to {operation}: {e}"),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem::new();

        let nested = dir.path().join("a/b");
        fs.create_dir_all(&nested).unwrap();
        let file = nested.join("data.bin");
        fs.write_file(&file, &[0, 159, 146, 150]).unwrap();
        assert_eq!(fs.read_file(&file).unwrap(), vec![0, 159, 146, 150]);

        let moved = dir.path().join("moved.bin");
        fs.rename(&file, &moved).unwrap();
        assert!(!fs.exists(&file));
        assert!(fs.exists(&moved));

        fs.remove_file(&moved).unwrap();
        assert!(!fs.exists(&moved));
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_round_trips() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem::new();
        let script = dir.path().join("run.sh");
        fs.write_file(&script, b"#!/bin/sh\n").unwrap();

        fs.set_permissions(&script, true).unwrap();
        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);

        fs.set_permissions(&script, false).unwrap();
        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0);
    }

    #[test]
    fn errors_carry_the_path() {
        let fs = LocalFilesystem::new();
        let err = fs
            .read_file(Path::new("/definitely/not/here.txt"))
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
