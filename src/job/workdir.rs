use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::GenError;

/// Scratch directory owned by a single job
///
/// The directory outlives the job struct: it holds `run.in`, `run.out`, `run.err` and the
/// generated pseudopotential, so callers remove it explicitly with [`WorkingDirectory::remove`]
/// once they no longer need those files.
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    pub path: PathBuf,
}

impl WorkingDirectory {
    /// Create a fresh directory in the system temporary directory
    pub fn create(prefix: &str) -> Result<WorkingDirectory, GenError> {
        WorkingDirectory::create_in(&std::env::temp_dir(), prefix)
    }

    /// Create a fresh directory with a random suffix under `base`
    pub fn create_in(base: &Path, prefix: &str) -> Result<WorkingDirectory, GenError> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(base)
            .map_err(|err| GenError::io(base, err))?;
        // removal is explicit, don't let the guard delete it on drop
        let path = dir.keep();
        info!("Created working directory {}", path.display());
        Ok(WorkingDirectory { path })
    }

    pub fn join(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }

    /// Recursively delete the directory, returns false if anything went wrong
    pub fn remove(&self) -> bool {
        match fs::remove_dir_all(&self.path) {
            Ok(_) => {
                info!("Removed working directory {}", self.path.display());
                true
            }
            Err(err) => {
                warn!("Can't remove working directory {}: {}", self.path.display(), err);
                false
            }
        }
    }

    /// Directory name without the parent path, used in log messages
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_remove() {
        let base = tempfile::tempdir().unwrap();
        let wd = WorkingDirectory::create_in(base.path(), "OncvGenerator").unwrap();
        assert!(wd.path.is_dir());
        assert!(wd.name().starts_with("OncvGenerator"));
        assert_eq!(wd.join("run.in"), wd.path.join("run.in"));

        fs::write(wd.join("run.out"), "data").unwrap();
        assert!(wd.remove());
        assert!(!wd.path.exists());
        // second removal fails but doesn't panic
        assert!(!wd.remove());
    }

    #[test]
    fn directories_are_unique() {
        let base = tempfile::tempdir().unwrap();
        let a = WorkingDirectory::create_in(base.path(), "job").unwrap();
        let b = WorkingDirectory::create_in(base.path(), "job").unwrap();
        assert_ne!(a.path, b.path);
    }
}
