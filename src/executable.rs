//! Locate generator executables
//!
//! Resolution happens once, when a generator is built. A missing executable is a construction
//! error, never a runtime one.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::debug;

/// Turns an executable name into an absolute path
pub trait ExecutableResolver {
    fn resolve(&self, name: &str) -> Option<PathBuf>;
}

impl<F> ExecutableResolver for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        self(name)
    }
}

/// Search the directories of a `PATH`-style list, like `which`
#[derive(Debug, Clone)]
pub struct PathLookup {
    path: Option<OsString>,
}

impl PathLookup {
    /// Lookup in the `PATH` of the current process
    pub fn from_env() -> PathLookup {
        PathLookup { path: env::var_os("PATH") }
    }

    /// Lookup in an explicit search path
    pub fn new(path: impl Into<OsString>) -> PathLookup {
        PathLookup { path: Some(path.into()) }
    }
}

impl Default for PathLookup {
    fn default() -> Self {
        PathLookup::from_env()
    }
}

impl ExecutableResolver for PathLookup {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            return is_executable(candidate).then(|| candidate.to_path_buf());
        }

        let search = self.path.as_ref()?;
        env::split_paths(search)
            .map(|dir| dir.join(name))
            .find(|path| is_executable(path))
            .map(|path| {
                debug!("Found {} at {}", name, path.display());
                absolute(path)
            })
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    env::current_dir().map(|cwd| cwd.join(&path)).unwrap_or(path)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
