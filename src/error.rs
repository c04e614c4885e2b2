//! Error types shared by the supervisor, the generators and the output parsers

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::status::Status;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("wrong status string: {0:?}")]
    InvalidStatusName(String),

    #[error("cannot find executable `{name}` in PATH. Use `export PATH=dir_with_executable:$PATH`")]
    MissingExecutable { name: String },

    #[error("process has not been started")]
    NotStarted,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to spawn {}: {source}", executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The run finished without reaching `Completed`
    #[error("run ended with status {status}: {}", errors.join("; "))]
    Run { status: Status, errors: Vec<String> },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to render plot: {0}")]
    Render(#[from] tinytemplate::error::Error),
}

/// Errors raised while reading generator output.
///
/// `Incomplete` means the output cannot be parsed *yet* (missing file, block cut
/// short by an unfinished write). `Malformed` means the text will not parse no
/// matter how long we wait. Domain errors reported by the generator itself are
/// not parse errors, they are collected by the parser.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("output is not complete: {0}")]
    Incomplete(String),

    #[error("malformed output at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("can't read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GenError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        GenError::Io { path: path.into(), source }
    }
}
