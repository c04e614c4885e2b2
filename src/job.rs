//! One supervised run of an external executable
//!
//! A [`Job`] owns a scratch working directory, the input payload and the child process. The
//! process reads `run.in` and writes `run.out` / `run.err`, all inside the working directory.
//! Status transitions and the completion check are driven by
//! [`PseudoGenerator`](crate::generator::PseudoGenerator), the job only keeps the bookkeeping.

/// Scratch directory handling
pub mod workdir;

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::GenError;
use crate::job::workdir::WorkingDirectory;
use crate::status::Status;

pub static STDIN_FILE: &str = "run.in";
pub static STDOUT_FILE: &str = "run.out";
pub static STDERR_FILE: &str = "run.err";

/// Appended to the job errors by `kill()`
pub static KILLED_MESSAGE: &str = "Process has been killed by host code.";

#[derive(Debug)]
pub struct Job {
    workdir: WorkingDirectory,
    input: String,
    executable: PathBuf,
    status: Status,
    process: Option<Child>,
    retcode: Option<i32>,
    errors: Vec<String>,
    warnings: Vec<String>,
    started_at: Option<DateTime<Utc>>,
}

/// Serialisable snapshot of a job, used for reporting
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub status: Status,
    pub retcode: Option<i32>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub workdir: PathBuf,
    pub executable: PathBuf,
    pub started_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(workdir: WorkingDirectory, input: String, executable: PathBuf) -> Job {
        Job {
            workdir,
            input,
            executable,
            status: Status::Initialized,
            process: None,
            retcode: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            started_at: None,
        }
    }

    pub fn workdir(&self) -> &WorkingDirectory {
        &self.workdir
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Return code of the process, `None` until it has exited
    pub fn retcode(&self) -> Option<i32> {
        self.retcode
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn is_started(&self) -> bool {
        self.process.is_some()
    }

    pub fn stdin_path(&self) -> PathBuf {
        self.workdir.join(STDIN_FILE)
    }

    pub fn stdout_path(&self) -> PathBuf {
        self.workdir.join(STDOUT_FILE)
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.workdir.join(STDERR_FILE)
    }

    /// Overwrite the status. Completion checks go through
    /// [`PseudoGenerator`](crate::generator::PseudoGenerator) rather than calling this directly
    /// with `Done`.
    pub fn set_status(&mut self, status: Status) -> Status {
        if status != self.status {
            debug!("{}: status {} -> {}", self.workdir.name(), self.status, status);
        }
        self.status = status;
        status
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn extend_errors<I: IntoIterator<Item = String>>(&mut self, messages: I) {
        self.errors.extend(messages);
    }

    pub fn extend_warnings<I: IntoIterator<Item = String>>(&mut self, messages: I) {
        self.warnings.extend(messages);
    }

    /// Write the input payload and spawn the executable with its streams bound to files
    ///
    /// No shell is involved: the executable is started directly and the redirections are file
    /// handles passed to the child.
    pub(crate) fn spawn(&mut self) -> Result<(), GenError> {
        let stdin_path = self.stdin_path();
        let stdout_path = self.stdout_path();
        let stderr_path = self.stderr_path();

        info!("Running in {}", self.workdir.path.display());
        fs::write(&stdin_path, &self.input).map_err(|err| GenError::io(&stdin_path, err))?;

        let stdin = File::open(&stdin_path).map_err(|err| GenError::io(&stdin_path, err))?;
        let stdout = File::create(&stdout_path).map_err(|err| GenError::io(&stdout_path, err))?;
        let stderr = File::create(&stderr_path).map_err(|err| GenError::io(&stderr_path, err))?;

        let mut cmd = Command::new(&self.executable);
        cmd.current_dir(&self.workdir.path)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr);
        debug!("{:?}", &cmd);

        let child = cmd.spawn().map_err(|source| GenError::Spawn {
            executable: self.executable.clone(),
            source,
        })?;

        let now = Utc::now();
        info!("Started {} (pid {}) on {}", self.executable.display(), child.id(), now);
        self.started_at = Some(now);
        self.process = Some(child);
        Ok(())
    }

    /// Non-blocking check of the child, records the return code once it has exited
    pub(crate) fn try_wait(&mut self) -> Result<Option<i32>, GenError> {
        let child = self.process.as_mut().ok_or(GenError::NotStarted)?;
        let status = child
            .try_wait()
            .map_err(|err| GenError::io(&self.executable, err))?;
        if let Some(status) = status {
            self.retcode = Some(exit_code(status));
        }
        Ok(self.retcode)
    }

    /// Block until the child exits
    pub(crate) fn wait(&mut self) -> Result<i32, GenError> {
        let child = self.process.as_mut().ok_or(GenError::NotStarted)?;
        let status = child.wait().map_err(|err| GenError::io(&self.executable, err))?;
        let code = exit_code(status);
        self.retcode = Some(code);
        Ok(code)
    }

    /// Kill and reap the child, recording whatever return code the OS reports
    pub(crate) fn kill(&mut self) -> Result<Option<i32>, GenError> {
        let child = self.process.as_mut().ok_or(GenError::NotStarted)?;
        if let Err(err) = child.kill() {
            // the child may already have been reaped
            warn!("Can't kill process {}: {}", child.id(), err);
        }
        match child.wait() {
            Ok(status) => self.retcode = Some(exit_code(status)),
            Err(err) => warn!("Can't reap killed process {}: {}", child.id(), err),
        }
        Ok(self.retcode)
    }

    /// Content of `run.out`, or a placeholder if it doesn't exist yet
    pub fn stdout(&self) -> String {
        read_or_placeholder(&self.stdout_path(), "Stdout file does not exist")
    }

    /// Content of `run.err`, or a placeholder if it doesn't exist yet
    pub fn stderr(&self) -> String {
        read_or_placeholder(&self.stderr_path(), "Stderr file does not exist")
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            status: self.status,
            retcode: self.retcode,
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
            workdir: self.workdir.path.clone(),
            executable: self.executable.clone(),
            started_at: self.started_at,
        }
    }
}

fn read_or_placeholder(path: &Path, missing: &str) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => missing.to_string(),
        Err(err) => {
            warn!("Can't read {}: {}", path.display(), err);
            format!("Can't read {}: {}", path.display(), err)
        }
    }
}

/// Exit code of a finished process; signals are reported as negative numbers
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
