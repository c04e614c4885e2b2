//! Supervise a generator run and hand finished runs to a completion check
//!
//! [`PseudoGenerator`] drives the state machine of a [`Job`]:
//!
//! ```text
//! Initialized --start--> Running --exit seen by poll/wait--> Done --check--> Error | Completed
//!      any state --kill--> Error
//! ```
//!
//! Deciding whether a finished run actually succeeded depends on the output format of the
//! generator, so it's delegated to a [`StatusCheck`]. The check runs exactly once per `Done`
//! transition, synchronously, before `poll()` or `wait()` return.

use std::fmt;

use log::{info, warn};

use crate::error::GenError;
use crate::job::workdir::WorkingDirectory;
use crate::job::{Job, KILLED_MESSAGE};
use crate::status::Status;

/// Format specific part of a generator
pub trait StatusCheck {
    /// Name used in log messages and as the working directory prefix
    fn name(&self) -> &'static str {
        "PseudoGenerator"
    }

    /// Inspect the output of the job, set and return its status
    fn check_status(&mut self, job: &mut Job) -> Result<Status, GenError>;

    /// Render the plot data of the run. Must not change the job.
    fn plot_results(&self, job: &Job) -> Result<String, GenError>;
}

#[derive(Debug)]
pub struct PseudoGenerator<C> {
    job: Job,
    check: C,
}

impl<C: StatusCheck> PseudoGenerator<C> {
    pub fn with_check(check: C, job: Job) -> PseudoGenerator<C> {
        PseudoGenerator { job, check }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn check(&self) -> &C {
        &self.check
    }

    pub fn status(&self) -> Status {
        self.job.status()
    }

    pub fn workdir(&self) -> &WorkingDirectory {
        self.job.workdir()
    }

    /// Run the generator in a subprocess without waiting for it
    ///
    /// Returns `false` without doing anything if the job was already started.
    pub fn start(&mut self) -> Result<bool, GenError> {
        if self.job.status() >= Status::Running {
            return Ok(false);
        }
        self.job.spawn()?;
        self.job.set_status(Status::Running);
        Ok(true)
    }

    /// Check if the process has terminated, returns its return code once it has
    pub fn poll(&mut self) -> Result<Option<i32>, GenError> {
        if !self.job.is_started() {
            return Err(GenError::NotStarted);
        }
        if self.job.status() >= Status::Done {
            return Ok(self.job.retcode());
        }

        let retcode = self.job.try_wait()?;
        if retcode.is_some() {
            self.set_status(Status::Done)?;
        }
        Ok(retcode)
    }

    /// Block until the process terminates
    pub fn wait(&mut self) -> Result<i32, GenError> {
        if !self.job.is_started() {
            return Err(GenError::NotStarted);
        }
        if self.job.status() >= Status::Done {
            if let Some(retcode) = self.job.retcode() {
                return Ok(retcode);
            }
        }

        let retcode = self.job.wait()?;
        self.set_status(Status::Done)?;
        Ok(retcode)
    }

    /// Kill the process. The job always ends up in `Error`.
    pub fn kill(&mut self) -> Result<Option<i32>, GenError> {
        let retcode = self.job.kill()?;
        warn!("{}: killed, return code {:?}", self, retcode);
        self.job.set_status(Status::Error);
        self.job.push_error(KILLED_MESSAGE);
        Ok(retcode)
    }

    /// Set the status, entering `Done` runs the completion check
    pub fn set_status(&mut self, status: Status) -> Result<Status, GenError> {
        self.job.set_status(status);
        if status == Status::Done {
            let status = self.check.check_status(&mut self.job)?;
            info!("{}: finished with status {}", self.check.name(), status);
            return Ok(status);
        }
        Ok(status)
    }

    pub fn check_status(&mut self) -> Result<Status, GenError> {
        self.check.check_status(&mut self.job)
    }

    pub fn plot_results(&self) -> Result<String, GenError> {
        self.check.plot_results(&self.job)
    }

    /// `Ok` if the run completed, otherwise the errors collected on the way
    pub fn outcome(&self) -> Result<(), GenError> {
        match self.job.status() {
            Status::Completed => Ok(()),
            status => Err(GenError::Run { status, errors: self.job.errors().to_vec() }),
        }
    }

    pub fn stdin(&self) -> &str {
        self.job.input()
    }

    pub fn stdout(&self) -> String {
        self.job.stdout()
    }

    pub fn stderr(&self) -> String {
        self.job.stderr()
    }

    /// Remove the working directory, returns false if that failed
    pub fn rmtree(&self) -> bool {
        self.job.workdir().remove()
    }
}

impl<C: StatusCheck> fmt::Display for PseudoGenerator<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<{} at {}, status={}>",
            self.check.name(),
            self.job.workdir().name(),
            self.job.status()
        )
    }
}
