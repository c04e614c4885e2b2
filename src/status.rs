use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenError;

/// Status of a generator run.
///
/// Variants are declared in their natural order so comparisons like
/// `status >= Status::Running` read as "at least this far along". The order is
/// not a strict progression: `Error` is reached from `Done`, and `Completed` is
/// the only successful terminal state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Status {
    /// Generator has been initialized
    Initialized = 1,
    /// Generator is running
    Running = 2,
    /// Process exited, this does not imply that results are ok
    Done = 3,
    /// Generator error
    Error = 4,
    /// Execution completed successfully
    Completed = 5,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Initialized,
        Status::Running,
        Status::Done,
        Status::Error,
        Status::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Initialized => "Initialized",
            Status::Running => "Running",
            Status::Done => "Done",
            Status::Error => "Error",
            Status::Completed => "Completed",
        }
    }

    /// Integer value of the status (1 to 5)
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| GenError::InvalidStatusName(s.to_string()))
    }
}
