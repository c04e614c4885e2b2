//! Run pseudopotential generators as supervised subprocesses
//!
//! A generator writes its input to a scratch directory, starts the external code without
//! blocking, and decides from the output whether the run really completed.

/// Ordered run status
pub mod status;
/// Errors raised by the supervisor and by output parsers
pub mod error;
/// oncvpsp calculation types
pub mod calc_type;
/// Locate executables
pub mod executable;
/// Subprocess and working directory bookkeeping
pub mod job;
/// Supervisor state machine and the completion check interface
pub mod generator;
/// Output parser contract
pub mod parser;
/// Plot data collected from the output, rendered as text
pub mod plot;
/// Generated psp8 pseudopotential file
pub mod pseudo;
/// oncvpsp completion check and generator
pub mod oncv;
/// Polling with a deadline
pub mod watch;

pub use calc_type::CalcType;
pub use error::{GenError, ParseError};
pub use generator::{PseudoGenerator, StatusCheck};
pub use oncv::OncvGenerator;
pub use status::Status;
