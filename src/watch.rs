//! Wait for a generator with an optional deadline
//!
//! `wait()` blocks without a timeout. This polls on an interval instead and kills the process
//! once the deadline has passed. The completion check still runs inside `poll()`, so it blocks
//! the task while it reads the output.

use std::time::Duration;

use log::warn;
use tokio::time::{self, Instant};

use crate::error::GenError;
use crate::generator::{PseudoGenerator, StatusCheck};
use crate::status::Status;

/// Shortest interval between two polls
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Poll every `interval` until the process exits, killing it once `timeout` has passed
///
/// An interval below [`MIN_INTERVAL`] is raised to it. A timeout too large to represent as an
/// instant means no deadline.
pub async fn wait_with_deadline<C: StatusCheck>(
    generator: &mut PseudoGenerator<C>,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<Status, GenError> {
    let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
    let mut ticks = time::interval(interval.max(MIN_INTERVAL));
    loop {
        ticks.tick().await;
        if generator.poll()?.is_some() {
            return Ok(generator.status());
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            warn!("{} is still running after {:?}, killing it", generator, timeout.unwrap_or_default());
            generator.kill()?;
            return Ok(generator.status());
        }
    }
}
