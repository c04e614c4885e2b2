//! Contract between the completion check and a generator's output format
//!
//! The supervisor never looks at the output text itself. It asks an [`OutputParser`] whether
//! the run reached its completion marker, which errors and warnings were reported, and for the
//! derived products (results, pseudopotential text, plot data).

use std::path::Path;
use std::thread;
use std::time::Duration;

use log::info;

use crate::error::ParseError;
use crate::plot::PlotData;

/// Wait before the single retry of a parse that failed on a partially written file
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

pub trait OutputParser {
    /// Most important results extracted from the output
    type Results;

    /// Parser for the output file at `path`. Nothing is read until [`OutputParser::scan`].
    fn from_path(path: &Path) -> Self
    where
        Self: Sized;

    /// Read and parse the output written so far
    fn scan(&mut self) -> Result<(), ParseError>;

    /// True if the output contains the generator's completion marker
    fn run_completed(&self) -> bool;

    fn errors(&self) -> &[String];

    fn warnings(&self) -> &[String];

    fn results(&self) -> Result<Self::Results, ParseError>;

    /// Text of the generated pseudopotential file
    fn pseudo_string(&self) -> Result<String, ParseError>;

    fn make_plotter(&self) -> Result<PlotData, ParseError>;

    /// Chemical symbol, names the pseudopotential file
    fn atom_symbol(&self) -> Option<&str>;
}

/// Build a parser for `path` and scan it, retrying once after [`RETRY_DELAY`]
///
/// The output may still be in the middle of a write when the process is first seen as done.
pub fn parse_output<P: OutputParser>(path: &Path) -> Result<P, ParseError> {
    let mut parser = P::from_path(path);
    if let Err(err) = parser.scan() {
        info!("Can't parse {} yet ({}), retrying in {:?}", path.display(), err, RETRY_DELAY);
        thread::sleep(RETRY_DELAY);
        parser = P::from_path(path);
        parser.scan()?;
    }
    Ok(parser)
}
