//! oncvpsp pseudopotential generator
//!
//! Binds the supervisor to one of the oncvpsp executables (chosen by [`CalcType`]) and decides
//! from the output whether a finished run produced a usable pseudopotential. On success the psp8
//! file is written to `<workdir>/<atom symbol>.psp8` and the results and plot data are kept.

/// Parser for oncvpsp output
pub mod parser;

use std::fs;
use std::path::Path;
use std::thread;

use log::{info, warn};

use crate::calc_type::CalcType;
use crate::error::{GenError, ParseError};
use crate::executable::{ExecutableResolver, PathLookup};
use crate::generator::{PseudoGenerator, StatusCheck};
use crate::job::workdir::WorkingDirectory;
use crate::job::{Job, STDOUT_FILE};
use crate::oncv::parser::OncvOutputParser;
use crate::parser::{self as output, OutputParser, RETRY_DELAY};
use crate::plot::PlotData;
use crate::pseudo::Pseudo;
use crate::status::Status;

/// Extension of the generated pseudopotential file
pub static PSEUDO_EXTENSION: &str = "psp8";

/// Completion check for oncvpsp runs
#[derive(Debug)]
pub struct Oncv<P: OutputParser = OncvOutputParser> {
    calc_type: CalcType,
    results: Option<P::Results>,
    plotter: Option<PlotData>,
    pseudo: Option<Pseudo>,
}

/// Generator running oncvpsp, the parser is replaceable for other output dialects
pub type OncvGenerator<P = OncvOutputParser> = PseudoGenerator<Oncv<P>>;

impl<P: OutputParser> Oncv<P> {
    pub fn new(calc_type: CalcType) -> Oncv<P> {
        Oncv { calc_type, results: None, plotter: None, pseudo: None }
    }

    /// Plot data, psp8 file and pseudo artifact, in that order. Errors are messages for the job.
    fn materialize(&mut self, parser: &P, job: &Job) -> Result<(), String> {
        let plotter = parser
            .make_plotter()
            .map_err(|err| format!("Cannot build plot data: {err}"))?;
        let symbol = parser
            .atom_symbol()
            .ok_or_else(|| "Output does not define the atom symbol".to_string())?;

        let path = job.workdir().join(&format!("{symbol}.{PSEUDO_EXTENSION}"));
        let text = parser
            .pseudo_string()
            .map_err(|err| format!("Cannot extract pseudopotential: {err}"))?;
        info!("Writing pseudopotential to {}", path.display());
        fs::write(&path, text).map_err(|err| format!("Cannot write {}: {err}", path.display()))?;
        let pseudo = Pseudo::from_file(&path).map_err(|err| format!("Cannot read back {}: {err}", path.display()))?;

        self.plotter = Some(plotter);
        self.pseudo = Some(pseudo);
        Ok(())
    }
}

/// `results()` with a single retry, the output may still be in the middle of a write
fn results_with_retry<P: OutputParser>(parser: &mut P) -> Result<P::Results, ParseError> {
    match parser.results() {
        Ok(results) => Ok(results),
        Err(err) => {
            info!("Results not available yet ({}), retrying in {:?}", err, RETRY_DELAY);
            thread::sleep(RETRY_DELAY);
            parser.scan()?;
            parser.results()
        }
    }
}

impl<P: OutputParser> StatusCheck for Oncv<P> {
    fn name(&self) -> &'static str {
        "OncvGenerator"
    }

    fn check_status(&mut self, job: &mut Job) -> Result<Status, GenError> {
        if job.status() == Status::Completed {
            return Ok(Status::Completed);
        }

        let mut parser = P::from_path(&job.stdout_path());
        if let Err(err) = parser.scan() {
            warn!("Can't parse output in {}: {}", job.workdir().path.display(), err);
            job.push_error(format!("Cannot parse {STDOUT_FILE}: {err}"));
            return Ok(job.set_status(Status::Error));
        }

        info!("run_completed: {}", parser.run_completed());
        if job.status() == Status::Done && !parser.run_completed() {
            warn!("Run is not completed!");
            job.push_error(format!("Run is not completed: no completion marker in {STDOUT_FILE}"));
            job.set_status(Status::Error);
        }

        if parser.run_completed() {
            info!("setting status to {}", Status::Completed);
            job.set_status(Status::Completed);
            // warnings are reported as errors as well
            job.extend_errors(parser.warnings().iter().cloned());
            job.extend_warnings(parser.warnings().iter().cloned());

            match results_with_retry(&mut parser) {
                Ok(results) => self.results = Some(results),
                Err(err) => {
                    job.set_status(Status::Error);
                    job.push_error(format!("Cannot read results: {err}"));
                    return Err(err.into());
                }
            }

            if let Err(message) = self.materialize(&parser, job) {
                warn!("{}", message);
                job.set_status(Status::Error);
                job.push_error(message);
            }
        }

        if !parser.errors().is_empty() {
            warn!("setting status to {}", Status::Error);
            job.set_status(Status::Error);
            job.extend_errors(parser.errors().iter().cloned());
        }

        Ok(job.status())
    }

    /// Parse the output again from scratch and render its plot data
    fn plot_results(&self, job: &Job) -> Result<String, GenError> {
        let mut parser = P::from_path(&job.stdout_path());
        parser.scan()?;
        Ok(parser.make_plotter()?.render()?)
    }
}

impl<P: OutputParser> PseudoGenerator<Oncv<P>> {
    /// Generator using a custom output parser
    ///
    /// The executable is resolved before anything touches the filesystem, a missing one is
    /// reported as [`GenError::MissingExecutable`].
    pub fn with_parser<R>(
        input: impl Into<String>,
        calc_type: CalcType,
        resolver: &R,
        workdir_base: Option<&Path>,
    ) -> Result<Self, GenError>
    where
        R: ExecutableResolver + ?Sized,
    {
        let name = calc_type.executable_name();
        let executable = resolver
            .resolve(name)
            .ok_or_else(|| GenError::MissingExecutable { name: name.to_string() })?;
        info!("Using {} for {} calculation", executable.display(), calc_type);

        let check = Oncv::new(calc_type);
        let workdir = match workdir_base {
            Some(base) => WorkingDirectory::create_in(base, check.name())?,
            None => WorkingDirectory::create(check.name())?,
        };
        let job = Job::new(workdir, input.into(), executable);
        Ok(PseudoGenerator::with_check(check, job))
    }

    pub fn calc_type(&self) -> CalcType {
        self.check().calc_type
    }

    /// Most important results, only once the run has completed
    pub fn results(&self) -> Option<&P::Results> {
        self.completed().and(self.check().results.as_ref())
    }

    pub fn plotter(&self) -> Option<&PlotData> {
        self.completed().and(self.check().plotter.as_ref())
    }

    /// Pseudopotential written by a completed run
    pub fn pseudo(&self) -> Option<&Pseudo> {
        self.completed().and(self.check().pseudo.as_ref())
    }

    pub fn pseudo_path(&self) -> Option<&Path> {
        self.pseudo().map(|pseudo| pseudo.path.as_path())
    }

    /// Parse the output, retrying once if it's still being written
    pub fn parse_output(&self) -> Result<P, ParseError> {
        output::parse_output(&self.job().stdout_path())
    }

    fn completed(&self) -> Option<()> {
        (self.status() == Status::Completed).then_some(())
    }
}

impl OncvGenerator {
    /// Generator for `input`, looking up the executable in `PATH`
    pub fn new(input: impl Into<String>, calc_type: CalcType) -> Result<Self, GenError> {
        Self::with_resolver(input, calc_type, &PathLookup::from_env(), None)
    }

    pub fn with_resolver<R>(
        input: impl Into<String>,
        calc_type: CalcType,
        resolver: &R,
        workdir_base: Option<&Path>,
    ) -> Result<Self, GenError>
    where
        R: ExecutableResolver + ?Sized,
    {
        PseudoGenerator::with_parser(input, calc_type, resolver, workdir_base)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use assert_matches::assert_matches;

    use super::*;

    static SAMPLE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/si.out"));

    fn sh(name: &str) -> Option<PathBuf> {
        (name == "oncvpsp.x").then(|| PathBuf::from("/bin/sh"))
    }

    fn generator() -> (tempfile::TempDir, OncvGenerator) {
        let base = tempfile::tempdir().unwrap();
        let gen = OncvGenerator::with_resolver("", CalcType::ScalarRelativistic, &sh, Some(base.path())).unwrap();
        (base, gen)
    }

    /// Pretend the process exited after writing `output`
    fn finish(gen: &mut OncvGenerator, output: &str) -> Result<Status, GenError> {
        fs::write(gen.job().stdout_path(), output).unwrap();
        gen.set_status(Status::Done)
    }

    #[test]
    fn completed_run() {
        let (_base, mut gen) = generator();
        assert_eq!(finish(&mut gen, SAMPLE).unwrap(), Status::Completed);

        let results = gen.results().unwrap();
        assert_eq!(results.atom_symbol, "Si");
        let path = gen.pseudo_path().unwrap();
        assert_eq!(path, gen.workdir().path.join("Si.psp8"));
        assert!(path.exists());
        assert_eq!(gen.pseudo().unwrap().zion, 4.0);
        assert!(gen.plotter().unwrap().get("atanlogder_l0").is_some());

        // warnings are folded into the errors
        assert_eq!(gen.job().errors().len(), 1);
        assert!(gen.job().errors()[0].starts_with("WARNING"));
        assert_eq!(gen.job().warnings(), gen.job().errors());
        assert!(gen.outcome().is_ok());
    }

    #[test]
    fn completed_check_is_not_repeated() {
        let (_base, mut gen) = generator();
        finish(&mut gen, SAMPLE).unwrap();
        let path = gen.pseudo_path().unwrap().to_path_buf();
        fs::remove_file(&path).unwrap();

        assert_eq!(gen.check_status().unwrap(), Status::Completed);
        assert!(!path.exists());
        assert_eq!(gen.job().errors().len(), 1);
    }

    #[test]
    fn missing_completion_marker() {
        let (_base, mut gen) = generator();
        let output = SAMPLE.split("Begin PSPCODE8").next().unwrap();
        assert_eq!(finish(&mut gen, output).unwrap(), Status::Error);
        assert!(!gen.job().errors().is_empty());
        assert!(gen.results().is_none());
        assert!(gen.pseudo_path().is_none());
        assert!(!gen.workdir().path.join("Si.psp8").exists());
    }

    #[test]
    fn parser_errors_win() {
        let (_base, mut gen) = generator();
        let output = SAMPLE.replace(" Test configurations", " ERROR: ghost state found\n Test configurations");
        assert_eq!(finish(&mut gen, &output).unwrap(), Status::Error);
        assert!(gen.job().errors().contains(&"ERROR: ghost state found".to_string()));
        // the artifacts were produced but aren't exposed
        assert!(gen.workdir().path.join("Si.psp8").exists());
        assert!(gen.results().is_none());
        assert_matches!(gen.outcome(), Err(GenError::Run { status: Status::Error, .. }));
    }

    #[test]
    fn unparsable_output() {
        let (_base, mut gen) = generator();
        let output = SAMPLE.split("END_PSP").next().unwrap();
        assert_eq!(finish(&mut gen, output).unwrap(), Status::Error);
        assert!(gen.job().errors()[0].starts_with("Cannot parse run.out"));
    }

    #[test]
    fn missing_output() {
        let (_base, mut gen) = generator();
        assert_eq!(gen.set_status(Status::Done).unwrap(), Status::Error);
    }

    #[test]
    fn plot_results_ignores_status() {
        let (_base, gen) = generator();
        fs::write(gen.job().stdout_path(), SAMPLE).unwrap();
        let text = gen.plot_results().unwrap();
        assert!(text.contains("atanlogder_l1: 2 points"));
        assert_eq!(gen.status(), Status::Initialized);
        assert!(gen.plotter().is_none());
    }

    #[test]
    fn plot_results_without_output() {
        let (_base, gen) = generator();
        assert_matches!(gen.plot_results(), Err(GenError::Parse(ParseError::Incomplete(_))));
    }

    #[test]
    fn parse_output_reads_fresh() {
        let (_base, gen) = generator();
        fs::write(gen.job().stdout_path(), SAMPLE).unwrap();
        let parser = gen.parse_output().unwrap();
        assert!(parser.run_completed());
    }

    #[test]
    fn missing_executable() {
        let base = tempfile::tempdir().unwrap();
        let result = OncvGenerator::with_resolver("", CalcType::FullyRelativistic, &sh, Some(base.path()));
        assert_matches!(result, Err(GenError::MissingExecutable { name }) if name == "oncvpspr.x");
        assert_eq!(fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[test]
    fn calc_type_and_name() {
        let (_base, gen) = generator();
        assert_eq!(gen.calc_type(), CalcType::ScalarRelativistic);
        assert!(gen.workdir().name().starts_with("OncvGenerator"));
        assert_eq!(gen.job().executable(), Path::new("/bin/sh"));
    }

    /// Completed output whose results only show up on the second scan
    struct SlowResults {
        path: PathBuf,
        scans: usize,
    }

    impl OutputParser for SlowResults {
        type Results = usize;

        fn from_path(path: &Path) -> Self {
            SlowResults { path: path.to_path_buf(), scans: 0 }
        }

        fn scan(&mut self) -> Result<(), ParseError> {
            self.scans += 1;
            Ok(())
        }

        fn run_completed(&self) -> bool {
            true
        }

        fn errors(&self) -> &[String] {
            &[]
        }

        fn warnings(&self) -> &[String] {
            &[]
        }

        fn results(&self) -> Result<usize, ParseError> {
            match self.path.with_file_name("never").exists() || self.scans < 2 {
                true => Err(ParseError::Incomplete("results not written".to_string())),
                false => Ok(self.scans),
            }
        }

        fn pseudo_string(&self) -> Result<String, ParseError> {
            Ok("X comment\n1.0 1.0 0\n8 4 0 0 10 0\n".to_string())
        }

        fn make_plotter(&self) -> Result<PlotData, ParseError> {
            Ok(PlotData::new("X"))
        }

        fn atom_symbol(&self) -> Option<&str> {
            Some("X")
        }
    }

    fn slow_generator() -> (tempfile::TempDir, OncvGenerator<SlowResults>) {
        let base = tempfile::tempdir().unwrap();
        let gen = PseudoGenerator::with_parser("", CalcType::ScalarRelativistic, &sh, Some(base.path())).unwrap();
        (base, gen)
    }

    #[test]
    fn results_are_retried_once() {
        let (_base, mut gen) = slow_generator();
        assert_eq!(gen.set_status(Status::Done).unwrap(), Status::Completed);
        assert_eq!(gen.results(), Some(&2));
        assert_eq!(gen.pseudo().unwrap().symbol, "X");
    }

    #[test]
    fn failed_retry_propagates() {
        let (_base, mut gen) = slow_generator();
        fs::write(gen.workdir().join("never"), "").unwrap();
        assert_matches!(gen.set_status(Status::Done), Err(GenError::Parse(ParseError::Incomplete(_))));
        assert_eq!(gen.status(), Status::Error);
        assert!(gen.job().errors()[0].starts_with("Cannot read results"));
        assert!(gen.results().is_none());
    }
}
