//! End to end runs of the oncvpsp generator with `/bin/sh` standing in for the executable
//!
//! The input payload is fed to the shell on stdin, so each test scripts what the fake
//! generator writes.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use tempfile::TempDir;

use ppgen::job::KILLED_MESSAGE;
use ppgen::{CalcType, GenError, OncvGenerator, Status};

static SAMPLE: &str = include_str!("data/si.out");

fn sh(name: &str) -> Option<PathBuf> {
    (name == "oncvpsp.x").then(|| PathBuf::from("/bin/sh"))
}

fn generator(input: &str) -> (TempDir, OncvGenerator) {
    let base = tempfile::tempdir().unwrap();
    let gen = OncvGenerator::with_resolver(input, CalcType::ScalarRelativistic, &sh, Some(base.path())).unwrap();
    (base, gen)
}

/// Shell script printing `output` on stdout
fn emit(output: &str) -> String {
    format!("cat <<'EOF'\n{output}EOF\n")
}

#[test]
fn successful_run_completes() {
    let (_base, mut gen) = generator(&emit(SAMPLE));
    assert!(gen.start().unwrap());
    assert_eq!(gen.status(), Status::Running);

    assert_eq!(gen.wait().unwrap(), 0);
    assert_eq!(gen.status(), Status::Completed);
    assert!(gen.results().is_some());
    let path = gen.pseudo_path().unwrap();
    assert!(path.exists());
    assert_eq!(path.file_name().unwrap(), "Si.psp8");
    assert!(fs::read_to_string(path).unwrap().starts_with("Si    ONCVPSP"));
    assert_eq!(gen.stdout(), SAMPLE);
    assert_eq!(gen.stderr(), "");
    assert!(gen.outcome().is_ok());
}

#[test]
fn truncated_output_is_an_error() {
    let truncated = SAMPLE.split("Begin PSPCODE8").next().unwrap();
    let (_base, mut gen) = generator(&emit(truncated));
    gen.start().unwrap();

    assert_eq!(gen.wait().unwrap(), 0);
    assert_eq!(gen.status(), Status::Error);
    assert!(!gen.job().errors().is_empty());
    assert!(gen.results().is_none());
    assert_matches!(gen.outcome(), Err(GenError::Run { status: Status::Error, .. }));
}

#[test]
fn reported_errors_override_completion() {
    let output = SAMPLE.replace(" Test configurations", " ERROR: ghost state found\n Test configurations");
    let (_base, mut gen) = generator(&emit(&output));
    gen.start().unwrap();
    gen.wait().unwrap();
    assert_eq!(gen.status(), Status::Error);
    assert!(gen.job().errors().iter().any(|e| e.contains("ghost state")));
}

#[test]
fn nonzero_exit_with_complete_output_still_completes() {
    let (_base, mut gen) = generator(&(emit(SAMPLE) + "exit 1\n"));
    gen.start().unwrap();
    assert_eq!(gen.wait().unwrap(), 1);
    assert_eq!(gen.status(), Status::Completed);
}

#[test]
fn kill_mid_run() {
    let (_base, mut gen) = generator("sleep 30\n");
    gen.start().unwrap();
    assert_eq!(gen.poll().unwrap(), None);

    let retcode = gen.kill().unwrap();
    assert_eq!(gen.status(), Status::Error);
    assert!(gen.job().errors().iter().any(|e| e.contains("killed")));
    assert_eq!(gen.job().errors(), &[KILLED_MESSAGE.to_string()]);
    assert!(retcode.is_some());
    assert_eq!(gen.job().retcode(), retcode);
}

#[test]
fn missing_executable_fails_construction() {
    let base = tempfile::tempdir().unwrap();
    for calc_type in [CalcType::NonRelativistic, CalcType::FullyRelativistic] {
        let result = OncvGenerator::with_resolver("", calc_type, &sh, Some(base.path()));
        assert_matches!(result, Err(GenError::MissingExecutable { name }) if name == calc_type.executable_name());
    }
    assert_eq!(fs::read_dir(base.path()).unwrap().count(), 0);
}

#[test]
fn start_twice_spawns_once() {
    let (_base, mut gen) = generator("echo started >> starts.txt\n");
    assert!(gen.start().unwrap());
    assert!(!gen.start().unwrap());
    gen.wait().unwrap();
    assert!(!gen.start().unwrap());
    let starts = fs::read_to_string(gen.workdir().join("starts.txt")).unwrap();
    assert_eq!(starts, "started\n");
}

#[test]
fn calls_before_start() {
    let (_base, mut gen) = generator("");
    assert_matches!(gen.poll(), Err(GenError::NotStarted));
    assert_matches!(gen.wait(), Err(GenError::NotStarted));
    assert_eq!(gen.stdout(), "Stdout file does not exist");
    assert_eq!(gen.stderr(), "Stderr file does not exist");
}

#[test]
fn polling_sees_slow_output() {
    let script = format!("sleep 1\n{}", emit(SAMPLE));
    let (_base, mut gen) = generator(&script);
    gen.start().unwrap();
    assert_eq!(gen.poll().unwrap(), None);
    assert_eq!(gen.status(), Status::Running);

    let retcode = loop {
        if let Some(retcode) = gen.poll().unwrap() {
            break retcode;
        }
        thread::sleep(Duration::from_millis(50));
    };
    assert_eq!(retcode, 0);
    assert_eq!(gen.status(), Status::Completed);
}

#[test]
fn working_directory_layout_and_removal() {
    let (_base, mut gen) = generator(&emit(SAMPLE));
    gen.start().unwrap();
    gen.wait().unwrap();

    let workdir: &Path = &gen.workdir().path;
    for name in ["run.in", "run.out", "run.err", "Si.psp8"] {
        assert!(workdir.join(name).exists(), "{name} missing");
    }
    assert_eq!(fs::read_to_string(workdir.join("run.in")).unwrap(), gen.stdin());

    let plot = gen.plot_results().unwrap();
    assert!(plot.contains("econv_l0: 2 points"));

    assert!(gen.rmtree());
    assert!(!gen.workdir().path.exists());
    assert_eq!(gen.stdout(), "Stdout file does not exist");
}
