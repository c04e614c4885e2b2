use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::error::ParseError;
use crate::parser::OutputParser;
use crate::plot::PlotData;

/// Header line preceding the atom description
static HEADER_MARKER: &str = "# atsym";
/// Opens the section with `! <series> <x> <y>` rows
static PLOT_MARKER: &str = "DATA FOR PLOTTING";
/// Opens the generated psp8 file
static PSP_BEGIN: &str = "Begin PSPCODE8";
/// Closes the psp8 file, reaching it means the run completed
static PSP_END: &str = "END_PSP";

/// Most important results of an oncvpsp run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OncvResults {
    pub atom_symbol: String,
    pub atomic_number: f64,
    pub core_states: u32,
    pub valence_states: u32,
    pub iexc: i32,
    pub psfile: Option<String>,
}

/// Parser for the text written by oncvpsp on stdout
#[derive(Debug)]
pub struct OncvOutputParser {
    path: PathBuf,
    scanned: bool,
    run_completed: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    header: Option<OncvResults>,
    pseudo_lines: Vec<String>,
    points: Vec<(String, f64, f64)>,
}

#[derive(Copy, Clone, PartialEq)]
enum Section {
    Main,
    Plot,
    Pseudo,
}

impl OncvOutputParser {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reset(&mut self) {
        self.scanned = false;
        self.run_completed = false;
        self.errors.clear();
        self.warnings.clear();
        self.header = None;
        self.pseudo_lines.clear();
        self.points.clear();
    }

    fn read(&self) -> Result<String, ParseError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(ParseError::Incomplete(format!("{} does not exist", self.path.display())))
            }
            Err(source) => Err(ParseError::Io { path: self.path.clone(), source }),
        }
    }

    fn ensure_scanned(&self) -> Result<(), ParseError> {
        match self.scanned {
            true => Ok(()),
            false => Err(ParseError::Incomplete("output has not been scanned".to_string())),
        }
    }
}

impl OutputParser for OncvOutputParser {
    type Results = OncvResults;

    fn from_path(path: &Path) -> Self {
        OncvOutputParser {
            path: path.to_path_buf(),
            scanned: false,
            run_completed: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            header: None,
            pseudo_lines: Vec::new(),
            points: Vec::new(),
        }
    }

    fn scan(&mut self) -> Result<(), ParseError> {
        let text = self.read()?;
        self.reset();

        // a last line without newline may still be in the middle of a write
        let open_tail = !text.is_empty() && !text.ends_with('\n');
        let total = text.lines().count();

        let mut section = Section::Main;
        let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));
        while let Some((number, line)) = lines.next() {
            let trimmed = line.trim();

            if section == Section::Pseudo {
                if trimmed == PSP_END {
                    section = Section::Main;
                    self.run_completed = true;
                } else {
                    self.pseudo_lines.push(line.to_string());
                }
                continue;
            }

            if trimmed.starts_with(HEADER_MARKER) {
                let (number, values) = lines
                    .next()
                    .ok_or_else(|| ParseError::Incomplete("atom header is truncated".to_string()))?;
                self.header = match parse_header(values, number) {
                    Ok(header) => Some(header),
                    Err(_) if open_tail && number == total => return Err(partially_written(number)),
                    Err(err) => return Err(err),
                };
            } else if trimmed.starts_with(PSP_BEGIN) {
                section = Section::Pseudo;
            } else if trimmed.starts_with(PLOT_MARKER) {
                section = Section::Plot;
            } else if section == Section::Plot && trimmed.starts_with('!') {
                match parse_point(trimmed, number) {
                    Ok(point) => self.points.push(point),
                    Err(_) if open_tail && number == total => return Err(partially_written(number)),
                    Err(err) => return Err(err),
                }
            } else if trimmed.contains("ERROR") {
                self.errors.push(trimmed.to_string());
            } else if trimmed.contains("WARNING") {
                self.warnings.push(trimmed.to_string());
            }
        }

        if section == Section::Pseudo {
            return Err(ParseError::Incomplete(format!("{PSP_BEGIN} block is not terminated by {PSP_END}")));
        }
        if self.run_completed && self.header.is_none() {
            return Err(ParseError::Malformed {
                line: total,
                reason: "completed run without atom header".to_string(),
            });
        }

        debug!(
            "Scanned {}: completed={}, {} errors, {} warnings, {} plot points",
            self.path.display(),
            self.run_completed,
            self.errors.len(),
            self.warnings.len(),
            self.points.len()
        );
        self.scanned = true;
        Ok(())
    }

    fn run_completed(&self) -> bool {
        self.run_completed
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn results(&self) -> Result<OncvResults, ParseError> {
        self.ensure_scanned()?;
        self.header
            .clone()
            .ok_or_else(|| ParseError::Incomplete("no atom header in output".to_string()))
    }

    fn pseudo_string(&self) -> Result<String, ParseError> {
        self.ensure_scanned()?;
        if !self.run_completed {
            return Err(ParseError::Incomplete("no pseudopotential in output".to_string()));
        }
        let mut text = self.pseudo_lines.join("\n");
        text.push('\n');
        Ok(text)
    }

    fn make_plotter(&self) -> Result<PlotData, ParseError> {
        self.ensure_scanned()?;
        let mut plot = PlotData::new(self.atom_symbol().unwrap_or_default());
        for (series, x, y) in &self.points {
            plot.push(series, *x, *y);
        }
        Ok(plot)
    }

    fn atom_symbol(&self) -> Option<&str> {
        self.header.as_ref().map(|header| header.atom_symbol.as_str())
    }
}

fn partially_written(number: usize) -> ParseError {
    ParseError::Incomplete(format!("line {number} is partially written"))
}

/// `atsym z nc nv iexc [psfile]`
fn parse_header(line: &str, number: usize) -> Result<OncvResults, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(ParseError::Malformed {
            line: number,
            reason: format!("expected `atsym z nc nv iexc psfile`, found {line:?}"),
        });
    }
    Ok(OncvResults {
        atom_symbol: fields[0].to_string(),
        atomic_number: field(fields[1], number)?,
        core_states: field(fields[2], number)?,
        valence_states: field(fields[3], number)?,
        iexc: field(fields[4], number)?,
        psfile: fields.get(5).map(|s| s.to_string()),
    })
}

/// `! <series> <x> <y>`
fn parse_point(line: &str, number: usize) -> Result<(String, f64, f64), ParseError> {
    let fields: Vec<&str> = line.trim_start_matches('!').split_whitespace().collect();
    match fields.as_slice() {
        [series, x, y] => Ok((series.to_string(), field(x, number)?, field(y, number)?)),
        _ => Err(ParseError::Malformed {
            line: number,
            reason: format!("expected `! <series> <x> <y>`, found {line:?}"),
        }),
    }
}

fn field<T: std::str::FromStr>(value: &str, number: usize) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::Malformed {
        line: number,
        reason: format!("can't parse {value:?}"),
    })
}
