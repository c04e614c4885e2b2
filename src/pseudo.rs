use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ParseError;

/// Pseudopotential file in psp8 format written by a completed run
///
/// Only the header is interpreted:
/// - line 1: free comment
/// - line 2: `zatom zion pspd`
/// - line 3: `pspcod pspxc lmax lloc mmax r2well`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pseudo {
    pub path: PathBuf,
    pub symbol: String,
    pub zatom: f64,
    pub zion: f64,
    pub pspcod: i32,
    pub pspxc: i32,
    pub lmax: i32,
}

impl Pseudo {
    pub fn from_file(path: &Path) -> Result<Pseudo, ParseError> {
        let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let symbol = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut lines = text.lines().skip(1);
        let zline = header_fields(lines.next(), 2, 2)?;
        let pspline = header_fields(lines.next(), 3, 3)?;

        Ok(Pseudo {
            path: path.to_path_buf(),
            symbol,
            zatom: number(&zline[0], 2)?,
            zion: number(&zline[1], 2)?,
            pspcod: integer(&pspline[0], 3)?,
            pspxc: integer(&pspline[1], 3)?,
            lmax: integer(&pspline[2], 3)?,
        })
    }
}

/// First `count` whitespace separated fields of a header line
fn header_fields(line: Option<&str>, line_number: usize, count: usize) -> Result<Vec<String>, ParseError> {
    let line = line.ok_or_else(|| malformed(line_number, "pseudopotential header is truncated"))?;
    let fields: Vec<String> = line.split_whitespace().take(count).map(str::to_string).collect();
    if fields.len() < count {
        return Err(malformed(line_number, &format!("expected {count} values in {line:?}")));
    }
    Ok(fields)
}

fn number(field: &str, line: usize) -> Result<f64, ParseError> {
    // fortran style exponents, 1.0D+00
    field
        .replace(['D', 'd'], "E")
        .parse()
        .map_err(|_| malformed(line, &format!("not a number: {field:?}")))
}

fn integer(field: &str, line: usize) -> Result<i32, ParseError> {
    field.parse().map_err(|_| malformed(line, &format!("not an integer: {field:?}")))
}

fn malformed(line: usize, reason: &str) -> ParseError {
    ParseError::Malformed { line, reason: reason.to_string() }
}
