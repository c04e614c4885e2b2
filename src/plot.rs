//! Plot data extracted from generator output and its text rendering

use std::collections::BTreeMap;

use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::error::GenError;

/// Named (x, y) series read from the plotting section of the output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlotData {
    pub atom_symbol: String,
    pub series: BTreeMap<String, Vec<(f64, f64)>>,
}

/// Rendering context for the plot summary
#[derive(Serialize)]
struct PlotContext {
    title: String,
    series: Vec<SeriesContext>,
    empty: bool,
}

/// Rendering context for a single series
#[derive(Serialize)]
struct SeriesContext {
    name: String,
    points: usize,
    x_min: String,
    x_max: String,
    y_min: String,
    y_max: String,
}

impl PlotData {
    pub fn new(atom_symbol: &str) -> PlotData {
        PlotData { atom_symbol: atom_symbol.to_string(), series: BTreeMap::new() }
    }

    pub fn push(&mut self, series: &str, x: f64, y: f64) {
        self.series.entry(series.to_string()).or_default().push((x, y));
    }

    pub fn get(&self, series: &str) -> Option<&[(f64, f64)]> {
        self.series.get(series).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Render a text summary of every series using the plot template
    pub fn render(&self) -> Result<String, GenError> {
        /// included plot template
        static PLOT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/plot.txt"));
        let mut tt = TinyTemplate::new();
        tt.set_default_formatter(&tinytemplate::format_unescaped);
        tt.add_template("plot", PLOT)?;

        let context = PlotContext {
            title: format!("{} plot data", self.atom_symbol),
            series: self.series.iter().map(|(name, points)| series_context(name, points)).collect(),
            empty: self.series.is_empty(),
        };

        Ok(tt.render("plot", &context)?)
    }
}

fn series_context(name: &str, points: &[(f64, f64)]) -> SeriesContext {
    let (x_min, x_max) = range(points.iter().map(|p| p.0));
    let (y_min, y_max) = range(points.iter().map(|p| p.1));
    SeriesContext {
        name: name.to_string(),
        points: points.len(),
        x_min: format!("{x_min:.4}"),
        x_max: format!("{x_max:.4}"),
        y_min: format!("{y_min:.4}"),
        y_max: format!("{y_max:.4}"),
    }
}

fn range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
