//! Objective history plot.

use anyhow::{Context, Result};
use plotters::prelude::*;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const OBJECTIVE_SVG: &str = "objective_function.svg";
pub const OBJECTIVE_CSV: &str = "objective_function.csv";

/// CSV with one `compute,objective` row per solver invocation.
pub fn format_objective_csv(history: &[f64]) -> String {
    let mut out = String::from("compute,objective\n");
    for (i, value) in history.iter().enumerate() {
        let _ = writeln!(out, "{},{}", i + 1, value);
    }
    out
}

/// Line plot of the objective against the solver invocation index.
pub fn plot_objective_svg(path: &Path, history: &[f64]) -> Result<()> {
    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let finite: Vec<(f64, f64)> = history
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| ((i + 1) as f64, v))
        .collect();
    let (lo, hi) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, v)| (lo.min(v), hi.max(v)));
    let (lo, hi) = if finite.is_empty() {
        (0.0, 1.0)
    } else if hi - lo < 1e-12 {
        (lo - 0.5, hi + 0.5)
    } else {
        let pad = 0.05 * (hi - lo);
        (lo - pad, hi + pad)
    };
    let x_max = history.len().max(2) as f64;

    let mut chart = ChartBuilder::on(&root)
        .caption("Objective function", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(1f64..x_max, lo..hi)?;
    chart
        .configure_mesh()
        .x_desc("compute")
        .y_desc("objective")
        .draw()?;
    chart.draw_series(LineSeries::new(finite, &BLUE))?;
    root.present()?;
    Ok(())
}

/// Write the SVG plot and the CSV data next to it.
pub fn write_objective_plot(dir: &Path, history: &[f64]) -> Result<()> {
    let csv = dir.join(OBJECTIVE_CSV);
    fs::write(&csv, format_objective_csv(history))
        .with_context(|| format!("Failed to write {}", csv.display()))?;
    let svg = dir.join(OBJECTIVE_SVG);
    plot_objective_svg(&svg, history).with_context(|| format!("Failed to plot {}", svg.display()))
}
