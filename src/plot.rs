//! Convergence plots rendered straight to JPEG. Styling is deliberately
//! bare: line series on a white canvas, log-scaled y axis for residuals,
//! colors cycled from the standard palette.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, ensure, Result};
use log::info;
use plotters::prelude::*;

use crate::residuals::ResidualSeries;
use crate::Float;

const PLOT_SIZE: (u32, u32) = (900, 600);

/// Where a plot landed and the y range it was drawn with, so callers can
/// verify axis capping.
#[derive(Debug, Clone)]
pub struct RenderedPlot {
    pub path: PathBuf,
    pub y_range: (Float, Float),
}

fn positive_range(series: &[ResidualSeries]) -> Result<(Float, Float)> {
    let mut lo = Float::INFINITY;
    let mut hi = Float::NEG_INFINITY;
    for s in series {
        for &v in &s.values {
            if v > 0.0 {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
    }
    ensure!(lo.is_finite(), "no positive residual values to plot");
    if lo == hi {
        lo /= 10.0;
        hi *= 10.0;
    }
    Ok((lo, hi))
}

/// Combined residual plot on a shared log-y axis, one line per variable,
/// saved as `residuals_vs_iteration.jpg`. A `y_max` cap clips the axis top
/// while the lower bound stays data-driven.
pub fn plot_residuals(
    residuals_dir: &Path,
    series: &[ResidualSeries],
    y_max: Option<Float>,
) -> Result<RenderedPlot> {
    ensure!(!series.is_empty(), "no residual series to plot");
    let (lo, mut hi) = positive_range(series)?;
    if let Some(cap) = y_max {
        hi = cap;
    }
    let n = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    ensure!(n > 0, "residual series are empty");

    let path = residuals_dir.join("residuals_vs_iteration.jpg");
    {
        let root = BitMapBackend::new(&path, PLOT_SIZE).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| anyhow!("filling canvas: {e}"))?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(0.0..n as Float, (lo..hi).log_scale())
            .map_err(|e| anyhow!("building chart: {e}"))?;
        for (i, s) in series.iter().enumerate() {
            chart
                .draw_series(LineSeries::new(
                    s.values
                        .iter()
                        .enumerate()
                        .filter(|(_, v)| **v > 0.0)
                        .map(|(x, v)| (x as Float, *v)),
                    &Palette99::pick(i),
                ))
                .map_err(|e| anyhow!("drawing {}: {e}", s.name))?;
        }
        root.present().map_err(|e| anyhow!("saving plot: {e}"))?;
    }
    info!("wrote {}", path.display());
    Ok(RenderedPlot {
        path,
        y_range: (lo, hi),
    })
}

/// Single-quantity history (drag coefficient and friends), linear or log-y,
/// saved as `<name>_vs_iteration.jpg` or `<name>_vs_iteration_logy.jpg`.
pub fn plot_series(
    residuals_dir: &Path,
    series: &ResidualSeries,
    logy: bool,
) -> Result<RenderedPlot> {
    ensure!(!series.values.is_empty(), "series {} is empty", series.name);
    let n = series.values.len();
    let suffix = if logy { "_vs_iteration_logy" } else { "_vs_iteration" };
    let path = residuals_dir.join(format!("{}{}.jpg", series.name, suffix));

    let y_range;
    {
        let root = BitMapBackend::new(&path, PLOT_SIZE).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| anyhow!("filling canvas: {e}"))?;
        if logy {
            let one = std::slice::from_ref(series);
            let (lo, hi) = positive_range(one)?;
            y_range = (lo, hi);
            let mut chart = ChartBuilder::on(&root)
                .margin(10)
                .build_cartesian_2d(0.0..n as Float, (lo..hi).log_scale())
                .map_err(|e| anyhow!("building chart: {e}"))?;
            chart
                .draw_series(LineSeries::new(
                    series
                        .values
                        .iter()
                        .enumerate()
                        .filter(|(_, v)| **v > 0.0)
                        .map(|(x, v)| (x as Float, *v)),
                    &Palette99::pick(0),
                ))
                .map_err(|e| anyhow!("drawing {}: {e}", series.name))?;
        } else {
            let mut lo = series.values.iter().copied().fold(Float::INFINITY, Float::min);
            let mut hi = series
                .values
                .iter()
                .copied()
                .fold(Float::NEG_INFINITY, Float::max);
            if lo == hi {
                lo -= 0.5;
                hi += 0.5;
            }
            y_range = (lo, hi);
            let mut chart = ChartBuilder::on(&root)
                .margin(10)
                .build_cartesian_2d(0.0..n as Float, lo..hi)
                .map_err(|e| anyhow!("building chart: {e}"))?;
            chart
                .draw_series(LineSeries::new(
                    series
                        .values
                        .iter()
                        .enumerate()
                        .map(|(x, v)| (x as Float, *v)),
                    &Palette99::pick(0),
                ))
                .map_err(|e| anyhow!("drawing {}: {e}", series.name))?;
        }
        root.present().map_err(|e| anyhow!("saving plot: {e}"))?;
    }
    info!("wrote {}", path.display());
    Ok(RenderedPlot { path, y_range })
}
