//! Chart rendering for the analyzer, written as PNG files.

use std::path::Path;

use plotters::prelude::*;
use thiserror::Error;

pub use plotters::style::colors::{BLUE, GREEN, RED};

pub const ORANGE: RGBColor = RGBColor(255, 165, 0);
pub const PURPLE: RGBColor = RGBColor(128, 0, 128);

#[derive(Debug, Error)]
#[error("plot rendering failed: {0}")]
pub struct PlotError(String);

pub struct TrendSeries<'a> {
    pub label: &'a str,
    pub color: RGBColor,
    pub values: &'a [f64],
}

/// Line chart of one or more series over their observation rank. The two
/// joined series carry their own timestamps, so the shared x axis is the
/// ordinal position, matching the join itself.
pub fn trend_chart(
    path: &Path,
    title: &str,
    y_desc: &str,
    series: &[TrendSeries<'_>],
) -> Result<(), PlotError> {
    let longest = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let x_max = longest.saturating_sub(1).max(1) as f64;
    let (y_min, y_max) = padded_bounds(series.iter().flat_map(|s| s.values.iter().copied()));

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(to_plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(42)
        .y_label_area_size(56)
        .build_cartesian_2d(0f64..x_max, y_min..y_max)
        .map_err(to_plot_error)?;
    chart
        .configure_mesh()
        .x_desc("Observation")
        .y_desc(y_desc)
        .draw()
        .map_err(to_plot_error)?;

    for s in series {
        let color = s.color;
        chart
            .draw_series(LineSeries::new(
                s.values.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                &color,
            ))
            .map_err(to_plot_error)?
            .label(s.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(to_plot_error)?;
    root.present().map_err(to_plot_error)?;
    Ok(())
}

pub fn scatter_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    xs: &[f64],
    ys: &[f64],
) -> Result<(), PlotError> {
    let (x_min, x_max) = padded_bounds(xs.iter().copied());
    let (y_min, y_max) = padded_bounds(ys.iter().copied());

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(to_plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(42)
        .y_label_area_size(56)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(to_plot_error)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(to_plot_error)?;

    chart
        .draw_series(
            xs.iter()
                .zip(ys)
                .map(|(x, y)| Circle::new((*x, *y), 4, PURPLE.mix(0.7).filled())),
        )
        .map_err(to_plot_error)?;
    root.present().map_err(to_plot_error)?;
    Ok(())
}

fn to_plot_error<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError(e.to_string())
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_pad_the_value_range() {
        let (min, max) = padded_bounds([0.0, 10.0].into_iter());
        assert!(min < 0.0);
        assert!(max > 10.0);
    }

    #[test]
    fn constant_series_still_gets_a_drawable_range() {
        let (min, max) = padded_bounds([3.0, 3.0].into_iter());
        assert!(min < max);
    }

    #[test]
    fn empty_series_falls_back_to_unit_range() {
        let (min, max) = padded_bounds(std::iter::empty());
        assert_eq!((min, max), (0.0, 1.0));
    }
}
