//! Chart rendering
//!
//! Chart sections of a [`Document`] carry data only. A [`ChartRenderer`]
//! draws them; the SVG renderer is available with the `charts` feature.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChartSpec, Document};
use crate::error::ReportError;

/// A rendered chart image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartImage {
    /// Name of the chart it was rendered from
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ChartImage {
    /// File name with an extension matching the media type
    pub fn file_name(&self) -> String {
        let extension = match self.media_type.as_str() {
            "image/svg+xml" => "svg",
            "image/png" => "png",
            _ => "bin",
        };
        format!("{}.{}", self.name, extension)
    }
}

pub trait ChartRenderer {
    fn render(&self, chart: &ChartSpec) -> Result<ChartImage, ReportError>;
}

/// Render every chart section of a document, in section order
pub fn render_charts(
    document: &Document,
    renderer: &dyn ChartRenderer,
) -> Result<Vec<ChartImage>, ReportError> {
    let images = document
        .charts()
        .map(|chart| renderer.render(chart))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(charts = images.len(), "Rendered report charts");
    Ok(images)
}

/// Write rendered charts into `dir`, one file per chart
pub fn write_chart_files(images: &[ChartImage], dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    std::fs::create_dir_all(dir)?;
    images
        .iter()
        .map(|image| {
            let path = dir.join(image.file_name());
            std::fs::write(&path, &image.bytes)?;
            Ok(path)
        })
        .collect()
}

#[cfg(feature = "charts")]
pub use self::svg::SvgChartRenderer;

#[cfg(feature = "charts")]
mod svg {
    use plotters::coord::Shift;
    use plotters::prelude::*;

    use super::{ChartImage, ChartRenderer};
    use crate::error::ReportError;
    use crate::report::{ChartKind, ChartSpec, SeriesData};

    fn chart_error<E: std::fmt::Display>(name: &str) -> impl Fn(E) -> ReportError + '_ {
        move |e| ReportError::Chart {
            chart: name.to_string(),
            reason: e.to_string(),
        }
    }

    /// Renders charts to standalone SVG documents
    #[derive(Debug, Clone)]
    pub struct SvgChartRenderer {
        width: u32,
        height: u32,
    }

    impl SvgChartRenderer {
        pub fn new() -> Self {
            SvgChartRenderer {
                width: 900,
                height: 540,
            }
        }

        pub fn with_size(width: u32, height: u32) -> Self {
            SvgChartRenderer { width, height }
        }
    }

    impl Default for SvgChartRenderer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ChartRenderer for SvgChartRenderer {
        fn render(&self, chart: &ChartSpec) -> Result<ChartImage, ReportError> {
            let mut svg = String::new();
            {
                let root = SVGBackend::with_string(&mut svg, (self.width, self.height))
                    .into_drawing_area();
                root.fill(&WHITE).map_err(chart_error(&chart.name))?;
                match chart.kind {
                    ChartKind::Line => draw_line(&root, chart)?,
                    ChartKind::Bar => draw_bar(&root, chart)?,
                }
                root.present().map_err(chart_error(&chart.name))?;
            }

            Ok(ChartImage {
                name: chart.name.clone(),
                media_type: "image/svg+xml".to_string(),
                bytes: svg.into_bytes(),
            })
        }
    }

    fn draw_line(root: &DrawingArea<SVGBackend<'_>, Shift>, spec: &ChartSpec) -> Result<(), ReportError> {
        let err = chart_error(&spec.name);
        let numeric: Vec<(&str, &Vec<(f64, f64)>)> = spec
            .series
            .iter()
            .filter_map(|s| match &s.data {
                SeriesData::Numeric(points) => Some((s.label.as_str(), points)),
                SeriesData::Categorical(_) => None,
            })
            .collect();

        let x_max = numeric
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(x, _)| *x))
            .fold(1.0_f64, f64::max);
        let y_max = numeric
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(_, y)| *y))
            .fold(10.0_f64, f64::max);

        let mut chart = ChartBuilder::on(root)
            .caption(&spec.title, ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(45)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..x_max, 0.0..y_max)
            .map_err(&err)?;
        chart
            .configure_mesh()
            .x_desc(spec.x_label.as_str())
            .y_desc(spec.y_label.as_str())
            .draw()
            .map_err(&err)?;

        for (i, (label, points)) in numeric.iter().enumerate() {
            let color = Palette99::pick(i).mix(1.0);
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                .map_err(&err)?
                .label(*label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            chart
                .draw_series(points.iter().map(|p| Circle::new(*p, 3, color.filled())))
                .map_err(&err)?;
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(&err)?;
        Ok(())
    }

    fn draw_bar(root: &DrawingArea<SVGBackend<'_>, Shift>, spec: &ChartSpec) -> Result<(), ReportError> {
        let err = chart_error(&spec.name);
        let names = spec.categories();
        let count = names.len().max(1) as f64;
        let y_max = spec
            .series
            .iter()
            .filter_map(|s| match &s.data {
                SeriesData::Categorical(points) => Some(points),
                SeriesData::Numeric(_) => None,
            })
            .flat_map(|points| points.iter().map(|(_, y)| *y))
            .fold(10.0_f64, f64::max);

        let mut chart = ChartBuilder::on(root)
            .caption(&spec.title, ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(45)
            .y_label_area_size(50)
            .build_cartesian_2d(-0.5..count - 0.5, 0.0..y_max)
            .map_err(&err)?;

        let label_for = |x: &f64| {
            let index = x.round();
            if (x - index).abs() < 0.05 && index >= 0.0 {
                names.get(index as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(names.len().max(1) * 2 + 1)
            .x_label_formatter(&label_for)
            .x_desc(spec.x_label.as_str())
            .y_desc(spec.y_label.as_str())
            .draw()
            .map_err(&err)?;

        let width = 0.8 / spec.series.len().max(1) as f64;
        for (i, series) in spec.series.iter().enumerate() {
            let points = match &series.data {
                SeriesData::Categorical(points) => points,
                SeriesData::Numeric(_) => continue,
            };
            let color = Palette99::pick(i).mix(1.0);
            let bars = points.iter().filter_map(|(name, value)| {
                let slot = names.iter().position(|n| n == name)? as f64;
                let left = slot - 0.4 + width * i as f64;
                Some(Rectangle::new([(left, 0.0), (left + width, *value)], color.filled()))
            });
            chart
                .draw_series(bars)
                .map_err(&err)?
                .label(series.label.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(&err)?;
        Ok(())
    }
}
