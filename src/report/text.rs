use std::io::Write;

use tabled::builder::Builder;
use tabled::settings::Style;

use super::{ChartImage, ChartSpec, Document, RenderSink, SectionBody, SeriesData};
use crate::error::ReportError;

/// Plain-text report writer; chart sections are written as data tables
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        TextRenderer { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());
    for row in rows {
        builder.push_record(row.iter().cloned());
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

fn chart_table(chart: &ChartSpec) -> String {
    let mut columns = vec![chart.x_label.clone()];
    columns.extend(chart.series.iter().map(|s| s.label.clone()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    let categories = chart.categories();
    if !categories.is_empty() {
        for category in &categories {
            let mut row = vec![category.clone()];
            for series in &chart.series {
                let value = match &series.data {
                    SeriesData::Categorical(points) => points
                        .iter()
                        .find(|(name, _)| name == category)
                        .map(|(_, v)| format!("{:.1}", v)),
                    SeriesData::Numeric(_) => None,
                };
                row.push(value.unwrap_or_else(|| "-".to_string()));
            }
            rows.push(row);
        }
    } else {
        let mut xs: Vec<f64> = chart
            .series
            .iter()
            .filter_map(|s| match &s.data {
                SeriesData::Numeric(points) => Some(points.iter().map(|(x, _)| *x)),
                SeriesData::Categorical(_) => None,
            })
            .flatten()
            .collect();
        xs.sort_by(|a, b| a.total_cmp(b));
        xs.dedup();

        for x in xs {
            let mut row = vec![format!("{:.0}", x)];
            for series in &chart.series {
                let value = match &series.data {
                    SeriesData::Numeric(points) => points
                        .iter()
                        .find(|(px, _)| *px == x)
                        .map(|(_, y)| format!("{:.1}", y)),
                    SeriesData::Categorical(_) => None,
                };
                row.push(value.unwrap_or_else(|| "-".to_string()));
            }
            rows.push(row);
        }
    }

    table(&columns, &rows)
}

impl<W: Write> RenderSink for TextRenderer<W> {
    fn render(&mut self, document: &Document, images: &[ChartImage]) -> Result<(), ReportError> {
        writeln!(self.out, "{}", document.title)?;
        writeln!(self.out, "{}", "=".repeat(document.title.chars().count()))?;
        writeln!(
            self.out,
            "Generated {}",
            document.generated_at.format("%Y-%m-%d %H:%M")
        )?;

        if !document.warnings.is_empty() {
            writeln!(self.out)?;
            writeln!(self.out, "Data warnings:")?;
            for warning in &document.warnings {
                writeln!(self.out, "  - {}", warning)?;
            }
        }

        for section in &document.sections {
            writeln!(self.out)?;
            writeln!(self.out, "{}", section.heading)?;
            writeln!(self.out, "{}", "-".repeat(section.heading.chars().count()))?;
            match &section.body {
                SectionBody::Text { text } => writeln!(self.out, "{}", text)?,
                SectionBody::Table { columns, rows } => {
                    writeln!(self.out, "{}", table(columns, rows))?
                }
                SectionBody::Chart { chart } => {
                    writeln!(self.out, "{}", chart.title)?;
                    writeln!(self.out, "{}", chart_table(chart))?;
                    if let Some(image) = images.iter().find(|i| i.name == chart.name) {
                        writeln!(self.out, "[chart: {}]", image.file_name())?;
                    }
                }
            }
        }

        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataWarning;
    use crate::report::{ChartKind, ChartSeries, ReportSection, Section};
    use chrono::NaiveDate;

    fn document() -> Document {
        Document {
            title: "Progress Report".to_string(),
            generated_at: NaiveDate::from_ymd_opt(2025, 12, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            sections: vec![
                Section {
                    kind: ReportSection::Identification,
                    heading: "Patient identification".to_string(),
                    body: SectionBody::Table {
                        columns: vec!["Field".to_string(), "Value".to_string()],
                        rows: vec![vec!["Patient".to_string(), "Lucas Oliveira".to_string()]],
                    },
                },
                Section {
                    kind: ReportSection::EvolutionChart,
                    heading: "Evolution".to_string(),
                    body: SectionBody::Chart {
                        chart: ChartSpec {
                            name: "evolution".to_string(),
                            title: "Pain and functional score over time".to_string(),
                            kind: ChartKind::Line,
                            x_label: "Day".to_string(),
                            y_label: "Score".to_string(),
                            series: vec![
                                ChartSeries {
                                    label: "Functional score".to_string(),
                                    data: SeriesData::Numeric(vec![(0.0, 3.0), (7.0, 5.5)]),
                                },
                                ChartSeries {
                                    label: "Pain".to_string(),
                                    data: SeriesData::Numeric(vec![(0.0, 8.0)]),
                                },
                            ],
                        },
                    },
                },
            ],
            warnings: vec![DataWarning::MissingAssessment],
        }
    }

    #[test]
    fn test_text_output_contains_sections_and_warnings() {
        let images = vec![ChartImage {
            name: "evolution".to_string(),
            media_type: "image/svg+xml".to_string(),
            bytes: Vec::new(),
        }];
        let mut renderer = TextRenderer::new(Vec::new());
        renderer.render(&document(), &images).unwrap();
        let text = String::from_utf8(renderer.into_inner()).unwrap();

        assert!(text.starts_with("Progress Report\n===="));
        assert!(text.contains("No standardized assessment recorded"));
        assert!(text.contains("Lucas Oliveira"));
        assert!(text.contains("Functional score"));
        assert!(text.contains("5.5"));
        assert!(text.contains("[chart: evolution.svg]"));
    }

    #[test]
    fn test_chart_table_fills_gaps() {
        let doc = document();
        let chart = doc.charts().next().unwrap();
        let table = chart_table(chart);
        // Pain has no value on day 7
        let day_seven = table.lines().find(|l| l.contains(" 7 ")).unwrap();
        assert!(day_seven.contains('-'));
    }
}
