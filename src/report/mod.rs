//! Report assembly
//!
//! Builds a format-agnostic [`Document`] from a patient's derived history,
//! insights and projection. The section list is declarative
//! ([`ReportTemplate`]); every section tolerates missing upstream data by
//! emitting a "Not available" placeholder and recording a [`DataWarning`].
//!
//! Pixel-level chart drawing is not done here: chart sections carry the data
//! series, labels and layout order, and a [`charts::ChartRenderer`] turns them
//! into images for a [`RenderSink`].

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ReportError;
use crate::forecast::{ForecastConfig, ProjectionResult};
use crate::insights::InsightSet;
use crate::mapping::functional_value;
use crate::models::{
    DataWarning, DerivedObservation, FunctionalTest, PatientId, PatientProfile,
    StandardizedAssessment,
};
use crate::store::current_assessment;

pub mod charts;
pub mod json;
pub mod narrative;
pub mod text;

pub use charts::{render_charts, write_chart_files, ChartImage, ChartRenderer};

/// Placeholder prefix for sections whose data is missing
pub const NOT_AVAILABLE: &str = "Not available";

/// Sections a report can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    Identification,
    StandardizedAssessment,
    Forecast,
    EvolutionChart,
    SwellingHistoryChart,
    FunctionalByTestChart,
    SleepVsPainChart,
    PostureVsFunctionChart,
    ClinicalFlags,
    ClinicalSummary,
}

impl ReportSection {
    pub fn heading(&self) -> &'static str {
        match self {
            ReportSection::Identification => "Patient identification",
            ReportSection::StandardizedAssessment => "Standardized assessment (IKDC)",
            ReportSection::Forecast => "Discharge forecast",
            ReportSection::EvolutionChart => "Evolution",
            ReportSection::SwellingHistoryChart => "Swelling history",
            ReportSection::FunctionalByTestChart => "Functional capacity by test",
            ReportSection::SleepVsPainChart => "Sleep vs. pain",
            ReportSection::PostureVsFunctionChart => "Posture vs. function",
            ReportSection::ClinicalFlags => "Clinical flags",
            ReportSection::ClinicalSummary => "Clinical summary",
        }
    }
}

/// Ordered list of sections to assemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTemplate {
    pub sections: Vec<ReportSection>,
}

impl Default for ReportTemplate {
    fn default() -> Self {
        ReportTemplate {
            sections: vec![
                ReportSection::Identification,
                ReportSection::StandardizedAssessment,
                ReportSection::Forecast,
                ReportSection::EvolutionChart,
                ReportSection::SwellingHistoryChart,
                ReportSection::FunctionalByTestChart,
                ReportSection::SleepVsPainChart,
                ReportSection::PostureVsFunctionChart,
                ReportSection::ClinicalFlags,
                ReportSection::ClinicalSummary,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
}

/// Points of one chart series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesData {
    /// (x, y) pairs, x in elapsed days
    Numeric(Vec<(f64, f64)>),
    /// (category, y) pairs
    Categorical(Vec<(String, f64)>),
}

impl SeriesData {
    pub fn len(&self) -> usize {
        match self {
            SeriesData::Numeric(points) => points.len(),
            SeriesData::Categorical(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub label: String,
    pub data: SeriesData,
}

/// Chart data handed to a chart renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// File-safe chart name, unique within a document
    pub name: String,
    pub title: String,
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ChartSeries>,
}

impl ChartSpec {
    /// Category axis shared by all categorical series, in first-seen order
    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for series in &self.series {
            if let SeriesData::Categorical(points) = &series.data {
                for (name, _) in points {
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                }
            }
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionBody {
    Text { text: String },
    Table { columns: Vec<String>, rows: Vec<Vec<String>> },
    Chart { chart: ChartSpec },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: ReportSection,
    pub heading: String,
    pub body: SectionBody,
}

/// Format-agnostic report document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub generated_at: NaiveDateTime,
    pub sections: Vec<Section>,
    pub warnings: Vec<DataWarning>,
}

impl Document {
    pub fn section(&self, kind: ReportSection) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn charts(&self) -> impl Iterator<Item = &ChartSpec> {
        self.sections.iter().filter_map(|s| match &s.body {
            SectionBody::Chart { chart } => Some(chart),
            _ => None,
        })
    }
}

/// Output backend that receives a finished document plus its chart images
pub trait RenderSink {
    fn render(&mut self, document: &Document, images: &[ChartImage]) -> Result<(), ReportError>;
}

/// Everything known about the patient outside the check-in history
#[derive(Debug, Clone, PartialEq)]
pub struct PatientContext {
    pub patient: PatientId,
    pub profile: Option<PatientProfile>,
    pub assessments: Vec<StandardizedAssessment>,
}

/// Report configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    pub clinic_name: Option<String>,
    pub template: ReportTemplate,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            title: "Knee Rehabilitation Progress Report".to_string(),
            clinic_name: None,
            template: ReportTemplate::default(),
        }
    }
}

/// Parameterized report assembler
pub struct ReportAssembler {
    config: ReportConfig,
    forecast: ForecastConfig,
}

struct Inputs<'a> {
    context: &'a PatientContext,
    history: &'a [DerivedObservation],
    insights: &'a InsightSet,
    projection: &'a ProjectionResult,
    narrative: Option<&'a str>,
}

fn not_available(reason: &str) -> SectionBody {
    SectionBody::Text {
        text: format!("{}: {}", NOT_AVAILABLE, reason),
    }
}

fn fmt_date(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d").to_string()
}

impl ReportAssembler {
    pub fn new() -> Self {
        ReportAssembler {
            config: ReportConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }

    pub fn with_config(config: ReportConfig, forecast: ForecastConfig) -> Self {
        ReportAssembler { config, forecast }
    }

    pub fn assemble(
        &self,
        context: &PatientContext,
        history: &[DerivedObservation],
        insights: &InsightSet,
        projection: &ProjectionResult,
        narrative: Option<&str>,
    ) -> Document {
        let inputs = Inputs {
            context,
            history,
            insights,
            projection,
            narrative,
        };
        let mut warnings = Vec::new();

        let sections: Vec<Section> = self
            .config
            .template
            .sections
            .iter()
            .map(|kind| Section {
                kind: *kind,
                heading: kind.heading().to_string(),
                body: self.build_section(*kind, &inputs, &mut warnings),
            })
            .collect();

        for warning in &warnings {
            warn!(patient = %context.patient.initials(), %warning, "Report section degraded");
        }
        debug!(
            patient = %context.patient.initials(),
            sections = sections.len(),
            warnings = warnings.len(),
            "Assembled report"
        );

        let title = match &self.config.clinic_name {
            Some(clinic) => format!("{} - {}", self.config.title, clinic),
            None => self.config.title.clone(),
        };

        Document {
            title,
            generated_at: Utc::now().naive_utc(),
            sections,
            warnings,
        }
    }

    fn build_section(
        &self,
        kind: ReportSection,
        inputs: &Inputs<'_>,
        warnings: &mut Vec<DataWarning>,
    ) -> SectionBody {
        let mut warn_once = |warning: DataWarning| {
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        };

        if inputs.history.is_empty()
            && !matches!(
                kind,
                ReportSection::Identification | ReportSection::StandardizedAssessment
            )
        {
            warn_once(DataWarning::NoCheckIns);
            return not_available("no check-ins recorded");
        }

        match kind {
            ReportSection::Identification => {
                if inputs.context.profile.is_none() {
                    warn_once(DataWarning::MissingProfile);
                }
                identification(inputs)
            }
            ReportSection::StandardizedAssessment => {
                match assessment_summary(&inputs.context.assessments) {
                    Some(body) => body,
                    None => {
                        warn_once(DataWarning::MissingAssessment);
                        not_available("no standardized assessment recorded")
                    }
                }
            }
            ReportSection::Forecast => match self.forecast_text(inputs.projection) {
                Some(text) => SectionBody::Text { text },
                None => {
                    warn_once(DataWarning::InsufficientForecastData);
                    not_available("at least two check-in days are needed for a forecast")
                }
            },
            ReportSection::EvolutionChart => SectionBody::Chart {
                chart: evolution_chart(inputs.history, inputs.projection, self.forecast.target_score),
            },
            ReportSection::SwellingHistoryChart => match swelling_chart(inputs.history) {
                Some(chart) => SectionBody::Chart { chart },
                None => {
                    warn_once(DataWarning::NoSwellingData);
                    not_available("no swelling grades recorded")
                }
            },
            ReportSection::FunctionalByTestChart => SectionBody::Chart {
                chart: functional_by_test_chart(inputs.history),
            },
            ReportSection::SleepVsPainChart => SectionBody::Chart {
                chart: ChartSpec {
                    name: "sleep_vs_pain".to_string(),
                    title: "Mean pain by sleep quality".to_string(),
                    kind: ChartKind::Bar,
                    x_label: "Sleep quality".to_string(),
                    y_label: "Mean pain (0-10)".to_string(),
                    series: vec![ChartSeries {
                        label: "Mean pain".to_string(),
                        data: SeriesData::Categorical(
                            inputs
                                .insights
                                .pain_by_sleep
                                .iter()
                                .map(|g| (g.group.to_string(), g.mean))
                                .collect(),
                        ),
                    }],
                },
            },
            ReportSection::PostureVsFunctionChart => SectionBody::Chart {
                chart: ChartSpec {
                    name: "posture_vs_function".to_string(),
                    title: "Mean functional score by posture".to_string(),
                    kind: ChartKind::Bar,
                    x_label: "Posture".to_string(),
                    y_label: "Functional score (0-10)".to_string(),
                    series: vec![ChartSeries {
                        label: "Mean functional score".to_string(),
                        data: SeriesData::Categorical(
                            inputs
                                .insights
                                .function_by_posture
                                .iter()
                                .map(|g| (g.group.to_string(), g.mean))
                                .collect(),
                        ),
                    }],
                },
            },
            ReportSection::ClinicalFlags => flags_section(inputs.insights),
            ReportSection::ClinicalSummary => {
                let text = match inputs.narrative.map(str::trim) {
                    Some(text) if !text.is_empty() => text.to_string(),
                    _ => narrative::generate_summary(
                        inputs.history,
                        inputs.insights,
                        inputs.projection,
                        &self.forecast,
                    ),
                };
                SectionBody::Text { text }
            }
        }
    }

    fn forecast_text(&self, projection: &ProjectionResult) -> Option<String> {
        let trend = projection.trend()?;
        let mut text = match projection {
            ProjectionResult::Projected { date, target_day, .. } => format!(
                "Functional score is improving by {:.2} points/day. At this rate it reaches {:.1} \
                 around day {:.0}, projected discharge on {}.",
                trend.slope,
                self.forecast.target_score,
                target_day,
                date.format("%Y-%m-%d")
            ),
            _ => format!(
                "No upward functional trend (slope {:+.2}/day); a discharge date cannot be projected.",
                trend.slope
            ),
        };
        text.push_str(&format!(
            " Linear fit over {} check-ins, R\u{b2} = {:.2}.",
            trend.sample_size, trend.r_squared
        ));
        if trend.is_low_confidence(self.forecast.min_reliable_points) {
            text.push_str(&format!(
                " Low confidence: fewer than {} check-ins.",
                self.forecast.min_reliable_points
            ));
        }
        Some(text)
    }
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble a report with the default template
pub fn assemble_report(
    context: &PatientContext,
    history: &[DerivedObservation],
    insights: &InsightSet,
    projection: &ProjectionResult,
    narrative: Option<&str>,
) -> Document {
    ReportAssembler::new().assemble(context, history, insights, projection, narrative)
}

fn identification(inputs: &Inputs<'_>) -> SectionBody {
    let first = inputs.history.first().map(|d| fmt_date(&d.observation.timestamp));
    let last = inputs.history.last().map(|d| fmt_date(&d.observation.timestamp));
    let missing = || NOT_AVAILABLE.to_string();

    let rows = vec![
        vec!["Patient".to_string(), inputs.context.patient.display_name().to_string()],
        vec!["First check-in".to_string(), first.unwrap_or_else(missing)],
        vec!["Latest check-in".to_string(), last.unwrap_or_else(missing)],
        vec!["Check-ins".to_string(), inputs.history.len().to_string()],
        vec![
            "Clinical history".to_string(),
            inputs
                .context
                .profile
                .as_ref()
                .map(|p| p.history.clone())
                .filter(|h| !h.trim().is_empty())
                .unwrap_or_else(missing),
        ],
    ];

    SectionBody::Table {
        columns: vec!["Field".to_string(), "Value".to_string()],
        rows,
    }
}

fn assessment_summary(assessments: &[StandardizedAssessment]) -> Option<SectionBody> {
    let current = current_assessment(assessments)?;
    let mut text = format!(
        "Current score {:.1} on {}: {} ({}).",
        current.score,
        current.date.format("%Y-%m-%d"),
        current.band(),
        current.band().description()
    );

    let mut ordered: Vec<&StandardizedAssessment> = assessments.iter().collect();
    ordered.sort_by_key(|a| a.date);
    if let Some(first) = ordered.first().filter(|first| first.date < current.date) {
        text.push_str(&format!(
            " Change since {}: {:+.1} points over {} assessment(s).",
            first.date.format("%Y-%m-%d"),
            current.score - first.score,
            ordered.len()
        ));
    }
    Some(SectionBody::Text { text })
}

fn evolution_chart(
    history: &[DerivedObservation],
    projection: &ProjectionResult,
    target_score: f64,
) -> ChartSpec {
    let mut series = vec![
        ChartSeries {
            label: "Functional score".to_string(),
            data: SeriesData::Numeric(
                history.iter().map(|d| (d.elapsed_days, d.functional_score)).collect(),
            ),
        },
        ChartSeries {
            label: "Pain".to_string(),
            data: SeriesData::Numeric(
                history
                    .iter()
                    .map(|d| (d.elapsed_days, f64::from(d.observation.pain_level)))
                    .collect(),
            ),
        },
    ];

    if let Some(trend) = projection.trend() {
        let last_day = history.last().map(|d| d.elapsed_days).unwrap_or(0.0);
        let end = match projection {
            ProjectionResult::Projected { target_day, .. } => target_day.max(last_day),
            _ => last_day,
        };
        series.push(ChartSeries {
            label: "Trend".to_string(),
            data: SeriesData::Numeric(vec![(0.0, trend.predict(0.0)), (end, trend.predict(end))]),
        });
        series.push(ChartSeries {
            label: "Discharge target".to_string(),
            data: SeriesData::Numeric(vec![(0.0, target_score), (end, target_score)]),
        });
    }

    ChartSpec {
        name: "evolution".to_string(),
        title: "Pain and functional score over time".to_string(),
        kind: ChartKind::Line,
        x_label: "Days since first check-in".to_string(),
        y_label: "Score (0-10)".to_string(),
        series,
    }
}

fn swelling_chart(history: &[DerivedObservation]) -> Option<ChartSpec> {
    let points: Vec<(f64, f64)> = history
        .iter()
        .filter_map(|d| {
            d.observation
                .swelling_grade
                .map(|g| (d.elapsed_days, f64::from(g.value())))
        })
        .collect();
    if points.is_empty() {
        return None;
    }

    Some(ChartSpec {
        name: "swelling_history".to_string(),
        title: "Stroke test grade over time".to_string(),
        kind: ChartKind::Line,
        x_label: "Days since first check-in".to_string(),
        y_label: "Swelling grade (0-3)".to_string(),
        series: vec![ChartSeries {
            label: "Swelling grade".to_string(),
            data: SeriesData::Numeric(points),
        }],
    })
}

fn functional_by_test_chart(history: &[DerivedObservation]) -> ChartSpec {
    let tests: [(&str, fn(&DerivedObservation) -> FunctionalTest); 3] = [
        ("Squat", |d| d.observation.squat_test),
        ("Step up", |d| d.observation.step_up_test),
        ("Step down", |d| d.observation.step_down_test),
    ];

    let n = history.len().max(1) as f64;
    let mean = tests
        .iter()
        .map(|(name, test)| {
            let total: f64 = history.iter().map(|d| functional_value(test(d))).sum();
            (name.to_string(), total / n)
        })
        .collect();

    let mut series = vec![ChartSeries {
        label: "Mean".to_string(),
        data: SeriesData::Categorical(mean),
    }];
    if let Some(latest) = history.last() {
        series.push(ChartSeries {
            label: "Latest".to_string(),
            data: SeriesData::Categorical(
                tests
                    .iter()
                    .map(|(name, test)| (name.to_string(), functional_value(test(latest))))
                    .collect(),
            ),
        });
    }

    ChartSpec {
        name: "functional_by_test".to_string(),
        title: "Functional capacity by test".to_string(),
        kind: ChartKind::Bar,
        x_label: "Test".to_string(),
        y_label: "Capacity (0-10)".to_string(),
        series,
    }
}

fn flags_section(insights: &InsightSet) -> SectionBody {
    if insights.flags.is_empty() && insights.skipped_rules.is_empty() {
        return SectionBody::Text {
            text: "No clinical flags on the latest check-in.".to_string(),
        };
    }

    let mut rows: Vec<Vec<String>> = insights
        .flags
        .iter()
        .map(|flag| vec![flag.title().to_string(), flag.advice().to_string()])
        .collect();
    rows.extend(insights.skipped_rules.iter().map(|rule| {
        vec![
            rule.title().to_string(),
            format!("{}: latest check-in lacks the required data", NOT_AVAILABLE),
        ]
    }));

    SectionBody::Table {
        columns: vec!["Flag".to_string(), "Advice".to_string()],
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::forecast_discharge;
    use crate::insights::compute_insights;
    use crate::models::{Observation, Posture, SleepQuality, SwellingGrade};
    use crate::scoring::{derive_history, functional_series};
    use chrono::{Duration, NaiveDate};

    fn observations(scores: &[(i64, FunctionalTest, Option<u8>)]) -> Vec<Observation> {
        let start = NaiveDate::from_ymd_opt(2025, 11, 24)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        scores
            .iter()
            .map(|(day, test, swelling)| Observation {
                patient: PatientId::new("Report Patient").unwrap(),
                timestamp: start + Duration::days(*day),
                pain_level: 4,
                sleep_quality: SleepQuality::Fair,
                posture: Posture::Standing,
                squat_test: *test,
                step_up_test: *test,
                step_down_test: *test,
                swelling_grade: swelling.map(|g| SwellingGrade::new(g).unwrap()),
            })
            .collect()
    }

    fn context(with_data: bool) -> PatientContext {
        let patient = PatientId::new("Report Patient").unwrap();
        PatientContext {
            profile: with_data.then(|| PatientProfile {
                patient: patient.clone(),
                history: "Meniscectomy, right knee".to_string(),
            }),
            assessments: if with_data {
                vec![
                    StandardizedAssessment::new(
                        patient.clone(),
                        NaiveDate::from_ymd_opt(2025, 11, 24).unwrap(),
                        41.0,
                    )
                    .unwrap(),
                    StandardizedAssessment::new(
                        patient.clone(),
                        NaiveDate::from_ymd_opt(2025, 12, 24).unwrap(),
                        63.0,
                    )
                    .unwrap(),
                ]
            } else {
                Vec::new()
            },
            patient,
        }
    }

    fn build(context: &PatientContext, observations: &[Observation], narrative: Option<&str>) -> Document {
        let history = derive_history(observations);
        let insights = compute_insights(&history);
        let first_date = history
            .first()
            .map(|d| d.observation.timestamp.date())
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let projection = forecast_discharge(&functional_series(&history), first_date);
        assemble_report(context, &history, &insights, &projection, narrative)
    }

    #[test]
    fn test_sections_follow_template_order() {
        let obs = observations(&[
            (0, FunctionalTest::ModeratePain, Some(2)),
            (5, FunctionalTest::MildPain, Some(1)),
            (10, FunctionalTest::NoPain, Some(0)),
        ]);
        let doc = build(&context(true), &obs, Some("Doing well."));
        let kinds: Vec<ReportSection> = doc.sections.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, ReportTemplate::default().sections);
        assert!(doc.warnings.is_empty());
        assert_eq!(doc.charts().count(), 5);

        match &doc.section(ReportSection::StandardizedAssessment).unwrap().body {
            SectionBody::Text { text } => {
                assert!(text.contains("63.0"));
                assert!(text.contains("Fair"));
                assert!(text.contains("+22.0"));
            }
            other => panic!("unexpected body {:?}", other),
        }
        match &doc.section(ReportSection::ClinicalSummary).unwrap().body {
            SectionBody::Text { text } => assert_eq!(text, "Doing well."),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_missing_upstream_data_uses_placeholders() {
        let obs = observations(&[(0, FunctionalTest::MildPain, None)]);
        let doc = build(&context(false), &obs, None);

        assert!(doc.warnings.contains(&DataWarning::MissingAssessment));
        assert!(doc.warnings.contains(&DataWarning::MissingProfile));
        assert!(doc.warnings.contains(&DataWarning::NoSwellingData));
        assert!(doc.warnings.contains(&DataWarning::InsufficientForecastData));

        for kind in [
            ReportSection::StandardizedAssessment,
            ReportSection::Forecast,
            ReportSection::SwellingHistoryChart,
        ] {
            match &doc.section(kind).unwrap().body {
                SectionBody::Text { text } => assert!(text.starts_with(NOT_AVAILABLE)),
                other => panic!("expected placeholder for {:?}, got {:?}", kind, other),
            }
        }

        // Generated narrative stands in for a missing one
        match &doc.section(ReportSection::ClinicalSummary).unwrap().body {
            SectionBody::Text { text } => assert!(!text.is_empty()),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_empty_history_still_produces_document() {
        let doc = build(&context(true), &[], None);
        assert_eq!(doc.sections.len(), ReportTemplate::default().sections.len());
        assert!(doc.warnings.contains(&DataWarning::NoCheckIns));
        assert_eq!(doc.charts().count(), 0);
    }

    #[test]
    fn test_custom_template() {
        let assembler = ReportAssembler::with_config(
            ReportConfig {
                title: "Summary".to_string(),
                clinic_name: Some("Clinica Genua".to_string()),
                template: ReportTemplate {
                    sections: vec![ReportSection::ClinicalFlags, ReportSection::Identification],
                },
            },
            ForecastConfig::default(),
        );
        let history = derive_history(&observations(&[(0, FunctionalTest::Unable, Some(3))]));
        let insights = compute_insights(&history);
        let projection = ProjectionResult::Insufficient {
            points: 1,
            distinct_days: 1,
        };
        let doc = assembler.assemble(&context(true), &history, &insights, &projection, None);

        assert_eq!(doc.title, "Summary - Clinica Genua");
        assert_eq!(doc.sections.len(), 2);
        match &doc.sections[0].body {
            SectionBody::Table { rows, .. } => {
                assert!(rows.iter().any(|r| r[0] == "Effusion alert"));
                assert!(rows.iter().any(|r| r[0] == "Eccentric control deficit"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_evolution_chart_includes_trend() {
        let obs = observations(&[
            (0, FunctionalTest::ModeratePain, None),
            (10, FunctionalTest::MildPain, None),
        ]);
        let doc = build(&context(true), &obs, None);
        let evolution = doc.charts().find(|c| c.name == "evolution").unwrap();
        let labels: Vec<&str> = evolution.series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Functional score", "Pain", "Trend", "Discharge target"]);

        match &doc.section(ReportSection::Forecast).unwrap().body {
            SectionBody::Text { text } => assert!(text.contains("Low confidence")),
            other => panic!("unexpected body {:?}", other),
        }
    }
}
