//! Per-patient dashboard view model
//!
//! Every load re-reads the full history from the store and recomputes all
//! derived metrics; nothing is cached between interactions.

use colored::*;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{IdentityError, Result};
use crate::forecast::{ProjectionResult, TrendForecaster, TrendLine};
use crate::insights::{InsightEngine, InsightSet};
use crate::models::{
    AssessmentBand, DataWarning, DerivedObservation, PatientId, PatientProfile,
    StandardizedAssessment,
};
use crate::report::{Document, PatientContext, ReportAssembler};
use crate::scoring::{derive_history, functional_series};
use crate::store::{current_assessment, similar_patients, RecordStore};

/// Forecast panel; only present when a trend could be fitted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPanel {
    pub trend: TrendLine,
    pub projection: ProjectionResult,
    pub low_confidence: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDashboard {
    pub patient: PatientId,
    pub profile: Option<PatientProfile>,
    pub history: Vec<DerivedObservation>,
    pub assessments: Vec<StandardizedAssessment>,
    pub current_assessment: Option<StandardizedAssessment>,
    pub projection: ProjectionResult,
    pub forecast: Option<ForecastPanel>,
    pub insights: InsightSet,
    pub warnings: Vec<DataWarning>,
}

impl PatientDashboard {
    /// Load and derive everything shown for one patient.
    ///
    /// A name with no check-ins at all is an [`IdentityError::UnknownPatient`]
    /// carrying near-match suggestions.
    pub fn load<S: RecordStore + ?Sized>(store: &S, name: &str, config: &AppConfig) -> Result<Self> {
        let patient = PatientId::new(name)?;
        let observations = store.observations(&patient)?;
        if observations.is_empty() {
            let known = store.patients()?;
            return Err(IdentityError::UnknownPatient {
                name: patient.display_name().to_string(),
                suggestions: similar_patients(&known, name),
            }
            .into());
        }

        let mut warnings = Vec::new();
        let mut spellings: Vec<&str> = observations
            .iter()
            .map(|o| o.patient.display_name())
            .filter(|stored| *stored != patient.display_name())
            .collect();
        spellings.sort_unstable();
        spellings.dedup();
        for stored in spellings {
            warn!(
                patient = %patient.initials(),
                "Stored patient name spelling differs from the requested one"
            );
            warnings.push(DataWarning::NameSpellingDiffers {
                stored: stored.to_string(),
                requested: patient.display_name().to_string(),
            });
        }

        let history = derive_history(&observations);
        let first_date = history
            .first()
            .map(|d| d.observation.timestamp.date())
            .unwrap_or_default();

        let forecaster = TrendForecaster::with_config(config.forecast.clone());
        let projection = forecaster.forecast(&functional_series(&history), first_date);
        let insights = InsightEngine::with_config(config.insights.clone()).compute(&history);

        let forecast = projection.trend().map(|trend| ForecastPanel {
            trend: *trend,
            projection: projection.clone(),
            low_confidence: trend.is_low_confidence(config.forecast.min_reliable_points),
        });
        if forecast.is_none() {
            warnings.push(DataWarning::InsufficientForecastData);
        }

        let assessments = store.assessments(&patient)?;
        let current = current_assessment(&assessments).cloned();
        if current.is_none() {
            warnings.push(DataWarning::MissingAssessment);
        }

        let profile = store.profile(&patient)?;
        if profile.is_none() {
            warnings.push(DataWarning::MissingProfile);
        }

        if history.iter().all(|d| d.observation.swelling_grade.is_none()) {
            warnings.push(DataWarning::NoSwellingData);
        }

        debug!(
            patient = %patient.initials(),
            check_ins = history.len(),
            projection = %projection.summary(),
            warnings = warnings.len(),
            "Loaded dashboard"
        );

        Ok(PatientDashboard {
            patient,
            profile,
            history,
            assessments,
            current_assessment: current,
            projection,
            forecast,
            insights,
            warnings,
        })
    }

    pub fn latest(&self) -> Option<&DerivedObservation> {
        self.history.last()
    }

    pub fn assessment_band(&self) -> Option<AssessmentBand> {
        self.current_assessment.as_ref().map(|a| a.band())
    }

    /// Report inputs for this patient
    pub fn context(&self) -> PatientContext {
        PatientContext {
            patient: self.patient.clone(),
            profile: self.profile.clone(),
            assessments: self.assessments.clone(),
        }
    }

    /// Assemble a report using the configured template
    pub fn report(&self, config: &AppConfig, narrative: Option<&str>) -> Document {
        ReportAssembler::with_config(config.report.clone(), config.forecast.clone()).assemble(
            &self.context(),
            &self.history,
            &self.insights,
            &self.projection,
            narrative,
        )
    }

    /// Terminal rendering
    pub fn render(&self, recent: usize) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", self.patient.display_name().bold()));

        let mut summary = Builder::default();
        if let Some(latest) = self.latest() {
            summary.push_record([
                "Latest check-in".to_string(),
                latest.observation.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            ]);
            summary.push_record(["Pain".to_string(), format!("{}/10", latest.observation.pain_level)]);
            summary.push_record([
                "Functional score".to_string(),
                format!("{:.1}/10", latest.functional_score),
            ]);
            summary.push_record(["Sleep".to_string(), latest.observation.sleep_quality.to_string()]);
        }
        summary.push_record([
            "IKDC".to_string(),
            match &self.current_assessment {
                Some(a) => format!("{:.1} ({})", a.score, band_label(a.band())),
                None => "Not available".to_string(),
            },
        ]);
        summary.push_record([
            "Forecast".to_string(),
            match &self.forecast {
                Some(panel) if panel.low_confidence => {
                    format!("{} [low confidence]", panel.projection.summary())
                }
                Some(panel) => panel.projection.summary(),
                None => "Not available".to_string(),
            },
        ]);
        if let Some(r) = self.insights.sleep_pain_correlation {
            summary.push_record(["Sleep/pain correlation".to_string(), format!("{:+.2}", r)]);
        }
        if let Some(trend) = self.insights.effusion_trend {
            summary.push_record(["Swelling trend".to_string(), trend.to_string()]);
        }
        let mut table = summary.build();
        table.with(Style::rounded());
        out.push_str(&format!("{}\n", table));

        if !self.history.is_empty() {
            let mut checkins = Builder::default();
            checkins.push_record(
                ["Date", "Pain", "Sleep", "Posture", "Squat", "Step up", "Step down", "Score"]
                    .map(String::from),
            );
            let skip = self.history.len().saturating_sub(recent);
            for d in self.history.iter().skip(skip) {
                let o = &d.observation;
                checkins.push_record([
                    o.timestamp.format("%Y-%m-%d").to_string(),
                    o.pain_level.to_string(),
                    o.sleep_quality.to_string(),
                    o.posture.to_string(),
                    o.squat_test.to_string(),
                    o.step_up_test.to_string(),
                    o.step_down_test.to_string(),
                    format!("{:.1}", d.functional_score),
                ]);
            }
            let mut table = checkins.build();
            table.with(Style::rounded());
            out.push_str(&format!("{}\n", table));
        }

        for flag in &self.insights.flags {
            out.push_str(&format!("{} {}\n", "⚠".yellow(), flag.title().yellow().bold()));
            out.push_str(&format!("  {}\n", flag.advice()));
        }
        for warning in &self.warnings {
            out.push_str(&format!("{}\n", warning.to_string().dimmed()));
        }

        out
    }
}

fn band_label(band: AssessmentBand) -> ColoredString {
    match band {
        AssessmentBand::Severe => band.to_string().red(),
        AssessmentBand::Fair => band.to_string().yellow(),
        AssessmentBand::Good => band.to_string().green(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenuaError;
    use crate::insights::ClinicalFlag;
    use crate::models::{FunctionalTest, Observation, Posture, SleepQuality, SwellingGrade};
    use crate::store::MemoryStore;
    use chrono::{Duration, NaiveDate};

    fn check_in(name: &str, day: i64, test: FunctionalTest, pain: u8) -> Observation {
        Observation {
            patient: PatientId::new(name).unwrap(),
            timestamp: NaiveDate::from_ymd_opt(2025, 11, 24)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap()
                + Duration::days(day),
            pain_level: pain,
            sleep_quality: SleepQuality::Poor,
            posture: Posture::Sitting,
            squat_test: test,
            step_up_test: test,
            step_down_test: test,
            swelling_grade: Some(SwellingGrade::new(1).unwrap()),
        }
    }

    #[test]
    fn test_single_check_in_has_no_forecast_panel() {
        let mut store = MemoryStore::new();
        store
            .append_observation(&check_in("Beatriz Ferreira", 0, FunctionalTest::Unable, 8))
            .unwrap();

        let dashboard =
            PatientDashboard::load(&store, "Beatriz Ferreira", &AppConfig::default()).unwrap();
        assert!(dashboard.forecast.is_none());
        assert!(dashboard.projection.is_insufficient());
        assert!(dashboard.warnings.contains(&DataWarning::InsufficientForecastData));
        assert!(dashboard.insights.has_flag(ClinicalFlag::CentralSensitizationAlert));
        assert!(dashboard.render(5).contains("Not available"));
    }

    #[test]
    fn test_unknown_patient_suggests_near_matches() {
        let mut store = MemoryStore::new();
        store
            .append_observation(&check_in("Ricardo Biondi", 0, FunctionalTest::Unable, 7))
            .unwrap();

        let err = PatientDashboard::load(&store, "Ricardo", &AppConfig::default()).unwrap_err();
        match err {
            GenuaError::Identity(IdentityError::UnknownPatient { suggestions, .. }) => {
                assert_eq!(suggestions, vec!["Ricardo Biondi".to_string()]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_spelling_variants_are_merged_with_warning() {
        let mut store = MemoryStore::new();
        store
            .append_observation(&check_in("Roberto Santos", 0, FunctionalTest::ModeratePain, 6))
            .unwrap();
        store
            .append_observation(&check_in("roberto  santos", 7, FunctionalTest::MildPain, 4))
            .unwrap();

        let dashboard =
            PatientDashboard::load(&store, "Roberto Santos", &AppConfig::default()).unwrap();
        assert_eq!(dashboard.history.len(), 2);
        assert!(dashboard.forecast.is_some());
        assert!(dashboard.warnings.contains(&DataWarning::NameSpellingDiffers {
            stored: "roberto santos".to_string(),
            requested: "Roberto Santos".to_string(),
        }));
    }

    #[test]
    fn test_current_assessment_band() {
        let mut store = MemoryStore::new();
        let patient = PatientId::new("Mariana Costa").unwrap();
        store
            .append_observation(&check_in("Mariana Costa", 0, FunctionalTest::MildPain, 3))
            .unwrap();
        store
            .append_assessment(
                &StandardizedAssessment::new(
                    patient,
                    NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
                    74.0,
                )
                .unwrap(),
            )
            .unwrap();

        let dashboard =
            PatientDashboard::load(&store, "mariana costa", &AppConfig::default()).unwrap();
        assert_eq!(dashboard.assessment_band(), Some(AssessmentBand::Good));
        assert!(!dashboard.warnings.contains(&DataWarning::MissingAssessment));
        assert!(dashboard.warnings.contains(&DataWarning::MissingProfile));
    }
}
