use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{GenuaError, ValidationError};
use crate::mapping;

/// Check-in sheet schema version. Version 2 added the optional swelling column.
pub const SCHEMA_VERSION: u32 = 2;

/// Timestamp formats accepted from forms and stored sheets
const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Canonical identity key for a patient name.
///
/// Trims, collapses internal whitespace and lowercases. Every lookup across
/// check-ins, assessments and the registry goes through this function.
pub fn normalize_patient_name(raw: &str) -> String {
    collapse_whitespace(raw).to_lowercase()
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a timestamp in any of the supported formats; bare dates map to midnight
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, ValidationError> {
    let value = value.trim();
    for format in &TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }

    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            if let Some(ts) = date.and_hms_opt(0, 0, 0) {
                return Ok(ts);
            }
        }
    }

    Err(ValidationError::InvalidTimestamp {
        value: value.to_string(),
    })
}

/// Patient identity: the name as entered plus its canonical key.
///
/// Equality and hashing use the canonical key only. Serialized as the
/// display name; the key is always recomputed on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatientId {
    display: String,
    key: String,
}

impl PatientId {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let display = collapse_whitespace(raw);
        if display.is_empty() {
            return Err(ValidationError::EmptyPatientName);
        }
        let key = normalize_patient_name(&display);
        Ok(PatientId { display, key })
    }

    pub fn display_name(&self) -> &str {
        &self.display
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Initials used in log output instead of the full name
    pub fn initials(&self) -> String {
        self.display
            .split(' ')
            .filter_map(|part| part.chars().next())
            .flat_map(|c| c.to_uppercase())
            .collect()
    }

    /// True when `raw` refers to this patient after normalization
    pub fn matches(&self, raw: &str) -> bool {
        normalize_patient_name(raw) == self.key
    }
}

impl TryFrom<String> for PatientId {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        PatientId::new(&raw)
    }
}

impl From<PatientId> for String {
    fn from(patient: PatientId) -> String {
        patient.display
    }
}

impl PartialEq for PatientId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PatientId {}

impl Hash for PatientId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Self-reported sleep quality for the previous night
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SleepQuality {
    Poor,
    Fair,
    Good,
}

impl SleepQuality {
    pub const ALL: [SleepQuality; 3] = [SleepQuality::Poor, SleepQuality::Fair, SleepQuality::Good];
}

impl fmt::Display for SleepQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepQuality::Poor => write!(f, "Poor"),
            SleepQuality::Fair => write!(f, "Fair"),
            SleepQuality::Good => write!(f, "Good"),
        }
    }
}

/// Predominant posture during the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Posture {
    Sitting,
    Balanced,
    Standing,
}

impl Posture {
    pub const ALL: [Posture; 3] = [Posture::Sitting, Posture::Balanced, Posture::Standing];
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Posture::Sitting => write!(f, "Sitting"),
            Posture::Balanced => write!(f, "Balanced"),
            Posture::Standing => write!(f, "Standing"),
        }
    }
}

/// Result of a functional test (squat, step-up, step-down), ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FunctionalTest {
    Unable,
    ModeratePain,
    MildPain,
    NoPain,
}

impl FunctionalTest {
    pub const ALL: [FunctionalTest; 4] = [
        FunctionalTest::Unable,
        FunctionalTest::ModeratePain,
        FunctionalTest::MildPain,
        FunctionalTest::NoPain,
    ];
}

impl fmt::Display for FunctionalTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionalTest::Unable => write!(f, "Unable"),
            FunctionalTest::ModeratePain => write!(f, "Moderate Pain"),
            FunctionalTest::MildPain => write!(f, "Mild Pain"),
            FunctionalTest::NoPain => write!(f, "No Pain"),
        }
    }
}

/// Stroke/sweep test effusion grade (0-3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SwellingGrade(u8);

impl SwellingGrade {
    pub const MAX: u8 = 3;

    pub fn new(grade: u8) -> Result<Self, ValidationError> {
        if grade > Self::MAX {
            return Err(ValidationError::OutOfRange {
                field: "swelling_grade",
                value: grade.to_string(),
                expected: "0-3",
            });
        }
        Ok(SwellingGrade(grade))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SwellingGrade {
    type Error = ValidationError;

    fn try_from(grade: u8) -> Result<Self, Self::Error> {
        SwellingGrade::new(grade)
    }
}

impl From<SwellingGrade> for u8 {
    fn from(grade: SwellingGrade) -> u8 {
        grade.0
    }
}

impl fmt::Display for SwellingGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One check-in event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub patient: PatientId,

    /// Date and time of capture
    pub timestamp: NaiveDateTime,

    /// Pain on a 0-10 numeric rating scale
    pub pain_level: u8,

    pub sleep_quality: SleepQuality,

    pub posture: Posture,

    pub squat_test: FunctionalTest,

    pub step_up_test: FunctionalTest,

    pub step_down_test: FunctionalTest,

    /// Absent on records captured before schema version 2
    pub swelling_grade: Option<SwellingGrade>,
}

/// Raw check-in fields as collected by the entry form, minimally trimmed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckInForm {
    pub patient: String,
    pub timestamp: Option<String>,
    pub pain_level: String,
    pub sleep_quality: String,
    pub posture: String,
    pub squat_test: String,
    pub step_up_test: String,
    pub step_down_test: String,
    pub swelling_grade: Option<String>,
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(value)
    }
}

/// Parse a 0-10 pain rating
pub fn parse_pain_level(value: &str) -> Result<u8, ValidationError> {
    let value = required(value, "pain_level")?;
    let out_of_range = || ValidationError::OutOfRange {
        field: "pain_level",
        value: value.to_string(),
        expected: "integer 0-10",
    };
    let pain: u8 = value.parse().map_err(|_| out_of_range())?;
    if pain > 10 {
        return Err(out_of_range());
    }
    Ok(pain)
}

impl Observation {
    /// Validate raw form input into an observation.
    ///
    /// `now` is used when the form carries no timestamp.
    pub fn from_form(form: &CheckInForm, now: NaiveDateTime) -> Result<Self, GenuaError> {
        let patient = PatientId::new(required(&form.patient, "patient")?)?;

        let timestamp = match form.timestamp.as_deref().map(str::trim) {
            Some(ts) if !ts.is_empty() => parse_timestamp(ts)?,
            _ => now,
        };

        let pain_level = parse_pain_level(&form.pain_level)?;
        let sleep_quality = required(&form.sleep_quality, "sleep_quality")?.parse()?;
        let posture = required(&form.posture, "posture")?.parse()?;
        let squat_test = required(&form.squat_test, "squat_test")?.parse()?;
        let step_up_test = required(&form.step_up_test, "step_up_test")?.parse()?;
        let step_down_test = required(&form.step_down_test, "step_down_test")?.parse()?;
        let swelling_grade = mapping::parse_optional_swelling(form.swelling_grade.as_deref())?;

        Ok(Observation {
            patient,
            timestamp,
            pain_level,
            sleep_quality,
            posture,
            squat_test,
            step_up_test,
            step_down_test,
            swelling_grade,
        })
    }

    /// Store key: one observation per (patient, timestamp)
    pub fn record_key(&self) -> String {
        format!("{}@{}", self.patient.key(), self.timestamp.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Monthly standardized subjective-outcome record (IKDC-style, 0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedAssessment {
    pub patient: PatientId,
    pub date: NaiveDate,
    pub score: f64,
}

impl StandardizedAssessment {
    pub fn new(patient: PatientId, date: NaiveDate, score: f64) -> Result<Self, ValidationError> {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(ValidationError::OutOfRange {
                field: "score",
                value: score.to_string(),
                expected: "0-100",
            });
        }
        Ok(StandardizedAssessment {
            patient,
            date,
            score,
        })
    }

    pub fn band(&self) -> AssessmentBand {
        AssessmentBand::from_score(self.score)
    }
}

/// Interpretation band of a standardized assessment score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentBand {
    Severe, // below 45
    Fair,   // 45 to 70
    Good,   // above 70
}

impl AssessmentBand {
    pub fn from_score(score: f64) -> Self {
        if score < 45.0 {
            AssessmentBand::Severe
        } else if score <= 70.0 {
            AssessmentBand::Fair
        } else {
            AssessmentBand::Good
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AssessmentBand::Severe => "Severe limitation",
            AssessmentBand::Fair => "Fair function",
            AssessmentBand::Good => "Good function",
        }
    }
}

impl fmt::Display for AssessmentBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentBand::Severe => write!(f, "Severe"),
            AssessmentBand::Fair => write!(f, "Fair"),
            AssessmentBand::Good => write!(f, "Good"),
        }
    }
}

/// Free-text clinical history from the patient registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient: PatientId,
    pub history: String,
}

/// Upstream data that was absent; views degrade instead of failing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataWarning {
    NoCheckIns,
    MissingAssessment,
    MissingProfile,
    NoSwellingData,
    InsufficientForecastData,
    /// Stored spelling differs from the requested one but normalizes to the same patient
    NameSpellingDiffers { stored: String, requested: String },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataWarning::NoCheckIns => write!(f, "No check-ins recorded"),
            DataWarning::MissingAssessment => write!(f, "No standardized assessment recorded"),
            DataWarning::MissingProfile => write!(f, "No registry entry for this patient"),
            DataWarning::NoSwellingData => write!(f, "No swelling grades recorded"),
            DataWarning::InsufficientForecastData => {
                write!(f, "Fewer than two check-in days; no forecast")
            }
            DataWarning::NameSpellingDiffers { stored, requested } => write!(
                f,
                "Records are stored as '{}' but were requested as '{}'",
                stored, requested
            ),
        }
    }
}

/// An observation with its derived metrics. Recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedObservation {
    pub observation: Observation,

    /// Mean of the three mapped functional tests, 0-10
    pub functional_score: f64,

    /// Mapped sleep quality, 0-10
    pub sleep_score: f64,

    /// Whole calendar days since the patient's first observation
    pub elapsed_days: f64,
}
