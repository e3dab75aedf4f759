//! Category mapper
//!
//! Fixed lookup tables translating categorical clinical labels into numeric
//! scales. There is exactly one canonical table per category; unknown labels
//! are always an error, never a default.
//!
//! Label parsing is case-insensitive and ignores spaces, `_` and `-`, so
//! "Moderate Pain", "moderate_pain" and "ModeratePain" are the same label.
//! Labels written by the original Portuguese-language spreadsheet
//! ("Dor Moderada", "Ruim", "Em pé", ...) are accepted as aliases.

use std::fmt;
use std::str::FromStr;

use crate::error::MappingError;
use crate::models::{FunctionalTest, Posture, SleepQuality, SwellingGrade};

/// Version of the canonical mapping tables
pub const MAPPING_VERSION: u32 = 2;

/// The lookup tables known to the mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryTable {
    FunctionalTest,
    Sleep,
    Posture,
    Swelling,
}

impl CategoryTable {
    pub fn name(&self) -> &'static str {
        match self {
            CategoryTable::FunctionalTest => "functional_test",
            CategoryTable::Sleep => "sleep_quality",
            CategoryTable::Posture => "posture",
            CategoryTable::Swelling => "swelling_grade",
        }
    }
}

impl fmt::Display for CategoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Functional test scale: Unable 0, Moderate Pain 4, Mild Pain 7, No Pain 10
pub fn functional_value(test: FunctionalTest) -> f64 {
    match test {
        FunctionalTest::Unable => 0.0,
        FunctionalTest::ModeratePain => 4.0,
        FunctionalTest::MildPain => 7.0,
        FunctionalTest::NoPain => 10.0,
    }
}

/// Sleep scale: Poor 1, Fair 5, Good 10
pub fn sleep_value(sleep: SleepQuality) -> f64 {
    match sleep {
        SleepQuality::Poor => 1.0,
        SleepQuality::Fair => 5.0,
        SleepQuality::Good => 10.0,
    }
}

/// Inverse of [`functional_value`]; only exact table values have a category
pub fn functional_from_value(value: f64) -> Result<FunctionalTest, MappingError> {
    FunctionalTest::ALL
        .into_iter()
        .find(|test| functional_value(*test) == value)
        .ok_or_else(|| MappingError::UnknownValue {
            table: CategoryTable::FunctionalTest.name(),
            value: value.to_string(),
        })
}

/// Inverse of [`sleep_value`]
pub fn sleep_from_value(value: f64) -> Result<SleepQuality, MappingError> {
    SleepQuality::ALL
        .into_iter()
        .find(|sleep| sleep_value(*sleep) == value)
        .ok_or_else(|| MappingError::UnknownValue {
            table: CategoryTable::Sleep.name(),
            value: value.to_string(),
        })
}

/// Map a raw label straight to its numeric scale value.
///
/// Only the functional-test and sleep tables are numeric; posture labels
/// map to their ordinal position (Sitting 0, Balanced 1, Standing 2) and
/// swelling labels to their grade.
pub fn map_label(table: CategoryTable, label: &str) -> Result<f64, MappingError> {
    match table {
        CategoryTable::FunctionalTest => label.parse().map(functional_value),
        CategoryTable::Sleep => label.parse().map(sleep_value),
        CategoryTable::Posture => label.parse::<Posture>().map(|p| match p {
            Posture::Sitting => 0.0,
            Posture::Balanced => 1.0,
            Posture::Standing => 2.0,
        }),
        CategoryTable::Swelling => parse_swelling(label).map(|g| f64::from(g.value())),
    }
}

fn label_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn unknown(table: CategoryTable, label: &str) -> MappingError {
    MappingError::UnknownLabel {
        table: table.name(),
        label: label.trim().to_string(),
    }
}

impl FromStr for FunctionalTest {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match label_key(s).as_str() {
            "unable" | "incapaz" => Ok(FunctionalTest::Unable),
            "moderatepain" | "dormoderada" => Ok(FunctionalTest::ModeratePain),
            "mildpain" | "dorleve" => Ok(FunctionalTest::MildPain),
            "nopain" | "semdor" => Ok(FunctionalTest::NoPain),
            _ => Err(unknown(CategoryTable::FunctionalTest, s)),
        }
    }
}

impl FromStr for SleepQuality {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match label_key(s).as_str() {
            "poor" | "ruim" => Ok(SleepQuality::Poor),
            "fair" | "regular" => Ok(SleepQuality::Fair),
            "good" | "bom" => Ok(SleepQuality::Good),
            _ => Err(unknown(CategoryTable::Sleep, s)),
        }
    }
}

impl FromStr for Posture {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match label_key(s).as_str() {
            "sitting" | "sentado" => Ok(Posture::Sitting),
            "balanced" | "equilibrado" => Ok(Posture::Balanced),
            "standing" | "empé" | "empe" => Ok(Posture::Standing),
            _ => Err(unknown(CategoryTable::Posture, s)),
        }
    }
}

/// Parse a swelling grade label: "2", "2.0", "grade 2" or "grau 2"
pub fn parse_swelling(label: &str) -> Result<SwellingGrade, MappingError> {
    let key = label_key(label);
    let digits = key
        .strip_prefix("grade")
        .or_else(|| key.strip_prefix("grau"))
        .unwrap_or(key.as_str());
    let digits = digits.strip_suffix(".0").unwrap_or(digits);

    digits
        .parse::<u8>()
        .ok()
        .and_then(|grade| SwellingGrade::new(grade).ok())
        .ok_or_else(|| unknown(CategoryTable::Swelling, label))
}

/// Blank or absent swelling is a legacy record, not an error
pub fn parse_optional_swelling(label: Option<&str>) -> Result<Option<SwellingGrade>, MappingError> {
    match label.map(str::trim) {
        None | Some("") => Ok(None),
        Some(label) => parse_swelling(label).map(Some),
    }
}
