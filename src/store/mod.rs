//! Record store adapters
//!
//! Check-ins, standardized assessments and the patient registry are three
//! logically separate, append-only tables ("sheets"). The engine never holds
//! a global connection: a store handle is passed into every operation.
//!
//! Appends are not atomic across processes. Adapters must append a single
//! row (never rewrite the table) and verify the write so that concurrent
//! check-ins cannot silently drop each other.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::models::{Observation, PatientId, PatientProfile, StandardizedAssessment};

pub mod csv;
pub mod memory;

pub use self::csv::CsvStore;
pub use self::memory::MemoryStore;

/// Logical table selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sheet {
    CheckIns,
    Assessments,
    Registry,
}

impl Sheet {
    pub const ALL: [Sheet; 3] = [Sheet::CheckIns, Sheet::Assessments, Sheet::Registry];

    pub fn name(&self) -> &'static str {
        match self {
            Sheet::CheckIns => "checkins",
            Sheet::Assessments => "assessments",
            Sheet::Registry => "registry",
        }
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage backend for patient records
pub trait RecordStore {
    /// Full check-in history for a patient, in storage order
    fn observations(&self, patient: &PatientId) -> Result<Vec<Observation>>;

    /// Append one check-in; rejects a second check-in with the same (patient, timestamp)
    fn append_observation(&mut self, observation: &Observation) -> Result<()>;

    /// All standardized assessments for a patient, in storage order
    fn assessments(&self, patient: &PatientId) -> Result<Vec<StandardizedAssessment>>;

    fn append_assessment(&mut self, assessment: &StandardizedAssessment) -> Result<()>;

    /// Latest registry entry for a patient
    fn profile(&self, patient: &PatientId) -> Result<Option<PatientProfile>>;

    fn register_profile(&mut self, profile: &PatientProfile) -> Result<()>;

    /// Every patient with at least one check-in or registry entry
    fn patients(&self) -> Result<Vec<PatientId>>;
}

/// Most recent assessment by date; later rows win ties
pub fn current_assessment(assessments: &[StandardizedAssessment]) -> Option<&StandardizedAssessment> {
    assessments
        .iter()
        .enumerate()
        .max_by_key(|(i, a)| (a.date, *i))
        .map(|(_, a)| a)
}

/// Known patients whose name shares a word with `name`
pub fn similar_patients(known: &[PatientId], name: &str) -> Vec<String> {
    let query = crate::models::normalize_patient_name(name);
    let tokens: Vec<&str> = query.split(' ').filter(|t| t.chars().count() >= 3).collect();

    known
        .iter()
        .filter(|p| {
            tokens
                .iter()
                .any(|t| p.key().split(' ').any(|part| part.starts_with(t) || t.starts_with(part)))
        })
        .map(|p| p.display_name().to_string())
        .collect()
}

/// Result of importing an external check-in export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub imported: usize,
    pub skipped_duplicates: usize,
}
