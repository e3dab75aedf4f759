use crate::error::{Result, StoreError};
use crate::models::{Observation, PatientId, PatientProfile, StandardizedAssessment};

use super::{RecordStore, Sheet};

/// In-process store for tests and demos
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    observations: Vec<Observation>,
    assessments: Vec<StandardizedAssessment>,
    registry: Vec<PatientProfile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, sheet: Sheet) -> usize {
        match sheet {
            Sheet::CheckIns => self.observations.len(),
            Sheet::Assessments => self.assessments.len(),
            Sheet::Registry => self.registry.len(),
        }
    }
}

impl RecordStore for MemoryStore {
    fn observations(&self, patient: &PatientId) -> Result<Vec<Observation>> {
        Ok(self
            .observations
            .iter()
            .filter(|o| &o.patient == patient)
            .cloned()
            .collect())
    }

    fn append_observation(&mut self, observation: &Observation) -> Result<()> {
        let key = observation.record_key();
        if self.observations.iter().any(|o| o.record_key() == key) {
            return Err(StoreError::Duplicate {
                sheet: Sheet::CheckIns.name(),
                key,
            }
            .into());
        }
        self.observations.push(observation.clone());
        Ok(())
    }

    fn assessments(&self, patient: &PatientId) -> Result<Vec<StandardizedAssessment>> {
        Ok(self
            .assessments
            .iter()
            .filter(|a| &a.patient == patient)
            .cloned()
            .collect())
    }

    fn append_assessment(&mut self, assessment: &StandardizedAssessment) -> Result<()> {
        self.assessments.push(assessment.clone());
        Ok(())
    }

    fn profile(&self, patient: &PatientId) -> Result<Option<PatientProfile>> {
        Ok(self
            .registry
            .iter()
            .rev()
            .find(|p| &p.patient == patient)
            .cloned())
    }

    fn register_profile(&mut self, profile: &PatientProfile) -> Result<()> {
        self.registry.push(profile.clone());
        Ok(())
    }

    fn patients(&self) -> Result<Vec<PatientId>> {
        let mut patients: Vec<PatientId> = Vec::new();
        let names = self
            .observations
            .iter()
            .map(|o| &o.patient)
            .chain(self.registry.iter().map(|p| &p.patient));
        for patient in names {
            if !patients.contains(patient) {
                patients.push(patient.clone());
            }
        }
        Ok(patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenuaError;
    use crate::models::{FunctionalTest, Posture, SleepQuality};
    use chrono::NaiveDate;

    fn observation(name: &str, hour: u32) -> Observation {
        Observation {
            patient: PatientId::new(name).unwrap(),
            timestamp: NaiveDate::from_ymd_opt(2025, 11, 24)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            pain_level: 3,
            sleep_quality: SleepQuality::Good,
            posture: Posture::Balanced,
            squat_test: FunctionalTest::MildPain,
            step_up_test: FunctionalTest::MildPain,
            step_down_test: FunctionalTest::MildPain,
            swelling_grade: None,
        }
    }

    #[test]
    fn test_append_and_lookup_normalizes_names() {
        let mut store = MemoryStore::new();
        store.append_observation(&observation("Lucas Oliveira", 8)).unwrap();
        store.append_observation(&observation("lucas  oliveira ", 9)).unwrap();
        store.append_observation(&observation("Mariana Costa", 9)).unwrap();

        let patient = PatientId::new("LUCAS OLIVEIRA").unwrap();
        assert_eq!(store.observations(&patient).unwrap().len(), 2);
        assert_eq!(store.patients().unwrap().len(), 2);
        assert_eq!(store.len(Sheet::CheckIns), 3);
    }

    #[test]
    fn test_duplicate_check_in_rejected() {
        let mut store = MemoryStore::new();
        store.append_observation(&observation("Lucas Oliveira", 8)).unwrap();
        let err = store
            .append_observation(&observation(" lucas oliveira", 8))
            .unwrap_err();
        assert!(matches!(err, GenuaError::Store(StoreError::Duplicate { .. })));
    }

    #[test]
    fn test_latest_profile_wins() {
        let mut store = MemoryStore::new();
        let patient = PatientId::new("Ana").unwrap();
        for history in ["ACL reconstruction", "ACL reconstruction, 6 weeks post-op"] {
            store
                .register_profile(&PatientProfile {
                    patient: patient.clone(),
                    history: history.to_string(),
                })
                .unwrap();
        }
        let profile = store.profile(&patient).unwrap().unwrap();
        assert!(profile.history.contains("6 weeks"));
    }
}
