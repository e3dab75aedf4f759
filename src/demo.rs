//! Synthetic demo cohort
//!
//! Five clinical archetypes, thirty sessions each (three per week for ten
//! weeks). The generator is seeded so the same seed always yields the same
//! cohort.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{GenuaError, Result, StoreError};
use crate::models::{
    FunctionalTest, Observation, PatientId, PatientProfile, Posture, SleepQuality,
    StandardizedAssessment,
};
use crate::store::RecordStore;

pub const SESSIONS_PER_PATIENT: usize = 30;

/// Default first session date of the demo cohort
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 24).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoProfile {
    /// Pain falls and function rises steadily
    SteadyRecovery,
    /// Pain depends on time spent sitting
    Postural,
    /// Pain depends on the previous night's sleep
    SleepDependent,
    MotorDeficit,
    Sensitized,
}

impl DemoProfile {
    pub const ALL: [DemoProfile; 5] = [
        DemoProfile::SteadyRecovery,
        DemoProfile::Postural,
        DemoProfile::SleepDependent,
        DemoProfile::MotorDeficit,
        DemoProfile::Sensitized,
    ];

    pub fn patient_name(&self) -> &'static str {
        match self {
            DemoProfile::SteadyRecovery => "Lucas Oliveira",
            DemoProfile::Postural => "Mariana Costa",
            DemoProfile::SleepDependent => "Roberto Santos",
            DemoProfile::MotorDeficit => "Beatriz Ferreira",
            DemoProfile::Sensitized => "Ricardo Biondi",
        }
    }

    fn history(&self) -> &'static str {
        match self {
            DemoProfile::SteadyRecovery => "ACL reconstruction, right knee",
            DemoProfile::Postural => "Patellofemoral pain, office worker",
            DemoProfile::SleepDependent => "Knee osteoarthritis, poor sleep hygiene",
            DemoProfile::MotorDeficit => "Partial meniscectomy, quadriceps inhibition",
            DemoProfile::Sensitized => "Persistent knee pain after total knee replacement",
        }
    }

    /// Monthly standardized assessment scores
    fn assessment_scores(&self) -> [f64; 3] {
        match self {
            DemoProfile::SteadyRecovery => [38.0, 57.5, 76.0],
            DemoProfile::Postural => [48.0, 52.0, 55.0],
            DemoProfile::SleepDependent => [46.0, 50.5, 49.0],
            DemoProfile::MotorDeficit => [31.0, 33.5, 35.0],
            DemoProfile::Sensitized => [29.0, 27.5, 30.0],
        }
    }

    fn session(&self, index: usize, rng: &mut StdRng) -> (u8, SleepQuality, Posture, FunctionalTest) {
        match self {
            DemoProfile::SteadyRecovery => {
                let pain = 8u8.saturating_sub((index / 3) as u8);
                let test = if index > 20 {
                    FunctionalTest::NoPain
                } else if index > 10 {
                    FunctionalTest::MildPain
                } else {
                    FunctionalTest::Unable
                };
                let sleep = if index > 10 {
                    SleepQuality::Good
                } else {
                    SleepQuality::Fair
                };
                (pain, sleep, Posture::Standing, test)
            }
            DemoProfile::Postural => {
                let posture = if rng.gen::<f64>() > 0.5 {
                    Posture::Sitting
                } else {
                    Posture::Balanced
                };
                let pain = match posture {
                    Posture::Sitting => rng.gen_range(5..=8),
                    _ => rng.gen_range(2..=4),
                };
                (pain, SleepQuality::Fair, posture, FunctionalTest::ModeratePain)
            }
            DemoProfile::SleepDependent => {
                let sleep = SleepQuality::ALL[rng.gen_range(0..SleepQuality::ALL.len())];
                let pain = match sleep {
                    SleepQuality::Poor => rng.gen_range(7..=10),
                    _ => rng.gen_range(2..=4),
                };
                (pain, sleep, Posture::Balanced, FunctionalTest::MildPain)
            }
            DemoProfile::MotorDeficit | DemoProfile::Sensitized => (
                rng.gen_range(6..=9),
                SleepQuality::Poor,
                Posture::Sitting,
                FunctionalTest::Unable,
            ),
        }
    }
}

/// Day offset of session `index`: three sessions per week, two days apart
pub fn session_day(index: usize) -> i64 {
    ((index / 3) * 7 + (index % 3) * 2) as i64
}

/// Generate the full demo cohort, ordered by profile then session
pub fn generate_cohort(seed: u64, start_date: NaiveDate) -> Result<Vec<Observation>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = start_date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let mut cohort = Vec::with_capacity(DemoProfile::ALL.len() * SESSIONS_PER_PATIENT);

    for profile in DemoProfile::ALL {
        let patient = PatientId::new(profile.patient_name())?;
        for index in 0..SESSIONS_PER_PATIENT {
            let (pain_level, sleep_quality, posture, test) = profile.session(index, &mut rng);
            cohort.push(Observation {
                patient: patient.clone(),
                timestamp: start + Duration::days(session_day(index)),
                pain_level,
                sleep_quality,
                posture,
                squat_test: test,
                step_up_test: test,
                step_down_test: test,
                swelling_grade: None,
            });
        }
    }

    debug!(seed, observations = cohort.len(), "Generated demo cohort");
    Ok(cohort)
}

/// Registry entries and monthly assessments matching the demo cohort
pub fn cohort_records(start_date: NaiveDate) -> Result<(Vec<PatientProfile>, Vec<StandardizedAssessment>)> {
    let mut profiles = Vec::new();
    let mut assessments = Vec::new();

    for profile in DemoProfile::ALL {
        let patient = PatientId::new(profile.patient_name())?;
        profiles.push(PatientProfile {
            patient: patient.clone(),
            history: profile.history().to_string(),
        });
        for (month, score) in profile.assessment_scores().iter().enumerate() {
            let date = start_date + Duration::days(30 * month as i64);
            assessments.push(StandardizedAssessment::new(patient.clone(), date, *score)?);
        }
    }

    Ok((profiles, assessments))
}

/// Summary of a seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub observations: usize,
    pub skipped_duplicates: usize,
    pub profiles: usize,
    pub assessments: usize,
}

/// Write the demo cohort into a store. Check-ins already present are skipped,
/// so seeding twice does not duplicate data.
pub fn seed_store<S: RecordStore + ?Sized>(
    store: &mut S,
    seed: u64,
    start_date: NaiveDate,
) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for observation in generate_cohort(seed, start_date)? {
        match store.append_observation(&observation) {
            Ok(()) => summary.observations += 1,
            Err(GenuaError::Store(StoreError::Duplicate { .. })) => summary.skipped_duplicates += 1,
            Err(e) => return Err(e),
        }
    }

    // Registry and assessments only on first seeding
    if summary.observations > 0 {
        let (profiles, assessments) = cohort_records(start_date)?;
        for profile in &profiles {
            store.register_profile(profile)?;
        }
        for assessment in &assessments {
            store.append_assessment(assessment)?;
        }
        summary.profiles = profiles.len();
        summary.assessments = assessments.len();
    }

    info!(
        observations = summary.observations,
        skipped = summary.skipped_duplicates,
        "Seeded demo data"
    );
    Ok(summary)
}

fn legacy_functional(test: FunctionalTest) -> &'static str {
    match test {
        FunctionalTest::Unable => "Incapaz",
        FunctionalTest::ModeratePain => "Dor Moderada",
        FunctionalTest::MildPain => "Dor Leve",
        FunctionalTest::NoPain => "Sem Dor",
    }
}

fn legacy_sleep(sleep: SleepQuality) -> &'static str {
    match sleep {
        SleepQuality::Poor => "Ruim",
        SleepQuality::Fair => "Regular",
        SleepQuality::Good => "Bom",
    }
}

fn legacy_posture(posture: Posture) -> &'static str {
    match posture {
        Posture::Sitting => "Sentado",
        Posture::Balanced => "Equilibrado",
        Posture::Standing => "Em pé",
    }
}

/// Write observations in the legacy spreadsheet layout
/// (`Data, Paciente, Dor, Sono, Postura, Agachamento, Step_Up, Step_Down`)
pub fn write_legacy_csv<P: AsRef<Path>>(observations: &[Observation], path: P) -> Result<()> {
    let path = path.as_ref();
    let csv_err = |source| StoreError::Csv {
        sheet: "legacy export",
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer
        .write_record([
            "Data",
            "Paciente",
            "Dor",
            "Sono",
            "Postura",
            "Agachamento",
            "Step_Up",
            "Step_Down",
        ])
        .map_err(csv_err)?;

    for o in observations {
        writer
            .write_record([
                o.timestamp.format("%d/%m/%Y %H:%M").to_string(),
                o.patient.display_name().to_string(),
                o.pain_level.to_string(),
                legacy_sleep(o.sleep_quality).to_string(),
                legacy_posture(o.posture).to_string(),
                legacy_functional(o.squat_test).to_string(),
                legacy_functional(o.step_up_test).to_string(),
                legacy_functional(o.step_down_test).to_string(),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
