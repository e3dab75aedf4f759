//! Integration tests for the CSV record store
//!
//! Exercises the file-backed adapter through the public `RecordStore` trait,
//! the way the CLI uses it.

use chrono::NaiveDate;
use std::fs;
use tempfile::tempdir;

use genua::error::{GenuaError, StoreError};
use genua::models::{
    FunctionalTest, Observation, PatientId, PatientProfile, Posture, SleepQuality,
    StandardizedAssessment, SwellingGrade,
};
use genua::store::{CsvStore, RecordStore, Sheet};
use genua::{AppConfig, PatientDashboard};

fn observation(name: &str, day: u32, test: FunctionalTest) -> Observation {
    Observation {
        patient: PatientId::new(name).unwrap(),
        timestamp: NaiveDate::from_ymd_opt(2025, 11, day)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap(),
        pain_level: 4,
        sleep_quality: SleepQuality::Fair,
        posture: Posture::Balanced,
        squat_test: test,
        step_up_test: test,
        step_down_test: test,
        swelling_grade: Some(SwellingGrade::new(2).unwrap()),
    }
}

#[test]
fn test_two_handles_do_not_lose_appends() {
    let dir = tempdir().unwrap();
    let mut first = CsvStore::open(dir.path()).unwrap();
    let mut second = CsvStore::open(dir.path()).unwrap();

    first
        .append_observation(&observation("Lucas Oliveira", 24, FunctionalTest::Unable))
        .unwrap();
    second
        .append_observation(&observation("Lucas Oliveira", 26, FunctionalTest::ModeratePain))
        .unwrap();
    first
        .append_observation(&observation("Lucas Oliveira", 28, FunctionalTest::MildPain))
        .unwrap();

    let patient = PatientId::new("lucas oliveira").unwrap();
    assert_eq!(first.observations(&patient).unwrap().len(), 3);
    assert_eq!(second.observations(&patient).unwrap().len(), 3);

    // Single header, one line per append
    let contents = fs::read_to_string(first.sheet_path(Sheet::CheckIns)).unwrap();
    assert_eq!(contents.lines().count(), 4);
}

#[test]
fn test_duplicate_from_second_handle_rejected() {
    let dir = tempdir().unwrap();
    let mut first = CsvStore::open(dir.path()).unwrap();
    let mut second = CsvStore::open(dir.path()).unwrap();

    first
        .append_observation(&observation("Mariana Costa", 24, FunctionalTest::MildPain))
        .unwrap();
    let err = second
        .append_observation(&observation("MARIANA COSTA", 24, FunctionalTest::NoPain))
        .unwrap_err();
    assert!(matches!(err, GenuaError::Store(StoreError::Duplicate { .. })));
}

#[test]
fn test_dashboard_from_csv_store() {
    let dir = tempdir().unwrap();
    let mut store = CsvStore::open(dir.path()).unwrap();
    let patient = PatientId::new("Beatriz Ferreira").unwrap();

    for (day, test) in [
        (3, FunctionalTest::Unable),
        (10, FunctionalTest::ModeratePain),
        (17, FunctionalTest::MildPain),
        (24, FunctionalTest::MildPain),
    ] {
        store
            .append_observation(&observation("Beatriz Ferreira", day, test))
            .unwrap();
    }
    store
        .append_assessment(
            &StandardizedAssessment::new(
                patient.clone(),
                NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
                44.5,
            )
            .unwrap(),
        )
        .unwrap();
    store
        .register_profile(&PatientProfile {
            patient: patient.clone(),
            history: "Partial meniscectomy".to_string(),
        })
        .unwrap();

    let dashboard = PatientDashboard::load(&store, "Beatriz Ferreira", &AppConfig::default()).unwrap();
    assert_eq!(dashboard.history.len(), 4);
    assert!(dashboard.warnings.is_empty());
    let panel = dashboard.forecast.as_ref().unwrap();
    assert!(!panel.low_confidence);
    assert!(panel.trend.slope > 0.0);
    assert_eq!(dashboard.profile.as_ref().unwrap().history, "Partial meniscectomy");
}

#[test]
fn test_legacy_sheet_in_data_dir() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("checkins.csv"),
        "Data,Paciente,Dor,Sono,Postura,Agachamento,Step_Up,Step_Down\n\
         24/11/2025 00:00,Roberto Santos,9,Ruim,Equilibrado,Dor Leve,Dor Leve,Dor Leve\n\
         26/11/2025 00:00,Roberto Santos,3,Bom,Equilibrado,Dor Leve,Dor Leve,Dor Leve\n",
    )
    .unwrap();

    let mut store = CsvStore::open(dir.path()).unwrap();
    let patient = PatientId::new("Roberto Santos").unwrap();
    let history = store.observations(&patient).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|o| o.swelling_grade.is_none()));

    // Legacy layout has nowhere to put a swelling grade
    let err = store
        .append_observation(&observation("Roberto Santos", 28, FunctionalTest::MildPain))
        .unwrap_err();
    assert!(matches!(
        err,
        GenuaError::Store(StoreError::MissingColumn {
            column: "swelling_grade",
            ..
        })
    ));

    let mut without_swelling = observation("Roberto Santos", 28, FunctionalTest::MildPain);
    without_swelling.swelling_grade = None;
    store.append_observation(&without_swelling).unwrap();
    assert_eq!(store.observations(&patient).unwrap().len(), 3);
}
