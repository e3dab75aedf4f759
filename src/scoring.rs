//! Functional score calculation
//!
//! Combines the squat, step-up and step-down test results of one check-in
//! into a composite 0-10 functional score, and derives the per-observation
//! metrics used by the forecaster and the insight engine.

use tracing::debug;

use crate::error::MappingError;
use crate::mapping::{functional_value, sleep_value};
use crate::models::{DerivedObservation, FunctionalTest, Observation};

/// Lower bound of the functional scale
pub const FUNCTIONAL_SCORE_MIN: f64 = 0.0;

/// Upper bound of the functional scale
pub const FUNCTIONAL_SCORE_MAX: f64 = 10.0;

/// Mean of the three mapped functional tests. Not rounded.
pub fn compute_functional_score(
    squat: FunctionalTest,
    step_up: FunctionalTest,
    step_down: FunctionalTest,
) -> f64 {
    (functional_value(squat) + functional_value(step_up) + functional_value(step_down)) / 3.0
}

/// Same as [`compute_functional_score`] for raw labels
pub fn functional_score_from_labels(
    squat: &str,
    step_up: &str,
    step_down: &str,
) -> Result<f64, MappingError> {
    Ok(compute_functional_score(
        squat.parse()?,
        step_up.parse()?,
        step_down.parse()?,
    ))
}

/// Functional score of a single observation
pub fn observation_functional_score(observation: &Observation) -> f64 {
    compute_functional_score(
        observation.squat_test,
        observation.step_up_test,
        observation.step_down_test,
    )
}

/// Derive metrics for a patient's full history.
///
/// Observations are ordered by timestamp; `elapsed_days` counts calendar days
/// from the earliest one.
pub fn derive_history(history: &[Observation]) -> Vec<DerivedObservation> {
    let mut ordered: Vec<&Observation> = history.iter().collect();
    ordered.sort_by_key(|o| o.timestamp);

    let first_date = match ordered.first() {
        Some(first) => first.timestamp.date(),
        None => return Vec::new(),
    };

    let derived: Vec<DerivedObservation> = ordered
        .into_iter()
        .map(|observation| DerivedObservation {
            functional_score: observation_functional_score(observation),
            sleep_score: sleep_value(observation.sleep_quality),
            elapsed_days: (observation.timestamp.date() - first_date).num_days() as f64,
            observation: observation.clone(),
        })
        .collect();

    debug!(
        observations = derived.len(),
        first_date = %first_date,
        "Derived functional score series"
    );

    derived
}

/// (elapsed_days, functional_score) pairs for the trend forecaster
pub fn functional_series(history: &[DerivedObservation]) -> Vec<(f64, f64)> {
    history
        .iter()
        .map(|d| (d.elapsed_days, d.functional_score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientId, Posture, SleepQuality};
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::*;
    use FunctionalTest::*;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn observation(timestamp: NaiveDateTime, test: FunctionalTest) -> Observation {
        Observation {
            patient: PatientId::new("Test Patient").unwrap(),
            timestamp,
            pain_level: 4,
            sleep_quality: SleepQuality::Fair,
            posture: Posture::Balanced,
            squat_test: test,
            step_up_test: test,
            step_down_test: test,
            swelling_grade: None,
        }
    }

    #[test]
    fn test_score_extremes() {
        assert_eq!(compute_functional_score(NoPain, NoPain, NoPain), 10.0);
        assert_eq!(compute_functional_score(Unable, Unable, Unable), 0.0);
    }

    #[test]
    fn test_score_is_unrounded_mean() {
        let score = compute_functional_score(Unable, ModeratePain, MildPain);
        assert!((score - 11.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_from_labels() {
        assert_eq!(
            functional_score_from_labels("No Pain", "Sem Dor", "nopain").unwrap(),
            10.0
        );
        assert!(functional_score_from_labels("No Pain", "Wobbly", "No Pain").is_err());
    }

    #[test]
    fn test_derive_history_orders_and_counts_days() {
        let history = vec![
            observation(at(11), NoPain),
            observation(at(1), Unable),
            observation(at(6), MildPain),
        ];
        let derived = derive_history(&history);

        let days: Vec<f64> = derived.iter().map(|d| d.elapsed_days).collect();
        assert_eq!(days, vec![0.0, 5.0, 10.0]);
        assert_eq!(derived[0].functional_score, 0.0);
        assert_eq!(derived[2].functional_score, 10.0);
        assert_eq!(derived[1].sleep_score, 5.0);
    }

    #[test]
    fn test_derive_empty_history() {
        assert!(derive_history(&[]).is_empty());
    }

    fn any_test() -> impl Strategy<Value = FunctionalTest> {
        prop::sample::select(FunctionalTest::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn test_score_in_range(a in any_test(), b in any_test(), c in any_test()) {
            let score = compute_functional_score(a, b, c);
            prop_assert!((FUNCTIONAL_SCORE_MIN..=FUNCTIONAL_SCORE_MAX).contains(&score));
        }

        #[test]
        fn test_score_is_symmetric(a in any_test(), b in any_test(), c in any_test()) {
            let score = compute_functional_score(a, b, c);
            for permuted in [
                compute_functional_score(a, c, b),
                compute_functional_score(b, a, c),
                compute_functional_score(b, c, a),
                compute_functional_score(c, a, b),
                compute_functional_score(c, b, a),
            ] {
                prop_assert!((score - permuted).abs() < 1e-12);
            }
        }
    }
}
