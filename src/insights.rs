//! Correlation and clinical insight engine
//!
//! Descriptive aggregates over a patient's history (mean pain by sleep
//! quality, mean function by posture, sleep/pain correlation, effusion
//! trend) plus a fixed rule table evaluated on the latest check-in.
//!
//! Rules are independent: several flags can fire for the same check-in.
//! A rule whose input is missing on the latest record (swelling on legacy
//! rows) is skipped, which is different from evaluating to false.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::forecast::fit_trend;
use crate::models::{DerivedObservation, FunctionalTest, Posture, SleepQuality};

/// Rule thresholds. Defaults pending clinical sign-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Pain at or above this with poor sleep raises a central sensitization alert
    pub central_sensitization_pain: u8,

    /// Pain above this while mostly sitting raises a static overload warning
    pub static_overload_pain: u8,

    /// Functional score at or above this (with low pain) opens a progression window
    pub progression_min_score: f64,

    /// Pain at or below this (with high function) opens a progression window
    pub progression_max_pain: u8,

    /// Swelling grade at or above this raises an effusion alert
    pub effusion_min_grade: u8,

    /// Swelling slope (grade per day) beyond which the effusion trend is not stable
    pub effusion_trend_threshold: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        InsightConfig {
            central_sensitization_pain: 7,
            static_overload_pain: 5,
            progression_min_score: 8.0,
            progression_max_pain: 2,
            effusion_min_grade: 2,
            effusion_trend_threshold: 0.02,
        }
    }
}

/// Qualitative flag produced by the rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClinicalFlag {
    CentralSensitizationAlert,
    StaticOverloadWarning,
    EccentricControlDeficit,
    ProgressionWindow,
    EffusionAlert,
}

impl ClinicalFlag {
    /// Evaluation order of the rule table
    pub const RULE_ORDER: [ClinicalFlag; 5] = [
        ClinicalFlag::CentralSensitizationAlert,
        ClinicalFlag::StaticOverloadWarning,
        ClinicalFlag::EccentricControlDeficit,
        ClinicalFlag::ProgressionWindow,
        ClinicalFlag::EffusionAlert,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ClinicalFlag::CentralSensitizationAlert => "Central sensitization alert",
            ClinicalFlag::StaticOverloadWarning => "Static overload warning",
            ClinicalFlag::EccentricControlDeficit => "Eccentric control deficit",
            ClinicalFlag::ProgressionWindow => "Progression window",
            ClinicalFlag::EffusionAlert => "Effusion alert",
        }
    }

    /// Advisory text shown to the practitioner
    pub fn advice(&self) -> &'static str {
        match self {
            ClinicalFlag::CentralSensitizationAlert => {
                "High pain with poor sleep: consider pain education and sleep hygiene before loading"
            }
            ClinicalFlag::StaticOverloadWarning => {
                "Pain rises with prolonged sitting: break up static postures during the day"
            }
            ClinicalFlag::EccentricControlDeficit => {
                "Step-down remains painful or impossible: prioritise eccentric quadriceps control"
            }
            ClinicalFlag::ProgressionWindow => {
                "High function with low pain: load can be progressed"
            }
            ClinicalFlag::EffusionAlert => "Joint effusion grade 2 or more: reduce load",
        }
    }
}

impl fmt::Display for ClinicalFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Direction of a fitted trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "Increasing"),
            TrendDirection::Stable => write!(f, "Stable"),
            TrendDirection::Decreasing => write!(f, "Decreasing"),
        }
    }
}

/// Mean of a metric within one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMean<G> {
    pub group: G,
    pub mean: f64,
    pub count: usize,
}

/// Everything the insight engine derives from one history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSet {
    pub observation_count: usize,

    /// Mean pain per sleep quality, Poor to Good, non-empty groups only
    pub pain_by_sleep: Vec<GroupMean<SleepQuality>>,

    /// Mean functional score per posture, Sitting to Standing, non-empty groups only
    pub function_by_posture: Vec<GroupMean<Posture>>,

    /// Pearson correlation of sleep score with pain
    pub sleep_pain_correlation: Option<f64>,

    /// Direction of swelling grade over time
    pub effusion_trend: Option<TrendDirection>,

    /// Flags fired by the latest check-in, in rule order
    pub flags: Vec<ClinicalFlag>,

    /// Rules not evaluated because the latest check-in lacks their input
    pub skipped_rules: Vec<ClinicalFlag>,
}

impl InsightSet {
    pub fn empty() -> Self {
        InsightSet {
            observation_count: 0,
            pain_by_sleep: Vec::new(),
            function_by_posture: Vec::new(),
            sleep_pain_correlation: None,
            effusion_trend: None,
            flags: Vec::new(),
            skipped_rules: Vec::new(),
        }
    }

    pub fn has_flag(&self, flag: ClinicalFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Insight engine
pub struct InsightEngine {
    config: InsightConfig,
}

impl InsightEngine {
    pub fn new() -> Self {
        InsightEngine {
            config: InsightConfig::default(),
        }
    }

    pub fn with_config(config: InsightConfig) -> Self {
        InsightEngine { config }
    }

    pub fn compute(&self, history: &[DerivedObservation]) -> InsightSet {
        let latest = match history.iter().max_by_key(|d| d.observation.timestamp) {
            Some(latest) => latest,
            None => return InsightSet::empty(),
        };

        let mut flags = Vec::new();
        let mut skipped_rules = Vec::new();
        for rule in ClinicalFlag::RULE_ORDER {
            match self.evaluate_rule(rule, latest) {
                Some(true) => flags.push(rule),
                Some(false) => {}
                None => skipped_rules.push(rule),
            }
        }

        let insights = InsightSet {
            observation_count: history.len(),
            pain_by_sleep: group_means(history, |d| d.observation.sleep_quality, |d| {
                f64::from(d.observation.pain_level)
            }),
            function_by_posture: group_means(history, |d| d.observation.posture, |d| {
                d.functional_score
            }),
            sleep_pain_correlation: sleep_pain_correlation(history),
            effusion_trend: self.effusion_trend(history),
            flags,
            skipped_rules,
        };

        debug!(
            observations = insights.observation_count,
            flags = ?insights.flags,
            skipped = ?insights.skipped_rules,
            "Computed insights"
        );

        insights
    }

    /// `None` when the latest check-in lacks the rule's input
    fn evaluate_rule(&self, rule: ClinicalFlag, latest: &DerivedObservation) -> Option<bool> {
        let obs = &latest.observation;
        let cfg = &self.config;
        match rule {
            ClinicalFlag::CentralSensitizationAlert => Some(
                obs.pain_level >= cfg.central_sensitization_pain
                    && obs.sleep_quality == SleepQuality::Poor,
            ),
            ClinicalFlag::StaticOverloadWarning => Some(
                obs.posture == Posture::Sitting && obs.pain_level > cfg.static_overload_pain,
            ),
            ClinicalFlag::EccentricControlDeficit => Some(matches!(
                obs.step_down_test,
                FunctionalTest::Unable | FunctionalTest::ModeratePain
            )),
            ClinicalFlag::ProgressionWindow => Some(
                latest.functional_score >= cfg.progression_min_score
                    && obs.pain_level <= cfg.progression_max_pain,
            ),
            ClinicalFlag::EffusionAlert => obs
                .swelling_grade
                .map(|grade| grade.value() >= cfg.effusion_min_grade),
        }
    }

    fn effusion_trend(&self, history: &[DerivedObservation]) -> Option<TrendDirection> {
        let points: Vec<(f64, f64)> = history
            .iter()
            .filter_map(|d| {
                d.observation
                    .swelling_grade
                    .map(|grade| (d.elapsed_days, f64::from(grade.value())))
            })
            .collect();

        let trend = fit_trend(&points)?;
        let threshold = self.config.effusion_trend_threshold;
        Some(if trend.slope > threshold {
            TrendDirection::Increasing
        } else if trend.slope < -threshold {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        })
    }
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Insights with the default rule thresholds
pub fn compute_insights(history: &[DerivedObservation]) -> InsightSet {
    InsightEngine::new().compute(history)
}

fn group_means<G, K, V>(history: &[DerivedObservation], key: K, value: V) -> Vec<GroupMean<G>>
where
    G: Ord + Copy,
    K: Fn(&DerivedObservation) -> G,
    V: Fn(&DerivedObservation) -> f64,
{
    let mut groups: BTreeMap<G, Vec<f64>> = BTreeMap::new();
    for d in history {
        groups.entry(key(d)).or_default().push(value(d));
    }

    groups
        .into_iter()
        .map(|(group, values)| GroupMean {
            group,
            count: values.len(),
            mean: values.iter().mean(),
        })
        .collect()
}

fn sleep_pain_correlation(history: &[DerivedObservation]) -> Option<f64> {
    if history.len() < 3 {
        return None;
    }

    let sleep: Vec<f64> = history.iter().map(|d| d.sleep_score).collect();
    let pain: Vec<f64> = history
        .iter()
        .map(|d| f64::from(d.observation.pain_level))
        .collect();

    let mean_sleep = sleep.iter().mean();
    let mean_pain = pain.iter().mean();

    let (mut cov, mut var_sleep, mut var_pain) = (0.0, 0.0, 0.0);
    for (s, p) in sleep.iter().zip(&pain) {
        cov += (s - mean_sleep) * (p - mean_pain);
        var_sleep += (s - mean_sleep).powi(2);
        var_pain += (p - mean_pain).powi(2);
    }

    if var_sleep == 0.0 || var_pain == 0.0 {
        return None;
    }
    Some(cov / (var_sleep * var_pain).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Observation, PatientId, SwellingGrade};
    use crate::scoring::derive_history;
    use chrono::{Duration, NaiveDate};

    struct Entry {
        pain: u8,
        sleep: SleepQuality,
        posture: Posture,
        test: FunctionalTest,
        step_down: FunctionalTest,
        swelling: Option<u8>,
    }

    fn entry(pain: u8, sleep: SleepQuality) -> Entry {
        Entry {
            pain,
            sleep,
            posture: Posture::Standing,
            test: FunctionalTest::MildPain,
            step_down: FunctionalTest::MildPain,
            swelling: Some(0),
        }
    }

    fn history(entries: Vec<Entry>) -> Vec<DerivedObservation> {
        let start = NaiveDate::from_ymd_opt(2025, 11, 24)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let observations: Vec<Observation> = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| Observation {
                patient: PatientId::new("Rule Patient").unwrap(),
                timestamp: start + Duration::days(i as i64 * 2),
                pain_level: e.pain,
                sleep_quality: e.sleep,
                posture: e.posture,
                squat_test: e.test,
                step_up_test: e.test,
                step_down_test: e.step_down,
                swelling_grade: e.swelling.map(|g| SwellingGrade::new(g).unwrap()),
            })
            .collect();
        derive_history(&observations)
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(compute_insights(&[]), InsightSet::empty());
    }

    #[test]
    fn test_central_sensitization_fires_on_high_pain_poor_sleep() {
        let insights = compute_insights(&history(vec![entry(7, SleepQuality::Poor)]));
        assert!(insights.has_flag(ClinicalFlag::CentralSensitizationAlert));
    }

    #[test]
    fn test_central_sensitization_needs_poor_sleep() {
        let insights = compute_insights(&history(vec![entry(7, SleepQuality::Good)]));
        assert!(!insights.has_flag(ClinicalFlag::CentralSensitizationAlert));

        let insights = compute_insights(&history(vec![entry(6, SleepQuality::Poor)]));
        assert!(!insights.has_flag(ClinicalFlag::CentralSensitizationAlert));
    }

    #[test]
    fn test_rules_use_latest_observation_only() {
        let insights = compute_insights(&history(vec![
            entry(9, SleepQuality::Poor),
            entry(3, SleepQuality::Good),
        ]));
        assert!(!insights.has_flag(ClinicalFlag::CentralSensitizationAlert));
    }

    #[test]
    fn test_static_overload_threshold() {
        let mut sitting = entry(6, SleepQuality::Fair);
        sitting.posture = Posture::Sitting;
        assert!(compute_insights(&history(vec![sitting])).has_flag(ClinicalFlag::StaticOverloadWarning));

        let mut sitting = entry(5, SleepQuality::Fair);
        sitting.posture = Posture::Sitting;
        assert!(!compute_insights(&history(vec![sitting])).has_flag(ClinicalFlag::StaticOverloadWarning));
    }

    #[test]
    fn test_static_overload_needs_sitting() {
        for posture in [Posture::Balanced, Posture::Standing] {
            let mut e = entry(9, SleepQuality::Fair);
            e.posture = posture;
            let insights = compute_insights(&history(vec![e]));
            assert!(!insights.has_flag(ClinicalFlag::StaticOverloadWarning));
        }
    }

    #[test]
    fn test_eccentric_deficit_on_moderate_pain_step_down() {
        let mut e = entry(3, SleepQuality::Good);
        e.step_down = FunctionalTest::ModeratePain;
        let insights = compute_insights(&history(vec![e]));
        assert_eq!(insights.flags, vec![ClinicalFlag::EccentricControlDeficit]);

        // Mild pain on the way down is acceptable control
        let insights = compute_insights(&history(vec![entry(3, SleepQuality::Good)]));
        assert!(!insights.has_flag(ClinicalFlag::EccentricControlDeficit));
    }

    #[test]
    fn test_multiple_flags_fire_in_rule_order() {
        let mut e = entry(8, SleepQuality::Poor);
        e.posture = Posture::Sitting;
        e.step_down = FunctionalTest::Unable;
        e.swelling = Some(3);
        let insights = compute_insights(&history(vec![e]));
        assert_eq!(
            insights.flags,
            vec![
                ClinicalFlag::CentralSensitizationAlert,
                ClinicalFlag::StaticOverloadWarning,
                ClinicalFlag::EccentricControlDeficit,
                ClinicalFlag::EffusionAlert,
            ]
        );
    }

    #[test]
    fn test_progression_window() {
        let mut e = entry(2, SleepQuality::Good);
        e.test = FunctionalTest::NoPain;
        e.step_down = FunctionalTest::MildPain; // (10 + 10 + 7) / 3 = 9
        let insights = compute_insights(&history(vec![e]));
        assert_eq!(insights.flags, vec![ClinicalFlag::ProgressionWindow]);
    }

    #[test]
    fn test_missing_swelling_skips_effusion_rule() {
        let mut e = entry(3, SleepQuality::Good);
        e.swelling = None;
        let insights = compute_insights(&history(vec![e]));
        assert!(!insights.has_flag(ClinicalFlag::EffusionAlert));
        assert_eq!(insights.skipped_rules, vec![ClinicalFlag::EffusionAlert]);
    }

    #[test]
    fn test_group_means() {
        let insights = compute_insights(&history(vec![
            entry(8, SleepQuality::Poor),
            entry(6, SleepQuality::Poor),
            entry(2, SleepQuality::Good),
        ]));
        assert_eq!(insights.pain_by_sleep.len(), 2);
        assert_eq!(insights.pain_by_sleep[0].group, SleepQuality::Poor);
        assert_eq!(insights.pain_by_sleep[0].mean, 7.0);
        assert_eq!(insights.pain_by_sleep[0].count, 2);
        assert_eq!(insights.pain_by_sleep[1].group, SleepQuality::Good);
        assert_eq!(insights.pain_by_sleep[1].mean, 2.0);

        assert_eq!(insights.function_by_posture.len(), 1);
        assert_eq!(insights.function_by_posture[0].group, Posture::Standing);
        assert!((insights.function_by_posture[0].mean - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_sleep_pain_correlation_is_negative_when_poor_sleep_hurts() {
        let insights = compute_insights(&history(vec![
            entry(8, SleepQuality::Poor),
            entry(5, SleepQuality::Fair),
            entry(2, SleepQuality::Good),
            entry(9, SleepQuality::Poor),
        ]));
        assert!(insights.sleep_pain_correlation.unwrap() < -0.9);

        let constant = compute_insights(&history(vec![
            entry(4, SleepQuality::Poor),
            entry(4, SleepQuality::Good),
            entry(4, SleepQuality::Fair),
        ]));
        assert_eq!(constant.sleep_pain_correlation, None);
    }

    #[test]
    fn test_effusion_trend() {
        let grades = [0, 1, 2, 3];
        let entries = grades
            .iter()
            .map(|g| {
                let mut e = entry(3, SleepQuality::Fair);
                e.swelling = Some(*g);
                e
            })
            .collect();
        let insights = compute_insights(&history(entries));
        assert_eq!(insights.effusion_trend, Some(TrendDirection::Increasing));

        let mut legacy = entry(3, SleepQuality::Fair);
        legacy.swelling = None;
        let insights = compute_insights(&history(vec![legacy, entry(3, SleepQuality::Fair)]));
        assert_eq!(insights.effusion_trend, None);
    }
}
