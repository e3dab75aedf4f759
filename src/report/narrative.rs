use crate::forecast::{ForecastConfig, ProjectionResult};
use crate::insights::{InsightSet, TrendDirection};
use crate::models::DerivedObservation;

/// Plain-language clinical summary used when the practitioner supplies none
pub fn generate_summary(
    history: &[DerivedObservation],
    insights: &InsightSet,
    projection: &ProjectionResult,
    config: &ForecastConfig,
) -> String {
    let (first, last) = match (history.first(), history.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return "No check-ins recorded yet.".to_string(),
    };

    let mut sentences = Vec::new();

    if history.len() == 1 {
        sentences.push(format!(
            "Single check-in recorded: pain {}/10, functional score {:.1}/10.",
            last.observation.pain_level, last.functional_score
        ));
    } else {
        sentences.push(format!(
            "Over {} check-ins spanning {:.0} days, pain went from {}/10 to {}/10 and the \
             functional score from {:.1} to {:.1}.",
            history.len(),
            last.elapsed_days,
            first.observation.pain_level,
            last.observation.pain_level,
            first.functional_score,
            last.functional_score
        ));
    }

    match projection {
        ProjectionResult::Projected { date, .. } => sentences.push(format!(
            "At the current rate the functional score reaches {:.1} around {}.",
            config.target_score,
            date.format("%Y-%m-%d")
        )),
        ProjectionResult::Plateau { .. } => {
            sentences.push("Functional recovery has plateaued; review the plan.".to_string())
        }
        ProjectionResult::Insufficient { .. } => {}
    }

    if let Some(r) = insights.sleep_pain_correlation {
        if r <= -0.5 {
            sentences.push(format!(
                "Pain is strongly linked to poor sleep (r = {:.2}).",
                r
            ));
        }
    }

    match insights.effusion_trend {
        Some(TrendDirection::Increasing) => {
            sentences.push("Swelling is increasing.".to_string())
        }
        Some(TrendDirection::Decreasing) => {
            sentences.push("Swelling is decreasing.".to_string())
        }
        _ => {}
    }

    if !insights.flags.is_empty() {
        let titles: Vec<String> = insights
            .flags
            .iter()
            .map(|f| f.title().to_lowercase())
            .collect();
        sentences.push(format!("Active flags: {}.", titles.join(", ")));
    }

    sentences.join(" ")
}
