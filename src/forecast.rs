//! Discharge forecasting
//!
//! Fits an ordinary least-squares line through (elapsed days, functional
//! score) pairs and projects the day on which the line reaches the discharge
//! threshold. Every historical point weighs equally; there is no windowing
//! and no outlier rejection.
//!
//! Sparse or noisy histories over-extrapolate. The fitted [`TrendLine`]
//! therefore carries the coefficient of determination and the sample size,
//! and callers are expected to show a caveat when
//! [`TrendLine::is_low_confidence`] holds.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Forecast configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Functional score regarded as ready for discharge (default: 9.0, 90% of the scale)
    pub target_score: f64,

    /// Sample size below which a projection is flagged as low confidence
    pub min_reliable_points: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            target_score: 9.0,
            min_reliable_points: 4,
        }
    }
}

/// Fitted line `score = slope * day + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    /// Functional score change per day
    pub slope: f64,

    /// Fitted score on day 0
    pub intercept: f64,

    /// Coefficient of determination (0-1)
    pub r_squared: f64,

    /// Number of points used in the fit
    pub sample_size: usize,
}

impl TrendLine {
    /// Fitted score at `day`
    pub fn predict(&self, day: f64) -> f64 {
        self.slope * day + self.intercept
    }

    pub fn is_low_confidence(&self, min_points: usize) -> bool {
        self.sample_size < min_points
    }
}

/// Outcome of a discharge forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProjectionResult {
    /// Fewer than two distinct days of data; normal for new patients
    Insufficient { points: usize, distinct_days: usize },

    /// No positive trend, so no date can be projected
    Plateau { trend: TrendLine },

    /// Trend line crosses the target on `date`
    Projected {
        date: NaiveDate,
        target_day: f64,
        trend: TrendLine,
    },
}

impl ProjectionResult {
    pub fn trend(&self) -> Option<&TrendLine> {
        match self {
            ProjectionResult::Insufficient { .. } => None,
            ProjectionResult::Plateau { trend } | ProjectionResult::Projected { trend, .. } => {
                Some(trend)
            }
        }
    }

    pub fn projected_date(&self) -> Option<NaiveDate> {
        match self {
            ProjectionResult::Projected { date, .. } => Some(*date),
            _ => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, ProjectionResult::Insufficient { .. })
    }

    /// Short status text for tables and logs
    pub fn summary(&self) -> String {
        match self {
            ProjectionResult::Insufficient { points, .. } => {
                format!("Insufficient data ({} check-in(s))", points)
            }
            ProjectionResult::Plateau { trend } => {
                format!("Plateau (slope {:+.3}/day)", trend.slope)
            }
            ProjectionResult::Projected { date, trend, .. } => {
                format!("Projected {} (slope {:+.3}/day)", date.format("%Y-%m-%d"), trend.slope)
            }
        }
    }
}

fn distinct_days(points: &[(f64, f64)]) -> usize {
    let mut days: Vec<f64> = points.iter().map(|(day, _)| *day).collect();
    days.sort_by(|a, b| a.total_cmp(b));
    days.dedup();
    days.len()
}

/// Least-squares fit; `None` unless there are at least two distinct days
pub fn fit_trend(points: &[(f64, f64)]) -> Option<TrendLine> {
    if distinct_days(points) < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    // A flat series is fitted exactly by a flat line
    let r_squared = if syy == 0.0 { 1.0 } else { (sxy * sxy) / (sxx * syy) };

    Some(TrendLine {
        slope,
        intercept,
        r_squared,
        sample_size: points.len(),
    })
}

/// Discharge forecaster
pub struct TrendForecaster {
    config: ForecastConfig,
}

impl TrendForecaster {
    /// Create new forecaster with default configuration
    pub fn new() -> Self {
        TrendForecaster {
            config: ForecastConfig::default(),
        }
    }

    /// Create new forecaster with custom configuration
    pub fn with_config(config: ForecastConfig) -> Self {
        TrendForecaster { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Project the discharge date.
    ///
    /// `points` are (elapsed days, functional score) pairs and `first_date` is
    /// the date of day 0. The projected day is rounded to the nearest whole day.
    pub fn forecast(&self, points: &[(f64, f64)], first_date: NaiveDate) -> ProjectionResult {
        let trend = match fit_trend(points) {
            Some(trend) => trend,
            None => {
                return ProjectionResult::Insufficient {
                    points: points.len(),
                    distinct_days: distinct_days(points),
                }
            }
        };

        if trend.slope <= 0.0 {
            debug!(slope = trend.slope, "No positive functional trend");
            return ProjectionResult::Plateau { trend };
        }

        let target_day = (self.config.target_score - trend.intercept) / trend.slope;
        let date = Duration::try_days(target_day.round() as i64)
            .and_then(|offset| first_date.checked_add_signed(offset));

        match date {
            Some(date) => {
                debug!(
                    slope = trend.slope,
                    intercept = trend.intercept,
                    target_day,
                    r_squared = trend.r_squared,
                    "Projected discharge date"
                );
                ProjectionResult::Projected {
                    date,
                    target_day,
                    trend,
                }
            }
            // Slope so small that the crossing lies outside the calendar
            None => ProjectionResult::Plateau { trend },
        }
    }
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Forecast with the default 9.0 target
pub fn forecast_discharge(points: &[(f64, f64)], first_date: NaiveDate) -> ProjectionResult {
    TrendForecaster::new().forecast(points, first_date)
}
