// Library interface for genua modules
// The CLI binary and the integration tests both build on this crate

pub mod config;
pub mod dashboard;
pub mod demo;
pub mod error;
pub mod forecast;
pub mod insights;
pub mod logging;
pub mod mapping;
pub mod models;
pub mod report;
pub mod scoring;
pub mod store;

// Re-export commonly used types for convenience
pub use models::*;
pub use config::AppConfig;
pub use dashboard::PatientDashboard;
pub use error::{GenuaError, Result};
pub use forecast::{forecast_discharge, ForecastConfig, ProjectionResult, TrendForecaster, TrendLine};
pub use insights::{compute_insights, ClinicalFlag, InsightConfig, InsightEngine, InsightSet};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use report::{assemble_report, Document, ReportAssembler, ReportTemplate};
pub use scoring::{compute_functional_score, derive_history};
pub use store::{CsvStore, MemoryStore, RecordStore, Sheet};
