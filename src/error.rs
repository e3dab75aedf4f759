//! Unified error hierarchy for genua
//!
//! Hard failures (unknown labels, invalid input, store failures) are errors.
//! Soft conditions such as a forecast with too few points or a missing
//! registry entry are modelled as values elsewhere and never appear here.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all genua operations
#[derive(Debug, Error)]
pub enum GenuaError {
    /// Categorical label not present in a lookup table
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Entry validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Record store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Patient identity lookup errors
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Report rendering errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A categorical value that does not exist in the named table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("unrecognized label '{label}' in table '{table}'")]
    UnknownLabel { table: &'static str, label: String },

    #[error("value {value} has no category in table '{table}'")]
    UnknownValue { table: &'static str, value: String },
}

/// Check-in form and assessment validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required field absent or blank
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// Numeric value outside its allowed range
    #[error("Value out of range for {field}: {value} (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Timestamp could not be parsed with any supported format
    #[error("Unable to parse timestamp: {value}")]
    InvalidTimestamp { value: String },

    /// Patient name is empty after normalization
    #[error("Patient name is empty")]
    EmptyPatientName,
}

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {sheet}: {source}")]
    Csv {
        sheet: &'static str,
        #[source]
        source: csv::Error,
    },

    /// An observation for this (patient, timestamp) already exists
    #[error("Duplicate entry in {sheet}: {key}")]
    Duplicate { sheet: &'static str, key: String },

    /// Read-after-write verification could not find the appended row
    #[error("Write to {sheet} could not be verified for {key}")]
    WriteNotVerified { sheet: &'static str, key: String },

    /// Required column missing from a sheet header
    #[error("Sheet {sheet} has no column for {column}")]
    MissingColumn {
        sheet: &'static str,
        column: &'static str,
    },

    /// Row could not be turned into a record
    #[error("Malformed row {row} in {sheet}: {reason}")]
    MalformedRow {
        sheet: &'static str,
        row: usize,
        reason: String,
    },
}

/// Patient identity errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// No observations exist for the normalized name
    #[error("No check-ins found for patient '{name}'{}", format_suggestions(.suggestions))]
    UnknownPatient {
        name: String,
        suggestions: Vec<String>,
    },
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {})", suggestions.join(", "))
    }
}

/// Report rendering errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Chart rendering failed for {chart}: {reason}")]
    Chart { chart: String, reason: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for genua operations
pub type Result<T> = std::result::Result<T, GenuaError>;

impl GenuaError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GenuaError::Mapping(_) => ErrorSeverity::Error,
            GenuaError::Validation(_) => ErrorSeverity::Error,
            GenuaError::Identity(_) => ErrorSeverity::Warning,
            GenuaError::Store(StoreError::Duplicate { .. }) => ErrorSeverity::Warning,
            GenuaError::Store(StoreError::WriteNotVerified { .. }) => ErrorSeverity::Critical,
            GenuaError::Store(_) => ErrorSeverity::Error,
            GenuaError::Report(_) => ErrorSeverity::Error,
            GenuaError::Configuration(_) => ErrorSeverity::Error,
        }
    }

    /// Get caregiver-facing error message
    pub fn user_message(&self) -> String {
        match self {
            GenuaError::Mapping(MappingError::UnknownLabel { table, label }) => {
                format!("'{}' is not a valid {} option. Please pick one of the listed values.", label, table)
            }
            GenuaError::Validation(ValidationError::MissingField { field }) => {
                format!("Please fill in the {} field.", field)
            }
            GenuaError::Store(StoreError::Duplicate { .. }) => {
                "A check-in for this patient at this time was already recorded.".to_string()
            }
            GenuaError::Store(StoreError::WriteNotVerified { .. }) => {
                "The check-in could not be confirmed as saved. Please verify and retry.".to_string()
            }
            GenuaError::Identity(IdentityError::UnknownPatient { name, suggestions }) => {
                if suggestions.is_empty() {
                    format!("No records found for '{}'.", name)
                } else {
                    format!(
                        "No records found for '{}'. Similar names: {}.",
                        name,
                        suggestions.join(", ")
                    )
                }
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Data may have been lost
    Critical,
    /// Operation aborted
    Error,
    /// Operation aborted, but the input is likely a simple mistake
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
