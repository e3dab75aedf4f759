use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::forecast::ForecastConfig;
use crate::insights::InsightConfig;
use crate::logging::LogConfig;
use crate::report::ReportConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// General application settings
    pub settings: AppSettings,

    /// Discharge forecast settings
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Clinical rule thresholds
    #[serde(default)]
    pub insights: InsightConfig,

    /// Report title and section layout
    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Directory holding the check-in, assessment and registry sheets
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            settings: AppSettings::default(),
            forecast: ForecastConfig::default(),
            insights: InsightConfig::default(),
            report: ReportConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            data_dir: dirs::home_dir()
                .map(|home| home.join(".genua").join("data"))
                .unwrap_or_else(|| PathBuf::from("./data")),
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Default configuration file path (`~/.genua/config.toml`)
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".genua")
            .join("config.toml")
    }

    /// Load from the default path, falling back to defaults when absent or unreadable
    pub fn load_or_default() -> Self {
        let path = Self::default_config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid configuration");
                Self::default()
            }
        }
    }

    /// Save to the default path
    pub fn save_default(&mut self) -> Result<()> {
        self.save_to_file(Self::default_config_path())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let target = self.forecast.target_score;
        if !(target > 0.0 && target <= 10.0) {
            anyhow::bail!(
                "forecast.target_score must be within (0, 10], got {}",
                target
            );
        }
        if self.insights.effusion_min_grade > 3 {
            anyhow::bail!(
                "insights.effusion_min_grade must be 0-3, got {}",
                self.insights.effusion_min_grade
            );
        }
        if self.report.template.sections.is_empty() {
            anyhow::bail!("report.template.sections must list at least one section");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use crate::report::ReportSection;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.forecast, deserialized.forecast);
        assert_eq!(config.insights, deserialized.insights);
        assert_eq!(config.report, deserialized.report);
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = AppConfig::default();
        original.settings.data_dir = temp_dir.path().join("data");
        original.insights.static_overload_pain = 6;
        original.report.clinic_name = Some("Clinica Genua".to_string());
        original.logging.level = LogLevel::Debug;

        original.save_to_file(&config_path).unwrap();
        let loaded = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded.settings.data_dir, temp_dir.path().join("data"));
        assert_eq!(loaded.insights.static_overload_pain, 6);
        assert_eq!(loaded.report.clinic_name.as_deref(), Some("Clinica Genua"));
        assert_eq!(loaded.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let toml_str = r#"
            [metadata]
            version = "1.0"
            created_at = "2025-11-24T09:00:00Z"
            updated_at = "2025-11-24T09:00:00Z"

            [settings]
            data_dir = "/tmp/genua"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.forecast.target_score, 9.0);
        assert_eq!(config.insights.central_sensitization_pain, 7);
        assert_eq!(config.report.template.sections[0], ReportSection::Identification);
    }

    #[test]
    fn test_validation_rejects_bad_target() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.forecast.target_score = 12.0;
        config.save_to_file(&path).unwrap();

        let err = AppConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("target_score"));
    }
}
