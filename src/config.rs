//! # Unified Application Configuration
//!
//! This module consolidates every configuration section into a single object.
//! It supports loading from environment variables and validation, and is what the
//! command-line tool builds its scanner from.

use crate::errors::{AppError, AppResult};
use crate::medicine_extraction::ExtractionConfig;
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::OcrConfig;
use crate::preprocessing::ConditioningConfig;
use std::env;

/// Settings for running scans from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Per-image deadline in seconds; `None` waits indefinitely
    pub scan_timeout_secs: Option<u64>,
    /// Images processed at the same time
    pub max_concurrent_scans: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scan_timeout_secs: None,
            max_concurrent_scans: 4,
        }
    }
}

impl RuntimeConfig {
    /// Validate runtime configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.scan_timeout_secs == Some(0) {
            return Err(AppError::Config("Scan timeout cannot be 0".to_string()));
        }

        if self.scan_timeout_secs.is_some_and(|secs| secs > 3600) {
            return Err(AppError::Config(
                "Scan timeout cannot be greater than 3600 seconds".to_string(),
            ));
        }

        if self.max_concurrent_scans == 0 {
            return Err(AppError::Config(
                "Max concurrent scans cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// OCR engine configuration
    pub ocr: OcrConfig,
    /// Image conditioning tunables
    pub conditioning: ConditioningConfig,
    /// Medicine extraction reference data locations
    pub extraction: ExtractionConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
    /// Command-line runtime settings
    pub runtime: RuntimeConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self {
            ocr: OcrConfig::from_env(),
            extraction: ExtractionConfig::from_env(),
            observability: ObservabilityConfig::from_env(),
            // Conditioning tunables are calibrated, not configured
            ..Default::default()
        };

        config.runtime.scan_timeout_secs = match env::var("SCAN_TIMEOUT_SECS") {
            Ok(value) => Some(value.trim().parse().map_err(|_| {
                AppError::Config("SCAN_TIMEOUT_SECS must be a valid number".to_string())
            })?),
            Err(_) => None,
        };
        config.runtime.max_concurrent_scans = env::var("MAX_CONCURRENT_SCANS")
            .unwrap_or_else(|_| "4".to_string())
            .trim()
            .parse()
            .map_err(|_| {
                AppError::Config("MAX_CONCURRENT_SCANS must be a valid number".to_string())
            })?;

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.ocr.validate()?;
        self.conditioning.validate()?;
        self.extraction.validate()?;
        self.observability.validate()?;
        self.runtime.validate()?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: ocr_languages={}, engine_override={}, lexicon={}, ner_model={}, timeout_secs={:?}, max_concurrent_scans={}",
            self.ocr.languages,
            self.ocr
                .engine_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.extraction
                .lexicon_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default".to_string()),
            self.extraction
                .ner_model_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "disabled".to_string()),
            self.runtime.scan_timeout_secs,
            self.runtime.max_concurrent_scans
        )
    }
}
