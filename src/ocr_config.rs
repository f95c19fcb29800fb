//! # OCR Configuration Module
//!
//! This module defines configuration structures for text recognition and the rules
//! for locating the Tesseract engine data on disk.

use std::env;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};
use crate::ocr_errors::OcrError;

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng";
pub const DEFAULT_MAX_IDLE_INSTANCES: usize = 4;

/// Environment variable that overrides the engine location. Consulted before any default.
pub const ENGINE_PATH_ENV: &str = "TESSERACT_PATH";
/// Environment variable holding the recognition languages (e.g. "eng" or "eng+hin").
pub const LANGUAGES_ENV: &str = "OCR_LANGUAGES";

/// Default installation location probed right after the override.
#[cfg(windows)]
pub const DEFAULT_ENGINE_PATH: &str = r"C:\Program Files\Tesseract-OCR";
#[cfg(not(windows))]
pub const DEFAULT_ENGINE_PATH: &str = "/usr/share/tesseract-ocr/5/tessdata";

/// Alternate installation locations, probed in order after the default.
#[cfg(windows)]
const ALTERNATE_ENGINE_PATHS: &[&str] = &[
    r"C:\Program Files (x86)\Tesseract-OCR",
    r"C:\Program Files\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const ALTERNATE_ENGINE_PATHS: &[&str] = &[
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of text
    #[default]
    SingleBlock = 6,
    /// Treat the image as a single text line
    SingleLine = 7,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SparseText => "11",
        }
    }
}

/// Tesseract model type for different accuracy/speed trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ModelType {
    /// Fast model (tessdata_fast) - faster processing, lower accuracy
    Fast,
    /// Best model (tessdata_best) - slower processing, higher accuracy
    #[default]
    Best,
}

impl ModelType {
    /// Get the tessdata directory name for this model type
    pub fn tessdata_dir(&self) -> &'static str {
        match self {
            ModelType::Fast => "tessdata_fast",
            ModelType::Best => "tessdata_best",
        }
    }
}

/// Configuration structure for OCR processing
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// OCR language codes joined with '+' (e.g., "eng", "eng+hin")
    pub languages: String,
    /// Model set preferred inside each engine location
    pub model_type: ModelType,
    /// Page segmentation mode; single uniform block suits prescriptions
    pub psm_mode: PageSegMode,
    /// Explicit engine location, takes precedence over every default
    pub engine_path: Option<PathBuf>,
    /// Upper bound of idle Tesseract handles kept for reuse
    pub max_idle_instances: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            model_type: ModelType::default(),
            psm_mode: PageSegMode::default(),
            engine_path: None,
            max_idle_instances: DEFAULT_MAX_IDLE_INSTANCES,
        }
    }
}

impl OcrConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            languages: env::var(LANGUAGES_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LANGUAGES.to_string()),
            engine_path: env::var_os(ENGINE_PATH_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            ..Default::default()
        }
    }

    /// The individual language codes, e.g. ["eng", "hin"] for "eng+hin".
    pub fn language_codes(&self) -> impl Iterator<Item = &str> {
        self.languages
            .split('+')
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        // Validate languages string
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }

        if let Some(code) = self.language_codes().find(|code| {
            !code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        }) {
            return Err(AppError::Config(format!(
                "invalid language code '{}' in '{}'",
                code, self.languages
            )));
        }

        if self.max_idle_instances == 0 {
            return Err(AppError::Config(
                "max_idle_instances must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Ordered list of locations probed for engine data.
///
/// The explicit override comes first, then the default installation path, then the
/// generic alternates. Duplicates are removed, keeping the first occurrence. The model
/// set is chosen inside each location, see [`resolve_engine_data_dir`].
///
/// # Examples
///
/// ```
/// use careguide_scan::ocr_config::{engine_search_order, OcrConfig};
/// use std::path::PathBuf;
///
/// let config = OcrConfig {
///     engine_path: Some(PathBuf::from("/opt/tesseract")),
///     ..Default::default()
/// };
/// assert_eq!(engine_search_order(&config)[0], PathBuf::from("/opt/tesseract"));
/// ```
pub fn engine_search_order(config: &OcrConfig) -> Vec<PathBuf> {
    let mut order: Vec<PathBuf> = Vec::new();

    if let Some(path) = &config.engine_path {
        order.push(path.clone());
    }

    order.push(PathBuf::from(DEFAULT_ENGINE_PATH));
    order.extend(ALTERNATE_ENGINE_PATHS.iter().map(PathBuf::from));

    let mut seen = std::collections::HashSet::new();
    order.retain(|path| seen.insert(path.clone()));
    order
}

/// Finds the first candidate in [`engine_search_order`] that holds data for every language.
///
/// A candidate may name the tessdata directory itself, an installation directory with a
/// `tessdata/` child, or the engine executable inside such an installation directory.
/// Within a candidate the configured model set (`tessdata_best/` or `tessdata_fast/`,
/// as a child or as a sibling of a tessdata directory) wins over the stock data.
///
/// # Errors
///
/// Returns `OcrError::EngineUnavailable` naming Tesseract, the probed locations and the
/// remediation when no candidate qualifies.
pub fn resolve_engine_data_dir(config: &OcrConfig) -> Result<PathBuf, OcrError> {
    let candidates = engine_search_order(config);
    let languages: Vec<&str> = config.language_codes().collect();

    for candidate in &candidates {
        if let Some(dir) = tessdata_dir_for(candidate, config.model_type, &languages) {
            tracing::info!(
                tessdata = %dir.display(),
                languages = %config.languages,
                "Resolved Tesseract engine data directory"
            );
            return Ok(dir);
        }
        tracing::debug!(candidate = %candidate.display(), "No usable engine data at candidate");
    }

    let probed: Vec<String> = candidates
        .iter()
        .map(|path| path.display().to_string())
        .collect();

    Err(OcrError::EngineUnavailable(format!(
        "Tesseract data for '{}' not found (searched: {}). Install Tesseract OCR or set {} to its installation or tessdata directory",
        config.languages,
        probed.join(", "),
        ENGINE_PATH_ENV
    )))
}

fn tessdata_dir_for(candidate: &Path, model: ModelType, languages: &[&str]) -> Option<PathBuf> {
    let base = if candidate.is_file() {
        candidate.parent()?.to_path_buf()
    } else {
        candidate.to_path_buf()
    };

    let mut dirs = vec![base.join(model.tessdata_dir())];
    let names_tessdata = base
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with("tessdata"));
    if names_tessdata {
        if let Some(parent) = base.parent() {
            dirs.push(parent.join(model.tessdata_dir()));
        }
    }
    dirs.push(base.clone());
    dirs.push(base.join("tessdata"));

    dirs.into_iter().find(|dir| has_language_data(dir, languages))
}

fn has_language_data(dir: &Path, languages: &[&str]) -> bool {
    !languages.is_empty()
        && languages
            .iter()
            .all(|lang| dir.join(format!("{}.traineddata", lang)).is_file())
}
