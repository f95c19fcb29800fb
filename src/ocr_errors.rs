//! # OCR Error Types Module
//!
//! This module defines the error taxonomy of the conditioning and recognition stages.
//! Every hard failure of a scan originates here and propagates unchanged to the caller.

use crate::preprocessing::PreprocessingError;

/// Custom error types for OCR operations
#[derive(Debug, Clone, PartialEq)]
pub enum OcrError {
    /// Malformed or unprocessable bitmap
    Image(String),
    /// Source image missing at recognition time
    NotFound(String),
    /// OCR engine not installed or not resolvable
    EngineUnavailable(String),
    /// Engine ran but failed
    RecognitionFailed(String),
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Image(msg) => write!(f, "[IMAGE] Image could not be processed: {}", msg),
            OcrError::NotFound(path) => write!(f, "[NOT_FOUND] Image file not found: {}", path),
            OcrError::EngineUnavailable(msg) => {
                write!(f, "[ENGINE_UNAVAILABLE] OCR engine is not available: {}", msg)
            }
            OcrError::RecognitionFailed(msg) => {
                write!(f, "[OCR_FAILED] Text extraction from image failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for OcrError {}

impl From<PreprocessingError> for OcrError {
    fn from(err: PreprocessingError) -> Self {
        OcrError::Image(err.to_string())
    }
}

impl From<image::ImageError> for OcrError {
    fn from(err: image::ImageError) -> Self {
        OcrError::Image(err.to_string())
    }
}

impl OcrError {
    /// Short machine-readable label, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            OcrError::Image(_) => "image",
            OcrError::NotFound(_) => "not_found",
            OcrError::EngineUnavailable(_) => "engine_unavailable",
            OcrError::RecognitionFailed(_) => "recognition_failed",
        }
    }
}
