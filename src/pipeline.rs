//! # Prescription Scanning Pipeline
//!
//! Chains conditioning, recognition and extraction into one call.

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;
use tracing::info;

use crate::medicine_extraction::MedicineExtractor;
use crate::ocr::{OcrError, TextRecognizer};
use crate::preprocessing::{self, ConditioningConfig};

/// What a readable prescription yielded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Normalized transcript
    pub extracted_text: String,
    /// Sorted, de-duplicated medicine names
    pub medicines_detected: Vec<String>,
}

/// Result of a successful scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Readable(ScanReport),
    /// The engine ran but found no text
    NothingReadable,
}

impl ScanOutcome {
    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            ScanOutcome::Readable(report) => Some(report),
            ScanOutcome::NothingReadable => None,
        }
    }
}

/// Runs the whole scan for one image at a time; share it between threads with `Arc`.
#[derive(Clone)]
pub struct PrescriptionScanner {
    conditioning: ConditioningConfig,
    recognizer: Arc<dyn TextRecognizer>,
    extractor: Arc<MedicineExtractor>,
}

impl PrescriptionScanner {
    pub fn new(
        conditioning: ConditioningConfig,
        recognizer: Arc<dyn TextRecognizer>,
        extractor: Arc<MedicineExtractor>,
    ) -> Self {
        Self {
            conditioning,
            recognizer,
            extractor,
        }
    }

    /// Condition, recognize and extract from an already-decoded image.
    ///
    /// # Errors
    ///
    /// Conditioning failures surface as `OcrError::Image`; recognizer errors pass through.
    pub fn scan_image(&self, image: &DynamicImage) -> Result<ScanOutcome, OcrError> {
        let conditioned = preprocessing::condition_image(image, &self.conditioning)?;
        let text = self.recognizer.recognize(&conditioned)?;
        Ok(self.extract(text))
    }

    /// Load an image file and scan it.
    ///
    /// # Errors
    ///
    /// - `OcrError::NotFound` if `path` does not exist
    /// - `OcrError::Image` if it cannot be decoded or conditioned
    pub fn scan_file(&self, path: &Path) -> Result<ScanOutcome, OcrError> {
        let text = crate::ocr::recognize_file(self.recognizer.as_ref(), path, &self.conditioning)?;
        info!(
            path = %path.display(),
            engine = self.recognizer.engine_name(),
            characters = text.chars().count(),
            "Prescription recognized"
        );
        Ok(self.extract(text))
    }

    fn extract(&self, text: String) -> ScanOutcome {
        if text.trim().is_empty() {
            return ScanOutcome::NothingReadable;
        }

        let medicines_detected = self.extractor.extract(&text);
        ScanOutcome::Readable(ScanReport {
            extracted_text: text,
            medicines_detected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::ConditionedImage;
    use image::{GrayImage, Luma};

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn recognize(&self, image: &ConditionedImage) -> Result<String, OcrError> {
            assert!(image.width() >= 800);
            Ok(self.0.to_string())
        }

        fn engine_name(&self) -> &str {
            "fixed"
        }
    }

    fn scanner(text: &'static str) -> PrescriptionScanner {
        PrescriptionScanner::new(
            ConditioningConfig::default(),
            Arc::new(FixedText(text)),
            Arc::new(MedicineExtractor::with_builtin_lexicon()),
        )
    }

    fn blank() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(120, 60, Luma([255])))
    }

    #[test]
    fn test_scan_image_reports_medicines() {
        let outcome = scanner("Rx\nParacetamol 500mg twice daily").scan_image(&blank()).unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.extracted_text, "Rx\nParacetamol 500mg twice daily");
        assert_eq!(report.medicines_detected, vec!["paracetamol".to_string()]);
    }

    #[test]
    fn test_blank_text_is_nothing_readable() {
        assert_eq!(
            scanner("  \n ").scan_image(&blank()).unwrap(),
            ScanOutcome::NothingReadable
        );
    }

    #[test]
    fn test_scan_report_json_shape() {
        let report = ScanReport {
            extracted_text: "Aspirin 75mg".to_string(),
            medicines_detected: vec!["aspirin".to_string()],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "extracted_text": "Aspirin 75mg",
                "medicines_detected": ["aspirin"]
            })
        );
    }

    #[test]
    fn test_scan_file_missing() {
        let err = scanner("x").scan_file(Path::new("/missing/rx.jpg")).unwrap_err();
        assert!(matches!(err, OcrError::NotFound(_)));
    }
}
