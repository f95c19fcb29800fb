//! # OCR Processing Module
//!
//! This module provides optical character recognition (OCR) for conditioned prescription
//! images using the Tesseract OCR engine.
//!
//! ## Features
//!
//! - A [`TextRecognizer`] seam so the pipeline can run against any engine (or a fake in tests)
//! - [`TesseractRecognizer`], which resolves engine data at construction and fails fast
//! - Pooled Tesseract instances for concurrent recognition
//! - Whitespace normalization of the recognized transcript
//!
//! ## Dependencies
//!
//! - `leptess`: Rust bindings for Tesseract OCR and Leptonica
//! - `image`: Decoding and in-memory PNG encoding

use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;
use tracing::{info, warn};

use crate::errors::error_logging;
use crate::instance_manager::OcrInstancePool;
use crate::observability;
use crate::ocr_config::{resolve_engine_data_dir, OcrConfig};
use crate::preprocessing::{self, ConditionedImage, ConditioningConfig};

pub use crate::ocr_errors::OcrError;

/// Turns a conditioned bitmap into text.
///
/// Implementations must be callable from several threads at once.
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text in `image`, returning the normalized transcript.
    ///
    /// An empty string is a valid result: it means nothing was readable.
    fn recognize(&self, image: &ConditionedImage) -> Result<String, OcrError>;

    /// Engine name for logs and diagnostics.
    fn engine_name(&self) -> &str;
}

/// Tesseract-backed recognizer.
///
/// Runs with page segmentation mode 6 ("assume a single uniform block of text") and the
/// default engine mode, loading models from the directory resolved at construction.
pub struct TesseractRecognizer {
    pool: OcrInstancePool,
    config: OcrConfig,
}

impl std::fmt::Debug for TesseractRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesseractRecognizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TesseractRecognizer {
    /// Resolve the engine location and prepare a recognizer.
    ///
    /// One instance is created eagerly so that a broken installation is reported here,
    /// not on the first image.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use careguide_scan::ocr::{TesseractRecognizer, TextRecognizer};
    /// use careguide_scan::ocr_config::OcrConfig;
    ///
    /// let recognizer = TesseractRecognizer::new(&OcrConfig::from_env())?;
    /// assert_eq!(recognizer.engine_name(), "tesseract");
    /// # Ok::<(), careguide_scan::ocr::OcrError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `OcrError::EngineUnavailable` when no engine data is found for the configured
    /// languages or Tesseract refuses to initialize.
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        config
            .validate()
            .map_err(|e| OcrError::EngineUnavailable(e.to_string()))?;

        let tessdata_dir = resolve_engine_data_dir(config).inspect_err(|e| {
            error_logging::log_config_error(e, crate::ocr_config::ENGINE_PATH_ENV, "resolve_engine");
        })?;

        let pool = OcrInstancePool::new(tessdata_dir, config.clone());
        // Warm the pool and surface initialization failures now.
        drop(pool.checkout()?);

        Ok(Self {
            pool,
            config: config.clone(),
        })
    }

    /// Configuration this recognizer was built with.
    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Directory the engine loads its models from.
    pub fn tessdata_dir(&self) -> &Path {
        self.pool.tessdata_dir()
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &ConditionedImage) -> Result<String, OcrError> {
        let span = observability::ocr_span("recognize");
        let _enter = span.enter();
        let start_time = std::time::Instant::now();

        let result = run_tesseract(&self.pool, image);
        let duration = start_time.elapsed();
        observability::record_ocr_metrics(result.is_ok(), duration);

        match result {
            Ok(text) => {
                info!(
                    width = image.width(),
                    height = image.height(),
                    characters = text.chars().count(),
                    duration_ms = duration.as_millis() as u64,
                    "OCR processing completed"
                );
                Ok(text)
            }
            Err(err) => {
                error_logging::log_ocr_error(
                    &err,
                    "recognize",
                    None,
                    Some((image.width(), image.height())),
                    Some(duration),
                );
                Err(err)
            }
        }
    }

    fn engine_name(&self) -> &str {
        "tesseract"
    }
}

fn run_tesseract(pool: &OcrInstancePool, image: &ConditionedImage) -> Result<String, OcrError> {
    let mut encoded = Vec::new();
    image
        .as_gray()
        .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?;

    let mut tess = pool.checkout()?;

    tess.set_image_from_mem(&encoded).map_err(|e| {
        OcrError::RecognitionFailed(format!("Failed to load image into Tesseract: {}", e))
    })?;

    let raw = tess.get_utf8_text().map_err(|e| {
        OcrError::RecognitionFailed(format!("Failed to extract text from image: {}", e))
    })?;

    Ok(clean_recognized_text(&raw))
}

/// Normalize engine output: trim the whole text, trim each line, drop blank lines.
///
/// Case and punctuation are left alone.
///
/// # Examples
///
/// ```
/// use careguide_scan::ocr::clean_recognized_text;
///
/// let raw = "  \n Amoxicillin 500mg  \n\n   \n Cap x 10 \n";
/// assert_eq!(clean_recognized_text(raw), "Amoxicillin 500mg\nCap x 10");
/// ```
pub fn clean_recognized_text(raw: &str) -> String {
    raw.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Load an image file, condition it and run it through `recognizer`.
///
/// # Errors
///
/// - `OcrError::NotFound` if `path` does not exist
/// - `OcrError::Image` if the file cannot be decoded or conditioned
/// - whatever the recognizer reports for engine failures
pub fn recognize_file(
    recognizer: &dyn TextRecognizer,
    path: &Path,
    conditioning: &ConditioningConfig,
) -> Result<String, OcrError> {
    if !path.exists() {
        warn!(path = %path.display(), "Image file not found");
        return Err(OcrError::NotFound(path.display().to_string()));
    }

    let decoded = preprocessing::load_image(path)?;
    let conditioned = preprocessing::condition_image(&decoded, conditioning)?;
    recognizer.recognize(&conditioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRecognizer {
        calls: AtomicUsize,
    }

    impl TextRecognizer for CountingRecognizer {
        fn recognize(&self, image: &ConditionedImage) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}x{}", image.width(), image.height()))
        }

        fn engine_name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_clean_recognized_text_drops_blank_lines() {
        assert_eq!(clean_recognized_text("\n\n  a  \n\t\n b\n"), "a\nb");
        assert_eq!(clean_recognized_text("   \n \n"), "");
        assert_eq!(clean_recognized_text("Tab. Metformin 500 MG"), "Tab. Metformin 500 MG");
    }

    #[test]
    fn test_recognize_file_missing_is_not_found() {
        let recognizer = CountingRecognizer {
            calls: AtomicUsize::new(0),
        };
        let err = recognize_file(
            &recognizer,
            Path::new("/definitely/not/here.png"),
            &ConditioningConfig::default(),
        )
        .unwrap_err();

        assert!(matches!(err, OcrError::NotFound(ref p) if p.contains("here.png")));
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_recognize_file_undecodable_is_image_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"plain text, not pixels").unwrap();
        let recognizer = CountingRecognizer {
            calls: AtomicUsize::new(0),
        };

        let err = recognize_file(&recognizer, tmp.path(), &ConditioningConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), "image");
    }

    #[test]
    fn test_recognize_file_conditions_before_recognizing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rx.png");
        DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 50, Luma([255])))
            .save(&path)
            .unwrap();
        let recognizer = CountingRecognizer {
            calls: AtomicUsize::new(0),
        };

        let text = recognize_file(&recognizer, &path, &ConditioningConfig::default()).unwrap();
        assert_eq!(text, "800x200");
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tesseract_unavailable_with_bogus_override() {
        let tmp = tempfile::tempdir().unwrap();
        let config = OcrConfig {
            languages: "zzz_missing".to_string(),
            engine_path: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        match TesseractRecognizer::new(&config) {
            Err(OcrError::EngineUnavailable(msg)) => assert!(msg.contains("TESSERACT_PATH")),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("no engine data exists for a made-up language"),
        }
    }
}
