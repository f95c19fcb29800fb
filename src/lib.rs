//! # CareGuide Prescription Scanner
//!
//! Turns a photographed prescription into a normalized transcript and a
//! sorted, de-duplicated list of medicine names. Images are conditioned for
//! recognition, read with Tesseract, and the transcript is mined with
//! dosage patterns, a medicine lexicon and an optional entity recognizer.

pub mod config;
pub mod entity_recognition;
pub mod errors;
pub mod instance_manager;
pub mod medicine_extraction;
pub mod medicine_lexicon;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod preprocessing;

// Re-export types for easier access
pub use medicine_extraction::{ExtractionBreakdown, MedicineExtractor};
pub use medicine_lexicon::MedicineLexicon;
pub use ocr::{TesseractRecognizer, TextRecognizer};
pub use pipeline::{PrescriptionScanner, ScanOutcome, ScanReport};
pub use preprocessing::{condition_image, ConditionedImage, ConditioningConfig};
