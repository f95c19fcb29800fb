//! # Medicine Lexicon Module
//!
//! Reference data used by the extraction engine: known medicine names, name suffixes
//! typical of drug nomenclature, and words that must never be reported as medicines.
//!
//! The built-in lists cover common generic drugs. A JSON file with the same shape can
//! replace them:
//!
//! ```json
//! {
//!   "dictionary": ["aspirin", "metformin"],
//!   "suffixes": ["cillin", "pril"],
//!   "exclusions": ["daily", "clinic"]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{error_logging, AppError, AppResult};

/// Environment variable pointing at a lexicon JSON file.
pub const LEXICON_PATH_ENV: &str = "MEDICINE_LEXICON_PATH";

/// Searched in order when no explicit lexicon file is configured.
const DEFAULT_LEXICON_PATHS: [&str; 2] = [
    "config/medicine_lexicon.json",      // Local development path
    "/app/config/medicine_lexicon.json", // Docker path
];

const BUILTIN_DICTIONARY: &[&str] = &[
    "aspirin",
    "paracetamol",
    "ibuprofen",
    "naproxen",
    "acetaminophen",
    "amoxicillin",
    "penicillin",
    "cephalexin",
    "flucloxacillin",
    "metformin",
    "insulin",
    "glibenclamide",
    "pioglitazone",
    "lisinopril",
    "enalapril",
    "ramipril",
    "losartan",
    "amlodipine",
    "atorvastatin",
    "simvastatin",
    "lovastatin",
    "omeprazole",
    "pantoprazole",
    "ranitidine",
    "famotidine",
    "salbutamol",
    "terbutaline",
    "beclomethasone",
    "fluticasone",
    "fluoxetine",
    "sertraline",
    "paroxetine",
    "citalopram",
    "cetirizine",
    "loratadine",
    "fexofenadine",
    "amitriptyline",
    "nortriptyline",
    "doxycycline",
    "tetracycline",
    "ciprofloxacin",
    "levofloxacin",
    "ofloxacin",
    "methotrexate",
    "hydroxychloroquine",
    "sulfasalazine",
    "theophylline",
    "caffeine",
    "codeine",
    "morphine",
    "diclofenac",
    "mefenamic",
    "indomethacin",
    "vitamin",
    "folic",
    "calcium",
    "magnesium",
    "potassium",
    "zinc",
    "glycerin",
    "sorbitol",
    "lactose",
    "sucrose",
];

const BUILTIN_SUFFIXES: &[&str] = &[
    "ine", "ol", "ate", "ide", "ium", "um", "in", "on", "an", "yl", "oxazole", "azole", "mycin",
    "cillin", "pril", "sartan", "vir", "stat",
];

const BUILTIN_EXCLUSIONS: &[&str] = &[
    "time",
    "date",
    "day",
    "morning",
    "evening",
    "night",
    "meal",
    "food",
    "clinic",
    "hospital",
    "doctor",
    "patient",
    "name",
    "age",
    "mob",
    "mobile",
    "address",
    "phone",
    "consultant",
    "physician",
    "md",
    "dr",
    "ms",
    "mr",
    "timing",
    "delivery",
    "home",
    "free",
    "daily",
    "temp",
    "temperature",
    "ram",
    "sai",
    "shree",
    "sri",
    "care",
    "health",
    "medical",
    "diagnosis",
    "treatment",
    "prescription",
    "instructions",
    "note",
    "notes",
];

/// Static reference data for medicine extraction.
///
/// Read-only once built; share it behind an `Arc` between threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineLexicon {
    /// Known medicine names, lowercase
    pub dictionary: HashSet<String>,
    /// Substrings typical of drug names, checked against entity spans
    pub suffixes: Vec<String>,
    /// Words never reported, even when another list contains them
    pub exclusions: HashSet<String>,
}

impl Default for MedicineLexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MedicineLexicon {
    /// The built-in lexicon.
    ///
    /// # Examples
    ///
    /// ```
    /// use careguide_scan::medicine_lexicon::MedicineLexicon;
    ///
    /// let lexicon = MedicineLexicon::builtin();
    /// assert!(lexicon.is_known_medicine("metformin"));
    /// assert!(lexicon.is_excluded("daily"));
    /// ```
    pub fn builtin() -> Self {
        Self {
            dictionary: BUILTIN_DICTIONARY.iter().map(|s| s.to_string()).collect(),
            suffixes: BUILTIN_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            exclusions: BUILTIN_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_known_medicine(&self, word: &str) -> bool {
        self.dictionary.contains(word)
    }

    pub fn is_excluded(&self, word: &str) -> bool {
        self.exclusions.contains(word)
    }

    /// True when `text` contains at least one configured suffix anywhere.
    pub fn has_medicine_suffix(&self, text: &str) -> bool {
        self.suffixes.iter().any(|suffix| text.contains(suffix.as_str()))
    }

    /// Load and validate a lexicon from a JSON file.
    pub fn load_from_file(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            error_logging::log_filesystem_error(
                &e,
                "read_medicine_lexicon",
                Some(&path.display().to_string()),
                None,
            );
            AppError::FileSystem(format!(
                "Failed to read medicine lexicon '{}': {}",
                path.display(),
                e
            ))
        })?;

        let lexicon: MedicineLexicon = serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!(
                "Failed to parse medicine lexicon '{}': {}",
                path.display(),
                e
            ))
        })?;

        lexicon.validate()?;
        Ok(lexicon)
    }

    /// Load the lexicon from the usual config locations, falling back to the built-in one.
    ///
    /// A file that exists but fails to load is skipped with a warning. An explicit path
    /// (from `MEDICINE_LEXICON_PATH`) goes through [`load_from_file`](Self::load_from_file)
    /// instead, where failure is an error.
    pub fn load_default() -> Self {
        Self::load_first_of(&DEFAULT_LEXICON_PATHS.map(Path::new))
    }

    fn load_first_of(candidates: &[&Path]) -> Self {
        for path in candidates {
            if !path.is_file() {
                continue;
            }
            match Self::load_from_file(path) {
                Ok(lexicon) => {
                    info!(
                        "Successfully loaded medicine lexicon from fallback path: {}",
                        path.display()
                    );
                    return lexicon;
                }
                Err(e) => {
                    warn!(
                        "Failed to load medicine lexicon at '{}': {}. Trying next path.",
                        path.display(),
                        e
                    );
                }
            }
        }

        info!("No medicine lexicon file found, using built-in lexicon");
        Self::builtin()
    }

    /// Validate lexicon entries
    pub fn validate(&self) -> AppResult<()> {
        if self.dictionary.is_empty() {
            return Err(AppError::Config(
                "medicine dictionary cannot be empty".to_string(),
            ));
        }
        if self.suffixes.is_empty() {
            return Err(AppError::Config("suffix list cannot be empty".to_string()));
        }

        validate_entries(&self.dictionary, "dictionary")?;
        validate_entries(&self.suffixes, "suffixes")?;
        validate_entries(&self.exclusions, "exclusions")?;

        Ok(())
    }
}

fn validate_entries<'a>(
    entries: impl IntoIterator<Item = &'a String>,
    category: &str,
) -> AppResult<()> {
    for entry in entries {
        if entry.trim().is_empty() {
            return Err(AppError::Config(format!(
                "{} contains an empty entry",
                category
            )));
        }
        // Check for obviously invalid characters (control characters)
        if entry.chars().any(|c| c.is_control()) {
            return Err(AppError::Config(format!(
                "{} entry '{}' contains control characters",
                category,
                entry.escape_debug()
            )));
        }
        if entry.chars().any(char::is_uppercase) {
            return Err(AppError::Config(format!(
                "{} entry '{}' must be lowercase",
                category, entry
            )));
        }
    }
    Ok(())
}
