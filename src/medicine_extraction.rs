//! # Medicine Extraction Module
//!
//! Finds medicine names in recognized prescription text.
//!
//! Three independent methods propose candidates:
//!
//! - **pattern**: a word followed by a dose (`500mg`, `5 ml`, `1%`) or a word of four or more
//!   letters followed by a dosage form (`tablet`, `capsule`, ...)
//! - **dictionary**: any word found in the lexicon's list of known medicines
//! - **entity**: spans from the entity recognizer that contain a typical drug-name suffix
//!
//! The union of all candidates is filtered through the exclusion list and returned sorted.
//! Extraction never fails: the entity method degrades to no candidates when its model is
//! missing or broken.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::entity_recognition::{
    locate_default_model, EntityRecognitionError, EntityRecognizer, SharedEntityRecognizer,
    MODEL_PATH_ENV,
};
use crate::errors::{error_logging, AppError, AppResult};
use crate::medicine_lexicon::{MedicineLexicon, LEXICON_PATH_ENV};
use crate::observability;

lazy_static! {
    /// A word directly followed by a numeric dose with a unit
    static ref DOSE_PATTERN: Regex =
        Regex::new(r"\b([a-z]+)\s*\d+(?:[.,]\d+)?\s*(?:mg|ml|mcg|units|iu|%)")
            .expect("dose pattern should be valid");
    /// A word of at least four letters followed by a dosage form
    static ref FORM_PATTERN: Regex =
        Regex::new(r"\b([a-z]{4,})\s+(?:tablet|capsule|injection|ointment|syrup|powder)")
            .expect("dosage form pattern should be valid");
    /// Alphabetic tokens for dictionary lookup
    static ref WORD_PATTERN: Regex =
        Regex::new(r"\b[a-z]+\b").expect("word pattern should be valid");
}

/// Entity spans of this many characters or fewer are ignored.
const MIN_ENTITY_CHARS: usize = 2;

/// Where the extractor's reference data comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionConfig {
    /// Lexicon JSON file; `None` searches the default locations
    pub lexicon_path: Option<PathBuf>,
    /// Gazetteer model for the entity method; `None` disables the method
    pub ner_model_path: Option<PathBuf>,
}

impl ExtractionConfig {
    /// Load configuration from environment variables
    ///
    /// Empty values count as unset. Without `NER_MODEL_PATH`, a gazetteer in one of the
    /// default config locations enables the entity method.
    pub fn from_env() -> Self {
        let path_from = |name: &str| {
            std::env::var_os(name)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };
        Self {
            lexicon_path: path_from(LEXICON_PATH_ENV),
            ner_model_path: path_from(MODEL_PATH_ENV).or_else(locate_default_model),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        for (name, path) in [
            ("lexicon_path", &self.lexicon_path),
            ("ner_model_path", &self.ner_model_path),
        ] {
            if let Some(path) = path {
                if path.as_os_str().is_empty() {
                    return Err(AppError::Config(format!("{} cannot be empty", name)));
                }
            }
        }
        Ok(())
    }
}

/// Candidates proposed by each method, plus the final result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionBreakdown {
    pub pattern: BTreeSet<String>,
    pub dictionary: BTreeSet<String>,
    pub entity: BTreeSet<String>,
    /// Sorted union of the three sets minus exclusions
    pub medicines: Vec<String>,
}

/// Extracts medicine names from free text.
///
/// Cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct MedicineExtractor {
    lexicon: Arc<MedicineLexicon>,
    entities: Arc<dyn EntityRecognizer>,
}

impl MedicineExtractor {
    pub fn new(lexicon: Arc<MedicineLexicon>, entities: Arc<dyn EntityRecognizer>) -> Self {
        Self { lexicon, entities }
    }

    /// Built-in lexicon, no entity model.
    ///
    /// # Examples
    ///
    /// ```
    /// use careguide_scan::medicine_extraction::MedicineExtractor;
    ///
    /// let extractor = MedicineExtractor::with_builtin_lexicon();
    /// assert_eq!(
    ///     extractor.extract("Paracetamol 500mg twice daily"),
    ///     vec!["paracetamol".to_string()]
    /// );
    /// ```
    pub fn with_builtin_lexicon() -> Self {
        Self::new(
            Arc::new(MedicineLexicon::builtin()),
            Arc::new(SharedEntityRecognizer::disabled()),
        )
    }

    /// Build an extractor from configuration.
    ///
    /// The lexicon is loaded now; the entity model is loaded on first use.
    pub fn from_config(config: &ExtractionConfig) -> AppResult<Self> {
        config.validate()?;

        let lexicon = match &config.lexicon_path {
            Some(path) => MedicineLexicon::load_from_file(path)?,
            None => MedicineLexicon::load_default(),
        };

        let entities = match &config.ner_model_path {
            Some(path) => SharedEntityRecognizer::from_path(path.clone()),
            None => SharedEntityRecognizer::disabled(),
        };

        Ok(Self::new(Arc::new(lexicon), Arc::new(entities)))
    }

    pub fn lexicon(&self) -> &MedicineLexicon {
        &self.lexicon
    }

    /// Sorted, de-duplicated medicine names found in `text`.
    ///
    /// Empty input yields an empty list.
    pub fn extract(&self, text: &str) -> Vec<String> {
        self.extract_with_provenance(text).medicines
    }

    /// Like [`extract`](Self::extract), also reporting what each method proposed.
    pub fn extract_with_provenance(&self, text: &str) -> ExtractionBreakdown {
        let span = observability::extraction_span(text.len());
        let _enter = span.enter();

        let lowered = text.to_lowercase();

        let pattern = pattern_candidates(&lowered);
        let dictionary = self.dictionary_candidates(&lowered);
        let entity = self.entity_candidates(&lowered);

        let medicines: Vec<String> = pattern
            .iter()
            .chain(&dictionary)
            .chain(&entity)
            .filter(|candidate| !self.lexicon.is_excluded(candidate))
            .cloned()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();

        debug!(
            pattern = pattern.len(),
            dictionary = dictionary.len(),
            entity = entity.len(),
            medicines = medicines.len(),
            "Medicine extraction completed"
        );
        observability::record_extraction_metrics(medicines.len());

        ExtractionBreakdown {
            pattern,
            dictionary,
            entity,
            medicines,
        }
    }

    fn dictionary_candidates(&self, lowered: &str) -> BTreeSet<String> {
        WORD_PATTERN
            .find_iter(lowered)
            .map(|m| m.as_str())
            .filter(|word| self.lexicon.is_known_medicine(word))
            .map(str::to_string)
            .collect()
    }

    fn entity_candidates(&self, lowered: &str) -> BTreeSet<String> {
        let spans = match self.entities.recognize_entities(lowered) {
            Ok(spans) => spans,
            Err(EntityRecognitionError::ModelUnavailable(reason)) => {
                debug!(reason = %reason, "Entity method skipped");
                return BTreeSet::new();
            }
            Err(e) => {
                error_logging::log_extraction_degraded(&e, "entity", lowered.len());
                return BTreeSet::new();
            }
        };

        spans
            .into_iter()
            .map(|span| span.text.to_lowercase())
            .filter(|text| text.chars().count() > MIN_ENTITY_CHARS)
            .filter(|text| self.lexicon.has_medicine_suffix(text))
            .collect()
    }
}

impl std::fmt::Debug for MedicineExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MedicineExtractor")
            .field("dictionary_entries", &self.lexicon.dictionary.len())
            .field("exclusions", &self.lexicon.exclusions.len())
            .finish_non_exhaustive()
    }
}

fn pattern_candidates(lowered: &str) -> BTreeSet<String> {
    [&*DOSE_PATTERN, &*FORM_PATTERN]
        .into_iter()
        .flat_map(|pattern| pattern.captures_iter(lowered))
        .filter_map(|caps| caps.get(1))
        .map(|word| word.as_str().trim().to_lowercase())
        .filter(|word| !word.is_empty())
        .collect()
}
