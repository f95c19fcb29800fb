//! # Entity Recognition Module
//!
//! Named-entity recognition seam used by the suffix method of medicine extraction.
//!
//! The bundled [`LexiconEntityRecognizer`] is a gazetteer model: a plain text file with one
//! term per line, optionally followed by a tab and a label. Matching is case-insensitive,
//! whole-word, and prefers the longest term at each position.
//!
//! Models are loaded at most once per [`SharedEntityRecognizer`] and then shared read-only.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{info, warn};

/// Environment variable pointing at a gazetteer model file.
pub const MODEL_PATH_ENV: &str = "NER_MODEL_PATH";

/// Searched in order when `NER_MODEL_PATH` is not set.
const DEFAULT_MODEL_PATHS: [&str; 2] = [
    "config/ner_gazetteer.txt",      // Local development path
    "/app/config/ner_gazetteer.txt", // Docker path
];

/// Label given to gazetteer terms that do not carry one.
pub const DEFAULT_LABEL: &str = "ENTITY";

/// One recognized entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpan {
    /// Matched text as it appears in the input
    pub text: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Entity category from the model
    pub label: String,
}

/// Errors raised by entity recognizers
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecognitionError {
    /// No model configured, or an earlier load failed
    ModelUnavailable(String),
    /// Model file could not be read or compiled
    ModelLoad(String),
    /// Model loaded but recognition failed
    Recognition(String),
}

impl std::fmt::Display for EntityRecognitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRecognitionError::ModelUnavailable(msg) => {
                write!(f, "[NER_UNAVAILABLE] Entity model is not available: {}", msg)
            }
            EntityRecognitionError::ModelLoad(msg) => {
                write!(f, "[NER_LOAD] Failed to load entity model: {}", msg)
            }
            EntityRecognitionError::Recognition(msg) => {
                write!(f, "[NER_FAILED] Entity recognition failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for EntityRecognitionError {}

/// Finds entity spans in text.
pub trait EntityRecognizer: Send + Sync {
    fn recognize_entities(&self, text: &str) -> Result<Vec<EntitySpan>, EntityRecognitionError>;
}

/// Gazetteer-based recognizer.
#[derive(Debug, Clone)]
pub struct LexiconEntityRecognizer {
    pattern: Regex,
    labels: HashMap<String, String>,
}

impl LexiconEntityRecognizer {
    /// Build a recognizer from `(term, label)` pairs.
    ///
    /// Terms are matched case-insensitively; runs of whitespace inside a term match any
    /// whitespace in the text.
    ///
    /// # Examples
    ///
    /// ```
    /// use careguide_scan::entity_recognition::{EntityRecognizer, LexiconEntityRecognizer};
    ///
    /// let ner = LexiconEntityRecognizer::from_terms([
    ///     ("azithromycin", "DRUG"),
    ///     ("azithromycin dihydrate", "DRUG"),
    /// ])
    /// .unwrap();
    /// let spans = ner.recognize_entities("take Azithromycin  Dihydrate daily").unwrap();
    /// assert_eq!(spans.len(), 1);
    /// assert_eq!(spans[0].text, "Azithromycin  Dihydrate");
    /// ```
    pub fn from_terms<I, T, L>(terms: I) -> Result<Self, EntityRecognitionError>
    where
        I: IntoIterator<Item = (T, L)>,
        T: AsRef<str>,
        L: AsRef<str>,
    {
        let mut labels = HashMap::new();
        for (term, label) in terms {
            let key = normalize_term(term.as_ref());
            if key.is_empty() {
                continue;
            }
            labels.entry(key).or_insert_with(|| label.as_ref().to_string());
        }

        if labels.is_empty() {
            return Err(EntityRecognitionError::ModelLoad(
                "gazetteer contains no terms".to_string(),
            ));
        }

        let mut ordered: Vec<&String> = labels.keys().collect();
        // Longest first, so alternation prefers the longest term at a position.
        ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let alternation = ordered
            .iter()
            .map(|term| {
                term.split(' ')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .map_err(|e| EntityRecognitionError::ModelLoad(e.to_string()))?;

        Ok(Self { pattern, labels })
    }

    /// Load a gazetteer file: one term per line, optional `<TAB>label`, `#` starts a comment.
    pub fn load(path: &Path) -> Result<Self, EntityRecognitionError> {
        let content = fs::read_to_string(path).map_err(|e| {
            EntityRecognitionError::ModelLoad(format!("{}: {}", path.display(), e))
        })?;

        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| match line.split_once('\t') {
                Some((term, label)) => (term.trim(), label.trim()),
                None => (line, DEFAULT_LABEL),
            });

        let recognizer = Self::from_terms(entries)?;
        info!(
            path = %path.display(),
            terms = recognizer.term_count(),
            "Loaded gazetteer entity model"
        );
        Ok(recognizer)
    }

    pub fn term_count(&self) -> usize {
        self.labels.len()
    }
}

impl EntityRecognizer for LexiconEntityRecognizer {
    fn recognize_entities(&self, text: &str) -> Result<Vec<EntitySpan>, EntityRecognitionError> {
        Ok(self
            .pattern
            .find_iter(text)
            .map(|m| {
                let label = self
                    .labels
                    .get(&normalize_term(m.as_str()))
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_LABEL.to_string());
                EntitySpan {
                    text: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                    label,
                }
            })
            .collect())
    }
}

fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The first gazetteer found in the default config locations, if any.
pub fn locate_default_model() -> Option<PathBuf> {
    first_existing_file(&DEFAULT_MODEL_PATHS.map(Path::new))
}

fn first_existing_file(candidates: &[&Path]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|path| path.is_file())
        .map(|path| path.to_path_buf())
}

type LoadedRecognizer = Result<Arc<dyn EntityRecognizer>, EntityRecognitionError>;

/// Process-wide handle to an entity recognizer that is loaded at most once.
///
/// The first recognition call loads the model; concurrent first calls block until that
/// single load finishes. The outcome, success or failure, is kept for the lifetime of the
/// handle, so a broken model is reported once and never retried.
pub struct SharedEntityRecognizer {
    source: RecognizerSource,
    cell: OnceCell<LoadedRecognizer>,
}

enum RecognizerSource {
    Disabled,
    File(PathBuf),
}

impl SharedEntityRecognizer {
    /// A handle that never recognizes anything.
    pub fn disabled() -> Self {
        Self {
            source: RecognizerSource::Disabled,
            cell: OnceCell::new(),
        }
    }

    /// A handle that lazily loads a gazetteer from `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: RecognizerSource::File(path.into()),
            cell: OnceCell::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.source, RecognizerSource::Disabled)
    }

    /// The loaded recognizer, loading it on first use.
    pub fn get(&self) -> Result<&Arc<dyn EntityRecognizer>, EntityRecognitionError> {
        self.cell
            .get_or_init(|| self.load())
            .as_ref()
            .map_err(|e| EntityRecognitionError::ModelUnavailable(e.to_string()))
    }

    fn load(&self) -> LoadedRecognizer {
        match &self.source {
            RecognizerSource::File(path) => match LexiconEntityRecognizer::load(path) {
                Ok(recognizer) => Ok(Arc::new(recognizer) as Arc<dyn EntityRecognizer>),
                Err(e) => {
                    warn!(
                        error = %e,
                        path = %path.display(),
                        "Entity model failed to load; suffix method disabled"
                    );
                    Err(e)
                }
            },
            RecognizerSource::Disabled => {
                Err(EntityRecognitionError::ModelUnavailable(format!(
                    "no entity model configured (set {})",
                    MODEL_PATH_ENV
                )))
            }
        }
    }
}

impl EntityRecognizer for SharedEntityRecognizer {
    fn recognize_entities(&self, text: &str) -> Result<Vec<EntitySpan>, EntityRecognitionError> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        self.get()?.recognize_entities(text)
    }
}

impl std::fmt::Debug for SharedEntityRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            RecognizerSource::Disabled => "disabled".to_string(),
            RecognizerSource::File(path) => path.display().to_string(),
        };
        f.debug_struct("SharedEntityRecognizer")
            .field("source", &source)
            .field("loaded", &self.cell.get().is_some())
            .finish()
    }
}
