//! Language / scan classification.
//!
//! Produces one of four wire tags. The scanned-document check runs first: a
//! paged document must clear the scan floor before language detection is
//! attempted.

use crate::config::ClassifierConfig;
use crate::extract::PageText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language tag written into output filenames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageTag {
    /// Primarily English
    #[serde(rename = "EN")]
    English,
    /// Primarily another language
    #[serde(rename = "NON")]
    NonEnglish,
    /// Some text, but not enough (or not clear enough) to decide
    #[serde(rename = "UNK")]
    Unknown,
    /// Scanned or image-based, no usable text layer
    #[serde(rename = "OCR")]
    Scanned,
}

impl LanguageTag {
    pub const ALL: [LanguageTag; 4] = [
        LanguageTag::English,
        LanguageTag::NonEnglish,
        LanguageTag::Unknown,
        LanguageTag::Scanned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageTag::English => "EN",
            LanguageTag::NonEnglish => "NON",
            LanguageTag::Unknown => "UNK",
            LanguageTag::Scanned => "OCR",
        }
    }

    /// Whether a filename token (any case) is one of the four tags
    pub fn is_tag(token: &str) -> bool {
        token.parse::<LanguageTag>().is_ok()
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EN" => Ok(LanguageTag::English),
            "NON" => Ok(LanguageTag::NonEnglish),
            "UNK" => Ok(LanguageTag::Unknown),
            "OCR" => Ok(LanguageTag::Scanned),
            other => Err(format!("unknown language tag: {}", other)),
        }
    }
}

/// Outcome of running a language detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    English,
    Other,
    /// The detector could not make a call
    Undetermined,
}

/// Language detection backend
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Detection;
}

/// Trigram-based detection via the `whatlang` crate
#[derive(Debug, Clone, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Detection {
        match whatlang::detect(text) {
            Some(info) if info.lang() == whatlang::Lang::Eng => Detection::English,
            Some(info) => {
                tracing::trace!("[Language] detected {:?} ({:.2})", info.lang(), info.confidence());
                Detection::Other
            }
            None => Detection::Undetermined,
        }
    }
}

/// Classify the leading pages of a document
pub fn classify_pages(
    pages: &PageText,
    config: &ClassifierConfig,
    detector: &dyn LanguageDetector,
) -> LanguageTag {
    let checked = config.language_pages.min(pages.page_count.max(pages.pages.len()));

    let mut gathered = String::new();
    for page in pages.leading(checked) {
        if page.is_empty() {
            continue;
        }
        gathered.push_str(page);
        if gathered.chars().count() > config.early_stop {
            break;
        }
    }

    let stripped = gathered.trim().chars().count();

    if stripped < config.scan_floor && pages.page_count > 0 {
        tracing::debug!("[Language] {} chars on {} pages - treating as scanned", stripped, pages.page_count);
        return LanguageTag::Scanned;
    }

    if stripped > config.detection_threshold {
        return match detector.detect(&gathered) {
            Detection::English => LanguageTag::English,
            Detection::Other => LanguageTag::NonEnglish,
            Detection::Undetermined => {
                tracing::warn!("[Language] could not detect language");
                LanguageTag::Unknown
            }
        };
    }

    if stripped > 0 {
        tracing::debug!("[Language] only {} chars - not enough for detection", stripped);
        LanguageTag::Unknown
    } else {
        LanguageTag::Scanned
    }
}
