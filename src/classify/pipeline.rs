//! Per-document classification.
//!
//! The stages run in a fixed order and the first one that succeeds decides
//! the name:
//!
//! 1. project identifier (content, then original filename) -> `Identified`
//! 2. scanned check -> `Scanned`
//! 3. country text match -> `CountryMatched`
//! 4. fallback -> `Unknown`

use super::country::CountryMatcher;
use super::identifier::{self, Identifier};
use super::language::{self, LanguageDetector, LanguageTag, WhatlangDetector};
use crate::config::ClassifierConfig;
use crate::extract::{PageExtractor, PageText, PdfPageExtractor};
use crate::mapping::{CountryMapping, CountryVariants};
use crate::naming::ClassifiedName;
use std::path::Path;

/// Result of classifying one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub name: ClassifiedName,
    pub identifier: Option<Identifier>,
    pub country: Option<String>,
    pub language: LanguageTag,
}

impl Classification {
    fn new(name: ClassifiedName) -> Self {
        let (identifier, country, language) = match &name {
            ClassifiedName::Identified { id, country, lang } => {
                (Some(id.clone()), country.clone(), *lang)
            }
            ClassifiedName::CountryMatched { country, lang } => (None, Some(country.clone()), *lang),
            ClassifiedName::Scanned => (None, None, LanguageTag::Scanned),
            ClassifiedName::Unknown { lang } => (None, None, *lang),
        };
        Self {
            name,
            identifier,
            country,
            language,
        }
    }

    pub fn file_name(&self) -> String {
        self.name.file_name()
    }
}

/// Everything needed to classify documents of one batch
pub struct Classifier {
    mapping: CountryMapping,
    matcher: CountryMatcher,
    detector: Box<dyn LanguageDetector>,
    extractor: Box<dyn PageExtractor>,
    config: ClassifierConfig,
    use_identifier: bool,
}

impl Classifier {
    pub fn new(
        mapping: CountryMapping,
        variants: &CountryVariants,
        extractor: Box<dyn PageExtractor>,
        detector: Box<dyn LanguageDetector>,
        config: ClassifierConfig,
    ) -> Self {
        let matcher = CountryMatcher::from_mapping(&mapping, variants);
        Self {
            mapping,
            matcher,
            detector,
            extractor,
            config,
            use_identifier: true,
        }
    }

    /// PDF extraction and whatlang detection
    pub fn with_defaults(mapping: CountryMapping, variants: &CountryVariants, config: ClassifierConfig) -> Self {
        Self::new(
            mapping,
            variants,
            Box::new(PdfPageExtractor::new()),
            Box::new(WhatlangDetector),
            config,
        )
    }

    /// Turn identifier extraction on or off
    pub fn use_identifier(mut self, enabled: bool) -> Self {
        self.use_identifier = enabled;
        self
    }

    pub fn mapping(&self) -> &CountryMapping {
        &self.mapping
    }

    /// Classify a PDF. `original_name` is the name of the file the PDF came
    /// from, used for the filename identifier fallback.
    pub fn classify(&self, pdf_path: &Path, original_name: &str) -> Classification {
        let (pages, extracted) = match self.extractor.extract(pdf_path, self.config.max_pages()) {
            Ok(pages) => (pages, true),
            Err(e) => {
                tracing::warn!("[Pipeline] no text from {}: {}", pdf_path.display(), e);
                (PageText::default(), false)
            }
        };

        let lang = || {
            if extracted {
                language::classify_pages(&pages, &self.config, self.detector.as_ref())
            } else {
                LanguageTag::Unknown
            }
        };

        if self.use_identifier {
            if let Some(id) =
                identifier::find_identifier(&pages, self.config.identifier_pages, original_name)
            {
                let country = self.mapping.get(&id).map(str::to_string);
                match &country {
                    Some(c) => tracing::info!("[Pipeline] {} -> {} ({})", original_name, id, c),
                    None => tracing::debug!("[Pipeline] no country mapped for {}", id),
                }
                return Classification::new(ClassifiedName::Identified {
                    id,
                    country,
                    lang: lang(),
                });
            }
            tracing::debug!("[Pipeline] no identifier in {}", original_name);
        }

        let lang = lang();
        if lang == LanguageTag::Scanned {
            tracing::info!("[Pipeline] {} looks scanned", original_name);
            return Classification::new(ClassifiedName::Scanned);
        }

        if let Some(country) = self.matcher.find_in_pages(&pages, self.config.country_pages) {
            tracing::info!("[Pipeline] {} mentions {}", original_name, country);
            return Classification::new(ClassifiedName::CountryMatched { country, lang });
        }

        Classification::new(ClassifiedName::Unknown { lang })
    }
}
