//! Country name search in document text.
//!
//! Candidates come from the country mapping. Longer names are tried first so
//! `Niger` never shadows `Nigeria` and `Guinea` never shadows
//! `Equatorial Guinea`.

use crate::extract::PageText;
use crate::mapping::{consolidation_key, CountryMapping, CountryVariants};
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeSet, HashMap};

/// Distinct mapped countries, `World` excluded
pub fn unique_countries(mapping: &CountryMapping) -> BTreeSet<String> {
    mapping.countries()
}

#[derive(Debug)]
struct Candidate {
    /// Spelling searched for
    spelling: String,
    /// Name reported on a match
    canonical: String,
    patterns: Vec<Regex>,
}

/// Compiled, ordered set of country patterns
#[derive(Debug, Default)]
pub struct CountryMatcher {
    candidates: Vec<Candidate>,
}

fn word_pattern(text: &str) -> Option<Regex> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(text)))
        .case_insensitive(true)
        .build()
        .map_err(|e| tracing::warn!("[Country] skipping pattern for '{}': {}", text, e))
        .ok()
}

impl CountryMatcher {
    /// Build a matcher from country names and an optional variants dictionary.
    ///
    /// Variant spellings are only added when their canonical name is one of the
    /// given countries; a match on a variant reports that country.
    pub fn new<I, S>(countries: I, variants: &CountryVariants) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_key: HashMap<String, String> = HashMap::new();
        let mut spellings: Vec<(String, String)> = Vec::new();

        for country in countries {
            let country = country.as_ref().trim();
            if country.is_empty() || country.eq_ignore_ascii_case("world") {
                continue;
            }
            by_key.insert(consolidation_key(country), country.to_string());
            spellings.push((country.to_string(), country.to_string()));
        }

        for (variant, canonical) in variants.iter() {
            if let Some(display) = by_key.get(&consolidation_key(canonical)) {
                if !spellings.iter().any(|(s, _)| s == variant) {
                    spellings.push((variant.to_string(), display.clone()));
                }
            }
        }

        spellings.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });
        spellings.dedup_by(|a, b| a.0 == b.0);

        let candidates = spellings
            .into_iter()
            .map(|(spelling, canonical)| {
                let mut patterns: Vec<Regex> = word_pattern(&spelling).into_iter().collect();
                let spaced = spelling.replace('_', " ");
                if spaced != spelling {
                    patterns.extend(word_pattern(&spaced));
                }
                let underscored = spelling.replace(' ', "_");
                if underscored != spelling {
                    patterns.extend(word_pattern(&underscored));
                }
                Candidate {
                    spelling,
                    canonical,
                    patterns,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!("[Country] matcher built with {} candidates", candidates.len());
        Self { candidates }
    }

    pub fn from_mapping(mapping: &CountryMapping, variants: &CountryVariants) -> Self {
        Self::new(unique_countries(mapping), variants)
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// First candidate (longest first) found in a block of text
    pub fn find_in_text(&self, text: &str) -> Option<&str> {
        self.candidates
            .iter()
            .find(|c| c.patterns.iter().any(|p| p.is_match(text)))
            .map(|c| {
                if c.spelling != c.canonical {
                    tracing::debug!("[Country] '{}' resolved to '{}'", c.spelling, c.canonical);
                }
                c.canonical.as_str()
            })
    }

    /// Search the leading pages in order; the first page with a hit decides
    pub fn find_in_pages(&self, pages: &PageText, limit: usize) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        pages
            .leading(limit)
            .filter(|page| !page.trim().is_empty())
            .find_map(|page| self.find_in_text(page))
            .map(str::to_string)
    }
}
