//! Country name normalisation and the variant -> canonical dictionary.
//!
//! The dictionary is a flat JSON object, e.g.
//!
//! ```json
//! { "Ivory Coast": "Cote d'Ivoire", "Lao PDR": "Laos" }
//! ```
//!
//! Lookups go through [`consolidation_key`], so spacing, underscores, case and
//! punctuation differences between spellings do not matter.

use crate::error::{DocsortError, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Display form: underscores to spaces, collapsed whitespace, title case
pub fn normalize_country_name(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    title_case(&collapsed)
}

/// Upper-case a letter when it follows a non-letter, lower-case it otherwise.
///
/// `"cote d'ivoire"` becomes `"Cote D'Ivoire"`.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            result.push(c);
            previous_is_letter = false;
        }
    }
    result
}

/// Grouping key: lower-case alphanumeric words joined by single spaces.
///
/// `Cote_d_Ivoire`, `Cote d'Ivoire` and `COTE D IVOIRE` share one key.
pub fn consolidation_key(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Alternate country spellings and the canonical name each resolves to
#[derive(Debug, Clone, Default)]
pub struct CountryVariants {
    /// variant spelling -> canonical name, canonical names included
    entries: BTreeMap<String, String>,
    /// consolidation key -> canonical name
    by_key: HashMap<String, String>,
}

impl CountryVariants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(variant, canonical)` pairs
    pub fn from_pairs<I, V, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (V, C)>,
        V: Into<String>,
        C: Into<String>,
    {
        let mut variants = Self::new();
        for (variant, canonical) in pairs {
            variants.insert(variant.into(), canonical.into());
        }
        variants
    }

    /// Load a JSON object of `variant: canonical` pairs
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| DocsortError::io(path, e))?;
        let pairs: BTreeMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| DocsortError::Variants {
                path: path.to_path_buf(),
                source,
            })?;

        let variants = Self::from_pairs(pairs);
        tracing::info!(
            "[Variants] loaded {} spellings from {}",
            variants.entries.len(),
            path.display()
        );
        Ok(variants)
    }

    /// Load if a path is given; a broken file degrades to an empty dictionary
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::load(p).unwrap_or_else(|e| {
                tracing::warn!("[Variants] ignoring variants file: {}", e);
                Self::new()
            }),
            None => Self::new(),
        }
    }

    fn insert(&mut self, variant: String, canonical: String) {
        let variant = variant.trim().to_string();
        let canonical = canonical.trim().to_string();
        if variant.is_empty() || canonical.is_empty() {
            return;
        }
        // A canonical name always resolves to itself
        self.by_key
            .insert(consolidation_key(&canonical), canonical.clone());
        self.entries
            .entry(canonical.clone())
            .or_insert_with(|| canonical.clone());

        self.by_key
            .insert(consolidation_key(&variant), canonical.clone());
        self.entries.insert(variant, canonical);
    }

    /// Canonical name for any known spelling
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.by_key.get(&consolidation_key(name)).map(String::as_str)
    }

    /// All `(spelling, canonical)` pairs, canonical names included
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(v, c)| (v.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
