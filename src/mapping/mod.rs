//! Project -> country mapping.
//!
//! The table is loaded once per batch from a user spreadsheet. Choosing which
//! columns hold the identifier and the country is delegated to a
//! [`ColumnResolver`], so the classifier only ever sees a resolved
//! [`CountryMapping`].

mod spreadsheet;
pub mod variants;

pub use spreadsheet::{load_mapping, load_mapping_or_empty, normalize_identifier_cell};
pub use variants::{consolidation_key, normalize_country_name, CountryVariants};

use crate::classify::identifier::Identifier;
use crate::config::ColumnSelector;
use crate::error::{DocsortError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Identifier -> country display name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryMapping {
    entries: BTreeMap<Identifier, String>,
}

impl CountryMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: Identifier, country: impl Into<String>) {
        self.entries.insert(id, country.into());
    }

    /// Exact-key lookup
    pub fn get(&self, id: &Identifier) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &str)> {
        self.entries.iter().map(|(id, c)| (id, c.as_str()))
    }

    /// Distinct country names, `World` excluded
    pub fn countries(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .filter(|c| !c.trim().eq_ignore_ascii_case("world"))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Identifier, String)> for CountryMapping {
    fn from_iter<T: IntoIterator<Item = (Identifier, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Resolved column positions for one spreadsheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSelection {
    pub id: usize,
    pub country: usize,
}

/// Decides which columns hold identifiers and countries for a header row
pub trait ColumnResolver {
    fn resolve(&self, source: &Path, headers: &[String]) -> Result<ColumnSelection>;
}

/// Columns chosen up front by name or index
#[derive(Debug, Clone)]
pub struct ConfiguredColumns {
    pub id: ColumnSelector,
    pub country: ColumnSelector,
}

impl ConfiguredColumns {
    pub fn new(id: ColumnSelector, country: ColumnSelector) -> Self {
        Self { id, country }
    }

    fn locate(selector: &ColumnSelector, source: &Path, headers: &[String]) -> Result<usize> {
        let found = match selector {
            ColumnSelector::Index(index) if *index < headers.len() => Some(*index),
            ColumnSelector::Index(_) => None,
            ColumnSelector::Name(name) => headers
                .iter()
                .position(|h| h.trim() == name.as_str())
                .or_else(|| {
                    headers
                        .iter()
                        .position(|h| h.trim().eq_ignore_ascii_case(name))
                }),
        };

        found.ok_or_else(|| DocsortError::MissingColumn {
            path: source.to_path_buf(),
            column: selector.to_string(),
            available: headers.join(", "),
        })
    }
}

impl ColumnResolver for ConfiguredColumns {
    fn resolve(&self, source: &Path, headers: &[String]) -> Result<ColumnSelection> {
        Ok(ColumnSelection {
            id: Self::locate(&self.id, source, headers)?,
            country: Self::locate(&self.country, source, headers)?,
        })
    }
}
