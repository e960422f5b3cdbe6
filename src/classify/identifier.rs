//! Project identifier extraction.
//!
//! Identifiers are the letter `P` followed by six digits. Scanned text often
//! reads `0` as `O`, so content matches accept `O` and rewrite it; filename
//! matches are strict and must be followed by `-` or `_`.

use crate::extract::PageText;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved leading letter of every identifier
pub const IDENTIFIER_PREFIX: char = 'P';

static CONTENT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"P[0-9O]{6}").unwrap());
static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"P(\d{6})[-_]").unwrap());
static EXACT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^P\d{6}$").unwrap());

/// A validated project identifier such as `P123456`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Accept exactly `P` + 6 digits
    pub fn parse(value: &str) -> Option<Self> {
        if EXACT_PATTERN.is_match(value) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(&value).ok_or_else(|| format!("not a project identifier: {}", value))
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// First identifier in a block of text, with `O` misreads corrected
pub fn extract_from_text(text: &str) -> Option<Identifier> {
    let found = CONTENT_PATTERN.find(text)?.as_str();
    let digits = found[1..].replace('O', "0");
    let corrected = format!("{}{}", IDENTIFIER_PREFIX, digits);

    if found != corrected {
        tracing::info!("[Identifier] found {}, corrected to {}", found, corrected);
    }
    Some(Identifier(corrected))
}

/// First identifier on the leading `limit` pages, in page order
pub fn extract_from_pages(pages: &PageText, limit: usize) -> Option<Identifier> {
    pages.leading(limit).find_map(extract_from_text)
}

/// Identifier embedded in a filename, e.g. `P123456_report.docx`
pub fn extract_from_filename(file_name: &str) -> Option<Identifier> {
    FILENAME_PATTERN
        .captures(file_name)
        .map(|caps| Identifier(format!("{}{}", IDENTIFIER_PREFIX, &caps[1])))
}

/// Content first, filename second
pub fn find_identifier(
    pages: &PageText,
    limit: usize,
    file_name: &str,
) -> Option<Identifier> {
    extract_from_pages(pages, limit).or_else(|| {
        let from_name = extract_from_filename(file_name);
        if let Some(ref id) = from_name {
            tracing::debug!("[Identifier] {} taken from filename {}", id, file_name);
        }
        from_name
    })
}
