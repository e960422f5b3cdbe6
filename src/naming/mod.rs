//! Output filename grammar and conflict-free name allocation.
//!
//! Names are built by [`ClassifiedName::file_name`]. When the target already
//! exists a two-digit counter is appended to the stem: `X.pdf`, `X_01.pdf`,
//! `X_02.pdf` and so on. [`reserve`] claims the chosen name by creating it
//! exclusively, so concurrent workers never hand out the same path.

use crate::classify::identifier::Identifier;
use crate::classify::language::LanguageTag;
use crate::error::{DocsortError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Highest collision counter tried before giving up
pub const MAX_SUFFIX: u32 = 9999;

/// Base name for scanned documents without an identifier
pub const SCANNED_STEM: &str = "SCAN_OCR_DOCUMENT";
pub const COUNTRY_PREFIX: &str = "COUNTRY_";
pub const UNKNOWN_PREFIX: &str = "UNKNOWN_";

static NUMERIC_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_\d+$").unwrap());
static TYPE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)_(?:EN|NON|UNK|OCR)_([a-z]+)(?:_\d+)?\.pdf$").unwrap()
});

/// The four naming outcomes of classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedName {
    /// `{ID}_{COUNTRY}_{LANG}.pdf`, or `{ID}_{LANG}.pdf` without a country
    Identified {
        id: Identifier,
        country: Option<String>,
        lang: LanguageTag,
    },
    /// `COUNTRY_{COUNTRY}_{LANG}.pdf`
    CountryMatched { country: String, lang: LanguageTag },
    /// `SCAN_OCR_DOCUMENT.pdf`
    Scanned,
    /// `UNKNOWN_{LANG}.pdf`
    Unknown { lang: LanguageTag },
}

impl ClassifiedName {
    pub fn file_name(&self) -> String {
        match self {
            ClassifiedName::Identified { id, country, lang } => {
                let segment = country
                    .as_deref()
                    .map(|c| sanitize_segment(c).replace(' ', "_"))
                    .filter(|c| !c.is_empty());
                match segment {
                    Some(country) => format!("{}_{}_{}.pdf", id, country, lang),
                    None => format!("{}_{}.pdf", id, lang),
                }
            }
            ClassifiedName::CountryMatched { country, lang } => {
                format!("{}{}_{}.pdf", COUNTRY_PREFIX, sanitize_segment(country), lang)
            }
            ClassifiedName::Scanned => format!("{}.pdf", SCANNED_STEM),
            ClassifiedName::Unknown { lang } => format!("{}{}.pdf", UNKNOWN_PREFIX, lang),
        }
    }

    /// Short label used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedName::Identified { .. } => "identified",
            ClassifiedName::CountryMatched { .. } => "country",
            ClassifiedName::Scanned => "scanned",
            ClassifiedName::Unknown { .. } => "unknown",
        }
    }
}

/// Replace characters no filesystem accepts in a name segment
pub fn sanitize_segment(segment: &str) -> String {
    segment
        .trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}

/// The `counter`-th alternative for a target path.
///
/// A stem that already ends in a `_NN` counter is renumbered from its base, so
/// `X_01.pdf` continues as `X_02.pdf` rather than `X_01_01.pdf`.
fn candidate(target: &Path, counter: u32) -> PathBuf {
    let (stem, ext) = split_name(target);
    let base = match NUMERIC_SUFFIX.find(&stem) {
        Some(m) if m.start() > 0 => &stem[..m.start()],
        _ => stem.as_str(),
    };
    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{}_{:02}{}", base, counter, ext))
}

/// First free name for `target`, without claiming it.
///
/// Only a probe: another writer may take the name before it is used.
pub fn resolve(target: &Path) -> PathBuf {
    if !target.exists() {
        return target.to_path_buf();
    }
    (1..=MAX_SUFFIX)
        .map(|counter| candidate(target, counter))
        .find(|path| !path.exists())
        .unwrap_or_else(|| candidate(target, MAX_SUFFIX + 1))
}

/// Claim the first free name for `target` by creating an empty file there.
///
/// The name found by [`resolve`] is created exclusively; losing a race to
/// another writer just resolves again. The caller overwrites the placeholder
/// with the real content.
pub fn reserve(target: &Path) -> Result<PathBuf> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| DocsortError::io(parent, e))?;
        }
    }

    let exhausted = candidate(target, MAX_SUFFIX + 1);
    loop {
        let path = resolve(target);
        if path == exhausted {
            return Err(DocsortError::NamesExhausted(target.to_path_buf()));
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                if path != target {
                    tracing::debug!(
                        "[Naming] {} taken, using {}",
                        target.display(),
                        path.file_name().unwrap_or_default().to_string_lossy()
                    );
                }
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(DocsortError::io(&path, e)),
        }
    }
}

/// Insert a document-type token before any trailing `_NN` counter.
///
/// `P123456_France_EN_01.pdf` + `icrr` gives `P123456_France_EN_icrr_01.pdf`.
/// A name already carrying the token is returned unchanged.
pub fn insert_document_type(file_name: &str, document_type: &str) -> String {
    if document_type.is_empty() {
        return file_name.to_string();
    }
    let (stem, ext) = split_name(Path::new(file_name));

    let (base, suffix) = match NUMERIC_SUFFIX.find(&stem) {
        Some(m) => (&stem[..m.start()], &stem[m.start()..]),
        None => (stem.as_str(), ""),
    };

    let token = format!("_{}", document_type);
    if base.to_ascii_lowercase().ends_with(&token.to_ascii_lowercase()) {
        return file_name.to_string();
    }
    format!("{}{}{}{}", base, token, suffix, ext)
}

/// Document-type token following the language tag, lower-cased.
///
/// `P123456_France_EN_icrr_01.pdf` gives `icrr`; a name without a token, or
/// whose token is itself a language tag, gives None.
pub fn document_type_token(file_name: &str) -> Option<String> {
    let token = TYPE_TOKEN.captures(file_name)?.get(1)?.as_str();
    if LanguageTag::is_tag(token) {
        return None;
    }
    Some(token.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn test_file_name_grammar() {
        let identified = ClassifiedName::Identified {
            id: id("P123456"),
            country: Some("France".into()),
            lang: LanguageTag::English,
        };
        assert_eq!(identified.file_name(), "P123456_France_EN.pdf");

        let spaced = ClassifiedName::Identified {
            id: id("P123456"),
            country: Some("South Sudan".into()),
            lang: LanguageTag::NonEnglish,
        };
        assert_eq!(spaced.file_name(), "P123456_South_Sudan_NON.pdf");

        let no_country = ClassifiedName::Identified {
            id: id("P123456"),
            country: None,
            lang: LanguageTag::Scanned,
        };
        assert_eq!(no_country.file_name(), "P123456_OCR.pdf");

        let country = ClassifiedName::CountryMatched {
            country: "Cote d'Ivoire".into(),
            lang: LanguageTag::English,
        };
        assert_eq!(country.file_name(), "COUNTRY_Cote d'Ivoire_EN.pdf");

        assert_eq!(ClassifiedName::Scanned.file_name(), "SCAN_OCR_DOCUMENT.pdf");
        assert_eq!(
            ClassifiedName::Unknown { lang: LanguageTag::Unknown }.file_name(),
            "UNKNOWN_UNK.pdf"
        );
    }

    #[test]
    fn test_illegal_characters_replaced() {
        let name = ClassifiedName::CountryMatched {
            country: "Bosnia/Herzegovina: \"BiH\"".into(),
            lang: LanguageTag::English,
        };
        assert_eq!(name.file_name(), "COUNTRY_Bosnia_Herzegovina_ _BiH__EN.pdf");
    }

    #[test]
    fn test_resolve_appends_counter() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("X.pdf");
        assert_eq!(resolve(&target), target);

        std::fs::write(&target, b"a").unwrap();
        assert_eq!(resolve(&target), dir.path().join("X_01.pdf"));

        std::fs::write(dir.path().join("X_01.pdf"), b"b").unwrap();
        assert_eq!(resolve(&target), dir.path().join("X_02.pdf"));
    }

    #[test]
    fn test_reserve_never_repeats() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("UNKNOWN_EN.pdf");
        std::fs::write(&target, b"existing").unwrap();

        let first = reserve(&target).unwrap();
        let second = reserve(&target).unwrap();
        assert_ne!(first, target);
        assert_ne!(second, target);
        assert_ne!(first, second);
        assert_eq!(first.file_name().unwrap(), "UNKNOWN_EN_01.pdf");
        assert_eq!(second.file_name().unwrap(), "UNKNOWN_EN_02.pdf");
        assert_eq!(std::fs::read(&target).unwrap(), b"existing");
    }

    #[test]
    fn test_counter_renumbers_existing_suffix() {
        let dir = TempDir::new().unwrap();
        for name in ["P123456_France_EN_icrr.pdf", "P123456_France_EN_icrr_01.pdf"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let target = dir.path().join("P123456_France_EN_icrr_01.pdf");
        let reserved = reserve(&target).unwrap();
        assert_eq!(reserved.file_name().unwrap(), "P123456_France_EN_icrr_02.pdf");
        assert_eq!(document_type_token("P123456_France_EN_icrr_02.pdf").as_deref(), Some("icrr"));

        // A stem made only of digits keeps them
        let digits = dir.path().join("_2024.pdf");
        std::fs::write(&digits, b"x").unwrap();
        assert_eq!(resolve(&digits), dir.path().join("_2024_01.pdf"));
    }

    #[test]
    fn test_reserve_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b").join("X.pdf");
        assert_eq!(reserve(&target).unwrap(), target);
        assert!(target.exists());
    }

    #[test]
    fn test_concurrent_reservations_are_distinct() {
        let dir = Arc::new(TempDir::new().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dir = Arc::clone(&dir);
                std::thread::spawn(move || reserve(&dir.path().join("SCAN_OCR_DOCUMENT.pdf")).unwrap())
            })
            .collect();

        let names: HashSet<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_insert_document_type() {
        assert_eq!(
            insert_document_type("P123456_France_EN.pdf", "icrr"),
            "P123456_France_EN_icrr.pdf"
        );
        assert_eq!(
            insert_document_type("P123456_France_EN_01.pdf", "icrr"),
            "P123456_France_EN_icrr_01.pdf"
        );
        assert_eq!(
            insert_document_type("P123456_France_EN_icrr_01.pdf", "icrr"),
            "P123456_France_EN_icrr_01.pdf"
        );
        assert_eq!(insert_document_type("SCAN_OCR_DOCUMENT.pdf", ""), "SCAN_OCR_DOCUMENT.pdf");
    }

    #[test]
    fn test_document_type_token() {
        assert_eq!(document_type_token("P123456_France_EN_icrr.pdf").as_deref(), Some("icrr"));
        assert_eq!(document_type_token("COUNTRY_Kenya_NON_PAD_03.pdf").as_deref(), Some("pad"));
        assert_eq!(document_type_token("P123456_France_EN.pdf"), None);
        assert_eq!(document_type_token("P123456_France_EN_01.pdf"), None);
        assert_eq!(document_type_token("COUNTRY_Kenya_EN_OCR.pdf"), None);
    }
}
