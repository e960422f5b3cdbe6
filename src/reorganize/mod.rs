//! Output tree reorganization.
//!
//! Sorts the flat classification output into three bucket folders, groups the
//! country bucket by country, and finally splits country folders holding more
//! than one document type into per-type subfolders. Bucket membership depends
//! only on the filename, so running the pass twice changes nothing.

use crate::error::{DocsortError, Result};
use crate::mapping::{consolidation_key, normalize_country_name, CountryVariants};
use crate::naming::{document_type_token, insert_document_type, COUNTRY_PREFIX, UNKNOWN_PREFIX};
use crate::placement::{place, Ownership};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

static IDENTIFIER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^P\d{6}").unwrap());
static COUNTRY_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:P\d{6}|COUNTRY)_(.+?)_(?:EN|NON|UNK|OCR)(?:_[A-Za-z]+)?(?:_\d+)?\.(?i:pdf)$")
        .unwrap()
});

/// Top-level folders of a reorganized output root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Bucket {
    CountryAssociated,
    UnknownCountry,
    Failed,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::CountryAssociated, Bucket::UnknownCountry, Bucket::Failed];

    pub fn folder_name(&self) -> &'static str {
        match self {
            Bucket::CountryAssociated => "Country Associated Documents",
            Bucket::UnknownCountry => "Unknown Countries",
            Bucket::Failed => "Failed Conversions and Renaming",
        }
    }

    /// Bucket for a filename. Scanned documents land in `Failed`.
    pub fn for_file_name(file_name: &str) -> Bucket {
        if file_name.starts_with(COUNTRY_PREFIX) || IDENTIFIER_PREFIX.is_match(file_name) {
            Bucket::CountryAssociated
        } else if file_name.starts_with(UNKNOWN_PREFIX) {
            Bucket::UnknownCountry
        } else {
            Bucket::Failed
        }
    }

    pub fn is_bucket_folder(name: &str) -> bool {
        Bucket::ALL.iter().any(|b| b.folder_name() == name)
    }
}

/// Several spellings merged into one country folder
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedCountry {
    pub country: String,
    pub spellings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorganizeSummary {
    pub country_associated: usize,
    pub unknown: usize,
    pub failed: usize,
    /// Country folders that received files in this pass
    pub countries: usize,
    pub consolidated: Vec<ConsolidatedCountry>,
    /// Country-bucket files whose name carries no parseable country
    pub unparsed: usize,
    /// Files moved into document-type subfolders
    pub typed: usize,
    pub errors: usize,
}

impl ReorganizeSummary {
    pub fn total(&self) -> usize {
        self.country_associated + self.unknown + self.failed
    }
}

/// Folder name for a country: spaces and unsafe characters become `_`
pub fn safe_folder_name(country: &str) -> String {
    country
        .chars()
        .map(|c| match c {
            ' ' | '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' | ',' => '_',
            c => c,
        })
        .collect()
}

/// Raw country segment of a country-bucket filename
pub fn country_from_file_name(file_name: &str) -> Option<&str> {
    COUNTRY_FILE
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// PDFs under the root that are not yet in a bucket folder
fn collect_unsorted(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !(is_hidden(&name) || (entry.depth() == 1 && Bucket::is_bucket_folder(&name)))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_pdf(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Regular PDF files directly inside a folder
fn pdfs_in(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(|e| DocsortError::io(folder, e))? {
        let path = entry.map_err(|e| DocsortError::io(folder, e))?.path();
        if path.is_file() && is_pdf(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Visible subfolder names of a folder
fn subfolders_in(folder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(|e| DocsortError::io(folder, e))? {
        let entry = entry.map_err(|e| DocsortError::io(folder, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_dir() && !is_hidden(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Sort an output root into bucket, country and document-type folders
pub fn reorganize_output(
    root: &Path,
    document_type: Option<&str>,
    variants: &CountryVariants,
) -> Result<ReorganizeSummary> {
    if !root.is_dir() {
        return Err(DocsortError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "output directory does not exist"),
        ));
    }

    let mut summary = ReorganizeSummary::default();
    for bucket in Bucket::ALL {
        let folder = root.join(bucket.folder_name());
        std::fs::create_dir_all(&folder).map_err(|e| DocsortError::io(&folder, e))?;
    }

    let files = collect_unsorted(root);
    tracing::info!("[Reorganize] found {} PDF files to organize", files.len());

    for file in files {
        let mut name = file_name_of(&file);
        if let Some(doc_type) = document_type {
            name = insert_document_type(&name, doc_type);
        }

        let bucket = Bucket::for_file_name(&name);
        let target = root.join(bucket.folder_name()).join(&name);
        match place(&file, &target, Ownership::Owned) {
            Ok(_) => match bucket {
                Bucket::CountryAssociated => summary.country_associated += 1,
                Bucket::UnknownCountry => summary.unknown += 1,
                Bucket::Failed => summary.failed += 1,
            },
            Err(e) => {
                tracing::error!("[Reorganize] could not move {}: {}", file.display(), e);
                summary.errors += 1;
            }
        }
    }

    tracing::info!(
        "[Reorganize] {} country associated, {} unknown, {} failed",
        summary.country_associated,
        summary.unknown,
        summary.failed
    );

    let country_root = root.join(Bucket::CountryAssociated.folder_name());
    organize_by_country(&country_root, variants, &mut summary)?;

    for folder in subfolders_in(&country_root)? {
        organize_by_type(&country_root.join(folder), &mut summary)?;
    }

    remove_empty_dirs(root);
    Ok(summary)
}

struct CountryGroup {
    spellings: BTreeSet<String>,
    files: Vec<PathBuf>,
}

/// Name with the most non-whitespace characters; ties go to the smaller string
fn richest_spelling<'a>(spellings: impl Iterator<Item = &'a String>) -> String {
    spellings
        .map(|s| normalize_country_name(s))
        .max_by(|a, b| {
            let richness = |s: &str| s.chars().filter(|c| !c.is_whitespace()).count();
            richness(a).cmp(&richness(b)).then_with(|| b.cmp(a))
        })
        .unwrap_or_default()
}

/// Move country-bucket files into one folder per country
fn organize_by_country(
    country_root: &Path,
    variants: &CountryVariants,
    summary: &mut ReorganizeSummary,
) -> Result<()> {
    let files = pdfs_in(country_root)?;
    if files.is_empty() {
        return Ok(());
    }

    // consolidation key -> display name of an existing folder
    let existing: HashMap<String, String> = subfolders_in(country_root)?
        .into_iter()
        .map(|folder| (consolidation_key(&folder), folder.replace('_', " ")))
        .collect();

    let mut groups: BTreeMap<String, CountryGroup> = BTreeMap::new();
    for file in files {
        let name = file_name_of(&file);
        let Some(raw) = country_from_file_name(&name) else {
            tracing::debug!("[Reorganize] no country in {}, leaving in place", name);
            summary.unparsed += 1;
            continue;
        };

        let resolved = variants.canonical(raw).unwrap_or(raw);
        let group = groups
            .entry(consolidation_key(resolved))
            .or_insert_with(|| CountryGroup {
                spellings: BTreeSet::new(),
                files: Vec::new(),
            });
        group.spellings.insert(raw.to_string());
        group.files.push(file);
    }

    tracing::info!("[Reorganize] identified {} countries with documents", groups.len());

    for (key, group) in groups {
        // An existing folder keeps its name so re-runs never split a country
        let country_name = existing
            .get(&key)
            .cloned()
            .or_else(|| {
                group
                    .spellings
                    .iter()
                    .find_map(|s| variants.canonical(s))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| richest_spelling(group.spellings.iter()));

        if group.spellings.len() > 1 {
            tracing::info!(
                "[Reorganize] consolidated country variants {:?} -> '{}'",
                group.spellings,
                country_name
            );
            summary.consolidated.push(ConsolidatedCountry {
                country: country_name.clone(),
                spellings: group.spellings.iter().cloned().collect(),
            });
        }

        let folder = country_root.join(safe_folder_name(&country_name));
        let mut moved = 0;
        for file in &group.files {
            match place(file, &folder.join(file_name_of(file)), Ownership::Owned) {
                Ok(_) => moved += 1,
                Err(e) => {
                    tracing::error!("[Reorganize] could not move {} to {}: {}", file.display(), folder.display(), e);
                    summary.errors += 1;
                }
            }
        }
        if moved > 0 {
            summary.countries += 1;
        }
        tracing::debug!("[Reorganize] '{}' received {} documents", country_name, moved);
    }
    Ok(())
}

/// Split a country folder by document type when it holds more than one type
fn organize_by_type(folder: &Path, summary: &mut ReorganizeSummary) -> Result<()> {
    let typed: Vec<(PathBuf, String)> = pdfs_in(folder)?
        .into_iter()
        .filter_map(|path| {
            let doc_type = document_type_token(&file_name_of(&path))?;
            Some((path, doc_type))
        })
        .collect();

    let mut types: BTreeSet<String> = typed.iter().map(|(_, t)| t.clone()).collect();
    types.extend(
        subfolders_in(folder)?
            .into_iter()
            .filter(|name| name.chars().all(|c| c.is_ascii_alphabetic()))
            .map(|name| name.to_ascii_lowercase()),
    );

    if types.len() <= 1 {
        return Ok(());
    }

    for (path, doc_type) in typed {
        let target = folder
            .join(doc_type.to_ascii_uppercase())
            .join(file_name_of(&path));
        match place(&path, &target, Ownership::Owned) {
            Ok(_) => summary.typed += 1,
            Err(e) => {
                tracing::error!("[Reorganize] could not move {} into type folder: {}", path.display(), e);
                summary.errors += 1;
            }
        }
    }
    Ok(())
}

/// Drop directories left empty under the root, bucket folders excepted
fn remove_empty_dirs(root: &Path) {
    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| !(e.depth() == 1 && Bucket::is_bucket_folder(&e.file_name().to_string_lossy())))
        .filter(|e| !is_hidden(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();

    for dir in dirs {
        // Fails harmlessly on non-empty directories
        let _ = std::fs::remove_dir(&dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
    }

    fn names_in(folder: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(folder)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_bucket_for_file_name() {
        assert_eq!(Bucket::for_file_name("P123456_France_EN.pdf"), Bucket::CountryAssociated);
        assert_eq!(Bucket::for_file_name("P123456_EN.pdf"), Bucket::CountryAssociated);
        assert_eq!(Bucket::for_file_name("COUNTRY_Kenya_EN.pdf"), Bucket::CountryAssociated);
        assert_eq!(Bucket::for_file_name("UNKNOWN_NON.pdf"), Bucket::UnknownCountry);
        assert_eq!(Bucket::for_file_name("SCAN_OCR_DOCUMENT.pdf"), Bucket::Failed);
        assert_eq!(Bucket::for_file_name("memo.pdf"), Bucket::Failed);
        assert_eq!(Bucket::for_file_name("P12345_x.pdf"), Bucket::Failed);
    }

    #[test]
    fn test_country_from_file_name() {
        assert_eq!(country_from_file_name("P123456_France_EN.pdf"), Some("France"));
        assert_eq!(country_from_file_name("P123456_South_Sudan_NON_icrr_02.pdf"), Some("South_Sudan"));
        assert_eq!(country_from_file_name("COUNTRY_Cote d'Ivoire_EN.pdf"), Some("Cote d'Ivoire"));
        assert_eq!(country_from_file_name("P123456_EN.pdf"), None);
        assert_eq!(country_from_file_name("UNKNOWN_EN.pdf"), None);
    }

    #[test]
    fn test_safe_folder_name() {
        assert_eq!(safe_folder_name("Cote D'Ivoire"), "Cote_D'Ivoire");
        assert_eq!(safe_folder_name("Korea, Republic of"), "Korea__Republic_of");
    }

    #[test]
    fn test_buckets_and_country_folders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("P123456_France_EN.pdf"));
        touch(&root.join("sub").join("COUNTRY_Kenya_NON.pdf"));
        touch(&root.join("UNKNOWN_EN.pdf"));
        touch(&root.join("SCAN_OCR_DOCUMENT.pdf"));
        touch(&root.join("P654321_EN.pdf"));

        let summary = reorganize_output(root, None, &CountryVariants::new()).unwrap();
        assert_eq!(summary.country_associated, 3);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.countries, 2);
        assert_eq!(summary.unparsed, 1);

        let country_root = root.join("Country Associated Documents");
        assert!(country_root.join("France").join("P123456_France_EN.pdf").exists());
        assert!(country_root.join("Kenya").join("COUNTRY_Kenya_NON.pdf").exists());
        assert!(country_root.join("P654321_EN.pdf").exists());
        assert!(root.join("Unknown Countries").join("UNKNOWN_EN.pdf").exists());
        assert!(root
            .join("Failed Conversions and Renaming")
            .join("SCAN_OCR_DOCUMENT.pdf")
            .exists());
        assert!(!root.join("sub").exists());
    }

    #[test]
    fn test_spelling_variants_share_a_folder() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("COUNTRY_Cote_d_Ivoire_EN.pdf"));
        touch(&root.join("COUNTRY_Cote d'Ivoire_EN.pdf"));

        let summary = reorganize_output(root, None, &CountryVariants::new()).unwrap();
        assert_eq!(summary.countries, 1);
        assert_eq!(summary.consolidated.len(), 1);
        assert_eq!(summary.consolidated[0].spellings.len(), 2);

        let country_root = root.join("Country Associated Documents");
        assert_eq!(names_in(&country_root), vec!["Cote_D'Ivoire".to_string()]);
        assert_eq!(names_in(&country_root.join("Cote_D'Ivoire")).len(), 2);
    }

    #[test]
    fn test_variants_dictionary_picks_display_name() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("COUNTRY_Ivory Coast_EN.pdf"));
        touch(&root.join("P123456_Cote_d'Ivoire_EN.pdf"));

        let variants = CountryVariants::from_pairs([("Ivory Coast", "Cote d'Ivoire")]);
        reorganize_output(root, None, &variants).unwrap();

        let country_root = root.join("Country Associated Documents");
        assert_eq!(names_in(&country_root), vec!["Cote_d'Ivoire".to_string()]);
    }

    #[test]
    fn test_existing_folder_kept_when_variants_added() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("COUNTRY_Cote d'Ivoire_EN.pdf"));
        reorganize_output(root, None, &CountryVariants::new()).unwrap();

        let country_root = root.join("Country Associated Documents");
        let first = names_in(&country_root);
        assert_eq!(first.len(), 1);

        touch(&root.join("COUNTRY_Ivory Coast_EN.pdf"));
        let variants = CountryVariants::from_pairs([("Ivory Coast", "Cote d'Ivoire")]);
        reorganize_output(root, None, &variants).unwrap();

        assert_eq!(names_in(&country_root), first);
        assert_eq!(names_in(&country_root.join(&first[0])).len(), 2);
    }

    #[test]
    fn test_repeated_batches_keep_single_counter() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for _ in 0..2 {
            touch(&root.join("P123456_France_EN.pdf"));
            touch(&root.join("P123456_France_EN_01.pdf"));
            reorganize_output(root, Some("icrr"), &CountryVariants::new()).unwrap();
        }

        let france = root.join("Country Associated Documents").join("France");
        assert_eq!(
            names_in(&france),
            vec![
                "P123456_France_EN_icrr.pdf".to_string(),
                "P123456_France_EN_icrr_01.pdf".to_string(),
                "P123456_France_EN_icrr_02.pdf".to_string(),
                "P123456_France_EN_icrr_03.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_document_type_inserted_and_split() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("P123456_France_EN.pdf"));
        touch(&root.join("P123456_France_EN_01.pdf"));

        reorganize_output(root, Some("icrr"), &CountryVariants::new()).unwrap();
        let france = root.join("Country Associated Documents").join("France");
        assert_eq!(
            names_in(&france),
            vec!["P123456_France_EN_icrr.pdf".to_string(), "P123456_France_EN_icrr_01.pdf".to_string()]
        );

        // A second batch with another type splits the folder
        touch(&root.join("P123456_France_NON.pdf"));
        let summary = reorganize_output(root, Some("pad"), &CountryVariants::new()).unwrap();
        assert_eq!(summary.typed, 3);
        assert_eq!(names_in(&france), vec!["ICRR".to_string(), "PAD".to_string()]);
        assert_eq!(names_in(&france.join("PAD")), vec!["P123456_France_NON_pad.pdf".to_string()]);
        assert_eq!(names_in(&france.join("ICRR")).len(), 2);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("COUNTRY_Kenya_EN.pdf"));
        touch(&root.join("UNKNOWN_UNK.pdf"));

        reorganize_output(root, Some("icrr"), &CountryVariants::new()).unwrap();
        let second = reorganize_output(root, Some("icrr"), &CountryVariants::new()).unwrap();
        assert_eq!(second.total(), 0);
        assert!(root
            .join("Country Associated Documents")
            .join("Kenya")
            .join("COUNTRY_Kenya_EN_icrr.pdf")
            .exists());
        assert!(root.join("Unknown Countries").join("UNKNOWN_UNK_icrr.pdf").exists());
    }
}
