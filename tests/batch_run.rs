//! End-to-end runs with a text-file "PDF" extractor and a copying converter.

use docsort::batch::BatchRunner;
use docsort::classify::{Classifier, Detection, LanguageDetector};
use docsort::config::{BatchConfig, ClassifierConfig};
use docsort::convert::DocumentConverter;
use docsort::extract::{PageExtractor, PageText};
use docsort::mapping::{CountryMapping, CountryVariants};
use docsort::reorganize::reorganize_output;
use docsort::{DocsortError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Reads the file as UTF-8, pages separated by form feeds
struct TextPages;

impl PageExtractor for TextPages {
    fn extract(&self, path: &Path, max_pages: usize) -> Result<PageText> {
        let raw = std::fs::read_to_string(path).map_err(|e| DocsortError::io(path, e))?;
        if raw.is_empty() {
            return Ok(PageText::new(vec![String::new()], 1));
        }
        let pages = raw.split('\x0c').map(str::to_string).collect();
        Ok(PageText::from_all_pages(pages, max_pages))
    }
}

/// English when the text reads like English prose
struct WordListDetector;

impl LanguageDetector for WordListDetector {
    fn detect(&self, text: &str) -> Detection {
        if text.contains(" the ") {
            Detection::English
        } else {
            Detection::Other
        }
    }
}

/// Copies the input to `{stem}.pdf`; files named `broken*` always fail
#[derive(Default)]
struct CopyConverter {
    available: bool,
    conversions: AtomicUsize,
    resets: AtomicUsize,
}

impl CopyConverter {
    fn available() -> Self {
        Self {
            available: true,
            ..Default::default()
        }
    }
}

impl DocumentConverter for CopyConverter {
    fn preflight(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(DocsortError::ConverterUnavailable {
                program: "fake".into(),
                message: "not installed".into(),
            })
        }
    }

    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        self.conversions.fetch_add(1, Ordering::SeqCst);
        let stem = input.file_stem().unwrap_or_default().to_string_lossy().to_string();
        if stem.starts_with("broken") {
            return Err(DocsortError::Conversion {
                path: input.to_path_buf(),
                attempts: 1,
                message: "corrupt document".into(),
            });
        }
        let output = out_dir.join(format!("{}.pdf", stem));
        std::fs::copy(input, &output).map_err(|e| DocsortError::io(&output, e))?;
        Ok(output)
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

const ENGLISH_FRANCE: &str = "This is the completion report for project P123456. \
    It describes the results of the operation and the lessons learned by the team \
    during implementation.";
const ENGLISH_KENYA: &str = "This note summarises the findings of the mission to Kenya \
    and the follow-up actions agreed with the ministry of water and sanitation.";
const FRENCH_NO_COUNTRY: &str = "Ce document présente les résultats de l'évaluation \
    finale, les enseignements tirés et les recommandations pour les opérations futures.";

fn mapping() -> CountryMapping {
    [
        ("P123456", "France"),
        ("P654321", "Kenya"),
        ("P111111", "World"),
    ]
    .into_iter()
    .map(|(id, country)| (docsort::classify::Identifier::parse(id).unwrap(), country.to_string()))
    .collect()
}

struct Fixture {
    input: TempDir,
    output: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let input = TempDir::new().unwrap();
        let root = input.path();
        std::fs::create_dir_all(root.join("missions")).unwrap();
        std::fs::write(root.join("completion.docx"), ENGLISH_FRANCE).unwrap();
        std::fs::write(root.join("scan.docx"), "").unwrap();
        std::fs::write(root.join("evaluation.docx"), FRENCH_NO_COUNTRY).unwrap();
        std::fs::write(root.join("broken.docx"), "x").unwrap();
        std::fs::write(root.join("~$completion.docx"), "lock").unwrap();
        std::fs::write(root.join("missions").join("aide.pdf"), ENGLISH_KENYA).unwrap();

        Self {
            input,
            output: TempDir::new().unwrap(),
        }
    }

    fn config(&self) -> BatchConfig {
        let mut config =
            BatchConfig::new(self.input.path().to_path_buf(), self.output.path().to_path_buf());
        config.converter.workers = Some(2);
        config.converter.batch_size = Some(2);
        config.converter.retries = 1;
        config.converter.retry_delay = Duration::ZERO;
        config
    }

    fn runner(&self, config: BatchConfig, converter: Arc<CopyConverter>) -> BatchRunner {
        let variants = CountryVariants::new();
        let classifier = Classifier::new(
            mapping(),
            &variants,
            Box::new(TextPages),
            Box::new(WordListDetector),
            ClassifierConfig::default(),
        );
        BatchRunner::with_parts(config, classifier, converter, variants)
    }
}

#[tokio::test]
async fn test_classify_names_every_document() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.reorganize = false;
    config.reports = false;

    let converter = Arc::new(CopyConverter::available());
    let summary = fixture.runner(config, Arc::clone(&converter)).run().await.unwrap();

    let out = fixture.output.path();
    assert!(out.join("P123456_France_EN.pdf").is_file());
    assert!(out.join("SCAN_OCR_DOCUMENT.pdf").is_file());
    assert!(out.join("UNKNOWN_NON.pdf").is_file());
    // Existing PDFs keep their relative location
    assert!(out.join("missions").join("COUNTRY_Kenya_EN.pdf").is_file());

    assert_eq!(summary.office_documents, 4);
    assert_eq!(summary.converted, 3);
    assert_eq!(summary.conversion_failed, 1);
    assert_eq!(summary.copied, 1);
    assert_eq!(summary.outcomes.get("identified"), Some(&1));
    assert_eq!(summary.sample_identifiers, vec!["P123456".to_string()]);

    // One retry for the broken document
    assert_eq!(converter.conversions.load(Ordering::SeqCst), 5);
    // Reset before and after each of the two batches
    assert_eq!(converter.resets.load(Ordering::SeqCst), 4);

    // The input tree is untouched and no staging directory is left behind
    assert!(fixture.input.path().join("missions").join("aide.pdf").is_file());
    assert!(fixture.input.path().join("completion.docx").is_file());
    let leftovers: Vec<_> = std::fs::read_dir(out)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".docsort-staging"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_full_run_sorts_and_reports() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.document_type = Some("icrr".into());

    let summary = fixture
        .runner(config, Arc::new(CopyConverter::available()))
        .run()
        .await
        .unwrap();

    let out = fixture.output.path();
    let countries = out.join("Country Associated Documents");
    assert!(countries.join("France").join("P123456_France_EN_icrr.pdf").is_file());
    assert!(countries.join("Kenya").join("COUNTRY_Kenya_EN_icrr.pdf").is_file());
    assert!(out.join("Unknown Countries").join("UNKNOWN_NON_icrr.pdf").is_file());
    assert!(out
        .join("Failed Conversions and Renaming")
        .join("SCAN_OCR_DOCUMENT_icrr.pdf")
        .is_file());
    assert!(!out.join("missions").exists());

    let reorganized = summary.reorganize.unwrap();
    assert_eq!(reorganized.country_associated, 2);
    assert_eq!(reorganized.unknown, 1);
    assert_eq!(reorganized.failed, 1);

    let reports = summary.reports.unwrap();
    let master = reports.master.unwrap();
    assert!(master.is_file());
    assert!(master
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("document_inventory_"));
    assert_eq!(reports.country_reports.len(), 2);
    assert_eq!(reports.document_types, vec!["icrr".to_string()]);
}

#[tokio::test]
async fn test_missing_converter_aborts_before_work() {
    let fixture = Fixture::new();
    let converter = Arc::new(CopyConverter::default());

    let result = fixture.runner(fixture.config(), Arc::clone(&converter)).run().await;
    assert!(matches!(result, Err(DocsortError::ConverterUnavailable { .. })));
    assert_eq!(converter.conversions.load(Ordering::SeqCst), 0);

    let placed = walkdir::WalkDir::new(fixture.output.path())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count();
    assert_eq!(placed, 0);
}

#[tokio::test]
async fn test_pdf_only_input_needs_no_converter() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join("aide.pdf"), ENGLISH_KENYA).unwrap();

    let mut config = BatchConfig::new(input.path().to_path_buf(), output.path().to_path_buf());
    config.reorganize = false;
    config.reports = false;
    let fixture = Fixture { input, output };

    let summary = fixture
        .runner(config, Arc::new(CopyConverter::default()))
        .run()
        .await
        .unwrap();
    assert_eq!(summary.copied, 1);
    assert!(fixture.output.path().join("COUNTRY_Kenya_EN.pdf").is_file());
}

#[tokio::test]
async fn test_input_inside_output_is_refused() {
    let output = TempDir::new().unwrap();
    let input = output.path().join("in");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::write(input.join("aide.pdf"), ENGLISH_KENYA).unwrap();

    let config = BatchConfig::new(input.clone(), output.path().to_path_buf());
    let variants = CountryVariants::new();
    let classifier = Classifier::new(
        mapping(),
        &variants,
        Box::new(TextPages),
        Box::new(WordListDetector),
        ClassifierConfig::default(),
    );
    let runner =
        BatchRunner::with_parts(config, classifier, Arc::new(CopyConverter::available()), variants);

    let result = runner.run().await;
    assert!(matches!(result, Err(DocsortError::InvalidConfig(_))));
    assert_eq!(std::fs::read_to_string(input.join("aide.pdf")).unwrap(), ENGLISH_KENYA);
    assert!(!output.path().join("Failed Conversions and Renaming").exists());
}

#[test]
fn test_country_spellings_share_a_folder() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("COUNTRY_Cote_d_Ivoire_EN.pdf"), b"a").unwrap();
    std::fs::write(root.path().join("COUNTRY_Cote d'Ivoire_EN.pdf"), b"b").unwrap();

    let summary = reorganize_output(root.path(), None, &CountryVariants::new()).unwrap();

    let countries = root.path().join("Country Associated Documents");
    let folders: Vec<String> = std::fs::read_dir(&countries)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(folders.len(), 1);
    assert_eq!(summary.consolidated.len(), 1);
    assert_eq!(summary.consolidated[0].spellings.len(), 2);
    assert_eq!(
        std::fs::read_dir(countries.join(&folders[0])).unwrap().count(),
        2
    );
}
