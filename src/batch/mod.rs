//! Batch driver.
//!
//! A run scans the input tree, converts office documents on a bounded worker
//! pool, classifies every resulting PDF (plus the PDFs already in the input)
//! and places it in the output tree at the path mirroring its input location.
//! Reorganization and reports follow when enabled.

use crate::classify::Classifier;
use crate::config::BatchConfig;
use crate::convert::pool::{self, SystemResources};
use crate::convert::{convert_with_retry, DocumentConverter, OfficeConverter};
use crate::error::{DocsortError, Result};
use crate::mapping::{load_mapping_or_empty, ConfiguredColumns, CountryMapping, CountryVariants};
use crate::placement::{place, Ownership};
use crate::reorganize::{reorganize_output, ReorganizeSummary};
use crate::report::{write_reports, ReportSummary};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Office documents are recognised by these extensions
pub const OFFICE_EXTENSIONS: &[&str] = &["doc", "docx"];

/// Identifiers listed in the run summary
const SAMPLE_IDENTIFIERS: usize = 5;

/// Files found under the input root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSet {
    pub office: Vec<PathBuf>,
    pub pdfs: Vec<PathBuf>,
}

impl InputSet {
    pub fn total(&self) -> usize {
        self.office.len() + self.pdfs.len()
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Walk the input tree and split documents by kind.
///
/// Office lock files (`~$name.docx`) are ignored.
pub fn scan_inputs(root: &Path) -> InputSet {
    let mut inputs = InputSet::default();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if name.starts_with("~$") {
            continue;
        }
        let extension = extension_of(entry.path());
        if OFFICE_EXTENSIONS.contains(&extension.as_str()) {
            inputs.office.push(entry.into_path());
        } else if extension == "pdf" {
            inputs.pdfs.push(entry.into_path());
        }
    }

    tracing::info!(
        "[Batch] found {} office documents and {} PDFs under {}",
        inputs.office.len(),
        inputs.pdfs.len(),
        root.display()
    );
    inputs
}

/// What happened to one input document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Classified and placed under its classified name
    Placed {
        path: PathBuf,
        kind: &'static str,
        identifier: Option<String>,
    },
    /// Placed under its original stem after the classified name failed
    Fallback { path: PathBuf },
    ConversionFailed { error: String },
    Skipped { error: String },
}

/// Counters for one run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub office_documents: usize,
    pub existing_pdfs: usize,
    pub converted: usize,
    pub conversion_failed: usize,
    pub copied: usize,
    pub fallback_named: usize,
    pub skipped: usize,
    /// Placed documents per naming outcome (`identified`, `country`, ...)
    pub outcomes: BTreeMap<String, usize>,
    pub unique_identifiers: usize,
    pub sample_identifiers: Vec<String>,
    pub workers: usize,
    pub batch_size: usize,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorganize: Option<ReorganizeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports: Option<ReportSummary>,
    #[serde(skip)]
    identifiers: BTreeSet<String>,
}

impl RunSummary {
    fn record(&mut self, outcome: &DocumentOutcome, converted: bool) {
        match outcome {
            DocumentOutcome::Placed { kind, identifier, .. } => {
                if converted {
                    self.converted += 1;
                } else {
                    self.copied += 1;
                }
                *self.outcomes.entry(kind.to_string()).or_insert(0) += 1;
                if let Some(id) = identifier {
                    self.identifiers.insert(id.clone());
                }
            }
            DocumentOutcome::Fallback { .. } => {
                if converted {
                    self.converted += 1;
                } else {
                    self.copied += 1;
                }
                self.fallback_named += 1;
            }
            DocumentOutcome::ConversionFailed { .. } => self.conversion_failed += 1,
            DocumentOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    fn finish(&mut self, started: Instant) {
        self.unique_identifiers = self.identifiers.len();
        self.sample_identifiers = self
            .identifiers
            .iter()
            .take(SAMPLE_IDENTIFIERS)
            .cloned()
            .collect();
        self.elapsed_secs = started.elapsed().as_secs_f64();
    }

    /// Write the summary as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            DocsortError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(path, json).map_err(|e| DocsortError::io(path, e))
    }

    pub fn log(&self) {
        tracing::info!(
            "[Batch] converted {}, conversion failures {}, copied {}, fallback names {}, skipped {}",
            self.converted,
            self.conversion_failed,
            self.copied,
            self.fallback_named,
            self.skipped
        );
        for (kind, count) in &self.outcomes {
            tracing::info!("[Batch]   {}: {}", kind, count);
        }
        if !self.sample_identifiers.is_empty() {
            tracing::info!(
                "[Batch] {} unique project identifiers, e.g. {}",
                self.unique_identifiers,
                self.sample_identifiers.join(", ")
            );
        }
    }
}

/// Shared state of the conversion workers
struct WorkerContext {
    classifier: Arc<Classifier>,
    converter: Arc<dyn DocumentConverter>,
    input_root: PathBuf,
    output_root: PathBuf,
    staging: PathBuf,
    retries: u32,
    retry_delay: Duration,
}

impl WorkerContext {
    /// Output directory mirroring the input file's relative location
    fn target_dir(&self, input: &Path) -> PathBuf {
        let relative = input
            .parent()
            .and_then(|parent| parent.strip_prefix(&self.input_root).ok())
            .unwrap_or_else(|| Path::new(""));
        self.output_root.join(relative)
    }

    /// Classify a PDF and place it; on failure fall back to the original stem
    fn classify_and_place(
        &self,
        pdf: &Path,
        original: &Path,
        ownership: Ownership,
    ) -> DocumentOutcome {
        let original_name = original
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let target_dir = self.target_dir(original);
        let classification = self.classifier.classify(pdf, &original_name);

        match place(pdf, &target_dir.join(classification.file_name()), ownership) {
            Ok(path) => {
                tracing::info!(
                    "[Batch] {} -> {}",
                    original_name,
                    path.file_name().unwrap_or_default().to_string_lossy()
                );
                DocumentOutcome::Placed {
                    path,
                    kind: classification.name.kind(),
                    identifier: classification.identifier.map(|id| id.to_string()),
                }
            }
            Err(e) => {
                tracing::error!("[Batch] could not place {} as classified: {}", original_name, e);
                let stem = original.file_stem().unwrap_or_default().to_string_lossy();
                match place(pdf, &target_dir.join(format!("{}.pdf", stem)), ownership) {
                    Ok(path) => DocumentOutcome::Fallback { path },
                    Err(e) => DocumentOutcome::Skipped {
                        error: e.to_string(),
                    },
                }
            }
        }
    }

    /// Convert one office document in its own staging directory, then place it
    fn process_office(&self, input: &Path) -> DocumentOutcome {
        let staging = match tempfile::Builder::new()
            .prefix("doc")
            .tempdir_in(&self.staging)
        {
            Ok(dir) => dir,
            Err(e) => {
                return DocumentOutcome::ConversionFailed {
                    error: DocsortError::io(&self.staging, e).to_string(),
                }
            }
        };

        let pdf = match convert_with_retry(
            self.converter.as_ref(),
            input,
            staging.path(),
            self.retries,
            self.retry_delay,
        ) {
            Ok(pdf) => pdf,
            Err(e) => {
                tracing::error!("[Batch] {}", e);
                return DocumentOutcome::ConversionFailed {
                    error: e.to_string(),
                };
            }
        };

        self.classify_and_place(&pdf, input, Ownership::Owned)
    }
}

/// Drives one batch run end to end
pub struct BatchRunner {
    config: BatchConfig,
    classifier: Arc<Classifier>,
    converter: Arc<dyn DocumentConverter>,
    variants: CountryVariants,
}

impl BatchRunner {
    /// Load mapping and variants, and use PDF extraction, whatlang and soffice
    pub fn new(config: BatchConfig) -> Self {
        let variants = CountryVariants::load_or_empty(config.variants.as_deref());
        let mapping = match &config.mapping {
            Some(source) => {
                let columns =
                    ConfiguredColumns::new(source.id_column.clone(), source.country_column.clone());
                load_mapping_or_empty(Some(source), &columns)
            }
            None => CountryMapping::new(),
        };

        let classifier = Classifier::with_defaults(mapping, &variants, config.classifier.clone())
            .use_identifier(config.use_identifier);
        let converter = OfficeConverter::new(&config.converter);

        Self::with_parts(config, classifier, Arc::new(converter), variants)
    }

    /// Assemble from explicit collaborators
    pub fn with_parts(
        config: BatchConfig,
        classifier: Classifier,
        converter: Arc<dyn DocumentConverter>,
        variants: CountryVariants,
    ) -> Self {
        Self {
            config,
            classifier: Arc::new(classifier),
            converter,
            variants,
        }
    }

    pub fn mapping(&self) -> &CountryMapping {
        self.classifier.mapping()
    }

    /// Run every enabled stage
    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        self.config.validate()?;
        let output_root = &self.config.output_root;
        std::fs::create_dir_all(output_root).map_err(|e| DocsortError::io(output_root, e))?;

        let inputs = scan_inputs(&self.config.input_root);
        let mut summary = RunSummary {
            office_documents: inputs.office.len(),
            existing_pdfs: inputs.pdfs.len(),
            ..Default::default()
        };

        if !inputs.office.is_empty() {
            // Fail fast before any document is touched
            self.converter.preflight()?;
        }

        let staging = tempfile::Builder::new()
            .prefix(".docsort-staging")
            .tempdir_in(output_root)
            .map_err(|e| DocsortError::io(output_root, e))?;

        let context = Arc::new(WorkerContext {
            classifier: Arc::clone(&self.classifier),
            converter: Arc::clone(&self.converter),
            input_root: self.config.input_root.clone(),
            output_root: output_root.clone(),
            staging: staging.path().to_path_buf(),
            retries: self.config.converter.retries,
            retry_delay: self.config.converter.retry_delay,
        });

        self.convert_office(&inputs.office, &context, &mut summary).await;
        self.copy_pdfs(&inputs.pdfs, &context, &mut summary).await;

        if let Err(e) = staging.close() {
            tracing::warn!("[Batch] could not remove staging directory: {}", e);
        }
        summary.finish(started);
        summary.log();

        if self.config.reorganize {
            summary.reorganize = Some(reorganize_output(
                output_root,
                self.config.document_type.as_deref(),
                &self.variants,
            )?);
        }
        if self.config.reports {
            let today = chrono::Local::now().date_naive();
            summary.reports = Some(write_reports(output_root, self.mapping(), today)?);
        }

        summary.elapsed_secs = started.elapsed().as_secs_f64();
        Ok(summary)
    }

    async fn convert_office(
        &self,
        documents: &[PathBuf],
        context: &Arc<WorkerContext>,
        summary: &mut RunSummary,
    ) {
        if documents.is_empty() {
            return;
        }

        let resources = SystemResources::snapshot();
        let workers = self.config.converter.workers.unwrap_or_else(|| {
            pool::optimal_worker_count(resources.cpus, resources.total_memory, documents.len())
        });
        let batch_size = self
            .config
            .converter
            .batch_size
            .unwrap_or_else(|| pool::optimal_batch_size(resources.total_memory, workers));
        summary.workers = workers;
        summary.batch_size = batch_size;

        let batch_count = documents.len().div_ceil(batch_size);
        tracing::info!(
            "[Batch] converting {} documents with {} workers in {} batches of up to {}",
            documents.len(),
            workers,
            batch_count,
            batch_size
        );

        let job = {
            let context = Arc::clone(context);
            Arc::new(move |input: PathBuf| context.process_office(&input))
        };

        for (index, batch) in documents.chunks(batch_size).enumerate() {
            tracing::info!(
                "[Batch] batch {}/{} ({} files)",
                index + 1,
                batch_count,
                batch.len()
            );
            self.converter.reset();
            pool::wait_for_memory().await;

            let results = pool::run_blocking_pool(batch.to_vec(), workers, Arc::clone(&job)).await;
            for (input, result) in batch.iter().zip(results) {
                let outcome = result.unwrap_or_else(|| DocumentOutcome::ConversionFailed {
                    error: format!("worker crashed on {}", input.display()),
                });
                summary.record(&outcome, true);
            }

            self.converter.reset();
        }
    }

    /// Existing PDFs are classified one at a time and copied, never moved
    async fn copy_pdfs(&self, pdfs: &[PathBuf], context: &Arc<WorkerContext>, summary: &mut RunSummary) {
        if pdfs.is_empty() {
            return;
        }
        tracing::info!("[Batch] copying {} existing PDFs", pdfs.len());

        let job = {
            let context = Arc::clone(context);
            Arc::new(move |pdf: PathBuf| context.classify_and_place(&pdf, &pdf, Ownership::Borrowed))
        };

        let results = pool::run_blocking_pool(pdfs.to_vec(), 1, job).await;
        for (pdf, result) in pdfs.iter().zip(results) {
            let outcome = result.unwrap_or_else(|| DocumentOutcome::Skipped {
                error: format!("worker crashed on {}", pdf.display()),
            });
            summary.record(&outcome, false);
        }
    }
}
