//! Command line interface.

use crate::batch::BatchRunner;
use crate::config::{sanitize_document_type, BatchConfig, ColumnSelector, MappingSource};
use crate::error::{DocsortError, Result};
use crate::mapping::{load_mapping_or_empty, ConfiguredColumns, CountryMapping, CountryVariants};
use crate::reorganize::reorganize_output;
use crate::report::write_reports;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Classify project documents and file them into a country folder tree
#[derive(Parser, Debug)]
#[command(name = "docsort")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert, classify and place documents, then reorganize and report
    Run(RunArgs),
    /// Convert, classify and place documents only
    Classify(RunArgs),
    /// Sort an existing output folder into bucket and country folders
    Reorganize {
        /// Output folder produced by a previous run
        #[arg(value_name = "DIR")]
        output: PathBuf,

        #[command(flatten)]
        labels: LabelArgs,
    },
    /// Regenerate inventory workbooks for an organized output folder
    Report {
        /// Output folder produced by a previous run
        #[arg(value_name = "DIR")]
        output: PathBuf,

        #[command(flatten)]
        mapping: MappingArgs,
    },
}

/// Project -> country spreadsheet
#[derive(Args, Debug, Clone)]
pub struct MappingArgs {
    /// Spreadsheet (.xlsx, .xls, .ods, .csv) mapping project IDs to countries
    #[arg(long, value_name = "FILE", env = "DOCSORT_MAPPING")]
    pub mapping: Option<PathBuf>,

    /// Column with project IDs: header name or zero-based index
    #[arg(long, default_value = "0", env = "DOCSORT_ID_COLUMN")]
    pub id_column: ColumnSelector,

    /// Column with country names: header name or zero-based index
    #[arg(long, default_value = "1", env = "DOCSORT_COUNTRY_COLUMN")]
    pub country_column: ColumnSelector,
}

impl MappingArgs {
    pub fn source(&self) -> Option<MappingSource> {
        self.mapping.as_ref().map(|path| MappingSource {
            path: path.clone(),
            id_column: self.id_column.clone(),
            country_column: self.country_column.clone(),
        })
    }

    /// Load the mapping, empty when absent or unreadable
    pub fn load(&self) -> CountryMapping {
        let source = self.source();
        let columns = ConfiguredColumns::new(self.id_column.clone(), self.country_column.clone());
        load_mapping_or_empty(source.as_ref(), &columns)
    }
}

/// Country spelling variants and document-type tag
#[derive(Args, Debug, Clone)]
pub struct LabelArgs {
    /// JSON object of country spelling variants to canonical names
    #[arg(long, value_name = "FILE", env = "DOCSORT_VARIANTS")]
    pub variants: Option<PathBuf>,

    /// Document type appended to every filename (letters only, e.g. icrr)
    #[arg(long, value_name = "TYPE", env = "DOCSORT_DOCUMENT_TYPE")]
    pub document_type: Option<String>,
}

impl LabelArgs {
    pub fn document_type(&self) -> Option<String> {
        let raw = self.document_type.as_deref()?;
        let cleaned = sanitize_document_type(raw);
        if cleaned.is_none() {
            tracing::warn!("[Cli] ignoring document type {:?}: no letters left", raw);
        }
        cleaned
    }

    pub fn load_variants(&self) -> CountryVariants {
        CountryVariants::load_or_empty(self.variants.as_deref())
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Folder with the Word documents and PDFs to classify
    #[arg(value_name = "INPUT", env = "DOCSORT_INPUT")]
    pub input: PathBuf,

    /// Folder receiving the classified PDFs (must not be inside INPUT)
    #[arg(value_name = "OUTPUT", env = "DOCSORT_OUTPUT")]
    pub output: PathBuf,

    #[command(flatten)]
    pub mapping: MappingArgs,

    #[command(flatten)]
    pub labels: LabelArgs,

    /// Parallel conversions (auto-sized from CPUs and memory when omitted)
    #[arg(short, long, env = "DOCSORT_WORKERS")]
    pub workers: Option<usize>,

    /// Documents per conversion batch (auto-sized when omitted)
    #[arg(long, env = "DOCSORT_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Office converter executable
    #[arg(long, default_value = "soffice", env = "DOCSORT_CONVERTER")]
    pub converter: String,

    /// Extra conversion attempts after a failure
    #[arg(long, default_value_t = 2, env = "DOCSORT_RETRIES")]
    pub retries: u32,

    /// Seconds before a single conversion is killed
    #[arg(long, default_value_t = 300, env = "DOCSORT_TIMEOUT")]
    pub timeout: u64,

    /// Classify by language and country text only
    #[arg(long, env = "DOCSORT_NO_IDENTIFIER")]
    pub no_identifier: bool,

    /// Do not force-kill converter processes between batches
    #[arg(long, env = "DOCSORT_NO_RESET")]
    pub no_reset: bool,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "FILE", env = "DOCSORT_SUMMARY_JSON")]
    pub summary_json: Option<PathBuf>,
}

impl RunArgs {
    /// Build the batch configuration; `full` enables reorganization and reports
    pub fn to_config(&self, full: bool) -> BatchConfig {
        let mut config = BatchConfig::new(self.input.clone(), self.output.clone());
        config.mapping = self.mapping.source();
        config.variants = self.labels.variants.clone();
        config.document_type = self.labels.document_type();
        config.use_identifier = !self.no_identifier;
        config.reorganize = full;
        config.reports = full;

        config.converter.program = self.converter.clone();
        config.converter.retries = self.retries;
        config.converter.timeout = std::time::Duration::from_secs(self.timeout);
        config.converter.workers = self.workers;
        config.converter.batch_size = self.batch_size;
        if self.no_reset {
            config.converter.reset_process = None;
        }
        config
    }
}

fn require_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(DocsortError::InvalidConfig(format!(
            "not a directory: {}",
            path.display()
        )))
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => run_batch(&args, true).await,
            Commands::Classify(args) => run_batch(&args, false).await,
            Commands::Reorganize { output, labels } => {
                require_dir(&output)?;
                let summary = reorganize_output(
                    &output,
                    labels.document_type().as_deref(),
                    &labels.load_variants(),
                )?;
                tracing::info!("[Cli] reorganized {} files", summary.total());
                Ok(())
            }
            Commands::Report { output, mapping } => {
                require_dir(&output)?;
                let today = chrono::Local::now().date_naive();
                let summary = write_reports(&output, &mapping.load(), today)?;
                tracing::info!(
                    "[Cli] {} documents reported in {} country workbooks",
                    summary.documents,
                    summary.country_reports.len()
                );
                Ok(())
            }
        }
    }
}

async fn run_batch(args: &RunArgs, full: bool) -> Result<()> {
    let runner = BatchRunner::new(args.to_config(full));
    let summary = runner.run().await?;

    if let Some(path) = &args.summary_json {
        summary.write_json(path)?;
        tracing::info!("[Cli] summary written to {}", path.display());
    }
    Ok(())
}
