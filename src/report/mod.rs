//! Inventory workbooks.
//!
//! Reports are projections of the reorganized folder tree and are rebuilt from
//! scratch on every run:
//!
//! - `document_inventory_{date}.xlsx` at the output root, one row per project
//! - `{Country}_documents_{date}.xlsx` inside each country folder

mod workbook;

use crate::classify::identifier::Identifier;
use crate::error::{DocsortError, Result};
use crate::mapping::CountryMapping;
use crate::naming::document_type_token;
use crate::reorganize::Bucket;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use workbook::{Cell, Table};

static IDENTIFIER_IN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"P\d{6}").unwrap());

/// Type recorded for documents whose name and folder carry none
pub const UNKNOWN_TYPE: &str = "unknown";

/// Note on master rows for projects missing from the mapping
pub const NOT_IN_PORTFOLIO: &str = "Not in original portfolio";

/// One PDF found in a country folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub identifier: Option<Identifier>,
    pub document_type: String,
    pub file_name: String,
}

impl DocumentRecord {
    /// Derive identifier and type from a filename and its type subfolder
    pub fn from_file_name(file_name: &str, subfolder: Option<&str>) -> Self {
        let identifier = IDENTIFIER_IN_NAME
            .find(file_name)
            .and_then(|m| Identifier::parse(m.as_str()));
        let document_type = document_type_token(file_name)
            .or_else(|| subfolder.map(|s| s.to_ascii_lowercase()))
            .unwrap_or_else(|| UNKNOWN_TYPE.to_string());
        Self {
            identifier,
            document_type,
            file_name: file_name.to_string(),
        }
    }
}

/// Documents of one country folder
#[derive(Debug, Clone, Default)]
pub struct CountryInventory {
    /// Folder name on disk
    pub folder: String,
    /// Display name (underscores as spaces)
    pub country: String,
    pub documents: Vec<DocumentRecord>,
}

/// Everything found under the country bucket
#[derive(Debug, Clone, Default)]
pub struct TreeInventory {
    pub countries: Vec<CountryInventory>,
}

impl TreeInventory {
    pub fn document_count(&self) -> usize {
        self.countries.iter().map(|c| c.documents.len()).sum()
    }

    /// All document types, sorted
    pub fn document_types(&self) -> BTreeSet<String> {
        self.countries
            .iter()
            .flat_map(|c| c.documents.iter().map(|d| d.document_type.clone()))
            .collect()
    }
}

fn pdf_names(folder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(|e| DocsortError::io(folder, e))? {
        let entry = entry.map_err(|e| DocsortError::io(folder, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_file() && name.to_ascii_lowercase().ends_with(".pdf") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn dir_names(folder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(|e| DocsortError::io(folder, e))? {
        let entry = entry.map_err(|e| DocsortError::io(folder, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_dir() && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Read the country bucket: country folders, their PDFs and one level of type
/// subfolders. A missing bucket gives an empty inventory.
pub fn scan_tree(root: &Path) -> Result<TreeInventory> {
    let country_root = root.join(Bucket::CountryAssociated.folder_name());
    if !country_root.is_dir() {
        tracing::warn!(
            "[Report] no '{}' folder under {}",
            Bucket::CountryAssociated.folder_name(),
            root.display()
        );
        return Ok(TreeInventory::default());
    }

    let mut inventory = TreeInventory::default();
    for folder in dir_names(&country_root)? {
        let path = country_root.join(&folder);
        let mut documents: Vec<DocumentRecord> = pdf_names(&path)?
            .iter()
            .map(|name| DocumentRecord::from_file_name(name, None))
            .collect();

        for subfolder in dir_names(&path)? {
            documents.extend(
                pdf_names(&path.join(&subfolder))?
                    .iter()
                    .map(|name| DocumentRecord::from_file_name(name, Some(&subfolder))),
            );
        }

        inventory.countries.push(CountryInventory {
            country: folder.replace('_', " "),
            folder,
            documents,
        });
    }

    tracing::info!(
        "[Report] {} documents across {} countries",
        inventory.document_count(),
        inventory.countries.len()
    );
    Ok(inventory)
}

/// One project row of the master inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterRow {
    pub identifier: Identifier,
    pub country: String,
    pub document_count: usize,
    pub document_types: BTreeSet<String>,
    pub in_portfolio: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MasterReport {
    pub document_types: Vec<String>,
    pub rows: Vec<MasterRow>,
}

impl MasterReport {
    fn table(&self) -> Table {
        let mut headers: Vec<String> = ["Project ID", "Country", "Has Documents", "Document Count"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        headers.extend(self.document_types.iter().cloned());
        headers.push("Note".to_string());

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = vec![
                    Cell::text(row.identifier.as_str()),
                    Cell::text(&row.country),
                    Cell::text(if row.document_count > 0 { "Yes" } else { "No" }),
                    Cell::number(row.document_count),
                ];
                cells.extend(
                    self.document_types
                        .iter()
                        .map(|t| Cell::number(usize::from(row.document_types.contains(t)))),
                );
                cells.push(Cell::text(if row.in_portfolio { "" } else { NOT_IN_PORTFOLIO }));
                cells
            })
            .collect();

        Table { headers, rows }
    }
}

/// One row per mapped project plus one per project found only in documents
pub fn build_master_rows(inventory: &TreeInventory, mapping: &CountryMapping) -> MasterReport {
    let mut rows: BTreeMap<Identifier, MasterRow> = mapping
        .iter()
        .map(|(id, country)| {
            (
                id.clone(),
                MasterRow {
                    identifier: id.clone(),
                    country: country.to_string(),
                    document_count: 0,
                    document_types: BTreeSet::new(),
                    in_portfolio: true,
                },
            )
        })
        .collect();

    for country in &inventory.countries {
        for document in &country.documents {
            let Some(id) = &document.identifier else {
                continue;
            };
            let row = rows.entry(id.clone()).or_insert_with(|| MasterRow {
                identifier: id.clone(),
                country: country.country.clone(),
                document_count: 0,
                document_types: BTreeSet::new(),
                in_portfolio: false,
            });
            row.document_count += 1;
            row.document_types.insert(document.document_type.clone());
        }
    }

    let mut rows: Vec<MasterRow> = rows.into_values().collect();
    rows.sort_by(|a, b| {
        a.country
            .cmp(&b.country)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });

    MasterReport {
        document_types: inventory.document_types().into_iter().collect(),
        rows,
    }
}

/// Per-project totals for one country
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub identifier: Identifier,
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct CountryReport {
    pub country: String,
    pub document_types: Vec<String>,
    pub projects: Vec<ProjectSummary>,
    pub documents: Vec<DocumentRecord>,
}

impl CountryReport {
    fn summary_table(&self) -> Table {
        let mut headers = vec!["Project ID".to_string(), "Total Documents".to_string()];
        headers.extend(self.document_types.iter().cloned());

        let rows = self
            .projects
            .iter()
            .map(|project| {
                let mut cells = vec![Cell::text(project.identifier.as_str()), Cell::number(project.total)];
                cells.extend(
                    self.document_types
                        .iter()
                        .map(|t| Cell::number(project.by_type.get(t).copied().unwrap_or(0))),
                );
                cells
            })
            .collect();

        Table { headers, rows }
    }

    fn documents_table(&self) -> Table {
        let headers = ["Project ID", "Document Type", "Filename"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = self
            .documents
            .iter()
            .map(|d| {
                vec![
                    Cell::text(d.identifier.as_ref().map(Identifier::as_str).unwrap_or("")),
                    Cell::text(&d.document_type),
                    Cell::text(&d.file_name),
                ]
            })
            .collect();
        Table { headers, rows }
    }
}

pub fn build_country_report(country: &CountryInventory) -> CountryReport {
    let mut projects: BTreeMap<Identifier, ProjectSummary> = BTreeMap::new();
    for document in &country.documents {
        if let Some(id) = &document.identifier {
            let summary = projects.entry(id.clone()).or_insert_with(|| ProjectSummary {
                identifier: id.clone(),
                total: 0,
                by_type: BTreeMap::new(),
            });
            summary.total += 1;
            *summary.by_type.entry(document.document_type.clone()).or_insert(0) += 1;
        }
    }

    let mut documents = country.documents.clone();
    documents.sort_by(|a, b| {
        a.identifier
            .cmp(&b.identifier)
            .then_with(|| a.document_type.cmp(&b.document_type))
            .then_with(|| a.file_name.cmp(&b.file_name))
    });

    CountryReport {
        country: country.country.clone(),
        document_types: documents
            .iter()
            .map(|d| d.document_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        projects: projects.into_values().collect(),
        documents,
    }
}

/// Paths written by [`write_reports`]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub master: Option<PathBuf>,
    pub country_reports: Vec<PathBuf>,
    pub documents: usize,
    pub document_types: Vec<String>,
}

/// Scan the tree and write the master and per-country workbooks
pub fn write_reports(root: &Path, mapping: &CountryMapping, date: NaiveDate) -> Result<ReportSummary> {
    let stamp = date.format("%Y-%m-%d").to_string();
    let inventory = scan_tree(root)?;
    let mut summary = ReportSummary {
        documents: inventory.document_count(),
        document_types: inventory.document_types().into_iter().collect(),
        ..Default::default()
    };

    let master = build_master_rows(&inventory, mapping);
    if master.rows.is_empty() {
        tracing::info!("[Report] no project data for the master report");
    } else {
        let path = root.join(format!("document_inventory_{}.xlsx", stamp));
        workbook::write(&path, &[("Document Inventory", master.table())])?;
        tracing::info!("[Report] master inventory with {} projects: {}", master.rows.len(), path.display());
        summary.master = Some(path);
    }

    let country_root = root.join(Bucket::CountryAssociated.folder_name());
    for country in &inventory.countries {
        if country.documents.is_empty() {
            continue;
        }
        let report = build_country_report(country);
        let mut sheets = Vec::new();
        if !report.projects.is_empty() {
            sheets.push(("Project Summary", report.summary_table()));
        }
        sheets.push(("All Documents", report.documents_table()));

        let path = country_root
            .join(&country.folder)
            .join(format!("{}_documents_{}.xlsx", country.folder, stamp));
        workbook::write(&path, &sheets)?;
        summary.country_reports.push(path);
    }

    tracing::info!("[Report] wrote {} country reports", summary.country_reports.len());
    Ok(summary)
}
