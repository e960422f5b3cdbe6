//! Spreadsheet loading for the country mapping.
//!
//! Workbooks (`.xlsx`, `.xlsm`, `.xls`, `.ods`) go through calamine and use the
//! first sheet; `.csv` goes through the csv crate. In both cases the first row
//! is the header row handed to the [`ColumnResolver`].

use super::{ColumnResolver, CountryMapping};
use crate::classify::identifier::{Identifier, IDENTIFIER_PREFIX};
use crate::config::MappingSource;
use crate::error::{DocsortError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Turn a raw identifier cell into a validated identifier.
///
/// Bare numbers get the `P` prefix, stray characters are dropped and short
/// numbers are zero-padded: `"12345"` and `"P12345"` both become `P012345`.
pub fn normalize_identifier_cell(raw: &str) -> Option<Identifier> {
    let mut value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return None;
    }
    // Numeric cells exported as floats
    if let Some(stripped) = value.strip_suffix(".0") {
        value = stripped;
    }

    let upper = value.to_ascii_uppercase();
    let cleaned: String = upper
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == IDENTIFIER_PREFIX)
        .collect();

    let digits = match cleaned.strip_prefix(IDENTIFIER_PREFIX) {
        Some(rest) => rest,
        None => cleaned.as_str(),
    };
    if digits.is_empty() || digits.len() > 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Identifier::parse(&format!("{}{:0>6}", IDENTIFIER_PREFIX, digits))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Read every row (header first) of a supported mapping file
fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook_rows(path),
        "csv" => read_csv_rows(path),
        _ => Err(DocsortError::UnsupportedMappingFormat(format!(
            "{} (expected .xlsx, .xls, .ods or .csv)",
            path.display()
        ))),
    }
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let spreadsheet_error = |message: String| DocsortError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_error(e.to_string()))?;
    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| spreadsheet_error("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| spreadsheet_error(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let spreadsheet_error = |e: csv::Error| DocsortError::Spreadsheet {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(spreadsheet_error)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(spreadsheet_error)?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Load the identifier -> country table
pub fn load_mapping(source: &MappingSource, resolver: &dyn ColumnResolver) -> Result<CountryMapping> {
    let path = source.path.as_path();
    if !path.exists() {
        return Err(DocsortError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "mapping file not found"),
        ));
    }

    let rows = read_rows(path)?;
    let mut rows = rows.into_iter();
    let headers: Vec<String> = match rows.next() {
        Some(headers) => headers.into_iter().map(|h| h.trim().to_string()).collect(),
        None => {
            return Err(DocsortError::Spreadsheet {
                path: path.to_path_buf(),
                message: "file is empty".to_string(),
            })
        }
    };

    let selection = resolver.resolve(path, &headers)?;
    tracing::debug!(
        "[Mapping] using columns '{}' (id) and '{}' (country) of {}",
        headers[selection.id],
        headers[selection.country],
        path.display()
    );

    let mut mapping = CountryMapping::new();
    let mut skipped = 0usize;
    for row in rows {
        let raw_id = row.get(selection.id).map(String::as_str).unwrap_or("");
        let country = row
            .get(selection.country)
            .map(|c| c.trim())
            .unwrap_or("");

        let id = match normalize_identifier_cell(raw_id) {
            Some(id) => id,
            None => {
                skipped += 1;
                continue;
            }
        };
        if country.is_empty() || country.eq_ignore_ascii_case("nan") {
            skipped += 1;
            continue;
        }
        mapping.insert(id, country);
    }

    tracing::info!(
        "[Mapping] loaded {} project mappings from {} ({} rows skipped)",
        mapping.len(),
        path.display(),
        skipped
    );
    Ok(mapping)
}

/// Load a mapping if configured; any failure degrades to an empty mapping
pub fn load_mapping_or_empty(
    source: Option<&MappingSource>,
    resolver: &dyn ColumnResolver,
) -> CountryMapping {
    let Some(source) = source else {
        tracing::info!("[Mapping] no mapping file configured");
        return CountryMapping::new();
    };

    match load_mapping(source, resolver) {
        Ok(mapping) => mapping,
        Err(e) => {
            tracing::warn!("[Mapping] continuing without country mapping: {}", e);
            CountryMapping::new()
        }
    }
}
