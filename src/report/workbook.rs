//! Minimal table -> xlsx writer on top of rust_xlsxwriter.

use crate::error::Result;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn number(value: usize) -> Self {
        Cell::Number(value as f64)
    }
}

/// Header row plus data rows
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

fn fill(sheet: &mut Worksheet, table: &Table, header_format: &Format) -> Result<()> {
    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, header_format)?;
    }

    for (index, row) in table.rows.iter().enumerate() {
        let row_number = (index + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                // Leave empty cells blank
                Cell::Text(text) if text.is_empty() => {}
                Cell::Text(text) => {
                    sheet.write_string(row_number, col as u16, text)?;
                }
                Cell::Number(number) => {
                    sheet.write_number(row_number, col as u16, *number)?;
                }
            }
        }
    }

    sheet.autofit();
    Ok(())
}

/// Write one workbook with a sheet per `(name, table)` pair, overwriting any
/// existing file.
pub fn write(path: &Path, sheets: &[(&str, Table)]) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for (name, table) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name)?;
        fill(sheet, table, &header_format)?;
    }

    workbook.save(path)?;
    Ok(())
}
