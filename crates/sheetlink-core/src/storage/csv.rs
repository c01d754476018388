//! CSV import/export functionality

use std::io::Write;
use std::path::Path;

use crate::error::{Result, SheetlinkError};
use crate::workbook::Workbook;
use sheetlink_engine::engine::{CellRef, CellValue};

/// Parse CSV text into stored cell text, starting at A1. Empty fields are
/// skipped.
pub fn parse_csv(content: &str) -> Vec<(CellRef, String)> {
    let mut cells = Vec::new();
    for (row_idx, line) in content.lines().enumerate() {
        for (col_idx, field) in parse_csv_line(line).into_iter().enumerate() {
            if field.is_empty() {
                continue;
            }
            cells.push((CellRef::new(col_idx, row_idx), field));
        }
    }
    cells
}

/// Parse a single CSV line, handling quoted fields
pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                // Check for escaped quote
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => {
                    in_quotes = true;
                    field_was_quoted = true;
                }
                ',' => {
                    fields.push(finish_field(&current, field_was_quoted));
                    current.clear();
                    field_was_quoted = false;
                }
                _ => current.push(c),
            }
        }
    }
    fields.push(finish_field(&current, field_was_quoted));
    fields
}

/// Quoted fields keep their whitespace; bare fields are trimmed.
fn finish_field(field: &str, quoted: bool) -> String {
    if quoted {
        field.to_string()
    } else {
        field.trim().to_string()
    }
}

/// Load a CSV file into a sheet named after the file stem and return that
/// name. An existing empty sheet of the same name is filled in place.
pub fn import_csv(workbook: &mut Workbook, path: &Path) -> Result<String> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    import_csv_as(workbook, path, &name)
}

pub fn import_csv_as(workbook: &mut Workbook, path: &Path, sheet: &str) -> Result<String> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(SheetlinkError::EmptyCsv);
    }

    match workbook.sheet(sheet) {
        Some(existing) if existing.is_empty() => {}
        Some(_) => return Err(SheetlinkError::DuplicateSheet(sheet.to_string())),
        None => {
            workbook.add_sheet(sheet)?;
        }
    }

    let cells = parse_csv(&content);
    tracing::debug!(path = %path.display(), sheet, cells = cells.len(), "imported CSV");
    for (cell, text) in cells {
        workbook.set_cell_text(sheet, cell, &text)?;
    }
    Ok(sheet.to_string())
}

/// Write the resolved values of `sheet` as CSV, from A1 to the last used
/// cell. Errors are written as their sentinels.
pub fn write_csv<W: Write>(workbook: &Workbook, sheet: &str, out: &mut W) -> Result<()> {
    let Some(range) = workbook.used_range(sheet)? else {
        return Ok(());
    };

    for row in 0..=range.end.row {
        let mut row_fields = Vec::new();
        for col in 0..=range.end.col {
            let field = match workbook.resolve_cell(sheet, CellRef::new(col, row)) {
                Ok(CellValue::Text(text)) => escape_csv_field(&text),
                Ok(value) => value.to_string(),
                Err(kind) => kind.sentinel().to_string(),
            };
            row_fields.push(field);
        }
        writeln!(out, "{}", row_fields.join(","))?;
    }

    Ok(())
}

/// Export resolved values of `sheet` to a CSV file.
pub fn export_csv(workbook: &Workbook, sheet: &str, path: &Path) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_csv(workbook, sheet, &mut file)?;
    file.flush()?;
    Ok(())
}

/// Escape a text field for CSV output
fn escape_csv_field(field: &str) -> String {
    // Guard against CSV formula injection in spreadsheet apps.
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    let safe_field = if matches!(first_non_space, Some('=' | '+' | '-' | '@')) {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains(',')
        || safe_field.contains('"')
        || safe_field.contains('\n')
        || safe_field.contains('\r')
        || safe_field != safe_field.trim()
    {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}
