//! Workbook output for report tables.

use super::{ReportCell, ReportTable};
use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

const MAX_SHEET_NAME: usize = 31;

/// Excel rejects these in sheet names.
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(MAX_SHEET_NAME)
        .collect();
    if cleaned.trim().is_empty() {
        "Report".to_string()
    } else {
        cleaned
    }
}

/// Write `table` as a single-sheet workbook with a bold, frozen header row.
pub fn write_report(table: &ReportTable, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let whole = Format::new().set_num_format("#,##0");
    let fractional = Format::new().set_num_format("#,##0.00");

    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name(&table.title))?;

    for (col, name) in table.columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &header)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                ReportCell::Empty => {}
                // Unit ids are identifiers, not quantities.
                ReportCell::Number(n) if c == 0 => {
                    sheet.write_number(r, c, *n)?;
                }
                ReportCell::Number(n) if n.fract() == 0.0 => {
                    sheet.write_number_with_format(r, c, *n, &whole)?;
                }
                ReportCell::Number(n) => {
                    sheet.write_number_with_format(r, c, *n, &fractional)?;
                }
                ReportCell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
            }
        }
    }
    sheet.set_freeze_panes(1, 0)?;
    sheet.autofit();

    workbook
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
