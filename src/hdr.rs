//! UNDP Human Development Report data: load the multi-indicator export and keep
//! one series.

use crate::table::{Cell, Table};
use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use std::path::Path;

pub const INDICATOR_CODE: &str = "indicatorCode";
pub const COUNTRY_ISO_CODE: &str = "countryIsoCode";
pub const YEAR: &str = "year";
pub const VALUE: &str = "value";

fn cell_text(c: &Data) -> Cell {
    match c {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        other => Some(other.to_string()),
    }
}

/// Read the first worksheet of a workbook (xlsx, xls, ods) into a [`Table`].
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let mut wb =
        open_workbook_auto(path).with_context(|| format!("open workbook {}", path.display()))?;
    let range = wb
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {} has no sheets", path.display()))?
        .with_context(|| format!("read first sheet of {}", path.display()))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| anyhow!("workbook {} is empty", path.display()))?;
    let columns: Vec<String> = header
        .iter()
        .map(|c| cell_text(c).unwrap_or_default())
        .collect();
    let width = columns.len();
    let mut table = Table::new(columns);
    for r in rows {
        let mut row: Vec<Cell> = r.iter().take(width).map(cell_text).collect();
        row.resize(width, None);
        table.push_row(row)?;
    }
    Ok(table)
}

/// Load the HDR export; `.csv` is read as CSV, anything else as a workbook.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        Table::read_csv(path)
    } else {
        read_workbook(path)
    }
}

/// Keep rows of one indicator as `(countryIsoCode, year, <value_column>)`.
///
/// Rows without an ISO code are dropped. Header whitespace is stripped first.
pub fn select_series(raw: &Table, indicator_code: &str, value_column: &str) -> Result<Table> {
    let mut raw = raw.clone();
    raw.strip_column_names();
    let ind = raw.require_column(INDICATOR_CODE, "HDR data")?;
    let iso = raw.require_column(COUNTRY_ISO_CODE, "HDR data")?;
    let year = raw.require_column(YEAR, "HDR data")?;
    let value = raw.require_column(VALUE, "HDR data")?;

    let mut out = Table::new([COUNTRY_ISO_CODE, YEAR, value_column]);
    for row in raw.rows() {
        if row[ind].as_deref().map(str::trim) != Some(indicator_code) {
            continue;
        }
        let Some(code) = row[iso].as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        out.push_row(vec![
            Some(code.to_string()),
            row[year].clone(),
            row[value].clone(),
        ])?;
    }
    log::info!(
        "selected {} rows of '{}' from {} HDR rows",
        out.len(),
        indicator_code,
        raw.len()
    );
    Ok(out)
}
