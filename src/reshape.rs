//! Wide → long → tidy reshaping of indicator tables.
//!
//! The wide table has one row per (country, indicator) and one column per year.
//! [`reshape`] melts it into [`Observation`]s, keeps catalog indicators and years in
//! range, then pivots back to one row per (country, year) with one column per
//! indicator, named through the catalog.

use crate::catalog::IndicatorCatalog;
use crate::error::PipelineError;
use crate::models::{DataPoint, YearRange};
use crate::table::{Cell, Table};
use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap};

pub const COUNTRY_NAME: &str = "Country Name";
pub const COUNTRY_CODE: &str = "Country Code";
pub const INDICATOR_NAME: &str = "Indicator Name";
pub const INDICATOR_CODE: &str = "Indicator Code";
pub const YEAR: &str = "year";

/// One long-form record; (country_code, indicator_code, year) is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub country_name: String,
    pub country_code: String,
    pub indicator_code: String,
    pub year: i32,
    pub value: Cell,
}

/// A header is a year only if it is made of ASCII digits and fits an `i32`.
/// Surrounding whitespace disqualifies it.
pub fn parse_year_header(header: &str) -> Option<i32> {
    if header.is_empty() || !header.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    header.parse().ok()
}

/// Melt the wide table, keeping only catalog indicators and year-named columns.
///
/// Every column other than country name, country code and indicator code is a
/// candidate; `Indicator Name` or a trailing blank header falls out at the year check.
pub fn melt(wide: &Table, catalog: &IndicatorCatalog) -> Result<Vec<Observation>> {
    let name_ix = wide.require_column(COUNTRY_NAME, "wide table")?;
    let code_ix = wide.require_column(COUNTRY_CODE, "wide table")?;
    let ind_ix = wide.require_column(INDICATOR_CODE, "wide table")?;

    let year_columns: Vec<(usize, i32)> = wide
        .columns()
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != name_ix && i != code_ix && i != ind_ix)
        .filter_map(|(i, h)| parse_year_header(h).map(|y| (i, y)))
        .collect();
    log::debug!(
        "melting {} year columns out of {}",
        year_columns.len(),
        wide.columns().len()
    );

    let mut out = Vec::new();
    for row in wide.rows() {
        let Some(indicator) = row[ind_ix].as_deref() else {
            continue;
        };
        if !catalog.contains(indicator) {
            continue;
        }
        let country_name = row[name_ix].clone().unwrap_or_default();
        let country_code = row[code_ix].clone().unwrap_or_default();
        for &(col, year) in &year_columns {
            out.push(Observation {
                country_name: country_name.clone(),
                country_code: country_code.clone(),
                indicator_code: indicator.to_string(),
                year,
                value: row[col].clone(),
            });
        }
    }
    Ok(out)
}

/// Pivot observations to one row per (country code, year).
///
/// Rows are sorted by (country name, country code, year); indicator columns follow
/// catalog order and every catalog indicator gets a column. A key with no value for
/// an indicator yields an empty cell. A code seen under two names keeps the first.
pub fn pivot(observations: &[Observation], catalog: &IndicatorCatalog) -> Result<Table> {
    let width = catalog.len();
    // `None` = not observed yet; `Some(None)` = observed as missing.
    let mut grid: HashMap<(String, i32), (String, Vec<Option<Cell>>)> = HashMap::new();

    for obs in observations {
        let Some(col) = catalog.position(&obs.indicator_code) else {
            continue;
        };
        let (name, slots) = grid
            .entry((obs.country_code.clone(), obs.year))
            .or_insert_with(|| (obs.country_name.clone(), vec![None; width]));
        if slots[col].is_some() {
            return Err(PipelineError::DuplicateObservation {
                country_code: obs.country_code.clone(),
                indicator_code: obs.indicator_code.clone(),
                year: obs.year,
            }
            .into());
        }
        if *name != obs.country_name {
            log::debug!(
                "country code {} appears as '{}' and '{}'; keeping the first",
                obs.country_code,
                name,
                obs.country_name
            );
        }
        slots[col] = Some(obs.value.clone());
    }

    let mut keyed: Vec<((String, String, i32), Vec<Option<Cell>>)> = grid
        .into_iter()
        .map(|((code, year), (name, slots))| ((name, code, year), slots))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut table = Table::new(
        [COUNTRY_NAME, COUNTRY_CODE, YEAR]
            .into_iter()
            .chain(catalog.names()),
    );
    for ((name, code, year), slots) in keyed {
        let mut row: Vec<Cell> = Vec::with_capacity(3 + width);
        row.push((!name.is_empty()).then_some(name));
        row.push((!code.is_empty()).then_some(code));
        row.push(Some(year.to_string()));
        row.extend(slots.into_iter().map(Option::flatten));
        table.push_row(row)?;
    }
    Ok(table)
}

/// Full reshape: melt, keep years in `years`, pivot, rename.
pub fn reshape(wide: &Table, catalog: &IndicatorCatalog, years: YearRange) -> Result<Table> {
    let mut observations = melt(wide, catalog).context("melt wide table")?;
    observations.retain(|o| years.contains(o.year));
    log::info!(
        "reshaping {} observations for {} indicators ({}..={})",
        observations.len(),
        catalog.len(),
        years.start,
        years.end
    );
    pivot(&observations, catalog).context("pivot to tidy table")
}

/// Inverse of [`pivot`]: one observation per (row, catalog column present in `tidy`).
pub fn melt_tidy(tidy: &Table, catalog: &IndicatorCatalog) -> Result<Vec<Observation>> {
    let name_ix = tidy.require_column(COUNTRY_NAME, "tidy table")?;
    let code_ix = tidy.require_column(COUNTRY_CODE, "tidy table")?;
    let year_ix = tidy.require_column(YEAR, "tidy table")?;
    let value_columns: Vec<(usize, &str)> = catalog
        .iter()
        .filter_map(|(code, name)| tidy.column_index(name).map(|i| (i, code)))
        .collect();

    let mut out = Vec::new();
    for (i, row) in tidy.rows().iter().enumerate() {
        let year = row[year_ix]
            .as_deref()
            .and_then(parse_year_header)
            .with_context(|| format!("row {}: year is not an integer", i + 1))?;
        for &(col, code) in &value_columns {
            out.push(Observation {
                country_name: row[name_ix].clone().unwrap_or_default(),
                country_code: row[code_ix].clone().unwrap_or_default(),
                indicator_code: code.to_string(),
                year,
                value: row[col].clone(),
            });
        }
    }
    Ok(out)
}

/// Lay out API observations as a wide table (country × indicator rows, year columns),
/// the same shape the bulk CSV has.
pub fn wide_from_points(points: &[DataPoint]) -> Result<Table> {
    let years: BTreeSet<i32> = points.iter().map(|p| p.year).collect();
    let year_col: HashMap<i32, usize> = years
        .iter()
        .enumerate()
        .map(|(i, &y)| (y, 4 + i))
        .collect();

    let mut table = Table::new(
        [COUNTRY_NAME, COUNTRY_CODE, INDICATOR_NAME, INDICATOR_CODE]
            .into_iter()
            .map(String::from)
            .chain(years.iter().map(ToString::to_string)),
    );
    let width = table.columns().len();

    let mut order: Vec<(String, String, String)> = Vec::new();
    let mut rows: HashMap<(String, String, String), Vec<Cell>> = HashMap::new();
    for p in points {
        let key = (
            p.country_name.clone(),
            p.country_iso3.clone(),
            p.indicator_id.clone(),
        );
        let row = rows.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            let mut r = vec![None; width];
            r[0] = Some(p.country_name.clone());
            r[1] = Some(p.country_iso3.clone());
            r[2] = Some(p.indicator_name.clone());
            r[3] = Some(p.indicator_id.clone());
            r
        });
        row[year_col[&p.year]] = p.value.map(|v| v.to_string());
    }
    for key in order {
        if let Some(row) = rows.remove(&key) {
            table.push_row(row)?;
        }
    }
    Ok(table)
}
