//! Left joins of the tidy WDI table with an external series and country metadata.
//!
//! Output rows are the left rows in their original order, one each. Right-hand tables
//! are de-duplicated (first occurrence wins) before joining.

use crate::hdr::COUNTRY_ISO_CODE;
use crate::metadata::{INCOME_GROUP, REGION};
use crate::reshape::{COUNTRY_CODE, YEAR};
use crate::table::{Cell, Table};
use anyhow::{Result, bail};
use std::collections::HashMap;

/// Canonical text for a year cell, so `2020`, `2020.0` and ` 2020 ` join alike.
pub fn normalize_year(raw: &str) -> Option<String> {
    let s = raw.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(i.to_string());
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", f as i64)),
        _ => None,
    }
}

fn append_columns(left: &Table, extra: &[String]) -> Result<Table> {
    for c in extra {
        if left.column_index(c).is_some() {
            bail!("column '{c}' exists on both sides of the join");
        }
    }
    Ok(Table::new(left.columns().iter().chain(extra).cloned()))
}

/// Left-join `series` on (Country Code, year) = (countryIsoCode, year).
///
/// Every non-key column of `series` is carried over.
pub fn join_series(left: &Table, series: &Table) -> Result<Table> {
    let l_code = left.require_column(COUNTRY_CODE, "tidy table")?;
    let l_year = left.require_column(YEAR, "tidy table")?;
    let r_code = series.require_column(COUNTRY_ISO_CODE, "external series")?;
    let r_year = series.require_column(YEAR, "external series")?;
    let carried: Vec<usize> = (0..series.columns().len())
        .filter(|&i| i != r_code && i != r_year)
        .collect();
    let carried_names: Vec<String> = carried
        .iter()
        .map(|&i| series.columns()[i].clone())
        .collect();

    let mut index: HashMap<(String, String), usize> = HashMap::new();
    for (i, row) in series.rows().iter().enumerate() {
        let (Some(code), Some(year)) = (
            row[r_code].as_deref().map(str::trim),
            row[r_year].as_deref().and_then(normalize_year),
        ) else {
            continue;
        };
        index.entry((code.to_string(), year)).or_insert(i);
    }

    let mut out = append_columns(left, &carried_names)?;
    let mut matched = 0usize;
    for row in left.rows() {
        let key = row[l_code].as_deref().map(str::trim).zip(
            row[l_year].as_deref().and_then(normalize_year),
        );
        let hit = key.and_then(|(c, y)| index.get(&(c.to_string(), y)));
        let mut new_row = row.clone();
        match hit {
            Some(&r) => {
                matched += 1;
                new_row.extend(carried.iter().map(|&i| series.rows()[r][i].clone()));
            }
            None => new_row.extend(std::iter::repeat_n(None, carried.len())),
        }
        out.push_row(new_row)?;
    }
    log::info!("series join matched {} of {} rows", matched, left.len());
    Ok(out)
}

/// Left-join `Region` / `IncomeGroup` from `metadata` on Country Code.
///
/// Only the attribute columns present in `metadata` are added.
pub fn join_metadata(left: &Table, metadata: &Table) -> Result<Table> {
    let l_code = left.require_column(COUNTRY_CODE, "tidy table")?;
    let r_code = metadata.require_column(COUNTRY_CODE, "country metadata")?;
    let attrs: Vec<(usize, String)> = [REGION, INCOME_GROUP]
        .into_iter()
        .filter_map(|c| metadata.column_index(c).map(|i| (i, c.to_string())))
        .collect();
    let attr_names: Vec<String> = attrs.iter().map(|(_, n)| n.clone()).collect();

    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, row) in metadata.rows().iter().enumerate() {
        if let Some(code) = row[r_code].as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            index.entry(code).or_insert(i);
        }
    }

    let mut out = append_columns(left, &attr_names)?;
    for row in left.rows() {
        let hit = row[l_code]
            .as_deref()
            .and_then(|c| index.get(c.trim()).copied());
        let mut new_row = row.clone();
        new_row.extend(attrs.iter().map(|(i, _)| -> Cell {
            hit.and_then(|r| metadata.rows()[r][*i].clone())
        }));
        out.push_row(new_row)?;
    }
    Ok(out)
}

/// Strip header whitespace on all inputs, then join the series and (if given) metadata.
pub fn merge(mut tidy: Table, mut series: Table, metadata: Option<Table>) -> Result<Table> {
    tidy.strip_column_names();
    series.strip_column_names();
    let merged = join_series(&tidy, &series)?;
    match metadata {
        Some(mut meta) => {
            meta.strip_column_names();
            join_metadata(&merged, &meta)
        }
        None => Ok(merged),
    }
}
