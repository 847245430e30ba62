//! Country metadata (name, region, income group) resolved in three tiers:
//! the `WDICountry.csv` shipped in the bulk archive, then the API country list,
//! then nothing. Each tier may fail without stopping the run.

use crate::api::Client;
use crate::models::CountryRecord;
use crate::reshape::{COUNTRY_CODE, COUNTRY_NAME};
use crate::table::Table;
use anyhow::Result;
use std::collections::HashSet;

pub const REGION: &str = "Region";
pub const INCOME_GROUP: &str = "IncomeGroup";

/// Header aliases, matched against trimmed lower-cased headers in order.
pub const CODE_ALIASES: &[&str] = &["country code", "countrycode", "code"];
pub const NAME_ALIASES: &[&str] = &[
    "table name",
    "tablename",
    "short name",
    "shortname",
    "long name",
    "longname",
];
pub const REGION_ALIASES: &[&str] = &["region"];
pub const INCOME_ALIASES: &[&str] = &["income group", "incomegroup", "income level", "incomelevel"];

/// Anything that can list countries; the API client in production.
pub trait CountrySource {
    fn fetch_countries(&self) -> Result<Vec<CountryRecord>>;
}

impl CountrySource for Client {
    fn fetch_countries(&self) -> Result<Vec<CountryRecord>> {
        Client::fetch_countries(self)
    }
}

/// Where the metadata came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryMetadata {
    Bundled(Vec<CountryRecord>),
    Api(Vec<CountryRecord>),
    Absent,
}

impl CountryMetadata {
    pub fn records(&self) -> &[CountryRecord] {
        match self {
            Self::Bundled(r) | Self::Api(r) => r,
            Self::Absent => &[],
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// `Country Code, Country Name, Region, IncomeGroup`, whatever the tier.
    pub fn to_table(&self) -> Result<Table> {
        let mut t = Table::new([COUNTRY_CODE, COUNTRY_NAME, REGION, INCOME_GROUP]);
        for r in self.records() {
            t.push_row(vec![
                Some(r.code.clone()),
                (!r.name.is_empty()).then(|| r.name.clone()),
                r.region.clone(),
                r.income_group.clone(),
            ])?;
        }
        Ok(t)
    }
}

fn find_header(raw: &Table, aliases: &[&str]) -> Option<usize> {
    let lowered: Vec<String> = raw
        .columns()
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();
    aliases
        .iter()
        .find_map(|a| lowered.iter().position(|c| c == a))
}

/// Keep the first record per code and drop empty codes.
pub fn dedup_by_code(records: Vec<CountryRecord>) -> Vec<CountryRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| !r.code.is_empty() && seen.insert(r.code.clone()))
        .collect()
}

/// Interpret a bundled `WDICountry.csv`. `None` if code or name columns are missing.
pub fn from_bundled(raw: &Table) -> Option<Vec<CountryRecord>> {
    let code_ix = find_header(raw, CODE_ALIASES)?;
    let name_ix = find_header(raw, NAME_ALIASES)?;
    let region_ix = find_header(raw, REGION_ALIASES);
    let income_ix = find_header(raw, INCOME_ALIASES);
    log::debug!(
        "bundled metadata columns: code={:?} name={:?} region={:?} income={:?}",
        raw.columns().get(code_ix),
        raw.columns().get(name_ix),
        region_ix.and_then(|i| raw.columns().get(i)),
        income_ix.and_then(|i| raw.columns().get(i)),
    );

    let cell = |row: &[Option<String>], ix: Option<usize>| -> Option<String> {
        ix.and_then(|i| row[i].as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    let records = raw
        .rows()
        .iter()
        .map(|row| CountryRecord {
            code: cell(row, Some(code_ix)).unwrap_or_default(),
            name: cell(row, Some(name_ix)).unwrap_or_default(),
            region: cell(row, region_ix),
            income_group: cell(row, income_ix),
        })
        .collect();
    Some(dedup_by_code(records))
}

/// Resolve metadata: bundled file, else `source`, else absent.
pub fn resolve(bundled: Option<&Table>, source: &dyn CountrySource) -> CountryMetadata {
    match bundled {
        Some(raw) => match from_bundled(raw) {
            Some(records) => {
                log::info!("country metadata from bundled file ({} rows)", records.len());
                return CountryMetadata::Bundled(records);
            }
            None => log::warn!(
                "bundled country file lacks a code or name column; trying the API"
            ),
        },
        None => log::warn!("no bundled country file; trying the API"),
    }

    match source.fetch_countries() {
        Ok(records) => {
            let records = dedup_by_code(records);
            if records.is_empty() {
                log::warn!("country API returned no rows; continuing without metadata");
                CountryMetadata::Absent
            } else {
                log::info!("country metadata from API ({} rows)", records.len());
                CountryMetadata::Api(records)
            }
        }
        Err(e) => {
            log::warn!("could not fetch country metadata: {e:#}; continuing without it");
            CountryMetadata::Absent
        }
    }
}
