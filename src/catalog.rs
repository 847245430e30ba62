//! The fixed set of World Development Indicators carried into the tidy table.
//!
//! Order matters: it is the column order of the tidy output.

use crate::error::PipelineError;
use std::collections::HashSet;

/// WDI indicators in thematic order, with their tidy column names.
pub const WDI_INDICATORS: &[(&str, &str)] = &[
    // Demographics / population
    ("SP.POP.TOTL", "population"),
    ("EN.POP.DNST", "pop_density"),
    ("SP.DYN.TFRT.IN", "fertility_rate"),
    ("SP.ADO.TFRT", "adol_fertility"),
    ("SP.DYN.LE00.IN", "life_expectancy"),
    ("SH.DYN.MORT", "under5_mortality"),
    ("SP.POP.GROW", "pop_growth"),
    ("SP.URB.GROW", "urban_pop_growth"),
    ("SM.POP.NETM", "net_migration"),
    // Technology
    ("IT.CEL.SETS.P2", "mobile_subs"),
    // Economy
    ("NY.GDP.PCAP.KD", "gdp_per_capita"),
    ("NY.GDP.MKTP.KD.ZG", "gdp_growth"),
    ("NE.EXP.GNFS.ZS", "exports_gdp"),
    ("NE.IMP.GNFS.ZS", "imports_gdp"),
    // Labour
    ("SL.UEM.TOTL.ZS", "unemployment"),
];

/// HDR indicator code selected from the UNDP spreadsheet.
pub const HDI_CODE: &str = "hdi";
/// Column name the HDI value gets in the merged table.
pub const HDI_COLUMN: &str = "hdi";

/// World Bank source id for WDI on the API (needed for multi-indicator requests).
pub const WDI_SOURCE_ID: u32 = 2;

/// Closed, ordered mapping from indicator code to tidy column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorCatalog {
    entries: Vec<(String, String)>,
}

impl IndicatorCatalog {
    /// Build a catalog, rejecting duplicate codes or names.
    pub fn new<I, C, N>(entries: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (C, N)>,
        C: Into<String>,
        N: Into<String>,
    {
        let entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(c, n)| (c.into(), n.into()))
            .collect();
        if entries.is_empty() {
            return Err(PipelineError::InvalidCatalog("no indicators".into()));
        }
        let mut codes = HashSet::new();
        let mut names = HashSet::new();
        for (code, name) in &entries {
            if !codes.insert(code.as_str()) {
                return Err(PipelineError::InvalidCatalog(format!(
                    "duplicate code {code}"
                )));
            }
            if !names.insert(name.as_str()) {
                return Err(PipelineError::InvalidCatalog(format!(
                    "duplicate name {name}"
                )));
            }
        }
        Ok(Self { entries })
    }

    /// The default WDI catalog.
    pub fn wdi() -> Self {
        Self {
            entries: WDI_INDICATORS
                .iter()
                .map(|&(c, n)| (c.to_string(), n.to_string()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.position(code).is_some()
    }

    /// Declared position of `code`, used as the pivot column index.
    pub fn position(&self, code: &str) -> Option<usize> {
        self.entries.iter().position(|(c, _)| c == code)
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, n)| n.as_str())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, n)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, n)| (c.as_str(), n.as_str()))
    }
}

impl Default for IndicatorCatalog {
    fn default() -> Self {
        Self::wdi()
    }
}
