use crate::models::YearRange;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BULK_URL: &str = "http://databank.worldbank.org/data/download/WDI_CSV.zip";

/// File locations, endpoints and run options. Every field has a default, so a TOML
/// file only needs the keys it changes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub bulk_url: String,
    pub api_base_url: String,
    /// Short name of the bulk source, used to spot its data member in the archive.
    pub source_short_name: String,
    pub archive_file: String,
    pub wdi_file: String,
    pub metadata_file: String,
    pub hdr_file: String,
    pub output_file: String,
    pub year_min: i32,
    pub year_max: i32,
    /// Regenerate outputs that already exist.
    pub replace: bool,
    /// Remove the archive once extracted.
    pub delete_archive: bool,
    pub download_timeout_secs: u64,
    pub api_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            raw_dir: PathBuf::from("data").join("raw"),
            processed_dir: PathBuf::from("data").join("processed"),
            bulk_url: DEFAULT_BULK_URL.into(),
            api_base_url: crate::api::DEFAULT_BASE_URL.into(),
            source_short_name: "wdi".into(),
            archive_file: "WDI_CSV.zip".into(),
            wdi_file: "wdi_data.csv".into(),
            metadata_file: "wdi_metadata.csv".into(),
            hdr_file: "hdr-data.xlsx".into(),
            output_file: "wdi_hdr.csv".into(),
            year_min: 1990,
            year_max: 2024,
            replace: true,
            delete_archive: true,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Read a TOML config file; missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn year_range(&self) -> Result<YearRange> {
        Ok(YearRange::new(self.year_min, self.year_max)?)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.raw_dir.join(&self.archive_file)
    }

    pub fn wdi_path(&self) -> PathBuf {
        self.raw_dir.join(&self.wdi_file)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.raw_dir.join(&self.metadata_file)
    }

    pub fn hdr_path(&self) -> PathBuf {
        self.raw_dir.join(&self.hdr_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.processed_dir.join(&self.output_file)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str("year_min = 2000\nreplace = false\n").unwrap();
        assert_eq!(cfg.year_min, 2000);
        assert!(!cfg.replace);
        assert_eq!(cfg.year_max, 2024);
        assert_eq!(cfg.output_path(), Path::new("data/processed/wdi_hdr.csv"));
    }

    #[test]
    fn inverted_years_are_an_error() {
        let cfg = Config {
            year_min: 2025,
            year_max: 2024,
            ..Config::default()
        };
        assert!(cfg.year_range().is_err());
    }
}
