//! Reading the bulk WDI zip: picking the data CSV and the country metadata CSV.

use crate::error::PipelineError;
use crate::table::Table;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Basename of the country metadata member, compared case-insensitively.
pub const COUNTRY_MEMBER: &str = "wdicountry.csv";

fn basename(member: &str) -> &str {
    member.rsplit(['/', '\\']).next().unwrap_or(member)
}

fn is_csv(member: &str) -> bool {
    member.to_ascii_lowercase().ends_with(".csv")
}

/// Locate the country metadata member (`WDICountry.csv`, with or without a folder prefix).
pub fn find_country_member<'a, I>(members: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    members
        .into_iter()
        .filter(|m| is_csv(m))
        .find(|m| basename(m).eq_ignore_ascii_case(COUNTRY_MEMBER))
}

/// Pick the primary data member.
///
/// A CSV whose name contains `data` wins, then one containing `short_name` (other
/// than the country metadata file), then the first CSV in archive order.
pub fn select_data_member<'a, I>(members: I, short_name: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let csvs: Vec<&str> = members.into_iter().filter(|m| is_csv(m)).collect();
    let short = short_name.to_ascii_lowercase();
    let lower = |m: &str| m.to_ascii_lowercase();

    csvs.iter()
        .find(|m| lower(m).contains("data"))
        .or_else(|| {
            csvs.iter().find(|m| {
                !short.is_empty()
                    && lower(m).contains(&short)
                    && !basename(m).eq_ignore_ascii_case(COUNTRY_MEMBER)
            })
        })
        .or_else(|| csvs.first())
        .copied()
}

/// True if `path` opens as a zip with a readable central directory.
pub fn is_valid_zip(path: &Path) -> bool {
    File::open(path)
        .ok()
        .and_then(|f| ZipArchive::new(f).ok())
        .is_some()
}

pub struct BulkArchive {
    path: PathBuf,
    zip: ZipArchive<File>,
}

impl BulkArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let f = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let zip = ZipArchive::new(f).with_context(|| format!("read zip {}", path.display()))?;
        Ok(Self { path, zip })
    }

    pub fn data_member(&self, short_name: &str) -> Result<String> {
        let chosen = select_data_member(self.zip.file_names(), short_name)
            .ok_or_else(|| PipelineError::NoCsvInArchive(self.path.display().to_string()))?;
        Ok(chosen.to_string())
    }

    pub fn country_member(&self) -> Option<String> {
        find_country_member(self.zip.file_names()).map(String::from)
    }

    pub fn read_table(&mut self, member: &str) -> Result<Table> {
        let entry = self
            .zip
            .by_name(member)
            .with_context(|| format!("open member {member}"))?;
        Table::from_reader(entry).with_context(|| format!("parse member {member}"))
    }
}
