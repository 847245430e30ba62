//! Stage entry points: acquire (bulk archive or API), then merge.
//!
//! Each stage reads its inputs from files, regenerates its own outputs, and returns
//! the path it wrote.

use crate::api::Client;
use crate::archive::BulkArchive;
use crate::catalog::{HDI_CODE, HDI_COLUMN, IndicatorCatalog, WDI_SOURCE_ID};
use crate::config::Config;
use crate::download::{DownloadOutcome, Downloader};
use crate::metadata::{self, CountryMetadata, CountrySource};
use crate::models::YearRange;
use crate::reshape;
use crate::table::Table;
use crate::{hdr, merge};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// What [`extract_archive`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub data_member: String,
    pub tidy_rows: usize,
    pub metadata: CountryMetadata,
    pub metadata_path: Option<PathBuf>,
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))
}

/// Save the metadata table when there is something to save.
pub fn write_metadata(cfg: &Config, meta: &CountryMetadata) -> Result<Option<PathBuf>> {
    if meta.records().is_empty() {
        log::warn!("no usable country metadata available (bundled file or API)");
        return Ok(None);
    }
    let path = cfg.metadata_path();
    meta.to_table()?.write_csv(&path)?;
    log::info!("saved metadata -> {} ({} rows)", path.display(), meta.records().len());
    Ok(Some(path))
}

/// Read the bulk archive: metadata through its three tiers, then the reshaped
/// indicator table into `cfg.wdi_path()`.
pub fn extract_archive(
    cfg: &Config,
    zip_path: &Path,
    catalog: &IndicatorCatalog,
    years: YearRange,
    countries: &dyn CountrySource,
) -> Result<ExtractSummary> {
    ensure_dir(&cfg.raw_dir)?;
    let mut archive = BulkArchive::open(zip_path)?;
    let data_member = archive.data_member(&cfg.source_short_name)?;
    log::info!("found data file: {data_member}");
    let wide = archive.read_table(&data_member)?;

    let bundled = match archive.country_member() {
        Some(member) => match archive.read_table(&member) {
            Ok(t) => Some(t),
            Err(e) => {
                log::warn!("could not read {member}: {e:#}");
                None
            }
        },
        None => None,
    };
    let meta = metadata::resolve(bundled.as_ref(), countries);
    let metadata_path = write_metadata(cfg, &meta)?;

    let tidy = reshape::reshape(&wide, catalog, years)?;
    let out = cfg.wdi_path();
    tidy.write_csv(&out)?;
    log::info!(
        "saved main WDI data -> {} ({} rows x {} columns)",
        out.display(),
        tidy.len(),
        tidy.columns().len()
    );

    Ok(ExtractSummary {
        data_member,
        tidy_rows: tidy.len(),
        metadata: meta,
        metadata_path,
    })
}

/// Download the bulk archive (unless cached) and extract it.
pub fn acquire_bulk(cfg: &Config) -> Result<PathBuf> {
    let out = cfg.wdi_path();
    if out.exists() && !cfg.replace {
        log::info!("file already exists, skipping acquire: {}", out.display());
        return Ok(out);
    }
    let years = cfg.year_range()?;
    ensure_dir(&cfg.raw_dir)?;

    let zip_path = cfg.archive_path();
    let downloader = Downloader::new(cfg.download_timeout())?;
    if let DownloadOutcome::Downloaded { bytes } =
        downloader.fetch_archive(&cfg.bulk_url, &zip_path)?
    {
        log::info!("downloaded {bytes} bytes from {}", cfg.bulk_url);
    }

    let client = Client::new(cfg.api_base_url.as_str(), cfg.api_timeout())?;
    extract_archive(cfg, &zip_path, &IndicatorCatalog::wdi(), years, &client)?;

    if cfg.delete_archive && zip_path.exists() {
        fs::remove_file(&zip_path).with_context(|| format!("remove {}", zip_path.display()))?;
        log::info!("deleted archive: {}", zip_path.display());
    }
    Ok(out)
}

/// Incremental acquisition through the indicator API instead of the bulk archive.
pub fn acquire_api(cfg: &Config, client: &Client) -> Result<PathBuf> {
    let out = cfg.wdi_path();
    if out.exists() && !cfg.replace {
        log::info!("file already exists, skipping fetch: {}", out.display());
        return Ok(out);
    }
    let years = cfg.year_range()?;
    ensure_dir(&cfg.raw_dir)?;
    let catalog = IndicatorCatalog::wdi();
    let codes: Vec<String> = catalog.codes().map(String::from).collect();

    log::info!("fetching {} indicators from {}", codes.len(), client.base_url);
    let points = client.fetch(&["all".to_string()], &codes, Some(years), Some(WDI_SOURCE_ID))?;
    let wide = reshape::wide_from_points(&points)?;
    let tidy = reshape::reshape(&wide, &catalog, years)?;
    tidy.write_csv(&out)?;
    log::info!("saved main WDI data -> {} ({} rows)", out.display(), tidy.len());

    let meta = metadata::resolve(None, client);
    write_metadata(cfg, &meta)?;
    Ok(out)
}

/// Merge the tidy WDI table with HDI from the HDR export and the country metadata.
pub fn merge_datasets(cfg: &Config) -> Result<PathBuf> {
    ensure_dir(&cfg.processed_dir)?;
    let out = cfg.output_path();
    if out.exists() && !cfg.replace {
        log::info!("file already exists, skipping merge: {}", out.display());
        return Ok(out);
    }

    let wdi = Table::read_csv(cfg.wdi_path())?;
    let hdr_raw = hdr::load(cfg.hdr_path())?;
    let series = hdr::select_series(&hdr_raw, HDI_CODE, HDI_COLUMN)?;
    let meta_path = cfg.metadata_path();
    let meta = if meta_path.exists() {
        Some(Table::read_csv(&meta_path)?)
    } else {
        log::warn!(
            "no metadata file at {}; Region/IncomeGroup will be omitted",
            meta_path.display()
        );
        None
    };
    log::info!(
        "WDI: {} rows, HDR: {} rows, META: {} rows",
        wdi.len(),
        hdr_raw.len(),
        meta.as_ref().map_or(0, Table::len)
    );

    let merged = merge::merge(wdi, series, meta)?;
    merged.write_csv(&out)?;
    log::info!(
        "merged dataset saved -> {} ({} rows x {} columns)",
        out.display(),
        merged.len(),
        merged.columns().len()
    );
    Ok(out)
}

/// Bulk acquisition followed by the merge.
pub fn run_all(cfg: &Config) -> Result<PathBuf> {
    acquire_bulk(cfg)?;
    merge_datasets(cfg)
}
