//! Bulk archive download with an existence gate.
//!
//! The body is streamed into a temporary file next to the target and renamed into
//! place only once complete, so an interrupted transfer never leaves a file at the
//! target path. A cached file is reused only if it still opens as a zip.

use crate::archive;
use anyhow::{Context, Result, bail};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Target existed and was reused.
    Cached,
    /// Fresh download of `bytes` bytes.
    Downloaded { bytes: u64 },
}

#[derive(Debug, Clone)]
pub struct Downloader {
    http: HttpClient,
}

impl Downloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("wdi_hdr/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self { http })
    }

    /// Download a zip archive to `target` unless a valid copy is already there.
    pub fn fetch_archive(&self, url: &str, target: &Path) -> Result<DownloadOutcome> {
        if target.exists() {
            if archive::is_valid_zip(target) {
                log::info!("archive already present: {}", target.display());
                return Ok(DownloadOutcome::Cached);
            }
            log::warn!(
                "cached archive {} is not a readable zip; downloading again",
                target.display()
            );
            fs::remove_file(target).with_context(|| format!("remove {}", target.display()))?;
        }
        let bytes = self.fetch(url, target)?;
        Ok(DownloadOutcome::Downloaded { bytes })
    }

    /// Stream `url` into `target`. Non-success statuses are errors; nothing is retried.
    pub fn fetch(&self, url: &str, target: &Path) -> Result<u64> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

        log::info!("downloading {url}");
        let mut resp = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let expected = resp.content_length();

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("create temporary file in {}", dir.display()))?;
        let written = resp
            .copy_to(tmp.as_file_mut())
            .with_context(|| format!("read body of {url}"))?;
        if let Some(expected) = expected {
            if written != expected {
                bail!("truncated download from {url}: got {written} of {expected} bytes");
            }
        }
        tmp.as_file().sync_all()?;
        tmp.persist(target)
            .with_context(|| format!("move download into {}", target.display()))?;

        log::info!("saved {} ({} bytes)", target.display(), written);
        Ok(written)
    }
}
