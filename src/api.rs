/// Synchronous client for the **World Bank Indicators API (v2)**.
///
/// Two endpoints are used:
/// - `country`: the country list (id, name, region, income level), the second tier
///   of country metadata resolution.
/// - `country/{codes}/indicator/{codes}`: per-indicator observations, the incremental
///   alternative to the bulk archive. Pagination is handled automatically.
///
/// ### Notes
/// - The API sometimes serializes `per_page` as a **string**; we accept both string/number.
/// - When requesting **multiple indicators** at once, the API requires a `source` parameter
///   (`source=2` for WDI).
/// - Failures are not retried; they propagate to the caller.
///
/// Typical usage:
/// ```no_run
/// # use wdi_hdr::{Client, YearRange};
/// let client = Client::default();
/// let rows = client.fetch(
///     &["all".into()],
///     &["SP.POP.TOTL".into()],
///     Some(YearRange { start: 1990, end: 2024 }),
///     None,
/// )?;
/// # Ok::<(), anyhow::Error>(())
/// ```
use crate::error::PipelineError;
use crate::models::{CountryEntry, CountryRecord, DataPoint, Entry, Meta, YearRange};
use anyhow::{Context, Result, bail};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";

#[derive(Debug, Clone)]
pub struct Client {
    pub base_url: String,
    http: HttpClient,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, Duration::from_secs(60)).expect("reqwest client build")
    }
}

// Allow -, _, . unescaped in codes (common for indicator ids)
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn enc_join<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(|s| percent_encoding::utf8_percent_encode(s.trim(), SAFE).to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// Split a `[Meta, [..]]` payload, surfacing API-level error messages.
fn split_payload(v: &Value) -> Result<(&Value, Option<&Value>)> {
    let arr = v.as_array().ok_or_else(|| {
        PipelineError::UnexpectedApiResponse("not a top-level array".into())
    })?;
    let Some(head) = arr.first() else {
        return Err(PipelineError::UnexpectedApiResponse("empty array".into()).into());
    };
    if head.get("message").is_some() {
        bail!("world bank api error: {}", head);
    }
    Ok((head, arr.get(1)))
}

impl Client {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout) // total request timeout
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("wdi_hdr/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        self.http
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("GET {url}"))?
            .json()
            .context("decode json")
    }

    /// Country list with region and income level.
    ///
    /// Entries without an id are dropped; region and income labels are trimmed.
    pub fn fetch_countries(&self) -> Result<Vec<CountryRecord>> {
        let url = format!("{}/country?format=json&per_page=400", self.base_url);
        let v = self.get_json(&url)?;
        let (_, body) = split_payload(&v)?;
        let entries: Vec<CountryEntry> = match body {
            Some(b) if !b.is_null() => {
                serde_json::from_value(b.clone()).context("parse country list")?
            }
            _ => vec![],
        };
        Ok(entries
            .into_iter()
            .filter_map(CountryEntry::into_record)
            .collect())
    }

    /// Fetch indicator observations.
    ///
    /// - `countries`: ISO2/ISO3 codes, aggregates, or `"all"`.
    /// - `indicators`: e.g. `"SP.POP.TOTL"`.
    /// - `years`: optional inclusive range.
    /// - `source`: numeric source id (2 for WDI). Without it, multiple indicators are
    ///   fetched one request chain at a time and concatenated.
    pub fn fetch(
        &self,
        countries: &[String],
        indicators: &[String],
        years: Option<YearRange>,
        source: Option<u32>,
    ) -> Result<Vec<DataPoint>> {
        if countries.is_empty() {
            bail!("at least one country/region code required");
        }
        if indicators.is_empty() {
            bail!("at least one indicator code required");
        }

        if indicators.len() > 1 && source.is_none() {
            let mut all_points = Vec::new();
            for indicator in indicators {
                let points = self.fetch(countries, std::slice::from_ref(indicator), years, None)?;
                all_points.extend(points);
            }
            return Ok(all_points);
        }

        let country_spec = enc_join(countries.iter().map(|s| s.as_str()));
        let indicator_spec = enc_join(indicators.iter().map(|s| s.as_str()));

        let mut url = format!(
            "{}/country/{}/indicator/{}?format=json&per_page=1000",
            self.base_url, country_spec, indicator_spec
        );
        if let Some(y) = years {
            url.push_str(&format!("&date={}", y.to_query_param()));
        }
        if let Some(s) = source {
            url.push_str(&format!("&source={}", s));
        }

        // Safety cap to avoid pathological jobs
        let max_pages = 1000u32;

        let mut page = 1u32;
        let mut out: Vec<DataPoint> = Vec::new();
        loop {
            if page > max_pages {
                bail!("page limit exceeded ({})", max_pages);
            }
            let page_url = format!("{}&page={}", url, page);
            let v = self.get_json(&page_url)?;
            let (head, body) = split_payload(&v)?;

            let meta: Meta = serde_json::from_value(head.clone()).context("parse meta")?;
            let entries: Vec<Entry> = match body {
                Some(b) if !b.is_null() => {
                    serde_json::from_value(b.clone()).context("parse entries")?
                }
                _ => vec![],
            };
            out.extend(entries.into_iter().map(DataPoint::from));

            log::debug!("page {}/{} ({} rows so far)", page, meta.pages, out.len());
            if page >= meta.pages {
                break;
            }
            page += 1;
        }

        Ok(out)
    }
}
