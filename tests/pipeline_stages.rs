//! End-to-end stage tests on local files. HTTP endpoints are local mock servers.

use anyhow::{Result, anyhow};
use httpmock::prelude::*;
use std::cell::Cell;
use std::io::{Cursor, Write};
use std::path::Path;
use wdi_hdr::catalog::WDI_INDICATORS;
use wdi_hdr::hdr;
use wdi_hdr::metadata::{CountryMetadata, CountrySource};
use wdi_hdr::pipeline::{acquire_api, acquire_bulk, extract_archive, merge_datasets};
use wdi_hdr::{Client, Config, CountryRecord, IndicatorCatalog, PipelineError, Table, YearRange};
use zip::write::SimpleFileOptions;

const WDI_CSV: &str = "\
Country Name,Country Code,Indicator Name,Indicator Code,1989,2020,2021,
United States,USA,\"Population, total\",SP.POP.TOTL,1,331000000,332000000,
United States,USA,\"GDP per capita (constant 2015 US$)\",NY.GDP.PCAP.KD,,61000.5,,
Germany,DEU,\"Population, total\",SP.POP.TOTL,,83200000,83100000,
Germany,DEU,Something else,XX.OTHER,,7,7,
";

const GOOD_COUNTRY_CSV: &str = "\
Country Code,Short Name,Table Name,Long Name,Region,Income Group
USA,United States,United States,United States of America,North America,High income
DEU,Germany,Germany,Federal Republic of Germany,Europe & Central Asia,High income
";

const BAD_COUNTRY_CSV: &str = "\
Country Code,Region
USA,North America
";

struct FakeApi {
    calls: Cell<usize>,
    fail: bool,
}

impl FakeApi {
    fn new(fail: bool) -> Self {
        Self {
            calls: Cell::new(0),
            fail,
        }
    }
}

impl CountrySource for FakeApi {
    fn fetch_countries(&self) -> Result<Vec<CountryRecord>> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(anyhow!("offline"));
        }
        Ok(vec![
            CountryRecord {
                code: "USA".into(),
                name: "United States".into(),
                region: Some("North America".into()),
                income_group: Some("High income".into()),
            },
            CountryRecord {
                code: "DEU".into(),
                name: "Germany".into(),
                region: Some("Europe & Central Asia".into()),
                income_group: Some("High income".into()),
            },
        ])
    }
}

fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in members {
        w.start_file(*name, SimpleFileOptions::default()).unwrap();
        w.write_all(body.as_bytes()).unwrap();
    }
    w.finish().unwrap().into_inner()
}

fn write_zip(path: &Path, members: &[(&str, &str)]) {
    std::fs::write(path, zip_bytes(members)).unwrap();
}

/// Columns the tidy table gets with the full WDI catalog.
fn wdi_columns() -> Vec<String> {
    ["Country Name", "Country Code", "year"]
        .into_iter()
        .map(String::from)
        .chain(WDI_INDICATORS.iter().map(|(_, name)| name.to_string()))
        .collect()
}

const COUNTRIES_JSON: &str = r#"[{"page":1,"pages":1,"per_page":"400","total":2},[
  {"id":"USA","name":"United States","region":{"id":"NAC","value":"North America"},"incomeLevel":{"id":"HIC","value":"High income"}},
  {"id":"DEU","name":"Germany","region":{"id":"ECS","value":"Europe & Central Asia"},"incomeLevel":{"id":"HIC","value":"High income"}}
]]"#;

fn inline_str(cell: &str, text: &str) -> String {
    format!(r#"<c r="{cell}" t="inlineStr"><is><t>{text}</t></is></c>"#)
}

fn number(cell: &str, v: &str) -> String {
    format!(r#"<c r="{cell}"><v>{v}</v></c>"#)
}

/// Minimal single-sheet `.xlsx`; `rows` are `(row number, cells xml)`.
fn xlsx_bytes(rows: &[(u32, String)]) -> Vec<u8> {
    let sheet_data: String = rows
        .iter()
        .map(|(r, cells)| format!(r#"<row r="{r}">{cells}</row>"#))
        .collect();
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
    );
    zip_bytes(&[
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#,
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
        ),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ])
}

fn config(root: &Path) -> Config {
    Config {
        raw_dir: root.join("raw"),
        processed_dir: root.join("processed"),
        hdr_file: "hdr-data.csv".into(),
        ..Config::default()
    }
}

fn catalog() -> IndicatorCatalog {
    IndicatorCatalog::new([
        ("SP.POP.TOTL", "population"),
        ("NY.GDP.PCAP.KD", "gdp_per_capita"),
    ])
    .unwrap()
}

fn years() -> YearRange {
    YearRange::new(1990, 2024).unwrap()
}

#[test]
fn extract_uses_bundled_metadata_when_valid() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("WDI_CSV.zip");
    write_zip(
        &zip_path,
        &[
            ("WDICountry.csv", GOOD_COUNTRY_CSV),
            ("WDICSV.csv", WDI_CSV),
            ("WDISeries.csv", "Series Code\n"),
        ],
    );
    let cfg = config(dir.path());
    let api = FakeApi::new(false);

    let summary = extract_archive(&cfg, &zip_path, &catalog(), years(), &api).unwrap();
    assert_eq!(summary.data_member, "WDICSV.csv");
    assert_eq!(summary.tidy_rows, 4);
    assert!(matches!(summary.metadata, CountryMetadata::Bundled(_)));
    assert_eq!(api.calls.get(), 0);

    let tidy = Table::read_csv(cfg.wdi_path()).unwrap();
    assert_eq!(
        tidy.columns(),
        ["Country Name", "Country Code", "year", "population", "gdp_per_capita"]
    );
    // Germany sorts before United States
    assert_eq!(tidy.cell(0, "Country Code"), Some("DEU"));
    assert_eq!(tidy.cell(2, "population"), Some("331000000"));
    assert_eq!(tidy.cell(2, "gdp_per_capita"), Some("61000.5"));
    assert_eq!(tidy.cell(3, "gdp_per_capita"), None);

    let meta = Table::read_csv(cfg.metadata_path()).unwrap();
    assert_eq!(
        meta.columns(),
        ["Country Code", "Country Name", "Region", "IncomeGroup"]
    );
    assert_eq!(meta.len(), 2);
}

#[test]
fn invalid_bundled_metadata_goes_to_api_with_same_shape() {
    let dir = tempfile::tempdir().unwrap();
    let good_zip = dir.path().join("good.zip");
    let bad_zip = dir.path().join("bad.zip");
    write_zip(&good_zip, &[("WDICSV.csv", WDI_CSV), ("WDICountry.csv", GOOD_COUNTRY_CSV)]);
    write_zip(&bad_zip, &[("WDICSV.csv", WDI_CSV), ("WDICountry.csv", BAD_COUNTRY_CSV)]);

    let good_cfg = config(&dir.path().join("good"));
    let bad_cfg = config(&dir.path().join("bad"));
    let api = FakeApi::new(false);

    let good = extract_archive(&good_cfg, &good_zip, &catalog(), years(), &api).unwrap();
    assert_eq!(api.calls.get(), 0);
    let bad = extract_archive(&bad_cfg, &bad_zip, &catalog(), years(), &api).unwrap();
    assert_eq!(api.calls.get(), 1);
    assert!(matches!(bad.metadata, CountryMetadata::Api(_)));

    let from_file = Table::read_csv(good.metadata_path.unwrap()).unwrap();
    let from_api = Table::read_csv(bad.metadata_path.unwrap()).unwrap();
    assert_eq!(from_file.columns(), from_api.columns());
    assert_eq!(from_file, from_api);
}

#[test]
fn no_metadata_anywhere_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("WDI_CSV.zip");
    write_zip(&zip_path, &[("WDICSV.csv", WDI_CSV)]);
    let cfg = config(dir.path());
    let api = FakeApi::new(true);

    let summary = extract_archive(&cfg, &zip_path, &catalog(), years(), &api).unwrap();
    assert!(summary.metadata.is_absent());
    assert_eq!(summary.metadata_path, None);
    assert_eq!(api.calls.get(), 1);
    assert!(cfg.wdi_path().exists());
    assert!(!cfg.metadata_path().exists());
}

#[test]
fn archive_without_csv_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("WDI_CSV.zip");
    write_zip(&zip_path, &[("readme.txt", "nothing here")]);
    let cfg = config(dir.path());
    let err = extract_archive(&cfg, &zip_path, &catalog(), years(), &FakeApi::new(false))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NoCsvInArchive(_))
    ));
}

#[test]
fn merge_stage_joins_hdi_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("WDI_CSV.zip");
    write_zip(&zip_path, &[("WDICSV.csv", WDI_CSV), ("WDICountry.csv", GOOD_COUNTRY_CSV)]);
    let cfg = config(dir.path());
    extract_archive(&cfg, &zip_path, &catalog(), years(), &FakeApi::new(true)).unwrap();

    std::fs::write(
        cfg.hdr_path(),
        "countryIsoCode,country,indicatorCode,indicator,value,year\n\
         USA,United States,hdi,Human Development Index (value),0.921,2020\n\
         USA,United States,le,Life Expectancy at Birth (years),77.4,2020\n\
         DEU,Germany,hdi,Human Development Index (value),0.948,2021.0\n",
    )
    .unwrap();

    let out = merge_datasets(&cfg).unwrap();
    assert_eq!(out, cfg.output_path());
    let merged = Table::read_csv(&out).unwrap();
    assert_eq!(
        merged.columns(),
        [
            "Country Name",
            "Country Code",
            "year",
            "population",
            "gdp_per_capita",
            "hdi",
            "Region",
            "IncomeGroup"
        ]
    );
    assert_eq!(merged.len(), 4);
    // DEU 2020, DEU 2021, USA 2020, USA 2021
    assert_eq!(merged.cell(0, "hdi"), None);
    assert_eq!(merged.cell(1, "hdi"), Some("0.948"));
    assert_eq!(merged.cell(2, "hdi"), Some("0.921"));
    assert_eq!(merged.cell(2, "Region"), Some("North America"));
    assert_eq!(merged.cell(1, "IncomeGroup"), Some("High income"));
}

#[test]
fn merge_respects_replace_flag() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        replace: false,
        ..config(dir.path())
    };
    std::fs::create_dir_all(&cfg.processed_dir).unwrap();
    std::fs::write(cfg.output_path(), "sentinel\n").unwrap();

    // inputs are absent; the existing output short-circuits before reading them
    let out = merge_datasets(&cfg).unwrap();
    assert_eq!(std::fs::read_to_string(out).unwrap(), "sentinel\n");
}

#[test]
fn merge_without_metadata_file_omits_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    std::fs::create_dir_all(&cfg.raw_dir).unwrap();
    std::fs::write(
        cfg.wdi_path(),
        "Country Name,Country Code,year,population\nUnited States,USA,2020,331000000\n",
    )
    .unwrap();
    std::fs::write(
        cfg.hdr_path(),
        "countryIsoCode,indicatorCode,year,value\nUSA,hdi,2020,0.921\n",
    )
    .unwrap();
    let merged = Table::read_csv(merge_datasets(&cfg).unwrap()).unwrap();
    assert_eq!(
        merged.columns(),
        ["Country Name", "Country Code", "year", "population", "hdi"]
    );
    assert_eq!(merged.cell(0, "hdi"), Some("0.921"));
}

#[test]
fn acquire_bulk_downloads_extracts_and_deletes_archive() {
    let server = MockServer::start();
    let body = zip_bytes(&[("WDICSV.csv", WDI_CSV), ("WDICountry.csv", GOOD_COUNTRY_CSV)]);
    let download = server.mock(|when, then| {
        when.method(GET).path("/WDI_CSV.zip");
        then.status(200).body(body);
    });
    let countries = server.mock(|when, then| {
        when.method(GET).path("/country");
        then.status(500);
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        bulk_url: server.url("/WDI_CSV.zip"),
        api_base_url: server.base_url(),
        ..config(dir.path())
    };
    let out = acquire_bulk(&cfg).unwrap();
    download.assert();
    // bundled WDICountry.csv is valid, so the API is never asked
    countries.assert_hits(0);

    assert_eq!(out, cfg.wdi_path());
    assert!(!cfg.archive_path().exists());
    let tidy = Table::read_csv(&out).unwrap();
    assert_eq!(tidy.columns(), wdi_columns());
    assert_eq!(tidy.len(), 4);
    assert_eq!(tidy.cell(2, "Country Code"), Some("USA"));
    assert_eq!(tidy.cell(2, "population"), Some("331000000"));
    assert_eq!(tidy.cell(2, "gdp_per_capita"), Some("61000.5"));
    assert_eq!(tidy.cell(2, "unemployment"), None);
    assert_eq!(Table::read_csv(cfg.metadata_path()).unwrap().len(), 2);
}

#[test]
fn acquire_bulk_keeps_archive_when_asked() {
    let server = MockServer::start();
    let body = zip_bytes(&[("WDICSV.csv", WDI_CSV), ("WDICountry.csv", GOOD_COUNTRY_CSV)]);
    let download = server.mock(|when, then| {
        when.method(GET).path("/WDI_CSV.zip");
        then.status(200).body(body);
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        bulk_url: server.url("/WDI_CSV.zip"),
        api_base_url: server.base_url(),
        delete_archive: false,
        ..config(dir.path())
    };
    acquire_bulk(&cfg).unwrap();
    assert!(cfg.archive_path().exists());

    // second run reuses the cached archive
    acquire_bulk(&cfg).unwrap();
    download.assert_hits(1);
}

#[test]
fn acquire_skips_existing_output_without_replace() {
    let server = MockServer::start();
    let download = server.mock(|when, then| {
        when.method(GET).path("/WDI_CSV.zip");
        then.status(200).body(zip_bytes(&[("WDICSV.csv", WDI_CSV)]));
    });
    let indicators = server.mock(|when, then| {
        when.method(GET).path_contains("/indicator/");
        then.status(500);
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        bulk_url: server.url("/WDI_CSV.zip"),
        api_base_url: server.base_url(),
        replace: false,
        ..config(dir.path())
    };
    std::fs::create_dir_all(&cfg.raw_dir).unwrap();
    std::fs::write(cfg.wdi_path(), "sentinel\n").unwrap();

    assert_eq!(acquire_bulk(&cfg).unwrap(), cfg.wdi_path());
    let client = Client::new(cfg.api_base_url.as_str(), cfg.api_timeout()).unwrap();
    assert_eq!(acquire_api(&cfg, &client).unwrap(), cfg.wdi_path());

    download.assert_hits(0);
    indicators.assert_hits(0);
    assert_eq!(std::fs::read_to_string(cfg.wdi_path()).unwrap(), "sentinel\n");
}

#[test]
fn acquire_api_writes_tidy_table_and_api_metadata() {
    let server = MockServer::start();
    let point = |ind: &str, iso2: &str, iso3: &str, name: &str, date: &str, value: &str| {
        format!(
            r#"{{"indicator":{{"id":"{ind}","value":"x"}},"country":{{"id":"{iso2}","value":"{name}"}},"countryiso3code":"{iso3}","date":"{date}","value":{value},"unit":"","obs_status":"","decimal":0}}"#
        )
    };
    let body = format!(
        r#"[{{"page":1,"pages":1,"per_page":1000,"total":4}},[{},{},{},{}]]"#,
        point("SP.POP.TOTL", "US", "USA", "United States", "2020", "331000000"),
        point("SP.POP.TOTL", "US", "USA", "United States", "2021", "332000000"),
        point("NY.GDP.PCAP.KD", "US", "USA", "United States", "2020", "61000.5"),
        point("SP.POP.TOTL", "DE", "DEU", "Germany", "2020", "null"),
    );
    let indicators = server.mock(|when, then| {
        when.method(GET)
            .path_contains("/country/all/indicator/")
            .query_param("source", "2")
            .query_param("date", "1990:2024");
        then.status(200).body(body);
    });
    let countries = server.mock(|when, then| {
        when.method(GET).path("/country");
        then.status(200).body(COUNTRIES_JSON);
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        api_base_url: server.base_url(),
        ..config(dir.path())
    };
    let client = Client::new(cfg.api_base_url.as_str(), cfg.api_timeout()).unwrap();
    let out = acquire_api(&cfg, &client).unwrap();
    indicators.assert();
    countries.assert();

    let tidy = Table::read_csv(&out).unwrap();
    assert_eq!(tidy.columns(), wdi_columns());
    // DEU 2020, DEU 2021, USA 2020, USA 2021
    assert_eq!(tidy.len(), 4);
    assert_eq!(tidy.cell(0, "Country Code"), Some("DEU"));
    assert_eq!(tidy.cell(0, "population"), None);
    assert_eq!(tidy.cell(2, "population"), Some("331000000"));
    assert_eq!(tidy.cell(2, "gdp_per_capita"), Some("61000.5"));
    assert_eq!(tidy.cell(3, "year"), Some("2021"));
    assert_eq!(tidy.cell(3, "population"), Some("332000000"));
    assert_eq!(tidy.cell(3, "gdp_per_capita"), None);

    let meta = Table::read_csv(cfg.metadata_path()).unwrap();
    assert_eq!(
        meta.columns(),
        ["Country Code", "Country Name", "Region", "IncomeGroup"]
    );
    assert_eq!(meta.cell(1, "Region"), Some("Europe & Central Asia"));
}

#[test]
fn merge_reads_default_xlsx_export() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        hdr_file: Config::default().hdr_file,
        ..config(dir.path())
    };
    assert!(cfg.hdr_path().to_string_lossy().ends_with(".xlsx"));
    std::fs::create_dir_all(&cfg.raw_dir).unwrap();
    std::fs::write(
        cfg.wdi_path(),
        "Country Name,Country Code,year,population\n\
         Germany,DEU,2021,83100000\n\
         United States,USA,2020,331000000\n",
    )
    .unwrap();
    let header = ["countryIsoCode", "indicatorCode", "year", "value"];
    let rows: Vec<(u32, String)> = vec![
        (
            1,
            ["A1", "B1", "C1", "D1"]
                .iter()
                .zip(header)
                .map(|(c, h)| inline_str(c, h))
                .collect(),
        ),
        (
            2,
            [
                inline_str("A2", "USA"),
                inline_str("B2", "hdi"),
                number("C2", "2020"),
                number("D2", "0.921"),
            ]
            .concat(),
        ),
        (3, String::new()),
        (
            4,
            [
                inline_str("A4", "DEU"),
                inline_str("B4", "hdi"),
                inline_str("C4", "2021.0"),
                number("D4", "0.948"),
            ]
            .concat(),
        ),
        (
            5,
            [
                inline_str("A5", "USA"),
                inline_str("B5", "le"),
                number("C5", "2020"),
                number("D5", "77.4"),
            ]
            .concat(),
        ),
        // blank ISO code
        (
            6,
            [
                inline_str("B6", "hdi"),
                number("C6", "2020"),
                number("D6", "0.5"),
            ]
            .concat(),
        ),
    ];
    std::fs::write(cfg.hdr_path(), xlsx_bytes(&rows)).unwrap();

    let raw = hdr::read_workbook(cfg.hdr_path()).unwrap();
    assert_eq!(raw.columns(), header);
    assert_eq!(raw.len(), 5);
    assert!(raw.rows()[1].iter().all(Option::is_none));
    assert_eq!(raw.cell(0, "year"), Some("2020"));
    assert_eq!(raw.cell(4, "countryIsoCode"), None);

    let merged = Table::read_csv(merge_datasets(&cfg).unwrap()).unwrap();
    assert_eq!(
        merged.columns(),
        ["Country Name", "Country Code", "year", "population", "hdi"]
    );
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.cell(0, "hdi"), Some("0.948"));
    assert_eq!(merged.cell(1, "hdi"), Some("0.921"));
}
