//! wdi_hdr
//!
//! Download, reshape and merge socioeconomic indicator data into one tidy CSV keyed
//! by country and year. Pairs with the `wdi-hdr` CLI.
//!
//! ### Stages
//! - **Acquire**: fetch the World Bank WDI bulk archive (or query the indicator API),
//!   pick the data CSV, resolve country metadata, and reshape the wide
//!   country × indicator table into one row per (country, year).
//! - **Merge**: left-join the UNDP Human Development Index and the country
//!   metadata (region, income group) onto that table.
//!
//! ### Example
//! ```no_run
//! use wdi_hdr::{Config, pipeline};
//!
//! let cfg = Config::default();
//! pipeline::acquire_bulk(&cfg)?;
//! let merged = pipeline::merge_datasets(&cfg)?;
//! println!("{}", merged.display());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod archive;
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod hdr;
pub mod merge;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod reshape;
pub mod table;

pub use api::Client;
pub use catalog::IndicatorCatalog;
pub use config::Config;
pub use error::PipelineError;
pub use models::{CountryRecord, DataPoint, YearRange};
pub use table::Table;
