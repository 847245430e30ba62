use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use wdi_hdr::{Client, Config, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "wdi-hdr",
    version,
    about = "Download, reshape & merge World Bank WDI and UNDP HDR indicators"
)]
struct Cli {
    /// TOML file overriding the default paths and options.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(flatten)]
    opts: Overrides,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the WDI bulk archive and write the tidy indicator table (+ metadata).
    Acquire,
    /// Build the tidy indicator table from the indicator API instead of the archive.
    Fetch,
    /// Merge the tidy table with HDI and country metadata.
    Merge,
    /// Acquire, then merge.
    Run,
}

#[derive(Args, Debug)]
struct Overrides {
    /// Directory for downloads and intermediate files (default data/raw).
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,
    /// Directory for the merged output (default data/processed).
    #[arg(long, global = true)]
    processed_dir: Option<PathBuf>,
    /// First year kept (default 1990).
    #[arg(long, global = true)]
    year_min: Option<i32>,
    /// Last year kept (default 2024).
    #[arg(long, global = true)]
    year_max: Option<i32>,
    /// Keep the downloaded archive after extraction.
    #[arg(long, global = true, default_value_t = false)]
    keep_archive: bool,
    /// Do not overwrite outputs that already exist.
    #[arg(long, global = true, default_value_t = false)]
    no_replace: bool,
}

impl Overrides {
    fn apply(&self, cfg: &mut Config) {
        if let Some(d) = &self.raw_dir {
            cfg.raw_dir = d.clone();
        }
        if let Some(d) = &self.processed_dir {
            cfg.processed_dir = d.clone();
        }
        if let Some(y) = self.year_min {
            cfg.year_min = y;
        }
        if let Some(y) = self.year_max {
            cfg.year_max = y;
        }
        if self.keep_archive {
            cfg.delete_archive = false;
        }
        if self.no_replace {
            cfg.replace = false;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    cli.opts.apply(&mut cfg);

    match cli.cmd {
        Command::Acquire => {
            let out = pipeline::acquire_bulk(&cfg)?;
            eprintln!("Saved tidy indicators to {}", out.display());
        }
        Command::Fetch => {
            let client = Client::new(cfg.api_base_url.as_str(), cfg.api_timeout())?;
            let out = pipeline::acquire_api(&cfg, &client)?;
            eprintln!("Saved tidy indicators to {}", out.display());
        }
        Command::Merge => {
            let out = pipeline::merge_datasets(&cfg)?;
            eprintln!("Saved merged dataset to {}", out.display());
        }
        Command::Run => {
            let out = pipeline::run_all(&cfg)?;
            eprintln!("Saved merged dataset to {}", out.display());
        }
    }
    Ok(())
}
