//! A small in-memory table: ordered named columns and rows of nullable text cells.
//!
//! Values stay as the text read from the source, so a read → write cycle does not
//! reformat numbers. An empty CSV field is a missing value.

use crate::error::PipelineError;
use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub type Cell = Option<String>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            bail!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like [`Table::column_index`] but a missing column is a `PipelineError::MissingColumn`.
    pub fn require_column(&self, name: &str, table: &str) -> Result<usize, PipelineError> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::MissingColumn {
                table: table.to_string(),
                column: name.to_string(),
            })
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Trim surrounding whitespace from every column name.
    pub fn strip_column_names(&mut self) {
        for c in &mut self.columns {
            let trimmed = c.trim();
            if trimmed.len() != c.len() {
                *c = trimmed.to_string();
            }
        }
    }

    /// Read a CSV with a header row. Short rows are padded with missing cells; cells
    /// beyond the header width are dropped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: Vec<String> = rdr
            .headers()
            .context("read CSV header")?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let width = columns.len();
        let mut rows = Vec::new();
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("read CSV record {}", i + 1))?;
            if rec.len() > width {
                log::debug!(
                    "CSV record {} has {} fields, header has {}; extra fields dropped",
                    i + 1,
                    rec.len(),
                    width
                );
            }
            let mut row: Vec<Cell> = rec
                .iter()
                .take(width)
                .map(|v| (!v.is_empty()).then(|| v.to_string()))
                .collect();
            row.resize(width, None);
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::from_reader(f).with_context(|| format!("parse {}", path.display()))
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Save as UTF-8 CSV with header.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        self.to_writer(f)
            .with_context(|| format!("write {}", path.display()))
    }
}
