use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::rows::ResultRow;

/// Writes result rows as CSV. The header is written up front, so a run with
/// no rows still produces a well-formed file.
pub struct CsvWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl CsvWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {:?}", parent))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .context(format!("Failed to create CSV file: {:?}", path))?;
        writer
            .write_record(ResultRow::HEADER)
            .context("Failed to write CSV header")?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write_row(&mut self, row: &ResultRow) -> Result<()> {
        self.writer
            .serialize(row)
            .context(format!("Failed to write CSV row to {:?}", self.path))?;
        self.rows += 1;
        Ok(())
    }

    pub fn write_all<'a>(&mut self, rows: impl IntoIterator<Item = &'a ResultRow>) -> Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Flush and return the number of rows written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer
            .flush()
            .context(format!("Failed to flush CSV file: {:?}", self.path))?;
        tracing::info!(path = ?self.path, rows = self.rows, "CSV written");
        Ok(self.rows)
    }
}
