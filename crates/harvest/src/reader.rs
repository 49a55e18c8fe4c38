use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tokio::fs;

use crate::record::{DocumentRecord, HarvestedRecord};

/// JSON array of records on disk.
pub struct RecordFile;

impl RecordFile {
    /// Write harvested records as pretty JSON, creating parent directories.
    pub async fn write(path: &Path, records: &[HarvestedRecord]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create directory: {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(records).context("Failed to serialize records")?;
        fs::write(path, json)
            .await
            .context(format!("Failed to write records file: {:?}", path))?;
        Ok(())
    }

    /// Read any JSON array of record objects, leniently.
    pub async fn read(path: &Path) -> Result<Vec<DocumentRecord>> {
        let content = fs::read_to_string(path)
            .await
            .context(format!("Failed to read records file: {:?}", path))?;

        let value: Value = serde_json::from_str(&content)
            .context(format!("Records file is not valid JSON: {:?}", path))?;

        match value {
            Value::Array(items) => Ok(items.iter().map(DocumentRecord::from_value).collect()),
            _ => anyhow::bail!("Records file must hold a JSON array: {:?}", path),
        }
    }
}
