//! JSON file backend: one pretty-printed array per collection.

use super::{Record, Repository};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct JsonFileRepository {
    name: String,
    path: PathBuf,
}

impl JsonFileRepository {
    /// Collection `name` is stored at `<data_dir>/<name>.json`
    pub fn new(data_dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        Ok(Self {
            name: name.to_string(),
            path: data_dir.join(format!("{}.json", name)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Record> Repository<T> for JsonFileRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            info!(
                collection = %self.name,
                "No {} file found, starting with an empty collection",
                self.name
            );
            return Ok(Vec::new());
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let records: Vec<T> = serde_json::from_str(&data)
            .with_context(|| format!("Corrupt collection file {}", self.path.display()))?;

        info!(collection = %self.name, count = records.len(), "Collection loaded from file");
        Ok(records)
    }

    fn save(&self, records: &[T]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)
            .with_context(|| format!("Failed to serialize {}", self.name))?;

        // Write to temp file then rename (atomic on POSIX)
        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| e.into_error())?
            .sync_all()?;

        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(collection = %self.name, count = records.len(), "Collection saved to file");
        Ok(())
    }
}
