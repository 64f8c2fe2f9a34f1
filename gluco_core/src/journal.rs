//! Append-only JSONL journals for immutable records.
//!
//! Readings, intakes, alerts and audit entries are appended one JSON
//! object per line, with file locking so separate processes never
//! interleave partial lines.

use crate::Result;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A JSONL file holding records of type `T`
pub struct Journal<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> Journal<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a journal handle for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append one record as a JSON line under an exclusive lock
    ///
    /// The line is synced to disk before this returns.
    pub fn append(&self, record: &T) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let line = serde_json::to_string(record)?;
        let write_result = write_line(&file, &line);

        file.unlock()?;
        write_result?;

        tracing::debug!("Appended record to {:?}", self.path);
        Ok(())
    }

    /// Read every record, skipping lines that fail to parse
    pub fn read_all(&self) -> Result<Vec<T>> {
        read_entries(&self.path)
    }
}

/// Write one line and sync it to disk before the lock is released
fn write_line(file: &File, line: &str) -> Result<()> {
    {
        let mut writer = std::io::BufWriter::new(file);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    file.sync_data()?;
    Ok(())
}

/// Read all records from a JSONL file under a shared lock
///
/// A missing file reads as empty. Corrupt lines are logged and skipped.
pub fn read_entries<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = match line_result {
            Ok(line) => line,
            Err(e) => {
                let _ = file.unlock();
                return Err(e.into());
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(
                    "Skipping malformed record in {:?} at line {}: {}",
                    path,
                    line_num + 1,
                    e
                );
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} records from {:?}", entries.len(), path);
    Ok(entries)
}
