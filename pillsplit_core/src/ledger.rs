//! Fill and distribution ledger.
//!
//! Records are appended to JSONL (JSON Lines) files with file locking.
//! Administrative corrections rewrite a file atomically through a temp file
//! in the same directory.

use crate::{Distribution, Error, PrescriptionFill, Result};
use chrono::{NaiveDate, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Append-only JSONL file of `T` records
pub struct JsonlLog<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> JsonlLog<T> {
    /// Create a log for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append one record under an exclusive lock
    pub fn append(&self, record: &T) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;
        Ok(())
    }

    /// Read every record under a shared lock.
    ///
    /// Malformed lines are logged and skipped.
    pub fn read_all(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let reader = BufReader::new(&file);
        let mut records = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<T>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {:?} at line {}: {}",
                        self.path,
                        line_num + 1,
                        e
                    );
                }
            }
        }

        file.unlock()?;
        Ok(records)
    }

    /// Replace the whole file atomically.
    ///
    /// Writes to a temp file in the same directory, syncs it, then renames it
    /// over the original.
    pub fn rewrite(&self, records: &[T]) -> Result<()> {
        self.ensure_parent_dir()?;

        let temp = NamedTempFile::new_in(self.path.parent().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "ledger path missing parent",
            ))
        })?)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            for record in records {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// A fill about to be recorded
#[derive(Clone, Debug, Default)]
pub struct NewFill {
    pub fill_date: NaiveDate,
    pub quantity: u32,
    pub pharmacy: Option<String>,
    pub rx_number: Option<String>,
    pub notes: Option<String>,
}

/// A distribution about to be recorded
#[derive(Clone, Debug)]
pub struct NewDistribution {
    pub date: NaiveDate,
    pub quantity: u32,
    pub fill_id: Uuid,
    pub notes: Option<String>,
}

/// The household's fill and distribution records
pub struct Ledger {
    fills: JsonlLog<PrescriptionFill>,
    distributions: JsonlLog<Distribution>,
}

impl Ledger {
    /// Open the ledger stored under `data_dir`
    pub fn open(data_dir: &Path) -> Self {
        Self {
            fills: JsonlLog::new(data_dir.join("fills.jsonl")),
            distributions: JsonlLog::new(data_dir.join("distributions.jsonl")),
        }
    }

    /// Record a new prescription fill
    pub fn record_fill(&self, new: NewFill) -> Result<PrescriptionFill> {
        if new.quantity == 0 {
            return Err(Error::Ledger("fill quantity must be positive".into()));
        }

        let fill = PrescriptionFill {
            id: Uuid::new_v4(),
            fill_date: new.fill_date,
            quantity: new.quantity,
            pharmacy: new.pharmacy,
            rx_number: new.rx_number,
            notes: new.notes,
            recorded_at: Utc::now(),
        };
        self.fills.append(&fill)?;

        tracing::info!(
            "Recorded fill {} of {} pills on {}",
            fill.id,
            fill.quantity,
            fill.fill_date
        );
        Ok(fill)
    }

    /// Record pills handed to the other parent from an existing fill
    pub fn record_distribution(&self, new: NewDistribution) -> Result<Distribution> {
        if new.quantity == 0 {
            return Err(Error::Ledger("distribution quantity must be positive".into()));
        }
        if self.fill(new.fill_id)?.is_none() {
            return Err(Error::Ledger(format!("unknown fill {}", new.fill_id)));
        }

        let distribution = Distribution {
            id: Uuid::new_v4(),
            date: new.date,
            quantity: new.quantity,
            fill_id: new.fill_id,
            notes: new.notes,
            recorded_at: Utc::now(),
        };
        self.distributions.append(&distribution)?;

        tracing::info!(
            "Recorded distribution of {} pills on {} from fill {}",
            distribution.quantity,
            distribution.date,
            distribution.fill_id
        );
        Ok(distribution)
    }

    pub fn fills(&self) -> Result<Vec<PrescriptionFill>> {
        self.fills.read_all()
    }

    pub fn distributions(&self) -> Result<Vec<Distribution>> {
        self.distributions.read_all()
    }

    pub fn fill(&self, id: Uuid) -> Result<Option<PrescriptionFill>> {
        Ok(self.fills()?.into_iter().find(|f| f.id == id))
    }

    /// Most recent fill by fill date, then by when it was recorded
    pub fn latest_fill(&self) -> Result<Option<PrescriptionFill>> {
        Ok(self
            .fills()?
            .into_iter()
            .max_by_key(|f| (f.fill_date, f.recorded_at)))
    }

    /// Fills newest first
    pub fn fill_history(&self, limit: usize) -> Result<Vec<PrescriptionFill>> {
        let mut fills = self.fills()?;
        fills.sort_by(|a, b| (b.fill_date, b.recorded_at).cmp(&(a.fill_date, a.recorded_at)));
        fills.truncate(limit);
        Ok(fills)
    }

    /// Distributions drawing on `fill_id`, oldest first
    pub fn distributions_for(&self, fill_id: Uuid) -> Result<Vec<Distribution>> {
        let mut distributions: Vec<Distribution> = self
            .distributions()?
            .into_iter()
            .filter(|d| d.fill_id == fill_id)
            .collect();
        distributions.sort_by_key(|d| (d.date, d.recorded_at));
        Ok(distributions)
    }

    /// Distributions newest first
    pub fn distribution_history(&self, limit: usize) -> Result<Vec<Distribution>> {
        let mut distributions = self.distributions()?;
        distributions.sort_by(|a, b| (b.date, b.recorded_at).cmp(&(a.date, a.recorded_at)));
        distributions.truncate(limit);
        Ok(distributions)
    }

    /// Administrative correction of a recorded fill.
    ///
    /// The id and record time are kept; the quantity must stay positive and
    /// may not drop below what has already been handed out.
    pub fn correct_fill<F>(&self, id: Uuid, edit: F) -> Result<PrescriptionFill>
    where
        F: FnOnce(&mut PrescriptionFill),
    {
        let mut fills = self.fills()?;
        let fill = fills
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| Error::Ledger(format!("unknown fill {}", id)))?;

        let (original_id, recorded_at) = (fill.id, fill.recorded_at);
        edit(fill);
        fill.id = original_id;
        fill.recorded_at = recorded_at;

        if fill.quantity == 0 {
            return Err(Error::Ledger("fill quantity must be positive".into()));
        }
        let handed_out: u32 = self.distributions_for(id)?.iter().map(|d| d.quantity).sum();
        if fill.quantity < handed_out {
            return Err(Error::Ledger(format!(
                "fill {} already has {} pills distributed",
                id, handed_out
            )));
        }

        let corrected = fill.clone();
        self.fills.rewrite(&fills)?;

        tracing::info!("Corrected fill {}", id);
        Ok(corrected)
    }
}
