//! CSV export of the distribution history.

use crate::ledger::Ledger;
use crate::{Distribution, PrescriptionFill, Result};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use uuid::Uuid;

/// Column names, in `CsvRow` field order
const HEADERS: [&str; 7] = [
    "date",
    "quantity",
    "fill_id",
    "fill_date",
    "pharmacy",
    "notes",
    "recorded_at",
];

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    quantity: u32,
    fill_id: String,
    fill_date: Option<String>,
    pharmacy: Option<String>,
    notes: Option<String>,
    recorded_at: String,
}

impl CsvRow {
    fn new(distribution: &Distribution, fill: Option<&PrescriptionFill>) -> Self {
        CsvRow {
            date: distribution.date.to_string(),
            quantity: distribution.quantity,
            fill_id: distribution.fill_id.to_string(),
            fill_date: fill.map(|f| f.fill_date.to_string()),
            pharmacy: fill.and_then(|f| f.pharmacy.clone()),
            notes: distribution.notes.clone(),
            recorded_at: distribution.recorded_at.to_rfc3339(),
        }
    }
}

/// Write every distribution, oldest first, to a CSV file at `path`.
///
/// The file is replaced, headers are written first, and the data is synced
/// to disk before returning. Returns the number of rows written.
pub fn export_distributions(ledger: &Ledger, path: &Path) -> Result<usize> {
    let fills: HashMap<Uuid, PrescriptionFill> =
        ledger.fills()?.into_iter().map(|f| (f.id, f)).collect();
    let mut distributions = ledger.distributions()?;
    distributions.sort_by_key(|d| (d.date, d.recorded_at));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    // serialize() only emits headers alongside the first row
    if distributions.is_empty() {
        writer.write_record(HEADERS)?;
    }
    for distribution in &distributions {
        writer.serialize(CsvRow::new(distribution, fills.get(&distribution.fill_id)))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} distributions to {:?}", distributions.len(), path);

    Ok(distributions.len())
}
