//! Custody calendar loader.
//!
//! Reads events exported from the shared custody calendar as a JSON array.
//! Only timed events carry a hand-off instant, so all-day entries are skipped.

use crate::{RawEvent, Result};
use chrono::DateTime;
use serde::Deserialize;
use std::path::Path;

/// One exported calendar row
#[derive(Debug, Deserialize)]
struct EventRow {
    #[serde(alias = "summary", default)]
    title: String,
    start: String,
    end: String,
}

/// Load custody calendar events from a JSON file.
///
/// Returns an empty list if the file doesn't exist. Returns an error if the
/// file exists but isn't a JSON array of events.
pub fn load_custody_events(path: &Path) -> Result<Vec<RawEvent>> {
    if !path.exists() {
        tracing::debug!("No custody events file found at {:?}", path);
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path)?;
    let rows: Vec<EventRow> = serde_json::from_str(&contents)?;

    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let start = DateTime::parse_from_rfc3339(&row.start);
        let end = DateTime::parse_from_rfc3339(&row.end);
        match (start, end) {
            (Ok(start), Ok(end)) => events.push(RawEvent {
                title: row.title,
                start,
                end,
            }),
            _ => {
                tracing::warn!(
                    "Skipping calendar event {:?} without timed start/end ({} to {})",
                    row.title,
                    row.start,
                    row.end
                );
            }
        }
    }

    tracing::info!("Loaded {} custody events from {:?}", events.len(), path);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_load_events() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("events.json");

        let json = r#"[
            {"title": "Brian", "start": "2025-10-10T17:00:00-04:00", "end": "2025-10-12T17:00:00-04:00"},
            {"summary": "Brian/Thanksgiving", "start": "2025-11-26T17:00:00-05:00", "end": "2025-11-28T17:00:00-05:00"}
        ]"#;
        std::fs::write(&path, json).unwrap();

        let events = load_custody_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Brian");
        assert_eq!(events[1].title, "Brian/Thanksgiving");
        assert_eq!(
            events[0].start.naive_local().to_string(),
            "2025-10-10 17:00:00"
        );
    }

    #[test]
    fn test_all_day_events_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("events.json");

        let json = r#"[
            {"title": "School holiday", "start": "2025-10-13", "end": "2025-10-14"},
            {"title": "Brian", "start": "2025-10-17T17:00:00Z", "end": "2025-10-19T17:00:00Z"}
        ]"#;
        std::fs::write(&path, json).unwrap();

        let events = load_custody_events(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Brian");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let events = load_custody_events(&temp_dir.path().join("nonexistent.json")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        assert!(matches!(load_custody_events(&path), Err(Error::Json(_))));
    }
}
