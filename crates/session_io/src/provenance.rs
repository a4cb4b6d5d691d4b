//! Provenance table (`frame_time_history.csv`)
//!
//! One row per frame actually written to a video file, mapping it to the
//! bundle it came from. Written once when a session closes.

use std::path::Path;

use contracts::CameraId;
use serde::{Deserialize, Serialize};

use crate::StorageError;

/// Column names, in file order
pub const PROVENANCE_COLUMNS: [&str; 4] = ["sync_index", "port", "frame_index", "frame_time"];

/// One provenance row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRow {
    pub sync_index: u64,
    pub port: CameraId,
    pub frame_index: u64,
    pub frame_time: f64,
}

/// Write the whole table
///
/// The header row is written even when `rows` is empty.
pub fn write_provenance(path: &Path, rows: &[ProvenanceRow]) -> Result<(), StorageError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(PROVENANCE_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the whole table
pub fn read_provenance(path: &Path) -> Result<Vec<ProvenanceRow>, StorageError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.iter().ne(PROVENANCE_COLUMNS) {
        return Err(StorageError::invalid(format!(
            "unexpected provenance columns: {:?}",
            headers.iter().collect::<Vec<_>>()
        )));
    }

    reader
        .deserialize()
        .map(|row| row.map_err(StorageError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_always_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_time_history.csv");

        write_provenance(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), "sync_index,port,frame_index,frame_time");
        assert!(read_provenance(&path).unwrap().is_empty());
    }

    #[test]
    fn test_rows_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_time_history.csv");

        let rows = vec![
            ProvenanceRow {
                sync_index: 0,
                port: CameraId::new(0),
                frame_index: 12,
                frame_time: 1700000000.25,
            },
            ProvenanceRow {
                sync_index: 0,
                port: CameraId::new(1),
                frame_index: 3,
                frame_time: 1700000000.5,
            },
        ];
        write_provenance(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("0,0,12,"));
        assert_eq!(read_provenance(&path).unwrap(), rows);
    }

    #[test]
    fn test_wrong_columns_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(matches!(
            read_provenance(&path),
            Err(StorageError::InvalidContainer(_))
        ));
    }
}
