//! Catalog introspection snapshot loading

mod records;

pub use records::{
    ColumnRecord, DependencyRecord, IndexStatRecord, RelationshipRecord, RoutineRecord, Snapshot,
};

use std::path::Path;

use encoding_rs::{UTF_8, WINDOWS_1252};

use crate::error::LineageError;

/// Load a snapshot document from disk.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, LineageError> {
    let bytes = std::fs::read(path).map_err(|e| LineageError::SnapshotReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let text = decode_text(&bytes).map_err(|message| LineageError::SnapshotEncodingError {
        path: path.to_path_buf(),
        message,
    })?;

    parse_snapshot(&text).map_err(|e| LineageError::SnapshotParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Parse snapshot JSON text.
pub fn parse_snapshot(text: &str) -> Result<Snapshot, serde_json::Error> {
    serde_json::from_str(text)
}

/// Decode file bytes: BOM-marked UTF-8/UTF-16, then plain UTF-8, then Windows-1252.
pub fn decode_text(bytes: &[u8]) -> Result<String, String> {
    let has_bom = bytes.starts_with(&[0xEF, 0xBB, 0xBF])
        || bytes.starts_with(&[0xFF, 0xFE])
        || bytes.starts_with(&[0xFE, 0xFF]);
    if has_bom {
        // decode() sniffs the BOM, picks its encoding and strips it
        let (decoded, encoding, had_errors) = UTF_8.decode(bytes);
        if had_errors {
            return Err(format!("invalid {} byte sequence", encoding.name()));
        }
        return Ok(decoded.into_owned());
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(_) => {
            // Fall back to Windows-1252 (common for files exported on Windows)
            let (decoded, _, had_errors) = WINDOWS_1252.decode(bytes);
            if had_errors {
                Err("file contains invalid characters".to_string())
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}
