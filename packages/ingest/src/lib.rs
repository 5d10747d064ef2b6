#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! File-format glue around the school gap engine.
//!
//! Reads the Get Information About Schools export ([`gias`]) and the LSOA
//! centroid and IDACI tables ([`idaci`]) into the engine's raw record
//! types, and writes scored output as CSV and JSON ([`export`]).
//! [`explanatory`] tidies passthrough fields before charting.

pub mod explanatory;
pub mod export;
pub mod gias;
pub mod idaci;

use std::collections::BTreeMap;
use std::io::Read;

/// Errors that can occur while reading inputs or writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required column is absent from a header row.
    #[error("{file}: missing required column {column:?}")]
    MissingColumn {
        /// Which input the header belongs to.
        file: &'static str,
        /// The column that was looked for.
        column: String,
    },
}

/// Header lookup for a CSV table.
pub(crate) struct Columns {
    file: &'static str,
    index: BTreeMap<String, usize>,
}

impl Columns {
    pub(crate) fn new(file: &'static str, headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        Self { file, index }
    }

    pub(crate) fn optional(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Case-insensitive lookup, for tables whose header casing varies
    /// between releases.
    pub(crate) fn optional_ignore_case(&self, name: &str) -> Option<usize> {
        self.index
            .iter()
            .find(|(h, _)| h.eq_ignore_ascii_case(name))
            .map(|(_, &i)| i)
    }

    pub(crate) fn required(&self, name: &str) -> Result<usize, IngestError> {
        self.optional(name).ok_or_else(|| self.missing(name))
    }

    pub(crate) fn missing(&self, name: &str) -> IngestError {
        IngestError::MissingColumn {
            file: self.file,
            column: name.to_string(),
        }
    }
}

/// Trimmed cell text; empty for a short row.
pub(crate) fn cell(record: &csv::StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("").trim()
}

/// Parses a numeric cell.
///
/// Empty cells are `None`. Text that is not a number becomes NaN so model
/// validation reports it as non-numeric rather than missing.
pub(crate) fn numeric(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    Some(text.parse().unwrap_or_else(|_| {
        log::trace!("Non-numeric cell {text:?}");
        f64::NAN
    }))
}

/// Reads `reader` to the end, decoding each byte as a Latin-1 code point.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if reading fails.
pub fn read_latin1(mut reader: impl Read) -> Result<String, IngestError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_decodes_every_byte() {
        let bytes: &[u8] = b"St Mary\xe2s \xa3 Caf\xe9";
        let text = read_latin1(bytes).unwrap();
        assert_eq!(text, "St Mary\u{e2}s \u{a3} Caf\u{e9}");
    }

    #[test]
    fn numeric_cells() {
        assert_eq!(numeric(""), None);
        assert_eq!(numeric("12.5"), Some(12.5));
        assert!(numeric("SUPP").unwrap().is_nan());
    }

    #[test]
    fn missing_column_names_the_file() {
        let headers = csv::StringRecord::from(vec!["URN", " Easting "]);
        let columns = Columns::new("gias", &headers);
        assert_eq!(columns.required("Easting").unwrap(), 1);
        let err = columns.required("Northing").unwrap_err();
        assert!(err.to_string().contains("Northing"));
        assert_eq!(columns.optional_ignore_case("urn"), Some(0));
    }
}
