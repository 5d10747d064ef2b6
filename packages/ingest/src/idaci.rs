//! LSOA population-weighted centroids joined to IDACI scores.
//!
//! The scores come from a CSV export of IoD2019 File 5 and the centroids
//! from the ONS LSOA (December 2011) population-weighted centroid table.
//! Only English LSOAs are scored, so Welsh centroids are dropped.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use school_gap_models::CandidateRecord;

use crate::{Columns, IngestError, cell, numeric};

const SCORE_CODE: &str = "LSOA code (2011)";
const SCORE_RATE: &str = "Income Deprivation Affecting Children Index (IDACI) Score (rate)";
const CENTROID_CODE: &str = "LSOA11CD";

/// A population-weighted LSOA centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct LsoaCentroid {
    pub code: String,
    pub easting: Option<f64>,
    pub northing: Option<f64>,
}

/// Reads IDACI rates keyed by LSOA code.
///
/// # Errors
///
/// Returns [`IngestError`] if the input cannot be parsed or a required
/// column is missing.
pub fn read_idaci_scores(reader: impl Read) -> Result<BTreeMap<String, f64>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = Columns::new("IDACI scores", reader.headers()?);
    let code = columns.required(SCORE_CODE)?;
    let rate = columns.required(SCORE_RATE)?;

    let mut scores = BTreeMap::new();
    for result in reader.records() {
        let record = result?;
        match numeric(cell(&record, rate)) {
            Some(value) if value.is_finite() => {
                scores.insert(cell(&record, code).to_string(), value);
            }
            _ => log::debug!("No IDACI rate for LSOA {}", cell(&record, code)),
        }
    }

    log::info!("Read {} IDACI scores", scores.len());
    Ok(scores)
}

/// Reads LSOA centroids.
///
/// The code column is `LSOA11CD`; coordinates are the `x`/`y` columns in
/// any casing.
///
/// # Errors
///
/// Returns [`IngestError`] if the input cannot be parsed or a required
/// column is missing.
pub fn read_lsoa_centroids(reader: impl Read) -> Result<Vec<LsoaCentroid>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = Columns::new("LSOA centroids", reader.headers()?);
    let code = columns
        .optional_ignore_case(CENTROID_CODE)
        .ok_or_else(|| columns.missing(CENTROID_CODE))?;
    let x = columns
        .optional_ignore_case("x")
        .ok_or_else(|| columns.missing("x"))?;
    let y = columns
        .optional_ignore_case("y")
        .ok_or_else(|| columns.missing("y"))?;

    let mut centroids = Vec::new();
    for result in reader.records() {
        let record = result?;
        centroids.push(LsoaCentroid {
            code: cell(&record, code).to_string(),
            easting: numeric(cell(&record, x)),
            northing: numeric(cell(&record, y)),
        });
    }

    log::info!("Read {} LSOA centroids", centroids.len());
    Ok(centroids)
}

/// Joins scores onto English centroids as unsized candidates.
///
/// A centroid without a score keeps a missing target and is rejected when
/// the candidate store is loaded.
#[must_use]
pub fn join_candidates(
    scores: &BTreeMap<String, f64>,
    centroids: Vec<LsoaCentroid>,
) -> Vec<CandidateRecord> {
    let total = centroids.len();
    let candidates: Vec<CandidateRecord> = centroids
        .into_iter()
        .filter(|c| c.code.starts_with('E'))
        .map(|c| CandidateRecord {
            target: scores.get(&c.code).copied(),
            id: c.code,
            easting: c.easting,
            northing: c.northing,
            size: None,
        })
        .collect();

    let unscored = candidates.iter().filter(|c| c.target.is_none()).count();
    log::info!(
        "Joined {} English LSOAs ({} outside England dropped, {} without a score)",
        candidates.len(),
        total - candidates.len(),
        unscored,
    );

    candidates
}

/// Reads both files from disk and joins them.
///
/// # Errors
///
/// Returns [`IngestError`] if either file cannot be read or parsed.
pub fn read_candidates_path(
    idaci: &Path,
    centroids: &Path,
) -> Result<Vec<CandidateRecord>, IngestError> {
    let scores = read_idaci_scores(File::open(idaci)?)?;
    let centroids = read_lsoa_centroids(File::open(centroids)?)?;
    Ok(join_candidates(&scores, centroids))
}
