//! Reader for the Get Information About Schools "all data" export
//! (`edubasealldata*.csv`).
//!
//! The export is Latin-1 encoded. Only open establishments with a
//! non-zero FSM percentage are kept; zero values are a known data issue
//! in the source rather than genuine zeros.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use school_gap_models::{CandidateRecord, SubjectRecord};

use crate::{Columns, IngestError, cell, numeric, read_latin1};

const URN: &str = "URN";
const STATUS: &str = "EstablishmentStatus (name)";
const PHASE: &str = "PhaseOfEducation (name)";
const FSM: &str = "PercentageFSM";
const EASTING: &str = "Easting";
const NORTHING: &str = "Northing";
const PUPILS: &str = "NumberOfPupils";
const CAPACITY: &str = "SchoolCapacity";

/// Explanatory columns carried through for secondary schools, as
/// `(GIAS header, passthrough key)`.
const EXPLANATORY: [(&str, &str); 11] = [
    ("EstablishmentName", "EstablishmentName"),
    ("LA (name)", "LA"),
    ("TypeOfEstablishment (name)", "TypeOfEstablishment"),
    ("Gender (name)", "Gender"),
    ("ReligiousCharacter (name)", "ReligiousCharacter"),
    ("AdmissionsPolicy (name)", "AdmissionsPolicy"),
    ("SchoolCapacity", "SchoolCapacity"),
    ("NumberOfPupils", "NumberOfPupils"),
    ("TrustSchoolFlag (name)", "TrustSchoolFlag"),
    ("ParliamentaryConstituency (name)", "ParliamentaryConstituency"),
    ("UrbanRural (name)", "UrbanRural"),
];

/// Address parts joined into the `FullAddress` passthrough field.
const ADDRESS: [&str; 6] = [
    "Street",
    "Locality",
    "Address3",
    "Town",
    "County (name)",
    "Postcode",
];

/// Passthrough key of the joined address.
pub const FULL_ADDRESS: &str = "FullAddress";

/// Row filters applied while reading.
#[derive(Debug, Clone, Copy)]
pub struct GiasOptions {
    /// Drop rows with no `SchoolCapacity`.
    pub require_capacity: bool,
}

impl Default for GiasOptions {
    fn default() -> Self {
        Self {
            require_capacity: true,
        }
    }
}

/// One open school that passed the row filters.
#[derive(Debug, Clone, PartialEq)]
pub struct GiasSchool {
    pub urn: String,
    pub phase: String,
    pub percentage_fsm: f64,
    pub easting: Option<f64>,
    pub northing: Option<f64>,
    pub pupils: Option<f64>,
    pub passthrough: BTreeMap<String, String>,
}

impl GiasSchool {
    #[must_use]
    pub fn is_secondary(&self) -> bool {
        self.phase == "Secondary"
    }

    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.phase == "Primary"
    }

    /// The school as a query subject, compared on its own FSM percentage.
    #[must_use]
    pub fn to_subject(&self) -> SubjectRecord {
        SubjectRecord {
            id: self.urn.clone(),
            easting: self.easting,
            northing: self.northing,
            own_attribute: Some(self.percentage_fsm),
            passthrough: self.passthrough.clone(),
        }
    }

    /// The school as a candidate, sized by pupil count.
    #[must_use]
    pub fn to_candidate(&self) -> CandidateRecord {
        CandidateRecord {
            id: self.urn.clone(),
            easting: self.easting,
            northing: self.northing,
            size: self.pupils,
            target: Some(self.percentage_fsm),
        }
    }
}

/// Every school kept from one GIAS export.
#[derive(Debug, Clone, Default)]
pub struct GiasExtract {
    pub schools: Vec<GiasSchool>,
    /// Data rows in the file.
    pub rows_read: u64,
}

impl GiasExtract {
    /// Secondary schools as query subjects.
    #[must_use]
    pub fn secondary_subjects(&self) -> Vec<SubjectRecord> {
        self.schools
            .iter()
            .filter(|s| s.is_secondary())
            .map(GiasSchool::to_subject)
            .collect()
    }

    /// Primary schools as size-weighted candidates.
    #[must_use]
    pub fn primary_candidates(&self) -> Vec<CandidateRecord> {
        self.schools
            .iter()
            .filter(|s| s.is_primary())
            .map(GiasSchool::to_candidate)
            .collect()
    }

    /// Every kept school, whatever its phase, as a query subject.
    #[must_use]
    pub fn all_subjects(&self) -> Vec<SubjectRecord> {
        self.schools.iter().map(GiasSchool::to_subject).collect()
    }
}

/// Reads a GIAS export from disk.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or parsed, or a
/// required column is missing.
pub fn read_gias_path(path: &Path, options: GiasOptions) -> Result<GiasExtract, IngestError> {
    log::info!("Reading GIAS export {}", path.display());
    read_gias(File::open(path)?, options)
}

/// Reads a Latin-1 encoded GIAS export.
///
/// # Errors
///
/// Returns [`IngestError`] if the input cannot be read or parsed, or a
/// required column is missing.
pub fn read_gias(reader: impl Read, options: GiasOptions) -> Result<GiasExtract, IngestError> {
    let text = read_latin1(reader)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = Columns::new("GIAS export", reader.headers()?);
    let urn = columns.required(URN)?;
    let status = columns.required(STATUS)?;
    let phase = columns.required(PHASE)?;
    let fsm = columns.required(FSM)?;
    let easting = columns.required(EASTING)?;
    let northing = columns.required(NORTHING)?;
    let pupils = columns.required(PUPILS)?;
    let capacity = columns.optional(CAPACITY);
    if options.require_capacity && capacity.is_none() {
        return Err(columns.missing(CAPACITY));
    }

    let explanatory: Vec<(&str, Option<usize>)> = EXPLANATORY
        .iter()
        .map(|&(header, key)| (key, columns.optional(header)))
        .collect();
    let address: Vec<usize> = ADDRESS.iter().filter_map(|h| columns.optional(h)).collect();

    let mut extract = GiasExtract::default();
    let mut closed = 0_u64;
    let mut no_fsm = 0_u64;
    let mut no_capacity = 0_u64;

    for result in reader.records() {
        let record = result?;
        extract.rows_read += 1;

        if cell(&record, status) != "Open" {
            closed += 1;
            continue;
        }

        let percentage_fsm = match numeric(cell(&record, fsm)) {
            Some(value) if value.is_finite() && value.abs() > 0.0 => value,
            _ => {
                no_fsm += 1;
                continue;
            }
        };

        if options.require_capacity && capacity.is_some_and(|i| cell(&record, i).is_empty()) {
            no_capacity += 1;
            continue;
        }

        let mut passthrough: BTreeMap<String, String> = explanatory
            .iter()
            .map(|&(key, index)| {
                let value = index.map_or("", |i| cell(&record, i));
                (key.to_string(), value.to_string())
            })
            .collect();
        passthrough.insert(FULL_ADDRESS.to_string(), join_address(&record, &address));

        extract.schools.push(GiasSchool {
            urn: cell(&record, urn).to_string(),
            phase: cell(&record, phase).to_string(),
            percentage_fsm,
            easting: numeric(cell(&record, easting)),
            northing: numeric(cell(&record, northing)),
            pupils: numeric(cell(&record, pupils)),
            passthrough,
        });
    }

    log::info!(
        "GIAS: {} rows read, {} kept ({} not open, {} without FSM, {} without capacity)",
        extract.rows_read,
        extract.schools.len(),
        closed,
        no_fsm,
        no_capacity,
    );

    Ok(extract)
}

fn join_address(record: &csv::StringRecord, parts: &[usize]) -> String {
    parts
        .iter()
        .map(|&i| cell(record, i))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
