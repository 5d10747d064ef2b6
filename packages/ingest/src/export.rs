//! CSV and JSON writers for scored output.
//!
//! The uncalibrated export is the audit copy: every value at full
//! precision with each subject's neighbour detail flattened into
//! `P{n}_*` columns. Calibrated exports keep one row per subject with the
//! passthrough fields and values rounded to one decimal place.

use std::io::Write;

use school_gap_models::ScoredSubject;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::IngestError;
use crate::explanatory::{ADMISSIONS_GROUP, FAITH_SCHOOL};
use crate::gias::FULL_ADDRESS;

/// Column naming for one kind of run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    pub id_column: String,
    pub own_column: String,
    pub estimate_column: String,
    /// Passthrough keys to emit, in order. Missing keys are written empty.
    pub passthrough_columns: Vec<String>,
}

impl ExportLayout {
    /// Secondary schools compared against local primary FSM.
    #[must_use]
    pub fn fsm() -> Self {
        Self::with_estimate("localFSM")
    }

    /// Schools compared against local IDACI.
    #[must_use]
    pub fn idaci() -> Self {
        Self::with_estimate("localIDACI")
    }

    fn with_estimate(estimate_column: &str) -> Self {
        Self {
            id_column: "URN".to_string(),
            own_column: "PercentageFSM".to_string(),
            estimate_column: estimate_column.to_string(),
            passthrough_columns: [
                "LA",
                "EstablishmentName",
                "TypeOfEstablishment",
                "Gender",
                "ReligiousCharacter",
                FAITH_SCHOOL,
                "AdmissionsPolicy",
                ADMISSIONS_GROUP,
                "SchoolCapacity",
                "NumberOfPupils",
                "TrustSchoolFlag",
                FULL_ADDRESS,
                "ParliamentaryConstituency",
                "UrbanRural",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }

    fn passthrough<'a>(&'a self, subject: &'a ScoredSubject) -> impl Iterator<Item = &'a str> {
        self.passthrough_columns
            .iter()
            .map(|key| subject.passthrough.get(key).map_or("", String::as_str))
    }
}

/// Rounds to one decimal place, ties to even.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

fn category_label(subject: &ScoredSubject) -> String {
    subject.category.map(|c| c.to_string()).unwrap_or_default()
}

/// Writes the full-precision audit CSV.
///
/// # Errors
///
/// Returns [`IngestError`] if writing fails.
pub fn write_uncalibrated_csv(
    writer: impl Write,
    subjects: &[ScoredSubject],
    layout: &ExportLayout,
) -> Result<(), IngestError> {
    let ranks = subjects
        .iter()
        .map(|s| s.neighbours.len())
        .max()
        .unwrap_or(0);
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![
        layout.id_column.clone(),
        "Easting".to_string(),
        "Northing".to_string(),
    ];
    header.extend(layout.passthrough_columns.iter().cloned());
    header.extend([
        layout.own_column.clone(),
        layout.estimate_column.clone(),
        "gap".to_string(),
        "cat".to_string(),
        "estimateSource".to_string(),
    ]);
    for n in 0..ranks {
        for suffix in ["id", "dist", "size", "weight", "target"] {
            header.push(format!("P{n}_{suffix}"));
        }
    }
    csv.write_record(&header)?;

    for subject in subjects {
        let mut row = vec![
            subject.id.clone(),
            subject.position.easting.to_string(),
            subject.position.northing.to_string(),
        ];
        row.extend(layout.passthrough(subject).map(str::to_string));
        row.extend([
            subject.own_attribute.to_string(),
            subject.local_estimate.to_string(),
            subject.gap.to_string(),
            category_label(subject),
            subject.estimate_source.to_string(),
        ]);
        for n in 0..ranks {
            match subject.neighbours.get(n) {
                Some(neighbour) => row.extend([
                    neighbour.id.clone(),
                    neighbour.distance.to_string(),
                    neighbour.size.map(|s| s.to_string()).unwrap_or_default(),
                    neighbour.weight.to_string(),
                    neighbour.target.to_string(),
                ]),
                None => row.extend(std::iter::repeat_n(String::new(), 5)),
            }
        }
        csv.write_record(&row)?;
    }

    csv.flush()?;
    log::info!("Wrote {} uncalibrated rows", subjects.len());
    Ok(())
}

/// Writes the rounded, one-row-per-subject CSV.
///
/// # Errors
///
/// Returns [`IngestError`] if writing fails.
pub fn write_calibrated_csv(
    writer: impl Write,
    subjects: &[ScoredSubject],
    layout: &ExportLayout,
) -> Result<(), IngestError> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![layout.id_column.clone()];
    header.extend(layout.passthrough_columns.iter().cloned());
    header.extend([
        layout.own_column.clone(),
        layout.estimate_column.clone(),
        "gap".to_string(),
        "cat".to_string(),
    ]);
    csv.write_record(&header)?;

    for subject in subjects {
        let mut row = vec![subject.id.clone()];
        row.extend(layout.passthrough(subject).map(str::to_string));
        row.extend([
            round1(subject.own_attribute).to_string(),
            round1(subject.local_estimate).to_string(),
            round1(subject.gap).to_string(),
            category_label(subject),
        ]);
        csv.write_record(&row)?;
    }

    csv.flush()?;
    log::info!("Wrote {} calibrated rows", subjects.len());
    Ok(())
}

/// Writes the rounded records as a JSON array of objects.
///
/// # Errors
///
/// Returns [`IngestError`] if serialization or writing fails.
pub fn write_calibrated_json(
    writer: impl Write,
    subjects: &[ScoredSubject],
    layout: &ExportLayout,
) -> Result<(), IngestError> {
    let records: Vec<Map<String, Value>> = subjects
        .iter()
        .map(|subject| {
            let mut record = Map::new();
            record.insert(layout.id_column.clone(), Value::from(subject.id.clone()));
            for (key, value) in layout.passthrough_columns.iter().zip(layout.passthrough(subject)) {
                record.insert(key.clone(), Value::from(value));
            }
            record.insert(
                layout.own_column.clone(),
                Value::from(round1(subject.own_attribute)),
            );
            record.insert(
                layout.estimate_column.clone(),
                Value::from(round1(subject.local_estimate)),
            );
            record.insert("gap".to_string(), Value::from(round1(subject.gap)));
            record.insert(
                "cat".to_string(),
                subject
                    .category
                    .map_or(Value::Null, |c| Value::from(c.to_string())),
            );
            record
        })
        .collect();

    write_json(writer, &records)
}

/// Writes any serializable value as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`IngestError`] if serialization or writing fails.
pub fn write_json<T: Serialize + ?Sized>(mut writer: impl Write, value: &T) -> Result<(), IngestError> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
