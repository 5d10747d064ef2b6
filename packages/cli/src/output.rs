//! Scores a prepared run and writes every output file.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use school_gap_cli_utils::{IndicatifProgress, MultiProgress};
use school_gap_engine::{
    CancellationToken, GapParams, RunStatistics, weight_rank_profile,
};
use school_gap_ingest::export::{
    ExportLayout, write_calibrated_csv, write_calibrated_json, write_json, write_uncalibrated_csv,
};
use school_gap_models::SubjectRecord;
use school_gap_spatial::GeoPointStore;
use serde::Serialize;

pub const UNCALIBRATED_CSV: &str = "gap-uncalibrated.csv";
pub const CALIBRATED_CSV: &str = "gap-calibrated.csv";
pub const CALIBRATED_JSON: &str = "gap-calibrated.json";
pub const STATS_JSON: &str = "gap-stats.json";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsFile {
    #[serde(flatten)]
    stats: RunStatistics,
    weight_rank_profile: Vec<f64>,
}

fn create(out_dir: &Path, name: &str) -> Result<BufWriter<File>, std::io::Error> {
    let path = out_dir.join(name);
    log::info!("Writing {}", path.display());
    Ok(BufWriter::new(File::create(path)?))
}

/// Scores `subjects`, writes the uncalibrated audit file, then calibrates
/// and writes the calibrated outputs and statistics.
pub fn score_and_export(
    multi: &MultiProgress,
    store: &GeoPointStore,
    subjects: Vec<SubjectRecord>,
    params: &GapParams,
    layout: &ExportLayout,
    out_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(out_dir)?;

    let progress = IndicatifProgress::subjects_bar(multi, "Scoring schools");
    let scored = school_gap_engine::score(
        store,
        subjects,
        params,
        &progress,
        &CancellationToken::new(),
    )?;

    write_uncalibrated_csv(create(out_dir, UNCALIBRATED_CSV)?, scored.subjects(), layout)?;
    log::info!("Uncalibrated data has been exported for reference");

    let gap_run = scored.calibrate(params);

    if let Some(calibrated) = &gap_run.calibrated {
        write_calibrated_csv(create(out_dir, CALIBRATED_CSV)?, calibrated, layout)?;
        write_calibrated_json(create(out_dir, CALIBRATED_JSON)?, calibrated, layout)?;
    }

    let stats = StatsFile {
        stats: gap_run.statistics(),
        weight_rank_profile: weight_rank_profile(&gap_run.uncalibrated),
    };
    write_json(create(out_dir, STATS_JSON)?, &stats)?;

    if let Some(bp) = &gap_run.breakpoints {
        log::info!(
            "Gap quantiles: q10 {:.2}, q25 {:.2}, median {:.2}, q75 {:.2}, q90 {:.2}",
            bp.q10,
            bp.q25,
            bp.q50,
            bp.q75,
            bp.q90,
        );
    }
    for category in school_gap_models::InclusivityCategory::ALL {
        let count = stats.stats.category_counts.get(&category).copied().unwrap_or(0);
        log::info!("  {category}: {count}");
    }

    Ok(())
}
