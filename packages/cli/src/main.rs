#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the school gap toolchain.
//!
//! Compares each school's FSM percentage against a distance-weighted
//! estimate from its neighbourhood: nearby primary schools (`primary`) or
//! LSOA deprivation scores (`idaci`). `sweep` shows how the estimate at a
//! single location settles as more neighbours are included.
//!
//! Uses `indicatif-log-bridge` (via [`school_gap_cli_utils::init_logger`])
//! so log lines and the scoring progress bar share the terminal.

mod config;
mod output;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use school_gap_engine::{GapParams, sweep_k};
use school_gap_ingest::export::ExportLayout;
use school_gap_ingest::explanatory::normalise_passthrough;
use school_gap_ingest::gias::{GiasOptions, read_gias_path};
use school_gap_ingest::idaci::read_candidates_path;
use school_gap_models::{CandidateRecord, Position, RequiredFields, SubjectRecord};
use school_gap_spatial::GeoPointStore;
use school_gap_weighting::Weighting;

use crate::config::ParamArgs;

#[derive(Parser)]
#[command(
    name = "school_gap",
    about = "School FSM gap against the local neighbourhood"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare secondary schools against their nearest primary schools
    Primary {
        /// GIAS "all data" export (`edubasealldata*.csv`)
        #[arg(long)]
        gias: PathBuf,
        /// Directory for the output files
        #[arg(long)]
        out_dir: PathBuf,
        /// Start from the undetuned preset (k = 12, no distance offset)
        #[arg(long)]
        basic: bool,
        /// Keep schools with no recorded capacity
        #[arg(long)]
        keep_missing_capacity: bool,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Compare every school with an FSM value against nearby LSOA IDACI scores
    Idaci {
        /// GIAS "all data" export (`edubasealldata*.csv`)
        #[arg(long)]
        gias: PathBuf,
        /// LSOA population-weighted centroids CSV
        #[arg(long)]
        lsoa: PathBuf,
        /// IDACI scores CSV (IoD2019 File 5)
        #[arg(long)]
        idaci: PathBuf,
        /// Directory for the output files
        #[arg(long)]
        out_dir: PathBuf,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Print the local estimate at one location for k = 1..=k-max
    Sweep {
        /// GIAS "all data" export; primary schools are the candidates
        #[arg(long)]
        gias: Option<PathBuf>,
        /// LSOA centroids CSV; with `--idaci`, LSOAs are the candidates
        #[arg(long, requires = "idaci")]
        lsoa: Option<PathBuf>,
        /// IDACI scores CSV
        #[arg(long, requires = "lsoa")]
        idaci: Option<PathBuf>,
        #[arg(long, allow_negative_numbers = true)]
        easting: f64,
        #[arg(long, allow_negative_numbers = true)]
        northing: f64,
        /// Largest neighbour count to evaluate
        #[arg(long, default_value = "20")]
        k_max: usize,
        #[command(flatten)]
        params: ParamArgs,
    },
}

fn load_store(candidates: Vec<CandidateRecord>, params: &GapParams) -> GeoPointStore {
    GeoPointStore::load(
        candidates,
        RequiredFields {
            size: params.weighting == Weighting::BySize,
        },
    )
}

fn with_explanatory(mut subjects: Vec<SubjectRecord>) -> Vec<SubjectRecord> {
    for subject in &mut subjects {
        normalise_passthrough(&mut subject.passthrough);
    }
    subjects
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = school_gap_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Primary {
            gias,
            out_dir,
            basic,
            keep_missing_capacity,
            params,
        } => {
            let preset = if basic {
                GapParams::primary_fsm_basic()
            } else {
                GapParams::primary_fsm()
            };
            let params = params.resolve(preset)?;

            let extract = read_gias_path(
                &gias,
                GiasOptions {
                    require_capacity: !keep_missing_capacity,
                },
            )?;
            let store = load_store(extract.primary_candidates(), &params);
            let subjects = with_explanatory(extract.secondary_subjects());

            output::score_and_export(
                &multi,
                &store,
                subjects,
                &params,
                &ExportLayout::fsm(),
                &out_dir,
            )?;
        }
        Commands::Idaci {
            gias,
            lsoa,
            idaci,
            out_dir,
            params,
        } => {
            let params = params.resolve(GapParams::deprivation_index())?;

            let extract = read_gias_path(
                &gias,
                GiasOptions {
                    require_capacity: false,
                },
            )?;
            let store = load_store(read_candidates_path(&idaci, &lsoa)?, &params);
            let subjects = with_explanatory(extract.all_subjects());

            output::score_and_export(
                &multi,
                &store,
                subjects,
                &params,
                &ExportLayout::idaci(),
                &out_dir,
            )?;
        }
        Commands::Sweep {
            gias,
            lsoa,
            idaci,
            easting,
            northing,
            k_max,
            params,
        } => {
            let (store, params) = match (gias, lsoa, idaci) {
                (_, Some(lsoa), Some(idaci)) => {
                    let params = params.resolve(GapParams::deprivation_index())?;
                    (load_store(read_candidates_path(&idaci, &lsoa)?, &params), params)
                }
                (Some(gias), _, _) => {
                    let params = params.resolve(GapParams::primary_fsm())?;
                    let extract = read_gias_path(&gias, GiasOptions::default())?;
                    (load_store(extract.primary_candidates(), &params), params)
                }
                _ => return Err("sweep needs --gias or both --lsoa and --idaci".into()),
            };

            let rows = sweep_k(&store, Position::new(easting, northing), k_max, &params)?;
            println!("{:>4} {:>12} {:>14}", "k", "DISTANCE", "LOCAL");
            for row in rows {
                let estimate = row
                    .local_estimate
                    .map_or_else(|| "-".to_string(), |e| format!("{e:.4}"));
                println!("{:>4} {:>12.1} {:>14}", row.k, row.kth_distance, estimate);
            }
        }
    }

    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}
