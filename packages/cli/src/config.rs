//! Parameter resolution: preset, then TOML config file, then flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Args;
use school_gap_engine::{CategoryBasis, FallbackPolicy, GapParams, GapParamsOverrides};
use school_gap_weighting::Weighting;

/// Run parameters accepted by every subcommand.
#[derive(Debug, Default, Args)]
pub struct ParamArgs {
    /// TOML file with run parameters; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Number of nearest candidates per school
    #[arg(long)]
    pub k: Option<usize>,
    /// Constant added to every distance, in metres
    #[arg(long)]
    pub offset: Option<f64>,
    /// `by_size` or `inverse_square`
    #[arg(long, value_parser = parse_name::<Weighting>)]
    pub weighting: Option<Weighting>,
    /// `nearest_candidate` or `exclude` for degenerate weights
    #[arg(long, value_parser = parse_name::<FallbackPolicy>)]
    pub fallback: Option<FallbackPolicy>,
    /// `calibrated` or `uncalibrated` gap distribution for categories
    #[arg(long, value_parser = parse_name::<CategoryBasis>)]
    pub category_basis: Option<CategoryBasis>,
    /// Minimum scored schools required to calibrate
    #[arg(long)]
    pub min_calibration_subjects: Option<usize>,
    /// Multiplier applied to the local estimate before taking the gap
    #[arg(long)]
    pub target_scale: Option<f64>,
}

impl ParamArgs {
    fn overrides(&self) -> GapParamsOverrides {
        GapParamsOverrides {
            k: self.k,
            distance_offset: self.offset,
            weighting: self.weighting,
            fallback: self.fallback,
            category_basis: self.category_basis,
            min_calibration_subjects: self.min_calibration_subjects,
            target_scale: self.target_scale,
        }
    }

    /// Layers the config file and flags onto `preset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn resolve(&self, preset: GapParams) -> Result<GapParams, Box<dyn std::error::Error>> {
        let file = match &self.config {
            Some(path) => read_config(path)?,
            None => GapParamsOverrides::default(),
        };
        let params = file.merge(self.overrides()).apply(preset);
        log::debug!("Resolved parameters: {params:?}");
        Ok(params)
    }
}

fn parse_name<T: FromStr>(name: &str) -> Result<T, String> {
    name.parse().map_err(|_| format!("unknown value {name:?}"))
}

fn read_config(path: &Path) -> Result<GapParamsOverrides, Box<dyn std::error::Error>> {
    log::info!("Reading parameters from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}
