//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use chrono::NaiveDate;
use clap::{command, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    config::{Overrides, Preset},
    frequency::Period,
    tile::TileCode,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the region options and the commands
pub struct Cli {
    #[command(flatten)]
    pub options: RegionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct RegionArgs {
    /// Region config file (YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Built-in region, used when no config file is given
    #[arg(long, value_enum, global = true)]
    pub region: Option<Preset>,

    /// Boundary polygon shapefile
    #[arg(long, global = true)]
    pub boundary: Option<PathBuf>,

    /// Output directory [default: ~/inundation/{region}]
    #[arg(long, global = true)]
    pub save_dir: Option<PathBuf>,

    /// Comma-separated tile codes, e.g. 080e030n,090e030n
    #[arg(long, value_delimiter = ',', global = true)]
    pub tiles: Option<Vec<TileCode>>,

    /// No-data value of the output rasters
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub nodata: Option<i16>,
}

impl RegionArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            boundary: self.boundary.clone(),
            save_dir: self.save_dir.clone(),
            tiles: self.tiles.clone(),
            nodata: self.nodata,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the daily archives of every tile and save the availability table
    Availability {},
    /// Build the template grid from the current two-week products
    Current {},
    /// Composite daily inundation rasters
    Daily {
        /// First date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Aggregate daily rasters into frequency rasters
    Frequency {
        #[arg(long, value_enum, default_value_t = Period::Monthly)]
        period: Period,
    },
    /// Build the template, then composite daily rasters
    Run {
        /// First date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}")
            .unwrap()
            .progress_chars("##-"),
    )
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn should_have_valid_command_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_parse_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "inundation",
            "daily",
            "--region",
            "bangladesh",
            "--tiles",
            "080E030N,090e030n",
            "--nodata",
            "-9999",
            "--from",
            "2019-01-01",
        ])
        .unwrap();

        assert_eq!(cli.options.region, Some(Preset::Bangladesh));
        assert_eq!(cli.options.nodata, Some(-9999));
        let tiles = cli.options.tiles.unwrap();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].as_str(), "080e030n");
        assert!(matches!(
            cli.command,
            Commands::Daily { from: Some(_), to: None }
        ));
    }

    #[test]
    fn should_reject_invalid_tile() {
        assert!(Cli::try_parse_from(["inundation", "current", "--tiles", "north"]).is_err());
    }

    #[test]
    fn should_default_to_monthly_frequency() {
        let cli = Cli::try_parse_from(["inundation", "frequency"]).unwrap();

        assert!(matches!(
            cli.command,
            Commands::Frequency {
                period: Period::Monthly
            }
        ));
    }
}
