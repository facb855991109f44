#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the CCHF data reconciliation pipeline.
//!
//! Log output is routed through `indicatif::MultiProgress` (via
//! [`cchf_map_cli_utils::init_logger`]) so that log lines and binning
//! progress bars never fight for the terminal.

mod config;
mod pipeline;

use std::path::PathBuf;

use cchf_map_analytics_models::MissingPolicy;
use clap::{Parser, Subcommand};

use crate::config::PipelineConfig;

#[derive(Parser)]
#[command(name = "cchf_map", about = "CCHF outbreak and climate reconciliation")]
struct Cli {
    /// Pipeline configuration file (defaults to `cchf_map.toml` if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered countries
    Countries,
    /// Add a `district` column to a notification table by binning each
    /// city coordinate onto a district polygon
    AssignDistricts {
        /// Notification CSV (defaults to the configured notifications table)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output CSV (defaults to the configured district notifications table)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Bin measurement points onto districts and write yearly averages
    Climate {
        /// Variable the points measure (vegetation, precipitation, temperature)
        #[arg(long)]
        variable: String,
        /// Comma-separated countries; one country covers every point file,
        /// otherwise countries pair with point files by position
        #[arg(long, value_delimiter = ',', required = true)]
        countries: Vec<String>,
        /// Point CSVs with `latitude,longitude,value,year,month` rows
        #[arg(long, num_args = 1.., required = true)]
        points: Vec<PathBuf>,
        /// Read each points file as a headerless global grid matrix with
        /// this cell size in degrees (e.g. 0.05), dated by its
        /// `YYYY.MM[.DD]` directory
        #[arg(long)]
        grid_degrees: Option<f64>,
        /// Output CSV (defaults to the configured table for the variable)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Aggregate per country, merge cattle and population, and report
    Country {
        /// Leave cattle counts out of the merge and correlation
        #[arg(long)]
        no_cattle: bool,
        /// Comma-separated countries to keep (defaults to all)
        #[arg(long, value_delimiter = ',')]
        countries: Vec<String>,
    },
    /// Aggregate per district, join climate averages, and report
    District {
        /// Treat missing values as zero instead of dropping the row
        #[arg(long)]
        fill_zero: bool,
        /// Comma-separated countries to keep (defaults to all)
        #[arg(long, value_delimiter = ',')]
        countries: Vec<String>,
    },
    /// Write the merged tables and district coordinates as JSON for the map
    MapExport {
        /// Output file (defaults to `map_data.json` in the output directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = cchf_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Countries => pipeline::list_countries(),
        Commands::AssignDistricts { input, output } => {
            let path = pipeline::assign(&config, input.as_deref(), output.as_deref(), &multi)?;
            println!("Wrote {}", path.display());
        }
        Commands::Climate {
            variable,
            countries,
            points,
            grid_degrees,
            output,
        } => {
            let path = pipeline::climate(
                &config,
                &variable,
                &countries,
                &points,
                grid_degrees,
                output.as_deref(),
                &multi,
            )?;
            println!("Wrote {}", path.display());
        }
        Commands::Country {
            no_cattle,
            countries,
        } => {
            let include_cattle = config.include_cattle && !no_cattle;
            let reports = pipeline::country_report(&config, include_cattle, &countries)?;
            print_summary(&reports);
        }
        Commands::District {
            fill_zero,
            countries,
        } => {
            let policy = if fill_zero {
                MissingPolicy::FillZero
            } else {
                config.district_policy
            };
            let reports = pipeline::district_report(&config, policy, &countries)?;
            print_summary(&reports);
        }
        Commands::MapExport { output } => {
            let path = pipeline::map_export(&config, output.as_deref())?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

fn print_summary(reports: &[cchf_map_analytics_models::GroupReport]) {
    use cchf_map_analytics_models::ReportOutcome;

    println!("{:<40} {:>6}  RESULT", "GROUP", "ROWS");
    println!("{}", "-".repeat(70));
    for report in reports {
        let result = match &report.outcome {
            ReportOutcome::Rendered { artifact, .. } => artifact.display().to_string(),
            ReportOutcome::Skipped { reason } => format!("skipped: {reason}"),
        };
        println!("{:<40} {:>6}  {result}", report.group.to_string(), report.rows);
    }
}
