//! # CLI Module
//!
//! This module provides the command-line interface for cmg-backscatter, including:
//! - Argument parsing with clap, one subcommand per extraction product
//! - Configuration file loading (JSON/YAML) through `--config` or `CMG_CONFIG`
//! - Data directory resolution (flag, `CMG_DATADIR`, config file, default)
//! - Inventory, template and shell completion tooling

use crate::input::{
    run_extraction, run_plot, ExtractionJob, PlotJob, RunConfig, CONFIG_ENV, DATADIR_ENV,
    DEFAULT_DATADIR, DEFAULT_MONTHLY_DATADIR,
};
use crate::inventory::{
    print_inventory_csv, print_inventory_human, print_inventory_json, print_inventory_yaml,
    scan_datadir,
};
use crate::log::{config_echo, job_echo, plot_job_echo, show_config_source};
use crate::output::TableFormat;
use crate::platform::{Granularity, MaskKind, Season};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Gridded scatterometer backscatter extraction around a location
#[derive(Parser, Debug)]
#[command(name = "cmg-backscatter")]
#[command(about = "Extract CMG scatterometer backscatter around a location into tables and plots")]
#[command(version)]
#[command(long_about = "
cmg-backscatter reads the SASS, ERS, QuikSCAT and ASCAT backscatter archives
(sig0 mean and standard deviation on the 0.05 degree Climate Modelling Grid),
cuts an 11 x 11 cell box around a location and writes one wide table with a
column per platform, period and statistic.

EXAMPLES:
  # Monthly table for Denver from ./data
  cmg-backscatter monthly 39.74 -104.99 Denver

  # Summer (JAS) seasonal table, urban mask, including SASS
  cmg-backscatter seasonal 39.74 -104.99 Denver -s JAS --urban --with-sass

  # Southern hemisphere summer plot
  cmg-backscatter plot -33.87 151.21 Sydney -s JFM -o sydney.png

  # What is in the archive?
  cmg-backscatter inventory -d /archive/cmg --format json

  # Start a configuration file
  cmg-backscatter template --format yaml -o run.yaml
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file path (JSON or YAML)
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monthly table over each platform's historical window
    #[command(long_about = "
Write <DATADIR>/CSV/<LOCNAME>_bs_grid_monthly.csv with one column per month
and statistic, named <PLATFORM><YEAR>_<MM>_mean|std.

Each platform is restricted to its historical window (see `template`).
Cells without any measurement are dropped unless --keep-nodata is given.

EXAMPLES:
  cmg-backscatter monthly 39.74 -104.99 Denver
  cmg-backscatter monthly 39.74 -104.99 Denver -d /archive --format parquet
")]
    Monthly {
        #[command(flatten)]
        location: LocationArgs,

        /// Directory with the NetCDF archives (default: ./data)
        #[arg(short, long, env = DATADIR_ENV)]
        datadir: Option<PathBuf>,

        /// Include the 1978 SASS mission
        #[arg(long)]
        with_sass: bool,

        /// Keep cells and months without any measurement
        #[arg(long)]
        keep_nodata: bool,

        /// Table format
        #[arg(long, value_parser = parse_table_format, default_value = "csv")]
        format: TableFormat,
    },

    /// Seasonal table, one column per year and statistic
    #[command(long_about = "
Write <DATADIR>/CSV/<LOCNAME>_bs_grid_<SEASON>.csv with one column per year
and statistic, named <PLATFORM><YEAR>_<SEASON>_mean|std. QuikSCAT columns use
the QSCAT prefix.

For summer use JAS in the northern hemisphere and JFM in the southern one.

EXAMPLES:
  cmg-backscatter seasonal 39.74 -104.99 Denver -s JAS
  cmg-backscatter seasonal -33.87 151.21 Sydney -s JFM --urban
")]
    Seasonal {
        #[command(flatten)]
        location: LocationArgs,

        /// Season/quarter to select
        #[arg(short, long, value_parser = parse_season, default_value = "JAS")]
        season: Season,

        /// Directory with the NetCDF archives (default: ./)
        #[arg(short, long, env = DATADIR_ENV)]
        datadir: Option<PathBuf>,

        /// Include the 1978 SASS mission
        #[arg(long)]
        with_sass: bool,

        /// Use the urban-masked archives instead of the land ones
        #[arg(long)]
        urban: bool,

        /// Keep cells and years without any measurement
        #[arg(long)]
        keep_nodata: bool,

        /// Table format
        #[arg(long, value_parser = parse_table_format, default_value = "csv")]
        format: TableFormat,
    },

    /// Seasonal power-ratio time series of the box mean
    #[command(long_about = "
Average each platform's seasonal backscatter over the 11 x 11 box, convert it
to power ratio (10^(sig0/10)) and draw one line per platform with a band
spanning one standard deviation.

The chart is written as SVG, or as PNG when the output name ends in .png.
The default name is <LOCNAME>_<SEASON>_timeseries_plot.svg.

EXAMPLES:
  cmg-backscatter plot 39.74 -104.99 Denver
  cmg-backscatter plot -33.87 151.21 Sydney -s JFM -o sydney.png
")]
    Plot {
        #[command(flatten)]
        location: LocationArgs,

        /// Season/quarter to select
        #[arg(short, long, value_parser = parse_season, default_value = "JAS")]
        season: Season,

        /// Directory with the NetCDF archives (default: ./)
        #[arg(short, long, env = DATADIR_ENV)]
        datadir: Option<PathBuf>,

        /// Include the 1978 SASS mission
        #[arg(long)]
        with_sass: bool,

        /// Use the urban-masked archives instead of the land ones
        #[arg(long)]
        urban: bool,

        /// Output file (.svg or .png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the products present in a data directory
    Inventory {
        /// Directory with the NetCDF archives (default: ./)
        #[arg(short, long, env = DATADIR_ENV)]
        datadir: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Print the default configuration
    #[command(long_about = "
Print the built-in configuration (grid and per-platform monthly windows) so it
can be edited and passed back with --config.

EXAMPLES:
  cmg-backscatter template
  cmg-backscatter template --format yaml -o run.yaml
")]
    Template {
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Json)]
        format: ConfigFormat,
    },

    /// Generate shell completions
    #[command(long_about = "
Generate shell completion scripts for bash, zsh, fish, elvish and PowerShell.

EXAMPLES:
  cmg-backscatter completions bash > ~/.bash_completion.d/cmg-backscatter
  cmg-backscatter completions zsh -o _cmg-backscatter
")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Positional location shared by the extraction and plot commands
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct LocationArgs {
    /// Latitude of the location in degrees
    #[arg(value_name = "LAT", allow_negative_numbers = true)]
    pub latitude: f64,

    /// Longitude of the location in degrees, -180 to 180
    #[arg(value_name = "LON", allow_negative_numbers = true)]
    pub longitude: f64,

    /// Location name used in output file names
    #[arg(value_name = "LOCNAME")]
    pub locname: String,
}

#[derive(ValueEnum, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON structured output
    Json,
    /// YAML structured output
    Yaml,
    /// CSV output
    Csv,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON configuration format
    Json,
    /// YAML configuration format
    Yaml,
}

/// Parse a season code, case-insensitively
fn parse_season(s: &str) -> Result<Season, String> {
    Season::from_code(&s.trim().to_uppercase()).map_err(|e| e.to_string())
}

fn parse_table_format(s: &str) -> Result<TableFormat, String> {
    s.parse::<TableFormat>().map_err(|e| e.to_string())
}

impl Cli {
    /// Log level from the verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    /// Name of the subcommand, for log messages
    pub fn command_name(&self) -> &'static str {
        match self.command {
            Commands::Monthly { .. } => "monthly",
            Commands::Seasonal { .. } => "seasonal",
            Commands::Plot { .. } => "plot",
            Commands::Inventory { .. } => "inventory",
            Commands::Template { .. } => "template",
            Commands::Completions { .. } => "completions",
        }
    }

    /// Loads the configuration file named by `--config`/`CMG_CONFIG`, or
    /// the built-in configuration
    pub fn load_config(&self) -> Result<RunConfig> {
        show_config_source(self.config.as_deref());
        match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display())),
            None => Ok(RunConfig::default()),
        }
    }
}

fn mask(urban: bool) -> MaskKind {
    if urban { MaskKind::Urban } else { MaskKind::Land }
}

/// Writes to the given file, or stdout when none
fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

/// Executes the parsed command
pub fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Monthly {
            location,
            datadir,
            with_sass,
            keep_nodata,
            format,
        } => {
            let config = cli.load_config()?;
            config_echo(&config);
            let mut job = ExtractionJob::new(
                location.latitude,
                location.longitude,
                location.locname.clone(),
                config.resolve_datadir(datadir.as_deref(), DEFAULT_MONTHLY_DATADIR),
                Granularity::Monthly,
            );
            job.with_sass = *with_sass;
            job.keep_nodata = *keep_nodata;
            job.format = *format;
            job_echo(&job);
            run_extraction(&job, &config)
                .with_context(|| format!("Monthly extraction for {} failed", job.locname))?;
        }
        Commands::Seasonal {
            location,
            season,
            datadir,
            with_sass,
            urban,
            keep_nodata,
            format,
        } => {
            let config = cli.load_config()?;
            config_echo(&config);
            let mut job = ExtractionJob::new(
                location.latitude,
                location.longitude,
                location.locname.clone(),
                config.resolve_datadir(datadir.as_deref(), DEFAULT_DATADIR),
                Granularity::Seasonal(*season),
            );
            job.mask = mask(*urban);
            job.with_sass = *with_sass;
            job.keep_nodata = *keep_nodata;
            job.format = *format;
            job_echo(&job);
            run_extraction(&job, &config).with_context(|| {
                format!("Seasonal {} extraction for {} failed", season, job.locname)
            })?;
        }
        Commands::Plot {
            location,
            season,
            datadir,
            with_sass,
            urban,
            output,
        } => {
            let config = cli.load_config()?;
            let mut job = PlotJob::new(
                location.latitude,
                location.longitude,
                location.locname.clone(),
                config.resolve_datadir(datadir.as_deref(), DEFAULT_DATADIR),
                *season,
            );
            job.mask = mask(*urban);
            job.with_sass = *with_sass;
            job.output = output.clone();
            plot_job_echo(&job);
            run_plot(&job, &config).with_context(|| format!("Plot for {} failed", job.locname))?;
        }
        Commands::Inventory { datadir, format } => {
            let config = cli.load_config()?;
            let datadir = config.resolve_datadir(datadir.as_deref(), DEFAULT_DATADIR);
            let inventory = scan_datadir(&datadir)?;
            match format {
                OutputFormat::Human => print_inventory_human(&inventory),
                OutputFormat::Json => print_inventory_json(&inventory)?,
                OutputFormat::Yaml => print_inventory_yaml(&inventory)?,
                OutputFormat::Csv => print_inventory_csv(&inventory)?,
            }
        }
        Commands::Template { output, format } => {
            let template = RunConfig::template();
            let content = match format {
                ConfigFormat::Json => template.to_json()?,
                ConfigFormat::Yaml => template.to_yaml()?,
            };
            let mut writer = open_output(output.as_deref())?;
            writeln!(writer, "{}", content.trim_end())?;
        }
        Commands::Completions { shell, output } => {
            let mut command = Cli::command();
            let mut writer = open_output(output.as_deref())?;
            clap_complete::generate(*shell, &mut command, "cmg-backscatter", &mut writer);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_season() {
        assert_eq!(parse_season("JAS").unwrap(), Season::Jas);
        assert_eq!(parse_season("jfm").unwrap(), Season::Jfm);
        assert_eq!(parse_season(" ond ").unwrap(), Season::Ond);
        assert!(parse_season("DJF").is_err());
        assert!(parse_season("").is_err());
    }

    #[test]
    fn test_parse_table_format() {
        assert_eq!(parse_table_format("csv").unwrap(), TableFormat::Csv);
        assert_eq!(parse_table_format("Parquet").unwrap(), TableFormat::Parquet);
        assert!(parse_table_format("netcdf").is_err());
    }

    #[test]
    fn test_mask_selection() {
        assert_eq!(mask(true), MaskKind::Urban);
        assert_eq!(mask(false), MaskKind::Land);
    }

    #[test]
    fn test_command_is_consistent() {
        Cli::command().debug_assert();
    }
}
