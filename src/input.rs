//! # Run Configuration and Jobs
//!
//! This module holds the optional run configuration (JSON or YAML) and the
//! three jobs the command line drives:
//!
//! - **Monthly extraction**: every platform's monthly product, restricted to
//!   its historical window, one column per month.
//! - **Seasonal extraction**: every platform's seasonal product for one
//!   season, one column per year.
//! - **Time-series plot**: the regional mean of every platform's seasonal
//!   product as a power-ratio chart.
//!
//! ## Configuration Structure
//!
//! All fields are optional; missing fields take the built-in values.
//!
//! ```yaml
//! datadir: /archive/cmg
//! grid:
//!   lon_min: -180.0
//!   lat_min: -60.0
//!   cell_size: 0.05
//! monthly_windows:
//!   ERS:
//!     start: 1993-01-01
//!     end: 2001-01-01
//! postprocess:
//!   - type: round
//!     decimals: 2
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cmg_backscatter::input::{ExtractionJob, RunConfig, run_extraction};
//! use cmg_backscatter::platform::Granularity;
//!
//! let config = RunConfig::from_file("run.yaml")?;
//! let job = ExtractionJob::new(39.74, -104.99, "Denver", "./data", Granularity::Monthly);
//! let report = run_extraction(&job, &config)?;
//! println!("wrote {}", report.output.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{CmgError, CmgResult};
use crate::filters::{bbox_filters, DateWindowFilter};
use crate::grid::{BoundingBox, GridLocator};
use crate::log::{platform_progress, show_bounding_box, show_center_cell};
use crate::ncfile::{load_monthly, load_seasonal};
use crate::output::{table_path, write_table, TableFormat};
use crate::platform::{DateWindow, Granularity, MaskKind, Platform, Season};
use crate::plot::{chart_title, default_plot_name, power_ratio_label, TimeSeriesChart};
use crate::postprocess::{create_pipeline, ProcessorConfig};
use crate::reshape::{merge_platform_tables, reshape, ReshapeOptions};
use crate::series::RasterSeries;
use crate::timeseries::platform_time_series;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CMG_CONFIG";

/// Environment variable overriding the data directory
pub const DATADIR_ENV: &str = "CMG_DATADIR";

/// Data directory used by monthly extraction when none is given
pub const DEFAULT_MONTHLY_DATADIR: &str = "./data";

/// Data directory used by the other commands when none is given
pub const DEFAULT_DATADIR: &str = "./";

/// Settings shared by every job.
///
/// Priority when resolving the data directory: command-line flag, then the
/// `CMG_DATADIR` environment variable, then this file, then the command's
/// built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding the NetCDF archives and receiving `CSV/`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datadir: Option<PathBuf>,
    /// Grid used to locate the bounding box
    pub grid: GridLocator,
    /// Historical window per platform for monthly extraction
    pub monthly_windows: BTreeMap<Platform, DateWindow>,
    /// Extra processing applied to the merged table before it is written
    pub postprocess: Vec<ProcessorConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            datadir: None,
            grid: GridLocator::cmg(),
            monthly_windows: BTreeMap::new(),
            postprocess: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Loads a configuration file, choosing the format from the extension.
    ///
    /// `.json` is parsed as JSON and `.yaml`/`.yml` as YAML. Files with any
    /// other extension are tried as JSON first, then YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CmgResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let config = match extension.as_deref() {
            Some("json") => Self::from_json(&content)?,
            Some("yaml") | Some("yml") => Self::from_yaml(&content)?,
            _ => Self::from_json(&content).or_else(|_| Self::from_yaml(&content))?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json_str: &str) -> CmgResult<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| CmgError::Config(format!("invalid JSON configuration: {}", e)))
    }

    pub fn from_yaml(yaml_str: &str) -> CmgResult<Self> {
        serde_yaml::from_str(yaml_str)
            .map_err(|e| CmgError::Config(format!("invalid YAML configuration: {}", e)))
    }

    /// Checks values that deserialization alone cannot
    pub fn validate(&self) -> CmgResult<()> {
        if !(self.grid.cell_size > 0.0) {
            return Err(CmgError::Config(format!(
                "grid cell size must be positive, got {}",
                self.grid.cell_size
            )));
        }
        for (platform, window) in &self.monthly_windows {
            if window.start > window.end {
                return Err(CmgError::Config(format!(
                    "{} monthly window starts ({}) after it ends ({})",
                    platform, window.start, window.end
                )));
            }
        }
        create_pipeline(&self.postprocess)?;
        Ok(())
    }

    /// The configured window for a platform, or its built-in default
    pub fn monthly_window(&self, platform: Platform) -> DateWindow {
        self.monthly_windows
            .get(&platform)
            .copied()
            .unwrap_or_else(|| platform.default_monthly_window())
    }

    /// Resolves the data directory; `explicit` carries the flag or the
    /// environment variable, whichever clap picked up
    pub fn resolve_datadir(&self, explicit: Option<&Path>, default: &str) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.datadir.clone())
            .unwrap_or_else(|| PathBuf::from(default))
    }

    /// The default configuration with every window spelled out
    pub fn template() -> Self {
        Self {
            datadir: Some(PathBuf::from(DEFAULT_DATADIR)),
            grid: GridLocator::cmg(),
            monthly_windows: Platform::ALL
                .iter()
                .map(|p| (*p, p.default_monthly_window()))
                .collect(),
            postprocess: Vec::new(),
        }
    }

    pub fn to_json(&self) -> CmgResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CmgError::Config(e.to_string()))
    }

    pub fn to_yaml(&self) -> CmgResult<String> {
        serde_yaml::to_string(self).map_err(|e| CmgError::Config(e.to_string()))
    }
}

/// Location shared by the extraction and plot jobs
fn locate(grid: &GridLocator, latitude: f64, longitude: f64) -> CmgResult<BoundingBox> {
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(CmgError::invalid_argument(format!(
            "longitude must be between -180 and 180, got {}",
            longitude
        )));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(CmgError::invalid_argument(format!(
            "latitude must be between -90 and 90, got {}",
            latitude
        )));
    }
    let (x0, y0) = grid.cell_index(longitude, latitude);
    let (lon0, lat0) = grid.cell_center(x0, y0);
    show_center_cell(lon0, lat0);

    let bbox = grid.box11(longitude, latitude);
    show_bounding_box(&bbox);
    Ok(bbox)
}

fn platforms(with_sass: bool) -> Vec<Platform> {
    Platform::ALL
        .into_iter()
        .filter(|p| with_sass || *p != Platform::Sass)
        .collect()
}

/// A monthly or seasonal table extraction around one location
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionJob {
    pub latitude: f64,
    pub longitude: f64,
    pub locname: String,
    pub datadir: PathBuf,
    pub granularity: Granularity,
    /// Seasonal products only
    pub mask: MaskKind,
    pub with_sass: bool,
    pub keep_nodata: bool,
    pub format: TableFormat,
}

impl ExtractionJob {
    pub fn new(
        latitude: f64,
        longitude: f64,
        locname: impl Into<String>,
        datadir: impl Into<PathBuf>,
        granularity: Granularity,
    ) -> Self {
        Self {
            latitude,
            longitude,
            locname: locname.into(),
            datadir: datadir.into(),
            granularity,
            mask: MaskKind::Land,
            with_sass: false,
            keep_nodata: false,
            format: TableFormat::Csv,
        }
    }

    pub fn platforms(&self) -> Vec<Platform> {
        platforms(self.with_sass)
    }

    pub fn output_path(&self) -> PathBuf {
        table_path(&self.datadir, &self.locname, self.granularity, self.format)
    }

    /// Platform subset restricted to the box and, for monthly data, the
    /// platform's historical window
    fn load(
        &self,
        platform: Platform,
        config: &RunConfig,
        bbox: &BoundingBox,
    ) -> CmgResult<RasterSeries> {
        let mut filters = bbox_filters(bbox);
        let series = match self.granularity {
            Granularity::Monthly => {
                filters.push(Box::new(DateWindowFilter::new(config.monthly_window(platform))));
                load_monthly(&self.datadir, platform)?
            }
            Granularity::Seasonal(season) => {
                load_seasonal(&self.datadir, platform, season, self.mask)?
            }
        };
        Ok(series.subset(&filters))
    }
}

/// What an extraction produced
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub output: PathBuf,
    pub platforms: Vec<Platform>,
    pub rows: usize,
    pub columns: usize,
}

/// Runs an extraction job and writes its table
pub fn run_extraction(job: &ExtractionJob, config: &RunConfig) -> CmgResult<JobReport> {
    let bbox = locate(&config.grid, job.latitude, job.longitude)?;
    let options = ReshapeOptions {
        keep_nodata: job.keep_nodata,
    };

    let platforms = job.platforms();
    let pb = platform_progress(platforms.len());
    let mut tables = Vec::with_capacity(platforms.len());
    for platform in &platforms {
        pb.set_message(platform.to_string());
        let subset = job.load(*platform, config, &bbox)?;
        let (nt, ni, nj) = subset.shape();
        info!("{} data size: ({}, {}, {})", platform, nt, ni, nj);

        let tag = platform.column_tag(job.granularity);
        let table = reshape(&subset, job.granularity, tag, options)?;
        debug!("{} table:\n{}", platform, table.head(Some(5)));
        tables.push(table);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let mut merged = merge_platform_tables(tables)?;
    if !config.postprocess.is_empty() {
        let mut pipeline = create_pipeline(&config.postprocess)?;
        info!("Applying {} post-processing steps", pipeline.len());
        merged = pipeline.execute(merged)?;
    }
    debug!("Merged columns: {:?}", merged.get_column_names());

    let output = job.output_path();
    write_table(&merged, &output, job.format)?;
    info!("Wrote {} rows x {} columns to {}", merged.height(), merged.width(), output.display());

    Ok(JobReport {
        output,
        platforms,
        rows: merged.height(),
        columns: merged.width(),
    })
}

/// A seasonal power-ratio time-series chart around one location
#[derive(Debug, Clone, PartialEq)]
pub struct PlotJob {
    pub latitude: f64,
    pub longitude: f64,
    pub locname: String,
    pub datadir: PathBuf,
    pub season: Season,
    pub mask: MaskKind,
    pub with_sass: bool,
    /// Defaults to `<locname>_<SEASON>_timeseries_plot.svg` in the working directory
    pub output: Option<PathBuf>,
}

impl PlotJob {
    pub fn new(
        latitude: f64,
        longitude: f64,
        locname: impl Into<String>,
        datadir: impl Into<PathBuf>,
        season: Season,
    ) -> Self {
        Self {
            latitude,
            longitude,
            locname: locname.into(),
            datadir: datadir.into(),
            season,
            mask: MaskKind::Land,
            with_sass: false,
            output: None,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_plot_name(&self.locname, self.season)))
    }
}

/// Runs a plot job, returning the path of the written chart
pub fn run_plot(job: &PlotJob, config: &RunConfig) -> CmgResult<PathBuf> {
    let bbox = locate(&config.grid, job.latitude, job.longitude)?;
    let mut chart = TimeSeriesChart::new(
        chart_title(&job.locname, job.latitude, job.longitude),
        power_ratio_label(job.season),
    );

    let platforms = platforms(job.with_sass);
    let pb = platform_progress(platforms.len());
    for platform in platforms {
        pb.set_message(platform.to_string());
        let series = load_seasonal(&job.datadir, platform, job.season, job.mask)?;
        let subset = series.subset(&bbox_filters(&bbox));
        let ts = platform_time_series(platform, &subset)?;
        info!("{}: {} time steps with data", platform, ts.plottable().count());
        chart.add_series(ts);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let output = job.output_path();
    chart.write(&output)?;
    info!("Wrote chart to {}", output.display());
    Ok(output)
}
