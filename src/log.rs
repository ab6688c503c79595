use crate::grid::BoundingBox;
use crate::input::{ExtractionJob, PlotJob, RunConfig};
use crate::platform::Platform;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, LevelFilter};
use std::time::Duration;

pub fn show_greeting(command: &str) {
    info!("=== CMG Backscatter Extractor ({}) ===", command);
}

pub fn show_config_source(config_path: Option<&std::path::Path>) {
    match config_path {
        Some(path) => info!("Loading configuration from: {}", path.display()),
        None => info!("Using built-in configuration"),
    }
}

pub fn config_echo(config: &RunConfig) {
    info!("Configuration:");
    info!(
        "  Grid: origin ({}, {}), cell size {}",
        config.grid.lon_min, config.grid.lat_min, config.grid.cell_size
    );
    for platform in Platform::ALL {
        let window = config.monthly_window(platform);
        info!("  {} monthly window: {} .. {}", platform, window.start, window.end);
    }
    info!("  Post-processing steps: {}", config.postprocess.len());
}

pub fn job_echo(job: &ExtractionJob) {
    info!("date: {}", chrono::Local::now().format("%Y-%m-%d"));
    info!("granularity: {}", job.granularity.label());
    info!("location: {} {}", job.longitude, job.latitude);
    info!("name: {}", job.locname);
    info!("include SASS: {}", job.with_sass);
    info!("data directory: {}", job.datadir.display());
}

pub fn plot_job_echo(job: &PlotJob) {
    info!("date: {}", chrono::Local::now().format("%Y-%m-%d"));
    info!("season: {}", job.season);
    info!("location: {} {}", job.longitude, job.latitude);
    info!("name: {}", job.locname);
    info!("data directory: {}", job.datadir.display());
}

pub fn show_center_cell(lon0: f64, lat0: f64) {
    info!("Center Cell: {:.3} {:.3}", lon0, lat0);
}

pub fn show_bounding_box(bbox: &BoundingBox) {
    info!(
        "Bounding Box:  {} {} {} {}",
        bbox.lonmin, bbox.latmin, bbox.lonmax, bbox.latmax
    );
}

/// Progress over the platforms of a job, hidden unless info messages are shown
pub fn platform_progress(len: usize) -> ProgressBar {
    if log::max_level() < LevelFilter::Info {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb
}

pub fn show_farewell_with_timing(elapsed: Duration) {
    info!(
        "=== Completed successfully in {:.2}s! ===",
        elapsed.as_secs_f64()
    );
}
