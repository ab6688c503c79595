//! # cmg-backscatter
//!
//! A Rust library for extracting scatterometer backscatter (sigma-naught) from
//! the gridded Climate Modelling Grid archives around a location.
//!
//! ## Features
//!
//! - **Grid location**: snap a point to the 0.05 degree CMG grid and build the
//!   11 x 11 cell box around it
//! - **Four missions**: SASS, ERS, QuikSCAT and ASCAT, monthly or seasonal
//! - **Wide tables**: one row per cell, one column per platform, period and
//!   statistic, written as CSV or Parquet
//! - **Time-series charts**: regional mean power ratio per season as SVG or PNG
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cmg_backscatter::{box11, ncfile::load_monthly, platform::Platform};
//! use cmg_backscatter::reshape::reshape_monthly;
//! use cmg_backscatter::filters::bbox_filters;
//! use std::path::Path;
//!
//! let bbox = box11(-104.99, 39.74);
//! let series = load_monthly(Path::new("data"), Platform::Ers)?.subset(&bbox_filters(&bbox));
//! let table = reshape_monthly(&series, "ERS")?;
//! println!("{}", table.head(Some(5)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Column Naming
//!
//! ```text
//! latitude,longitude,ERS1993_01_mean,ERS1993_01_std,...       (monthly)
//! latitude,longitude,QSCAT2000_JAS_mean,QSCAT2000_JAS_std,... (seasonal)
//! ```

pub mod cftime;
pub mod cli;
pub mod error;
pub mod filters;
pub mod grid;
pub mod input;
pub mod inventory;
pub mod log;
pub mod ncfile;
pub mod output;
pub mod platform;
pub mod plot;
pub mod postprocess;
pub mod reshape;
pub mod series;
pub mod timeseries;

#[cfg(test)]
mod cli_tests;

pub use crate::error::{CmgError, CmgResult};
pub use crate::grid::{box11, BoundingBox, GridLocator};
pub use crate::reshape::{
    merge_platform_tables, reshape, reshape_monthly, reshape_seasonal, ReshapeOptions,
};
pub use crate::series::RasterSeries;
