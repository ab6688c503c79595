//! # Table Output
//!
//! Writes wide backscatter tables as CSV or Parquet.
//!
//! CSV files carry a header row, no index column, and `-9999.0` in place of
//! missing values. Parquet files keep missing values as nulls.

use crate::error::{CmgError, CmgResult};
use crate::platform::Granularity;
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Placeholder written for missing values in CSV output
pub const CSV_NODATA: &str = "-9999.0";

/// Name of the output directory created under the data directory
pub const OUTPUT_SUBDIR: &str = "CSV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TableFormat {
    type Err = CmgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "parquet" | "pq" => Ok(TableFormat::Parquet),
            other => Err(CmgError::invalid_argument(format!(
                "unknown table format '{}', expected 'csv' or 'parquet'",
                other
            ))),
        }
    }
}

/// `<datadir>/CSV/<locname>_bs_grid_<monthly|SEASON>.<ext>`
pub fn table_path(
    datadir: &Path,
    locname: &str,
    granularity: Granularity,
    format: TableFormat,
) -> PathBuf {
    datadir.join(OUTPUT_SUBDIR).join(format!(
        "{}_bs_grid_{}.{}",
        locname,
        granularity.label(),
        format.extension()
    ))
}

/// Writes a table, creating the parent directory when missing
pub fn write_table(df: &DataFrame, path: &Path, format: TableFormat) -> CmgResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            debug!("Creating output directory {}", parent.display());
            fs::create_dir_all(parent)?;
        }
    }

    debug!("Writing {} table to {}", format, path.display());
    debug!("DataFrame shape: {:?}", df.shape());
    debug!("First few rows:\n{}", df.head(Some(5)));

    match format {
        TableFormat::Csv => write_csv(df, path),
        TableFormat::Parquet => write_parquet(df, path),
    }
}

fn write_csv(df: &DataFrame, path: &Path) -> CmgResult<()> {
    let mut file = File::create(path)?;
    let mut df_clone = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_null_value(CSV_NODATA.to_string())
        .finish(&mut df_clone)?;
    Ok(())
}

fn write_parquet(df: &DataFrame, path: &Path) -> CmgResult<()> {
    let file = File::create(path)?;
    let mut df_clone = df.clone();
    ParquetWriter::new(file).finish(&mut df_clone)?;
    Ok(())
}
