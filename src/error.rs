//! # Error Types
//!
//! Every fallible operation in the library returns [`CmgResult`]. Invalid
//! arguments (unknown platform tags, season codes) are reported before any
//! file is opened; NetCDF and Polars failures are wrapped unchanged.

use crate::postprocess::PostProcessError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised while locating, loading, reshaping or writing backscatter data
#[derive(Error, Debug)]
pub enum CmgError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Variable '{var}' not found in {path}")]
    VariableNotFound { var: String, path: String },

    #[error("Variable '{var}' has no '{dim}' dimension")]
    DimensionNotFound { var: String, dim: String },

    #[error("Cannot decode time axis: {0}")]
    TimeUnits(String),

    #[error("Mean and standard deviation files disagree on the {axis} coordinate")]
    Misaligned { axis: String },

    #[error("Column '{0}' would be produced by more than one time step")]
    DuplicateColumn(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Post-processing error: {0}")]
    PostProcess(#[from] PostProcessError),
}

/// Result type for library operations
pub type CmgResult<T> = Result<T, CmgError>;

impl CmgError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        CmgError::InvalidArgument(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, CmgError::InvalidArgument(_))
    }
}
