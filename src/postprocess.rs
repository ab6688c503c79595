//! # Post-Processing Framework
//!
//! DataFrame transformations chained into pipelines. The table reshaper uses
//! them to name, round and order the wide backscatter table, the time-series
//! builder uses them to average cells and convert to power ratio, and a run
//! configuration can append its own steps before a table is written.
//!
//! ## Built-in Processors
//! - **ColumnRenamer**: Rename columns with mappings
//! - **ColumnRounder**: Round float columns to a number of decimal places
//! - **ColumnReorderer**: Put key columns first and sort the rest by name
//! - **RowSorter**: Multi-column sort with per-column direction
//! - **Aggregator**: Grouped statistics
//! - **PowerRatioConverter**: Convert decibels to power ratio
//!
//! ## Example
//! ```rust
//! use cmg_backscatter::postprocess::{ColumnRounder, ColumnSelector, ProcessingPipeline};
//! use polars::prelude::*;
//!
//! let mut pipeline = ProcessingPipeline::new();
//! pipeline.add_processor(Box::new(ColumnRounder::new(2, ColumnSelector::All)));
//!
//! let sample_df = df! {
//!     "sig0" => [-12.3456, -11.0],
//! }.unwrap();
//!
//! let processed_df = pipeline.execute(sample_df).unwrap();
//! assert_eq!(processed_df.column("sig0").unwrap().f64().unwrap().get(0), Some(-12.35));
//! ```

use log::{debug, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Result type for post-processing operations
pub type PostProcessResult<T> = Result<T, PostProcessError>;

/// Errors that can occur during post-processing
#[derive(Debug)]
pub enum PostProcessError {
    /// Column not found in DataFrame
    ColumnNotFound(String),
    /// Invalid configuration
    ConfigurationError(String),
    /// Polars-specific error
    PolarsError(PolarsError),
    /// Custom processing error
    ProcessingError(String),
}

impl fmt::Display for PostProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostProcessError::ColumnNotFound(col) => {
                write!(f, "Column '{}' not found in DataFrame", col)
            }
            PostProcessError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            PostProcessError::PolarsError(e) => write!(f, "Polars error: {}", e),
            PostProcessError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
        }
    }
}

impl Error for PostProcessError {}

impl From<PolarsError> for PostProcessError {
    fn from(error: PolarsError) -> Self {
        PostProcessError::PolarsError(error)
    }
}

/// Core trait for post-processing operations on DataFrames
pub trait PostProcessor: Send + Sync {
    /// Process the DataFrame and return the transformed result
    fn process(&self, df: DataFrame) -> PostProcessResult<DataFrame>;

    /// Get the name/identifier of this processor
    fn name(&self) -> &str;

    /// Get a description of what this processor does
    fn description(&self) -> &str;
}

/// Configuration for post-processing steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessorConfig {
    /// Rename columns using a mapping
    RenameColumns { mappings: HashMap<String, String> },
    /// Round float columns
    Round {
        decimals: u32,
        #[serde(default)]
        columns: ColumnSelector,
    },
    /// Leading columns first, remaining columns sorted by name
    ReorderColumns { leading: Vec<String> },
    /// Sort rows
    SortRows {
        by: Vec<String>,
        #[serde(default)]
        descending: Vec<bool>,
    },
    /// Aggregate data
    Aggregate {
        group_by: Vec<String>,
        aggregations: HashMap<String, AggregationOp>,
    },
    /// Decibel column to power ratio
    PowerRatio {
        column: String,
        target: String,
        #[serde(default)]
        spread: Option<String>,
        #[serde(default = "default_spread_sign")]
        spread_sign: f64,
    },
}

fn default_spread_sign() -> f64 {
    1.0
}

/// Which columns a column-wise processor touches
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnSelector {
    #[default]
    All,
    Containing(String),
    NotContaining(String),
    Named(Vec<String>),
}

impl ColumnSelector {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            ColumnSelector::All => true,
            ColumnSelector::Containing(pattern) => name.contains(pattern.as_str()),
            ColumnSelector::NotContaining(pattern) => !name.contains(pattern.as_str()),
            ColumnSelector::Named(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Aggregation operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationOp {
    Mean,
    Min,
    Max,
    Count,
    Std,
}

/// Pipeline that chains multiple post-processors together
pub struct ProcessingPipeline {
    processors: Vec<Box<dyn PostProcessor>>,
    name: String,
}

impl ProcessingPipeline {
    /// Create a new empty processing pipeline
    pub fn new() -> Self {
        Self {
            name: "Unnamed Pipeline".to_string(),
            processors: Vec::new(),
        }
    }

    /// Create a new processing pipeline with a name
    pub fn with_name(name: String) -> Self {
        Self {
            name,
            processors: Vec::new(),
        }
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Add a processor to the pipeline
    pub fn add_processor(&mut self, processor: Box<dyn PostProcessor>) {
        self.processors.push(processor);
    }

    /// Execute the processing pipeline on a DataFrame
    pub fn execute(&mut self, mut df: DataFrame) -> PostProcessResult<DataFrame> {
        debug!(
            "Executing pipeline '{}' with {} processors",
            self.name,
            self.processors.len()
        );

        if self.processors.is_empty() {
            debug!(
                "Pipeline '{}' is empty, returning DataFrame unchanged",
                self.name
            );
            return Ok(df);
        }

        for (i, processor) in self.processors.iter().enumerate() {
            let processor_name = processor.name();
            debug!(
                "Executing processor {} '{}' ({}) - input shape: {:?}",
                i + 1,
                processor_name,
                processor.description(),
                df.shape()
            );

            df = processor.process(df)?;

            debug!(
                "Processor '{}' completed - output shape: {:?}",
                processor_name,
                df.shape()
            );
        }

        debug!("Pipeline '{}' completed successfully", self.name);
        Ok(df)
    }
}

impl Default for ProcessingPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper function to create a processor from configuration
pub fn create_processor(config: &ProcessorConfig) -> PostProcessResult<Box<dyn PostProcessor>> {
    match config {
        ProcessorConfig::RenameColumns { mappings } => {
            Ok(Box::new(ColumnRenamer::new(mappings.clone())))
        }
        ProcessorConfig::Round { decimals, columns } => {
            if *decimals > 15 {
                return Err(PostProcessError::ConfigurationError(format!(
                    "cannot round to {} decimal places",
                    decimals
                )));
            }
            Ok(Box::new(ColumnRounder::new(*decimals, columns.clone())))
        }
        ProcessorConfig::ReorderColumns { leading } => {
            Ok(Box::new(ColumnReorderer::new(leading.clone())))
        }
        ProcessorConfig::SortRows { by, descending } => {
            if !descending.is_empty() && descending.len() != by.len() {
                return Err(PostProcessError::ConfigurationError(format!(
                    "sort has {} columns but {} directions",
                    by.len(),
                    descending.len()
                )));
            }
            let descending = if descending.is_empty() {
                vec![false; by.len()]
            } else {
                descending.clone()
            };
            Ok(Box::new(RowSorter::new(by.clone(), descending)))
        }
        ProcessorConfig::Aggregate {
            group_by,
            aggregations,
        } => Ok(Box::new(Aggregator::new(
            group_by.clone(),
            aggregations.clone(),
        ))),
        ProcessorConfig::PowerRatio {
            column,
            target,
            spread,
            spread_sign,
        } => {
            let converter = PowerRatioConverter::new(column.clone(), target.clone());
            Ok(Box::new(match spread {
                Some(spread) => converter.with_spread(spread.clone(), *spread_sign),
                None => converter,
            }))
        }
    }
}

/// Create a pipeline from a vector of processor configurations
pub fn create_pipeline(configs: &[ProcessorConfig]) -> PostProcessResult<ProcessingPipeline> {
    let mut pipeline = ProcessingPipeline::with_name("Configured Pipeline".to_string());

    for config in configs {
        let processor = create_processor(config)?;
        pipeline.add_processor(processor);
    }

    Ok(pipeline)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

fn require_column(df: &DataFrame, name: &str) -> PostProcessResult<()> {
    if column_names(df).iter().any(|c| c == name) {
        Ok(())
    } else {
        Err(PostProcessError::ColumnNotFound(name.to_string()))
    }
}

fn require_float(df: &DataFrame, name: &str) -> PostProcessResult<()> {
    let dtype = df.column(name)?.dtype();
    if dtype != &DataType::Float64 {
        return Err(PostProcessError::ProcessingError(format!(
            "column '{}' has type {} but Float64 is required",
            name, dtype
        )));
    }
    Ok(())
}

pub struct ColumnRenamer {
    mappings: HashMap<String, String>,
}

impl ColumnRenamer {
    pub fn new(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }
}

impl PostProcessor for ColumnRenamer {
    fn process(&self, mut df: DataFrame) -> PostProcessResult<DataFrame> {
        debug!("Renaming columns with {} mappings", self.mappings.len());

        let existing = column_names(&df);
        for (old_name, new_name) in &self.mappings {
            if !existing.contains(old_name) {
                warn!(
                    "Column '{}' not found in DataFrame, skipping rename",
                    old_name
                );
                continue;
            }

            df.rename(old_name, new_name.into())?;
        }

        Ok(df)
    }

    fn name(&self) -> &str {
        "ColumnRenamer"
    }

    fn description(&self) -> &str {
        "Renames columns based on provided mappings"
    }
}

pub struct ColumnRounder {
    decimals: u32,
    columns: ColumnSelector,
}

impl ColumnRounder {
    pub fn new(decimals: u32, columns: ColumnSelector) -> Self {
        Self { decimals, columns }
    }
}

impl PostProcessor for ColumnRounder {
    fn process(&self, df: DataFrame) -> PostProcessResult<DataFrame> {
        let targets: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|c| c.dtype() == &DataType::Float64 && self.columns.matches(c.name()))
            .map(|c| c.name().to_string())
            .collect();
        debug!(
            "Rounding {} columns to {} decimals",
            targets.len(),
            self.decimals
        );

        if targets.is_empty() {
            return Ok(df);
        }

        // Ties go to the even neighbour
        let exprs: Vec<Expr> = targets
            .iter()
            .map(|name| col(name.as_str()).round(self.decimals, RoundMode::HalfToEven))
            .collect();
        Ok(df.lazy().with_columns(exprs).collect()?)
    }

    fn name(&self) -> &str {
        "ColumnRounder"
    }

    fn description(&self) -> &str {
        "Rounds float columns to a fixed number of decimal places"
    }
}

pub struct ColumnReorderer {
    leading: Vec<String>,
}

impl ColumnReorderer {
    pub fn new(leading: Vec<String>) -> Self {
        Self { leading }
    }
}

impl PostProcessor for ColumnReorderer {
    fn process(&self, df: DataFrame) -> PostProcessResult<DataFrame> {
        for name in &self.leading {
            require_column(&df, name)?;
        }

        let mut rest: Vec<String> = column_names(&df)
            .into_iter()
            .filter(|name| !self.leading.contains(name))
            .collect();
        rest.sort();

        let order: Vec<String> = self.leading.iter().cloned().chain(rest).collect();
        Ok(df.select(order)?)
    }

    fn name(&self) -> &str {
        "ColumnReorderer"
    }

    fn description(&self) -> &str {
        "Places key columns first and orders the remaining columns by name"
    }
}

pub struct RowSorter {
    by: Vec<String>,
    descending: Vec<bool>,
}

impl RowSorter {
    pub fn new(by: Vec<String>, descending: Vec<bool>) -> Self {
        Self { by, descending }
    }

    /// Latitude descending, longitude ascending
    pub fn north_to_south() -> Self {
        Self::new(
            vec!["latitude".to_string(), "longitude".to_string()],
            vec![true, false],
        )
    }
}

impl PostProcessor for RowSorter {
    fn process(&self, df: DataFrame) -> PostProcessResult<DataFrame> {
        for name in &self.by {
            require_column(&df, name)?;
        }
        debug!("Sorting rows by {:?} (descending: {:?})", self.by, self.descending);

        let exprs: Vec<Expr> = self.by.iter().map(|name| col(name.as_str())).collect();
        let options = SortMultipleOptions::default()
            .with_order_descending_multi(self.descending.clone())
            .with_nulls_last(true)
            .with_maintain_order(true);

        Ok(df.lazy().sort_by_exprs(exprs, options).collect()?)
    }

    fn name(&self) -> &str {
        "RowSorter"
    }

    fn description(&self) -> &str {
        "Sorts rows by one or more columns"
    }
}

pub struct Aggregator {
    group_by: Vec<String>,
    aggregations: HashMap<String, AggregationOp>,
}

impl Aggregator {
    pub fn new(group_by: Vec<String>, aggregations: HashMap<String, AggregationOp>) -> Self {
        Self {
            group_by,
            aggregations,
        }
    }
}

impl PostProcessor for Aggregator {
    fn process(&self, df: DataFrame) -> PostProcessResult<DataFrame> {
        debug!(
            "Aggregating data with group_by: {:?}, aggregations: {:?}",
            self.group_by, self.aggregations
        );

        for col_name in self.group_by.iter().chain(self.aggregations.keys()) {
            require_column(&df, col_name)?;
        }

        let mut agg_exprs = Vec::new();
        for (col_name, agg_op) in &self.aggregations {
            let (expr, suffix) = match agg_op {
                AggregationOp::Mean => (col(col_name.as_str()).mean(), "mean"),
                AggregationOp::Min => (col(col_name.as_str()).min(), "min"),
                AggregationOp::Max => (col(col_name.as_str()).max(), "max"),
                AggregationOp::Count => (col(col_name.as_str()).count(), "count"),
                AggregationOp::Std => (col(col_name.as_str()).std(1), "std"),
            };
            agg_exprs.push(expr.alias(format!("{}_{}", col_name, suffix)));
        }

        let result = if !self.group_by.is_empty() {
            df.lazy()
                .group_by(self.group_by.iter().map(|s| col(s.as_str())).collect::<Vec<_>>())
                .agg(agg_exprs)
                .collect()?
        } else {
            df.lazy().select(agg_exprs).collect()?
        };

        Ok(result)
    }

    fn name(&self) -> &str {
        "Aggregator"
    }

    fn description(&self) -> &str {
        "Aggregates data using group by operations and statistical functions"
    }
}

/// Writes `10^((column + sign * spread) / 10)` into `target`
pub struct PowerRatioConverter {
    column: String,
    target: String,
    spread: Option<(String, f64)>,
}

impl PowerRatioConverter {
    pub fn new(column: String, target: String) -> Self {
        Self {
            column,
            target,
            spread: None,
        }
    }

    pub fn with_spread(mut self, spread: String, sign: f64) -> Self {
        self.spread = Some((spread, sign));
        self
    }
}

/// `10^(db / 10)` as an expression
pub fn power_ratio(db: Expr) -> Expr {
    lit(10.0).pow(db / lit(10.0))
}

impl PostProcessor for PowerRatioConverter {
    fn process(&self, df: DataFrame) -> PostProcessResult<DataFrame> {
        require_column(&df, &self.column)?;
        require_float(&df, &self.column)?;

        let db = match &self.spread {
            None => col(self.column.as_str()),
            Some((spread, sign)) => {
                require_column(&df, spread)?;
                require_float(&df, spread)?;
                col(self.column.as_str()) + lit(*sign) * col(spread.as_str())
            }
        };
        debug!("Converting '{}' to power ratio in '{}'", self.column, self.target);

        Ok(df
            .lazy()
            .with_columns([power_ratio(db).alias(self.target.as_str())])
            .collect()?)
    }

    fn name(&self) -> &str {
        "PowerRatioConverter"
    }

    fn description(&self) -> &str {
        "Converts a decibel column to power ratio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df! {
            "latitude" => [40.02499, 40.07501, 40.07501],
            "longitude" => [-99.97501, -99.92499, -99.97501],
            "ERS1995_08_mean" => [Some(-12.34567), None, Some(-10.0004)],
            "ERS1994_08_mean" => [-11.0, -11.5, -12.0],
        }
        .unwrap()
    }

    #[test]
    fn test_round_to_decimal_places() {
        let df = df! {
            "sig0" => [12.34567, -12.0625, 0.0625, -0.00004],
        }
        .unwrap();
        let three = ColumnRounder::new(3, ColumnSelector::All).process(df.clone()).unwrap();
        let three = three.column("sig0").unwrap().f64().unwrap();
        assert_eq!(three.get(0), Some(12.346));
        // exact ties round to the even neighbour
        assert_eq!(three.get(1), Some(-12.062));
        assert_eq!(three.get(2), Some(0.062));

        let four = ColumnRounder::new(4, ColumnSelector::All).process(df).unwrap();
        let four = four.column("sig0").unwrap().f64().unwrap();
        assert_eq!(four.get(3), Some(-0.0));
    }

    #[test]
    fn test_rounder_leaves_non_float_columns() {
        let df = df! {
            "step" => [1i64, 2],
            "sig0" => [1.23456, 2.0],
        }
        .unwrap();
        let df = ColumnRounder::new(1, ColumnSelector::All).process(df).unwrap();
        assert_eq!(df.column("step").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("sig0").unwrap().f64().unwrap().get(0), Some(1.2));
    }

    #[test]
    fn test_rounder_respects_selector() {
        let df = ColumnRounder::new(3, ColumnSelector::Containing("ERS".into()))
            .process(sample())
            .unwrap();
        let mean = df.column("ERS1995_08_mean").unwrap().f64().unwrap();
        assert_eq!(mean.get(0), Some(-12.346));
        assert_eq!(mean.get(1), None);
        let lat = df.column("latitude").unwrap().f64().unwrap();
        assert_eq!(lat.get(0), Some(40.02499));

        let df = ColumnRounder::new(4, ColumnSelector::NotContaining("ERS".into()))
            .process(df)
            .unwrap();
        assert_eq!(df.column("latitude").unwrap().f64().unwrap().get(0), Some(40.025));
    }

    #[test]
    fn test_reorder_and_sort() {
        let df = ColumnReorderer::new(vec!["latitude".into(), "longitude".into()])
            .process(sample())
            .unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec!["latitude", "longitude", "ERS1994_08_mean", "ERS1995_08_mean"]
        );

        let df = RowSorter::north_to_south().process(df).unwrap();
        let lon = df.column("longitude").unwrap().f64().unwrap();
        assert_eq!(lon.get(0), Some(-99.97501));
        assert_eq!(lon.get(1), Some(-99.92499));
        assert_eq!(df.column("latitude").unwrap().f64().unwrap().get(2), Some(40.02499));
    }

    #[test]
    fn test_reorder_requires_leading_columns() {
        let result = ColumnReorderer::new(vec!["lat".into()]).process(sample());
        assert!(matches!(result, Err(PostProcessError::ColumnNotFound(_))));
    }

    #[test]
    fn test_renamer_skips_missing_columns() {
        let mut mappings = HashMap::new();
        mappings.insert("ERS1994_08_mean".to_string(), "renamed".to_string());
        mappings.insert("missing".to_string(), "other".to_string());
        let df = ColumnRenamer::new(mappings).process(sample()).unwrap();
        assert!(df.column("renamed").is_ok());
        assert!(df.column("other").is_err());
    }

    #[test]
    fn test_aggregator_mean_skips_nulls() {
        let mut aggregations = HashMap::new();
        aggregations.insert("ERS1995_08_mean".to_string(), AggregationOp::Mean);
        let df = Aggregator::new(vec![], aggregations).process(sample()).unwrap();
        let mean = df.column("ERS1995_08_mean_mean").unwrap().f64().unwrap().get(0).unwrap();
        assert!((mean - (-11.173035)).abs() < 1e-9);
    }

    #[test]
    fn test_power_ratio_converter() {
        let df = df! {
            "sig0" => [-10.0, 0.0],
            "sig0std" => [1.0, 10.0],
        }
        .unwrap();
        let df = PowerRatioConverter::new("sig0".into(), "pr".into()).process(df).unwrap();
        let df = PowerRatioConverter::new("sig0".into(), "pr_high".into())
            .with_spread("sig0std".into(), 1.0)
            .process(df)
            .unwrap();
        let pr = df.column("pr").unwrap().f64().unwrap();
        assert!((pr.get(0).unwrap() - 0.1).abs() < 1e-12);
        let high = df.column("pr_high").unwrap().f64().unwrap();
        assert!((high.get(1).unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_power_ratio_propagates_nulls_and_checks_columns() {
        let df = df! {
            "sig0" => [Some(-20.0), None],
            "sig0std" => [None, Some(1.0)],
        }
        .unwrap();
        let out = PowerRatioConverter::new("sig0".into(), "pr_low".into())
            .with_spread("sig0std".into(), -1.0)
            .process(df.clone())
            .unwrap();
        let low = out.column("pr_low").unwrap().f64().unwrap();
        assert_eq!(low.get(0), None);
        assert_eq!(low.get(1), None);

        let out = PowerRatioConverter::new("sig0".into(), "pr".into()).process(df.clone()).unwrap();
        let pr = out.column("pr").unwrap().f64().unwrap();
        assert!((pr.get(0).unwrap() - 0.01).abs() < 1e-12);

        let missing = PowerRatioConverter::new("sigma".into(), "pr".into()).process(df);
        assert!(matches!(missing, Err(PostProcessError::ColumnNotFound(_))));
    }

    #[test]
    fn test_pipeline_from_config() {
        let json = r#"
        [
            { "type": "round", "decimals": 1, "columns": { "kind": "containing", "value": "ERS" } },
            { "type": "sort_rows", "by": ["longitude"] }
        ]"#;
        let configs: Vec<ProcessorConfig> = serde_json::from_str(json).unwrap();
        let mut pipeline = create_pipeline(&configs).unwrap();
        assert_eq!(pipeline.name(), "Configured Pipeline");
        assert_eq!(pipeline.len(), 2);

        let df = pipeline.execute(sample()).unwrap();
        let lon = df.column("longitude").unwrap().f64().unwrap();
        assert_eq!(lon.get(0), Some(-99.97501));
        assert_eq!(df.column("ERS1994_08_mean").unwrap().f64().unwrap().get(0), Some(-11.0));
    }

    #[test]
    fn test_invalid_configs() {
        let sort = ProcessorConfig::SortRows {
            by: vec!["a".into(), "b".into()],
            descending: vec![true],
        };
        assert!(matches!(
            create_processor(&sort),
            Err(PostProcessError::ConfigurationError(_))
        ));
        let round = ProcessorConfig::Round {
            decimals: 40,
            columns: ColumnSelector::All,
        };
        assert!(create_processor(&round).is_err());
    }
}
