//! # Table Reshaper
//!
//! Turns a [`RasterSeries`] into the wide table exchanged with downstream
//! tools: one row per (latitude, longitude) cell and one mean and one
//! standard deviation column per time step, named
//! `<tag><year>_<period>_<mean|std>`.
//!
//! Monthly and seasonal tables share one procedure; the [`Granularity`]
//! supplies the period label and [`ReshapeOptions`] the missing-data policy.
//! The series is flattened to a long frame, every time step is given its
//! final column name, and each quantity is pivoted on that name.

use crate::error::{CmgError, CmgResult};
use crate::platform::{Granularity, Platform};
use crate::postprocess::{
    ColumnReorderer, ColumnRounder, ColumnSelector, PostProcessor, ProcessingPipeline, RowSorter,
};
use crate::series::{Quantity, RasterSeries, STEP};
use chrono::{Datelike, NaiveDateTime};
use log::{debug, warn};
use polars::lazy::frame::pivot::pivot_stable;
use polars::prelude::*;

pub use crate::series::{LATITUDE, LONGITUDE};

/// Decimal places kept in the platform's own columns
pub const DATA_DECIMALS: u32 = 3;
/// Decimal places kept in every other column
pub const COORD_DECIMALS: u32 = 4;

/// Wide-table column name of each long-frame row
const COLUMN: &str = "column";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReshapeOptions {
    /// Keep every grid cell and time step, writing nulls where no value
    /// exists. When false, cells and time steps without any value are dropped.
    pub keep_nodata: bool,
}

/// Wide-table name of one time step
pub fn column_name(
    tag: &str,
    granularity: Granularity,
    time: &NaiveDateTime,
    quantity: Quantity,
) -> String {
    format!(
        "{}{}_{}_{}",
        tag,
        time.year(),
        granularity.period_label(time.month()),
        quantity.column_suffix()
    )
}

/// Reshapes a series into the wide table.
///
/// `platform_tag` must name a known platform (`QSCAT` and `QuikSCAT` are both
/// accepted) and is used verbatim as the column prefix. Validation happens
/// before any data is touched.
pub fn reshape(
    series: &RasterSeries,
    granularity: Granularity,
    platform_tag: &str,
    options: ReshapeOptions,
) -> CmgResult<DataFrame> {
    Platform::from_tag(platform_tag)?;

    let (nt, ni, nj) = series.shape();
    debug!("{} data size: ({}, {}, {})", platform_tag, nt, ni, nj);

    let long = series.to_long_frame()?;
    let mean = quantity_table(&long, series, Quantity::Mean, granularity, platform_tag, options)?;
    let std = quantity_table(&long, series, Quantity::StdDev, granularity, platform_tag, options)?;

    let (mean_rows, std_rows) = (mean.height(), std.height());
    let joined = mean
        .lazy()
        .join(
            std.lazy(),
            [col(LATITUDE), col(LONGITUDE)],
            [col(LATITUDE), col(LONGITUDE)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;

    let dropped = (mean_rows + std_rows).saturating_sub(2 * joined.height());
    if dropped > 0 {
        warn!(
            "{}: dropped {} cells found in only one of the mean ({} rows) \
             and standard deviation ({} rows) tables",
            platform_tag, dropped, mean_rows, std_rows
        );
    }

    let mut pipeline =
        ProcessingPipeline::with_name(format!("{} {} layout", platform_tag, granularity.label()));
    pipeline.add_processor(Box::new(ColumnReorderer::new(vec![
        LATITUDE.to_string(),
        LONGITUDE.to_string(),
    ])));
    pipeline.add_processor(Box::new(RowSorter::north_to_south()));
    Ok(pipeline.execute(joined)?)
}

/// Monthly table, dropping cells and months without data
pub fn reshape_monthly(series: &RasterSeries, platform_tag: &str) -> CmgResult<DataFrame> {
    reshape(series, Granularity::Monthly, platform_tag, ReshapeOptions::default())
}

/// Seasonal table for a season code (`JFM`, `AMJ`, `JAS` or `OND`)
pub fn reshape_seasonal(
    series: &RasterSeries,
    season_code: &str,
    platform_tag: &str,
    keep_nodata: bool,
) -> CmgResult<DataFrame> {
    let granularity = Granularity::seasonal_from_code(season_code)?;
    reshape(series, granularity, platform_tag, ReshapeOptions { keep_nodata })
}

/// `step` to column-name lookup for one quantity
fn step_names(
    series: &RasterSeries,
    quantity: Quantity,
    granularity: Granularity,
    tag: &str,
) -> CmgResult<DataFrame> {
    let mut steps = Vec::with_capacity(series.times().len());
    let mut names: Vec<String> = Vec::with_capacity(series.times().len());
    for (t, time) in series.times().iter().enumerate() {
        let name = column_name(tag, granularity, time, quantity);
        if names.contains(&name) {
            return Err(CmgError::DuplicateColumn(name));
        }
        steps.push(t as i64);
        names.push(name);
    }

    Ok(DataFrame::new(vec![
        Series::new(STEP.into(), steps).into(),
        Series::new(COLUMN.into(), names).into(),
    ])?)
}

/// Pivots one quantity of the long frame, names its columns and rounds it
fn quantity_table(
    long: &DataFrame,
    series: &RasterSeries,
    quantity: Quantity,
    granularity: Granularity,
    tag: &str,
    options: ReshapeOptions,
) -> CmgResult<DataFrame> {
    let value = quantity.variable_name();
    let names = step_names(series, quantity, granularity, tag)?;

    let mut cells = long
        .clone()
        .lazy()
        .select([col(STEP), col(LATITUDE), col(LONGITUDE), col(value)]);
    if !options.keep_nodata {
        cells = cells.filter(col(value).is_not_null());
    }
    let cells = cells
        .join(names.lazy(), [col(STEP)], [col(STEP)], JoinArgs::new(JoinType::Inner))
        .select([col(LATITUDE), col(LONGITUDE), col(COLUMN), col(value)])
        .collect()?;

    let wide = if cells.height() == 0 {
        DataFrame::new(vec![
            Series::new(LATITUDE.into(), Vec::<f64>::new()).into(),
            Series::new(LONGITUDE.into(), Vec::<f64>::new()).into(),
        ])?
    } else {
        pivot_stable(
            &cells,
            [COLUMN],
            Some([LATITUDE, LONGITUDE]),
            Some([value]),
            false,
            None,
            None,
        )?
    };
    debug!(
        "{} {}: pivoted to {} cells x {} time steps",
        tag,
        value,
        wide.height(),
        wide.width().saturating_sub(2)
    );

    let mut pipeline = ProcessingPipeline::with_name(format!("{} {}", tag, value));
    pipeline.add_processor(Box::new(ColumnRounder::new(
        DATA_DECIMALS,
        ColumnSelector::Containing(tag.to_string()),
    )));
    pipeline.add_processor(Box::new(ColumnRounder::new(
        COORD_DECIMALS,
        ColumnSelector::NotContaining(tag.to_string()),
    )));
    Ok(pipeline.execute(wide)?)
}

/// Left-joins per-platform tables in order on (latitude, longitude).
///
/// The first table decides which cells appear in the result.
pub fn merge_platform_tables(tables: Vec<DataFrame>) -> CmgResult<DataFrame> {
    let mut iter = tables.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| CmgError::invalid_argument("no platform tables to merge"))?;

    let mut merged = first.lazy();
    for table in iter {
        merged = merged.join(
            table.lazy(),
            [col(LATITUDE), col(LONGITUDE)],
            [col(LATITUDE), col(LONGITUDE)],
            JoinArgs::new(JoinType::Left),
        );
    }
    let merged = merged.collect()?;
    Ok(RowSorter::north_to_south().process(merged)?)
}
