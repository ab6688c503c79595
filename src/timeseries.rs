//! # Regional Time Series
//!
//! Reduces a subset [`RasterSeries`] to one value per time step (the mean of
//! all cells, ignoring missing values) and converts it from decibels to
//! power ratio for plotting. The standard deviation band is converted at
//! its edges, `10^((sig0 - std)/10)` and `10^((sig0 + std)/10)`.

use crate::error::CmgResult;
use crate::platform::Platform;
use crate::postprocess::{
    AggregationOp, Aggregator, ColumnRenamer, PowerRatioConverter, ProcessingPipeline, RowSorter,
};
use crate::series::{RasterSeries, STEP};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::HashMap;

const SIG0: &str = "sig0";
const SIG0STD: &str = "sig0std";

/// Regional mean at one time step
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub time: NaiveDateTime,
    pub sig0: Option<f64>,
    pub sig0std: Option<f64>,
    pub pr: Option<f64>,
    pub pr_low: Option<f64>,
    pub pr_high: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformTimeSeries {
    pub platform: Platform,
    pub points: Vec<TimeSeriesPoint>,
}

impl PlatformTimeSeries {
    /// Points that can be drawn (a mean value exists)
    pub fn plottable(&self) -> impl Iterator<Item = &TimeSeriesPoint> {
        self.points.iter().filter(|p| p.pr.is_some())
    }
}

/// Per-time-step mean of `sig0` and `sig0std` over all cells.
///
/// Columns: `step` (index into the series' time axis), `sig0`, `sig0std`,
/// sorted by step.
pub fn spatial_mean(series: &RasterSeries) -> CmgResult<DataFrame> {
    let long = series
        .to_long_frame()?
        .lazy()
        .select([col(STEP), col(SIG0), col(SIG0STD)])
        .collect()?;

    let mut aggregations = HashMap::new();
    aggregations.insert(SIG0.to_string(), AggregationOp::Mean);
    aggregations.insert(SIG0STD.to_string(), AggregationOp::Mean);

    let mut renames = HashMap::new();
    renames.insert(format!("{}_mean", SIG0), SIG0.to_string());
    renames.insert(format!("{}_mean", SIG0STD), SIG0STD.to_string());

    let mut pipeline = ProcessingPipeline::with_name("spatial mean".to_string());
    pipeline.add_processor(Box::new(Aggregator::new(vec![STEP.to_string()], aggregations)));
    pipeline.add_processor(Box::new(ColumnRenamer::new(renames)));
    pipeline.add_processor(Box::new(RowSorter::new(vec![STEP.to_string()], vec![false])));
    Ok(pipeline.execute(long)?)
}

/// Adds `pr`, `pr_low` and `pr_high` columns to a spatial-mean table
pub fn with_power_ratio(df: DataFrame) -> CmgResult<DataFrame> {
    let mut pipeline = ProcessingPipeline::with_name("power ratio".to_string());
    pipeline.add_processor(Box::new(PowerRatioConverter::new(
        SIG0.to_string(),
        "pr".to_string(),
    )));
    pipeline.add_processor(Box::new(
        PowerRatioConverter::new(SIG0.to_string(), "pr_low".to_string())
            .with_spread(SIG0STD.to_string(), -1.0),
    ));
    pipeline.add_processor(Box::new(
        PowerRatioConverter::new(SIG0.to_string(), "pr_high".to_string())
            .with_spread(SIG0STD.to_string(), 1.0),
    ));
    Ok(pipeline.execute(df)?)
}

/// Regional power-ratio time series of one platform
pub fn platform_time_series(
    platform: Platform,
    series: &RasterSeries,
) -> CmgResult<PlatformTimeSeries> {
    let df = with_power_ratio(spatial_mean(series)?)?;

    let steps = df.column(STEP)?.i64()?;
    let floats = |name: &str| -> CmgResult<Vec<Option<f64>>> {
        Ok(df.column(name)?.f64()?.into_iter().collect())
    };
    let (sig0, sig0std) = (floats(SIG0)?, floats(SIG0STD)?);
    let (pr, pr_low, pr_high) = (floats("pr")?, floats("pr_low")?, floats("pr_high")?);

    let mut points = Vec::with_capacity(df.height());
    for (row, step) in steps.into_iter().enumerate() {
        let Some(step) = step else { continue };
        points.push(TimeSeriesPoint {
            time: series.times()[step as usize],
            sig0: sig0[row],
            sig0std: sig0std[row],
            pr: pr[row],
            pr_low: pr_low[row],
            pr_high: pr_high[row],
        });
    }

    Ok(PlatformTimeSeries { platform, points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, 8, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_spatial_mean_skips_missing_cells() {
        let series = RasterSeries::new(
            vec![at(2000), at(2001)],
            vec![1.0],
            vec![1.0, 2.0],
            vec![Some(-10.0), Some(-20.0), None, None],
            vec![Some(1.0), Some(3.0), None, Some(2.0)],
        )
        .unwrap();
        let df = spatial_mean(&series).unwrap();
        assert_eq!(df.height(), 2);
        let sig0 = df.column("sig0").unwrap().f64().unwrap();
        assert_eq!(sig0.get(0), Some(-15.0));
        assert_eq!(sig0.get(1), None);
        let std = df.column("sig0std").unwrap().f64().unwrap();
        assert_eq!(std.get(0), Some(2.0));
        assert_eq!(std.get(1), Some(2.0));
    }

    #[test]
    fn test_power_ratio_series() {
        let series = RasterSeries::new(
            vec![at(2003), at(2002)],
            vec![1.0],
            vec![1.0],
            vec![Some(-10.0), Some(0.0)],
            vec![Some(10.0), Some(0.0)],
        )
        .unwrap();
        let ts = platform_time_series(Platform::Ers, &series).unwrap();
        assert_eq!(ts.points.len(), 2);
        let first = &ts.points[0];
        assert_eq!(first.time, at(2003));
        assert!((first.pr.unwrap() - 0.1).abs() < 1e-12);
        assert!((first.pr_low.unwrap() - 0.01).abs() < 1e-12);
        assert!((first.pr_high.unwrap() - 1.0).abs() < 1e-12);
        assert!((ts.points[1].pr.unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(ts.plottable().count(), 2);
    }
}
