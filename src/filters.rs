//! # Series Filters
//!
//! Index selectors applied to a [`RasterSeries`] before reshaping. Each filter
//! targets one axis and returns the indices it keeps along that axis; the
//! series intersects the results of all filters per axis.

use crate::grid::BoundingBox;
use crate::platform::DateWindow;
use crate::series::RasterSeries;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis of a raster series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Time,
    Latitude,
    Longitude,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::Time => "time",
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        };
        f.write_str(name)
    }
}

/// Indices kept along one axis
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub axis: Axis,
    pub indices: Vec<usize>,
}

impl FilterResult {
    pub fn new(axis: Axis, indices: Vec<usize>) -> Self {
        Self { axis, indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

pub trait SeriesFilter {
    fn apply(&self, series: &RasterSeries) -> FilterResult;

    /// Short identifier used in log messages
    fn kind(&self) -> &'static str;
}

/// Inclusive coordinate range on the latitude or longitude axis.
///
/// Selection is by label, so the order of the bounds and the direction of
/// the axis do not matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordRangeFilter {
    pub axis: Axis,
    pub min_value: f64,
    pub max_value: f64,
}

impl CoordRangeFilter {
    pub fn new(axis: Axis, min_value: f64, max_value: f64) -> Self {
        CoordRangeFilter {
            axis,
            min_value: min_value.min(max_value),
            max_value: min_value.max(max_value),
        }
    }
}

impl SeriesFilter for CoordRangeFilter {
    fn apply(&self, series: &RasterSeries) -> FilterResult {
        let values = match self.axis {
            Axis::Latitude => series.latitudes(),
            Axis::Longitude => series.longitudes(),
            Axis::Time => &[],
        };
        let indices = values
            .iter()
            .enumerate()
            .filter(|(_, val)| **val >= self.min_value && **val <= self.max_value)
            .map(|(idx, _)| idx)
            .collect();
        FilterResult::new(self.axis, indices)
    }

    fn kind(&self) -> &'static str {
        "range"
    }
}

/// Keeps time steps whose calendar date falls inside a window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateWindowFilter {
    pub window: DateWindow,
}

impl DateWindowFilter {
    pub fn new(window: DateWindow) -> Self {
        DateWindowFilter { window }
    }
}

impl SeriesFilter for DateWindowFilter {
    fn apply(&self, series: &RasterSeries) -> FilterResult {
        let indices = series
            .times()
            .iter()
            .enumerate()
            .filter(|(_, t)| self.window.contains(t.date()))
            .map(|(idx, _)| idx)
            .collect();
        FilterResult::new(Axis::Time, indices)
    }

    fn kind(&self) -> &'static str {
        "date_window"
    }
}

/// Keeps time steps falling in one calendar month of any year
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthFilter {
    pub month: u32,
}

impl MonthFilter {
    pub fn new(month: u32) -> Self {
        MonthFilter { month }
    }
}

impl SeriesFilter for MonthFilter {
    fn apply(&self, series: &RasterSeries) -> FilterResult {
        let indices = series
            .times()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.month() == self.month)
            .map(|(idx, _)| idx)
            .collect();
        FilterResult::new(Axis::Time, indices)
    }

    fn kind(&self) -> &'static str {
        "month"
    }
}

/// Latitude and longitude range filters covering a bounding box
pub fn bbox_filters(bbox: &BoundingBox) -> Vec<Box<dyn SeriesFilter>> {
    vec![
        Box::new(CoordRangeFilter::new(Axis::Latitude, bbox.latmin, bbox.latmax)),
        Box::new(CoordRangeFilter::new(Axis::Longitude, bbox.lonmin, bbox.lonmax)),
    ]
}
