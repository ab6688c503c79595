//! # Raster Series
//!
//! In-memory cube of scatterometer backscatter for one platform, indexed by
//! (time, latitude, longitude) and holding the mean (`sig0`) and standard
//! deviation (`sig0std`) of every cell. Missing values are `None`.
//!
//! Filters narrow the cube axis by axis; [`RasterSeries::to_long_frame`]
//! then flattens it into a long DataFrame for the table and time-series
//! builders.

use crate::error::{CmgError, CmgResult};
use crate::filters::{Axis, FilterResult, SeriesFilter};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::HashSet;

/// Time index column of the long frame
pub const STEP: &str = "step";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

/// Measured quantity stored in a [`RasterSeries`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Mean,
    StdDev,
}

impl Quantity {
    /// Variable name inside the NetCDF files
    pub fn variable_name(&self) -> &'static str {
        match self {
            Quantity::Mean => "sig0",
            Quantity::StdDev => "sig0std",
        }
    }

    /// Suffix appended to wide-table column names
    pub fn column_suffix(&self) -> &'static str {
        match self {
            Quantity::Mean => "mean",
            Quantity::StdDev => "std",
        }
    }
}

/// Backscatter cube with shape (time, latitude, longitude)
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSeries {
    times: Vec<NaiveDateTime>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    sig0: Vec<Option<f64>>,
    sig0std: Vec<Option<f64>>,
}

impl RasterSeries {
    /// Builds a series from coordinates and time-major values
    /// (`index = (t * n_lat + i) * n_lon + j`).
    pub fn new(
        times: Vec<NaiveDateTime>,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        sig0: Vec<Option<f64>>,
        sig0std: Vec<Option<f64>>,
    ) -> CmgResult<Self> {
        let expected = times.len() * latitudes.len() * longitudes.len();
        for (name, len) in [("sig0", sig0.len()), ("sig0std", sig0std.len())] {
            if len != expected {
                return Err(CmgError::invalid_argument(format!(
                    "{} holds {} values but the coordinates describe {}",
                    name, len, expected
                )));
            }
        }
        Ok(Self {
            times,
            latitudes,
            longitudes,
            sig0,
            sig0std,
        })
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    /// (time, latitude, longitude) lengths
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.times.len(), self.latitudes.len(), self.longitudes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.sig0.is_empty()
    }

    fn offset(&self, t: usize, i: usize, j: usize) -> usize {
        (t * self.latitudes.len() + i) * self.longitudes.len() + j
    }

    pub fn value(&self, quantity: Quantity, t: usize, i: usize, j: usize) -> Option<f64> {
        let idx = self.offset(t, i, j);
        match quantity {
            Quantity::Mean => self.sig0[idx],
            Quantity::StdDev => self.sig0std[idx],
        }
    }

    /// Number of cells holding a value for the quantity
    pub fn valid_count(&self, quantity: Quantity) -> usize {
        let values = match quantity {
            Quantity::Mean => &self.sig0,
            Quantity::StdDev => &self.sig0std,
        };
        values.iter().filter(|v| v.is_some()).count()
    }

    /// Keeps the given indices along each axis, in the given order
    pub fn take(&self, time_idx: &[usize], lat_idx: &[usize], lon_idx: &[usize]) -> Self {
        let mut sig0 = Vec::with_capacity(time_idx.len() * lat_idx.len() * lon_idx.len());
        let mut sig0std = Vec::with_capacity(sig0.capacity());
        for &t in time_idx {
            for &i in lat_idx {
                for &j in lon_idx {
                    let idx = self.offset(t, i, j);
                    sig0.push(self.sig0[idx]);
                    sig0std.push(self.sig0std[idx]);
                }
            }
        }
        Self {
            times: time_idx.iter().map(|&t| self.times[t]).collect(),
            latitudes: lat_idx.iter().map(|&i| self.latitudes[i]).collect(),
            longitudes: lon_idx.iter().map(|&j| self.longitudes[j]).collect(),
            sig0,
            sig0std,
        }
    }

    /// Flattens the cube into one row per (time, latitude, longitude).
    ///
    /// Columns are `step` (index into [`times`](Self::times)), `latitude`,
    /// `longitude`, `sig0` and `sig0std`, in time-major order. Missing
    /// values become nulls.
    pub fn to_long_frame(&self) -> CmgResult<DataFrame> {
        let (nt, ni, nj) = self.shape();
        let rows = self.sig0.len();
        let mut steps = Vec::with_capacity(rows);
        let mut lats = Vec::with_capacity(rows);
        let mut lons = Vec::with_capacity(rows);
        for t in 0..nt {
            for lat in &self.latitudes {
                for lon in &self.longitudes {
                    steps.push(t as i64);
                    lats.push(*lat);
                    lons.push(*lon);
                }
            }
        }
        debug_assert_eq!(steps.len(), ni * nj * nt);

        let columns: Vec<Column> = vec![
            Series::new(STEP.into(), steps).into(),
            Series::new(LATITUDE.into(), lats).into(),
            Series::new(LONGITUDE.into(), lons).into(),
            Series::new(Quantity::Mean.variable_name().into(), self.sig0.clone()).into(),
            Series::new(Quantity::StdDev.variable_name().into(), self.sig0std.clone()).into(),
        ];
        Ok(DataFrame::new(columns)?)
    }

    /// Applies all filters, intersecting their selections per axis.
    ///
    /// Axis order is preserved, so a descending latitude axis stays
    /// descending in the subset.
    pub fn subset(&self, filters: &[Box<dyn SeriesFilter>]) -> Self {
        let mut selection = AxisSelection::new(self);
        for filter in filters {
            selection.apply(&filter.apply(self));
        }
        let (t, i, j) = selection.indices();
        self.take(&t, &i, &j)
    }
}

/// Tracks the surviving indices of every axis while filters are applied
#[derive(Debug, Clone)]
struct AxisSelection {
    time: HashSet<usize>,
    latitude: HashSet<usize>,
    longitude: HashSet<usize>,
}

impl AxisSelection {
    fn new(series: &RasterSeries) -> Self {
        let (nt, ni, nj) = series.shape();
        Self {
            time: (0..nt).collect(),
            latitude: (0..ni).collect(),
            longitude: (0..nj).collect(),
        }
    }

    fn apply(&mut self, result: &FilterResult) {
        let current = match result.axis {
            Axis::Time => &mut self.time,
            Axis::Latitude => &mut self.latitude,
            Axis::Longitude => &mut self.longitude,
        };
        let kept: HashSet<usize> = result.indices.iter().cloned().collect();
        *current = current.intersection(&kept).cloned().collect();
    }

    fn indices(&self) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
        let sorted = |set: &HashSet<usize>| {
            let mut v: Vec<usize> = set.iter().cloned().collect();
            v.sort_unstable();
            v
        };
        (sorted(&self.time), sorted(&self.latitude), sorted(&self.longitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{CoordRangeFilter, MonthFilter};
    use chrono::NaiveDate;

    fn month(y: i32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, 15).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn sample() -> RasterSeries {
        let times = vec![month(2000, 2), month(2000, 8), month(2001, 8)];
        let lats = vec![10.0, 5.0];
        let lons = vec![1.0, 2.0, 3.0];
        let sig0: Vec<Option<f64>> = (0..18).map(|v| Some(v as f64)).collect();
        let std: Vec<Option<f64>> = (0..18).map(|v| Some(v as f64 / 10.0)).collect();
        RasterSeries::new(times, lats, lons, sig0, std).unwrap()
    }

    #[test]
    fn test_shape_and_indexing() {
        let s = sample();
        assert_eq!(s.shape(), (3, 2, 3));
        assert_eq!(s.value(Quantity::Mean, 1, 1, 2), Some(11.0));
        assert_eq!(s.value(Quantity::StdDev, 2, 0, 0), Some(1.2));
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = RasterSeries::new(
            vec![month(2000, 1)],
            vec![0.0],
            vec![0.0, 1.0],
            vec![None],
            vec![None, None],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_subset_intersects_filters() {
        let s = sample();
        let filters: Vec<Box<dyn SeriesFilter>> = vec![
            Box::new(MonthFilter::new(8)),
            Box::new(CoordRangeFilter::new(Axis::Longitude, 1.5, 3.5)),
            Box::new(CoordRangeFilter::new(Axis::Longitude, 0.0, 2.5)),
        ];
        let sub = s.subset(&filters);
        assert_eq!(sub.shape(), (2, 2, 1));
        assert_eq!(sub.longitudes(), &[2.0]);
        assert_eq!(sub.latitudes(), &[10.0, 5.0]);
        assert_eq!(sub.value(Quantity::Mean, 0, 1, 0), Some(10.0));
    }

    #[test]
    fn test_long_frame_is_time_major() {
        let s = sample();
        let long = s.to_long_frame().unwrap();
        assert_eq!(long.shape(), (18, 5));
        let step = long.column(STEP).unwrap().i64().unwrap();
        assert_eq!(step.get(5), Some(0));
        assert_eq!(step.get(6), Some(1));
        let lat = long.column(LATITUDE).unwrap().f64().unwrap();
        assert_eq!(lat.get(3), Some(5.0));
        let lon = long.column(LONGITUDE).unwrap().f64().unwrap();
        assert_eq!(lon.get(4), Some(2.0));
        let sig0 = long.column("sig0").unwrap().f64().unwrap();
        assert_eq!(sig0.get(11), s.value(Quantity::Mean, 1, 1, 2));
    }

    #[test]
    fn test_valid_count() {
        let series = RasterSeries::new(
            vec![month(2000, 1)],
            vec![0.0],
            vec![0.0, 1.0],
            vec![Some(1.0), None],
            vec![None, None],
        )
        .unwrap();
        assert_eq!(series.valid_count(Quantity::Mean), 1);
        assert_eq!(series.valid_count(Quantity::StdDev), 0);
    }
}
