//! # NetCDF Loading
//!
//! Reads one platform's mean and standard deviation archives into a
//! [`RasterSeries`]. Each file is opened, read and closed inside the load
//! call; the two files must agree exactly on their time, latitude and
//! longitude coordinates.
//!
//! Data variables may use any dimension order. Missing values (`NaN`,
//! `_FillValue`, `missing_value`) become `None`, and `scale_factor` /
//! `add_offset` are applied when present.

use crate::cftime::{check_calendar, CfTimeUnits};
use crate::error::{CmgError, CmgResult};
use crate::filters::{MonthFilter, SeriesFilter};
use crate::platform::{MaskKind, Platform, ProductFiles, Season};
use crate::series::{Quantity, RasterSeries};
use chrono::NaiveDateTime;
use log::debug;
use std::path::Path;

const TIME_NAMES: [&str; 1] = ["time"];
const LAT_NAMES: [&str; 2] = ["lat", "latitude"];
const LON_NAMES: [&str; 2] = ["lon", "longitude"];

/// One data variable on its (time, latitude, longitude) grid
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedVariable {
    pub times: Vec<NaiveDateTime>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    /// Time-major values, `index = (t * n_lat + i) * n_lon + j`
    pub values: Vec<Option<f64>>,
}

/// Coordinates of a data variable, read without its values
#[derive(Debug, Clone, PartialEq)]
pub struct VariableAxes {
    pub times: Vec<NaiveDateTime>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
}

/// Position of the time, latitude and longitude dimensions of a variable
struct DimensionLayout {
    names: [String; 3],
    positions: [usize; 3],
    lengths: Vec<usize>,
}

impl DimensionLayout {
    fn new(var: &netcdf::Variable) -> CmgResult<Self> {
        let dims: Vec<(String, usize)> = var
            .dimensions()
            .iter()
            .map(|d| (d.name().to_string(), d.len()))
            .collect();

        let find = |candidates: &[&str], label: &str| -> CmgResult<(usize, String)> {
            dims.iter()
                .position(|(name, _)| candidates.contains(&name.as_str()))
                .map(|pos| (pos, dims[pos].0.clone()))
                .ok_or_else(|| CmgError::DimensionNotFound {
                    var: var.name().to_string(),
                    dim: label.to_string(),
                })
        };

        let (t_pos, t_name) = find(&TIME_NAMES, "time")?;
        let (lat_pos, lat_name) = find(&LAT_NAMES, "latitude")?;
        let (lon_pos, lon_name) = find(&LON_NAMES, "longitude")?;

        if dims.len() != 3 {
            return Err(CmgError::invalid_argument(format!(
                "variable '{}' has {} dimensions, expected time, latitude and longitude",
                var.name(),
                dims.len()
            )));
        }

        Ok(Self {
            names: [t_name, lat_name, lon_name],
            positions: [t_pos, lat_pos, lon_pos],
            lengths: dims.iter().map(|(_, len)| *len).collect(),
        })
    }

    /// Row-major offset of (t, i, j) in the variable's own dimension order
    fn offset(&self, t: usize, i: usize, j: usize) -> usize {
        let mut index = [0usize; 3];
        index[self.positions[0]] = t;
        index[self.positions[1]] = i;
        index[self.positions[2]] = j;
        (index[0] * self.lengths[1] + index[1]) * self.lengths[2] + index[2]
    }
}

/// Packing and missing-value attributes of a data variable
#[derive(Debug, Clone, Copy, Default)]
struct ValueEncoding {
    fill_value: Option<f64>,
    missing_value: Option<f64>,
    scale_factor: Option<f64>,
    add_offset: Option<f64>,
}

impl ValueEncoding {
    fn from_variable(var: &netcdf::Variable) -> Self {
        Self {
            fill_value: numeric_attribute(var, "_FillValue"),
            missing_value: numeric_attribute(var, "missing_value"),
            scale_factor: numeric_attribute(var, "scale_factor"),
            add_offset: numeric_attribute(var, "add_offset"),
        }
    }

    fn decode(&self, raw: f64) -> Option<f64> {
        if raw.is_nan() || Some(raw) == self.fill_value || Some(raw) == self.missing_value {
            return None;
        }
        Some(raw * self.scale_factor.unwrap_or(1.0) + self.add_offset.unwrap_or(0.0))
    }
}

fn numeric_attribute(var: &netcdf::Variable, name: &str) -> Option<f64> {
    let value = var.attribute(name)?.value().ok()?;
    attribute_as_f64(&value)
}

fn attribute_as_f64(value: &netcdf::AttributeValue) -> Option<f64> {
    use netcdf::AttributeValue::*;
    match value {
        Double(v) => Some(*v),
        Float(v) => Some(*v as f64),
        Int(v) => Some(*v as f64),
        Short(v) => Some(*v as f64),
        Longlong(v) => Some(*v as f64),
        Schar(v) => Some(*v as f64),
        Uchar(v) => Some(*v as f64),
        Ushort(v) => Some(*v as f64),
        Uint(v) => Some(*v as f64),
        Ulonglong(v) => Some(*v as f64),
        Doubles(v) => v.first().copied(),
        Floats(v) => v.first().map(|x| *x as f64),
        _ => None,
    }
}

fn string_attribute(var: &netcdf::Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn coordinate_values(file: &netcdf::File, name: &str, path: &Path) -> CmgResult<Vec<f64>> {
    let var = file.variable(name).ok_or_else(|| CmgError::VariableNotFound {
        var: name.to_string(),
        path: path.display().to_string(),
    })?;
    let values = var.get::<f64, _>(..)?;
    Ok(values.iter().cloned().collect())
}

fn time_coordinate(file: &netcdf::File, name: &str, path: &Path) -> CmgResult<Vec<NaiveDateTime>> {
    let var = file.variable(name).ok_or_else(|| CmgError::VariableNotFound {
        var: name.to_string(),
        path: path.display().to_string(),
    })?;
    let units = string_attribute(&var, "units").ok_or_else(|| {
        CmgError::TimeUnits(format!("'{}' in {} has no units", name, path.display()))
    })?;
    check_calendar(string_attribute(&var, "calendar").as_deref())?;

    let raw: Vec<f64> = var.get::<f64, _>(..)?.iter().cloned().collect();
    CfTimeUnits::parse(&units)?.decode_all(&raw)
}

fn read_axes(
    file: &netcdf::File,
    layout: &DimensionLayout,
    path: &Path,
) -> CmgResult<VariableAxes> {
    Ok(VariableAxes {
        times: time_coordinate(file, &layout.names[0], path)?,
        latitudes: coordinate_values(file, &layout.names[1], path)?,
        longitudes: coordinate_values(file, &layout.names[2], path)?,
    })
}

/// Reads the coordinates of a data variable
pub fn read_variable_axes(path: &Path, var_name: &str) -> CmgResult<VariableAxes> {
    debug!("Reading axes of '{}' from {}", var_name, path.display());
    let file = netcdf::open(path)?;
    let axes = {
        let var = file.variable(var_name).ok_or_else(|| CmgError::VariableNotFound {
            var: var_name.to_string(),
            path: path.display().to_string(),
        })?;
        let layout = DimensionLayout::new(&var)?;
        read_axes(&file, &layout, path)?
    };
    file.close()?;
    Ok(axes)
}

/// Reads a data variable and its coordinates
pub fn read_variable(path: &Path, var_name: &str) -> CmgResult<GriddedVariable> {
    debug!("input file path: {}", path.display());
    let file = netcdf::open(path)?;
    let gridded = {
        let var = file.variable(var_name).ok_or_else(|| CmgError::VariableNotFound {
            var: var_name.to_string(),
            path: path.display().to_string(),
        })?;
        let layout = DimensionLayout::new(&var)?;
        let axes = read_axes(&file, &layout, path)?;
        let encoding = ValueEncoding::from_variable(&var);
        let raw: Vec<f64> = var.get::<f64, _>(..)?.iter().cloned().collect();

        let (nt, ni, nj) = (axes.times.len(), axes.latitudes.len(), axes.longitudes.len());
        for (axis, (len, pos)) in ["time", "latitude", "longitude"]
            .iter()
            .zip([nt, ni, nj].into_iter().zip(layout.positions))
        {
            if layout.lengths[pos] != len {
                return Err(CmgError::invalid_argument(format!(
                    "{} coordinate of '{}' has {} values but the dimension has {}",
                    axis, var_name, len, layout.lengths[pos]
                )));
            }
        }

        let mut values = Vec::with_capacity(raw.len());
        for t in 0..nt {
            for i in 0..ni {
                for j in 0..nj {
                    values.push(encoding.decode(raw[layout.offset(t, i, j)]));
                }
            }
        }

        GriddedVariable {
            times: axes.times,
            latitudes: axes.latitudes,
            longitudes: axes.longitudes,
            values,
        }
    };
    file.close()?;
    Ok(gridded)
}

/// Combines a product's mean and stddev files, requiring identical coordinates
pub fn load_product(files: &ProductFiles) -> CmgResult<RasterSeries> {
    let mean = read_variable(&files.mean, Quantity::Mean.variable_name())?;
    let std = read_variable(&files.stddev, Quantity::StdDev.variable_name())?;

    if mean.times != std.times {
        return Err(CmgError::Misaligned { axis: "time".to_string() });
    }
    if mean.latitudes != std.latitudes {
        return Err(CmgError::Misaligned { axis: "latitude".to_string() });
    }
    if mean.longitudes != std.longitudes {
        return Err(CmgError::Misaligned { axis: "longitude".to_string() });
    }

    RasterSeries::new(mean.times, mean.latitudes, mean.longitudes, mean.values, std.values)
}

/// Loads the monthly land product of a platform
pub fn load_monthly(datadir: &Path, platform: Platform) -> CmgResult<RasterSeries> {
    load_product(&ProductFiles::monthly(datadir, platform))
}

/// Loads the seasonal product of a platform, keeping only the time steps
/// that fall in the season's representative month
pub fn load_seasonal(
    datadir: &Path,
    platform: Platform,
    season: Season,
    mask: MaskKind,
) -> CmgResult<RasterSeries> {
    let series = load_product(&ProductFiles::seasonal(datadir, platform, mask))?;
    let filters: Vec<Box<dyn SeriesFilter>> =
        vec![Box::new(MonthFilter::new(season.representative_month()))];
    let selected = series.subset(&filters);
    debug!(
        "{} {}: kept {} of {} time steps",
        platform,
        season,
        selected.times().len(),
        series.times().len()
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_encoding() {
        let encoding = ValueEncoding {
            fill_value: Some(-9999.0),
            missing_value: None,
            scale_factor: Some(0.01),
            add_offset: Some(-20.0),
        };
        assert_eq!(encoding.decode(f64::NAN), None);
        assert_eq!(encoding.decode(-9999.0), None);
        assert!((encoding.decode(500.0).unwrap() - (-15.0)).abs() < 1e-12);

        let plain = ValueEncoding::default();
        assert_eq!(plain.decode(-12.5), Some(-12.5));
    }

    #[test]
    fn test_attribute_as_f64() {
        assert_eq!(attribute_as_f64(&netcdf::AttributeValue::Float(-9999.0)), Some(-9999.0));
        assert_eq!(attribute_as_f64(&netcdf::AttributeValue::Short(3)), Some(3.0));
        assert_eq!(attribute_as_f64(&netcdf::AttributeValue::Str("x".into())), None);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_monthly(dir.path(), Platform::Ers);
        assert!(result.is_err());
    }
}
