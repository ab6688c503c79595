//! # Grid Locator
//!
//! Maps a geographic point onto the Climate Modelling Grid (CMG) used by the
//! backscatter archives and derives the 11x11-cell bounding box around it.
//!
//! The grid is anchored at ([`LONMIN`], [`LATMIN`]) with square cells of
//! [`GRDSIZE`] degrees. The box is centered on the midpoint of the cell that
//! contains the query point, not on the point itself.
//!
//! ```rust
//! use cmg_backscatter::grid::box11;
//!
//! let bbox = box11(-99.99, 40.01);
//! assert!((bbox.width() - 0.55).abs() < 1e-9);
//! assert!((bbox.center().0 - (-99.975)).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

/// Western edge of the grid (degrees east)
pub const LONMIN: f64 = -180.0;
/// Southern edge of the grid (degrees north)
pub const LATMIN: f64 = -60.0;
/// Cell size in degrees, both axes
pub const GRDSIZE: f64 = 0.05;
/// Number of cells along each side of the extraction box
pub const BOX_CELLS: u32 = 11;

/// Geographic extent of an extraction window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lonmin: f64,
    pub latmin: f64,
    pub lonmax: f64,
    pub latmax: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.lonmax - self.lonmin
    }

    pub fn height(&self) -> f64 {
        self.latmax - self.latmin
    }

    /// Center as (longitude, latitude)
    pub fn center(&self) -> (f64, f64) {
        (
            (self.lonmin + self.lonmax) / 2.0,
            (self.latmin + self.latmax) / 2.0,
        )
    }

    /// Inclusive containment test, matching label-based slicing of the raster
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.lonmin && lon <= self.lonmax && lat >= self.latmin && lat <= self.latmax
    }
}

/// A regular lat/lon grid defined by its origin and cell size.
///
/// The default value is the CMG grid. Cell indices are computed with an
/// integer cast, which truncates toward zero; points west of the origin or
/// south of it therefore land in cell 0 instead of a negative cell. Callers
/// are expected to stay inside the grid's domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLocator {
    pub lon_min: f64,
    pub lat_min: f64,
    pub cell_size: f64,
}

impl Default for GridLocator {
    fn default() -> Self {
        Self::cmg()
    }
}

impl GridLocator {
    pub fn new(lon_min: f64, lat_min: f64, cell_size: f64) -> Self {
        Self {
            lon_min,
            lat_min,
            cell_size,
        }
    }

    /// The 0.05 degree Climate Modelling Grid
    pub fn cmg() -> Self {
        Self::new(LONMIN, LATMIN, GRDSIZE)
    }

    /// Column/row index of the cell containing the point
    pub fn cell_index(&self, lon: f64, lat: f64) -> (i64, i64) {
        let x = ((lon - self.lon_min) / self.cell_size) as i64;
        let y = ((lat - self.lat_min) / self.cell_size) as i64;
        (x, y)
    }

    /// Midpoint of a cell as (longitude, latitude)
    pub fn cell_center(&self, x: i64, y: i64) -> (f64, f64) {
        let lon = (x as f64 * self.cell_size + self.cell_size / 2.0) + self.lon_min;
        let lat = (y as f64 * self.cell_size + self.cell_size / 2.0) + self.lat_min;
        (lon, lat)
    }

    /// Square box of `cells` x `cells` grid cells centered on the cell
    /// containing the point
    pub fn bounding_box(&self, lon: f64, lat: f64, cells: u32) -> BoundingBox {
        let (x0, y0) = self.cell_index(lon, lat);
        let (lon0, lat0) = self.cell_center(x0, y0);
        let half = cells as f64 * self.cell_size / 2.0;
        BoundingBox {
            lonmin: lon0 - half,
            latmin: lat0 - half,
            lonmax: lon0 + half,
            latmax: lat0 + half,
        }
    }

    pub fn box11(&self, lon: f64, lat: f64) -> BoundingBox {
        self.bounding_box(lon, lat, BOX_CELLS)
    }
}

/// 11x11-cell box on the CMG grid around the cell containing (lon, lat)
pub fn box11(lon: f64, lat: f64) -> BoundingBox {
    GridLocator::cmg().box11(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_box11_is_055_degrees_square() {
        for &(lon, lat) in &[(-99.99, 40.01), (2.35, 48.85), (151.2, -33.87), (-179.9, -59.9)] {
            let bbox = box11(lon, lat);
            assert!((bbox.width() - 0.55).abs() < EPS, "width at {lon},{lat}");
            assert!((bbox.height() - 0.55).abs() < EPS, "height at {lon},{lat}");
        }
    }

    #[test]
    fn test_box11_snaps_to_cell_center() {
        let bbox = box11(-99.99, 40.01);
        let (clon, clat) = bbox.center();
        assert!((clon - (-99.975)).abs() < EPS);
        assert!((clat - 40.025).abs() < EPS);
        assert!((bbox.lonmin - (-100.25)).abs() < EPS);
        assert!((bbox.latmax - 40.3).abs() < EPS);
    }

    #[test]
    fn test_points_in_same_cell_share_a_box() {
        let a = box11(-99.999, 40.001);
        let b = box11(-99.951, 40.049);
        assert_eq!(a, b);
        assert_eq!(box11(-99.99, 40.01), box11(-99.99, 40.01));
    }

    #[test]
    fn test_neighbouring_cells_shift_by_one_cell() {
        let a = box11(-99.99, 40.01);
        let b = box11(-99.94, 40.01);
        assert!((b.lonmin - a.lonmin - GRDSIZE).abs() < EPS);
        assert_eq!(a.latmin, b.latmin);
    }

    #[test]
    fn test_cell_index_truncates_toward_zero() {
        let grid = GridLocator::cmg();
        assert_eq!(grid.cell_index(-180.0 + 0.051, -60.0 + 0.101), (1, 2));
        // West of the origin: -0.2 cells truncates to 0 rather than flooring to -1
        assert_eq!(grid.cell_index(-180.01, -59.99).0, 0);
    }

    #[test]
    fn test_custom_grid() {
        let grid = GridLocator::new(0.0, 0.0, 1.0);
        let bbox = grid.bounding_box(2.5, 3.5, 3);
        assert_eq!(bbox.center(), (2.5, 3.5));
        assert!((bbox.width() - 3.0).abs() < EPS);
        assert!(bbox.contains(1.0, 2.0));
        assert!(!bbox.contains(0.9, 2.0));
    }
}
