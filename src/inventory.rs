//! # Data Directory Inventory
//!
//! Reports which platform products are present in a data directory and, for
//! complete products, the extent of their time axis and grid.

use crate::ncfile::read_variable_axes;
use crate::platform::{MaskKind, Platform, ProductFiles};
use crate::series::Quantity;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    MonthlyLand,
    SeasonalLand,
    SeasonalUrban,
}

impl ProductKind {
    pub const ALL: [ProductKind; 3] = [
        ProductKind::MonthlyLand,
        ProductKind::SeasonalLand,
        ProductKind::SeasonalUrban,
    ];

    pub fn files(&self, datadir: &Path, platform: Platform) -> ProductFiles {
        match self {
            ProductKind::MonthlyLand => ProductFiles::monthly(datadir, platform),
            ProductKind::SeasonalLand => ProductFiles::seasonal(datadir, platform, MaskKind::Land),
            ProductKind::SeasonalUrban => {
                ProductFiles::seasonal(datadir, platform, MaskKind::Urban)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProductKind::MonthlyLand => "monthly_land",
            ProductKind::SeasonalLand => "seasonal_land",
            ProductKind::SeasonalUrban => "seasonal_urban",
        }
    }
}

/// State of one (platform, product) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductEntry {
    pub platform: Platform,
    pub product: ProductKind,
    pub mean_file: String,
    pub stddev_file: String,
    pub present: bool,
    pub time_steps: Option<usize>,
    pub first_time: Option<String>,
    pub last_time: Option<String>,
    pub latitudes: Option<usize>,
    pub longitudes: Option<usize>,
    /// Set when the files exist but could not be read
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub datadir: String,
    pub entries: Vec<ProductEntry>,
}

impl Inventory {
    pub fn present(&self) -> impl Iterator<Item = &ProductEntry> {
        self.entries.iter().filter(|e| e.present)
    }
}

fn describe(datadir: &Path, platform: Platform, product: ProductKind) -> ProductEntry {
    let files = product.files(datadir, platform);
    let mut entry = ProductEntry {
        platform,
        product,
        mean_file: files.mean.display().to_string(),
        stddev_file: files.stddev.display().to_string(),
        present: files.exist(),
        time_steps: None,
        first_time: None,
        last_time: None,
        latitudes: None,
        longitudes: None,
        error: None,
    };
    if !entry.present {
        return entry;
    }

    match read_variable_axes(&files.mean, Quantity::Mean.variable_name()) {
        Ok(axes) => {
            entry.time_steps = Some(axes.times.len());
            entry.first_time = axes.times.first().map(|t| t.date().to_string());
            entry.last_time = axes.times.last().map(|t| t.date().to_string());
            entry.latitudes = Some(axes.latitudes.len());
            entry.longitudes = Some(axes.longitudes.len());
        }
        Err(e) => {
            warn!("Cannot read {}: {}", files.mean.display(), e);
            entry.error = Some(e.to_string());
        }
    }
    entry
}

/// Scans a data directory for every platform and product
pub fn scan_datadir(datadir: &Path) -> Result<Inventory> {
    if !datadir.is_dir() {
        anyhow::bail!("Data directory does not exist: {}", datadir.display());
    }
    debug!("Scanning {}", datadir.display());

    let mut entries = Vec::new();
    for platform in Platform::ALL {
        for product in ProductKind::ALL {
            entries.push(describe(datadir, platform, product));
        }
    }
    Ok(Inventory {
        datadir: datadir.display().to_string(),
        entries,
    })
}

fn or_dash<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Print the inventory in human-readable format
pub fn print_inventory_human(inventory: &Inventory) {
    println!("Backscatter archive inventory:");
    println!("  Data directory: {}", inventory.datadir);
    println!(
        "  Products: {} of {} present",
        inventory.present().count(),
        inventory.entries.len()
    );
    for entry in &inventory.entries {
        if !entry.present {
            println!("    {:<9} {:<15} missing", entry.platform, entry.product.name());
            continue;
        }
        match &entry.error {
            Some(err) => println!(
                "    {:<9} {:<15} unreadable: {}",
                entry.platform,
                entry.product.name(),
                err
            ),
            None => println!(
                "    {:<9} {:<15} {} steps ({} .. {}), grid {} x {}",
                entry.platform,
                entry.product.name(),
                or_dash(&entry.time_steps),
                or_dash(&entry.first_time),
                or_dash(&entry.last_time),
                or_dash(&entry.latitudes),
                or_dash(&entry.longitudes)
            ),
        }
    }
}

/// Print the inventory in JSON format
pub fn print_inventory_json(inventory: &Inventory) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(inventory)?);
    Ok(())
}

/// Print the inventory in YAML format
pub fn print_inventory_yaml(inventory: &Inventory) -> Result<()> {
    let yaml = serde_yaml::to_string(inventory).context("Failed to serialize inventory to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Print the inventory in CSV format
pub fn print_inventory_csv(inventory: &Inventory) -> Result<()> {
    println!("platform,product,present,time_steps,first_time,last_time,latitudes,longitudes");
    for entry in &inventory.entries {
        println!(
            "{},{},{},{},{},{},{},{}",
            entry.platform,
            entry.product.name(),
            entry.present,
            entry.time_steps.map(|v| v.to_string()).unwrap_or_default(),
            entry.first_time.clone().unwrap_or_default(),
            entry.last_time.clone().unwrap_or_default(),
            entry.latitudes.map(|v| v.to_string()).unwrap_or_default(),
            entry.longitudes.map(|v| v.to_string()).unwrap_or_default()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = scan_datadir(dir.path()).unwrap();
        assert_eq!(inventory.entries.len(), 12);
        assert_eq!(inventory.present().count(), 0);
    }

    #[test]
    fn test_unreadable_product_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let files = ProductKind::SeasonalUrban.files(dir.path(), Platform::Sass);
        fs::write(&files.mean, b"not netcdf").unwrap();
        fs::write(&files.stddev, b"not netcdf").unwrap();

        let inventory = scan_datadir(dir.path()).unwrap();
        let entry = inventory.present().next().unwrap();
        assert_eq!(entry.platform, Platform::Sass);
        assert_eq!(entry.product, ProductKind::SeasonalUrban);
        assert!(entry.error.is_some());
        assert_eq!(entry.time_steps, None);
    }

    #[test]
    fn test_missing_directory_fails() {
        assert!(scan_datadir(Path::new("/nonexistent/cmg/data")).is_err());
    }
}
