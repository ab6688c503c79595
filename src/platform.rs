//! # Platforms, Seasons and Products
//!
//! Closed enumerations describing the four scatterometer missions, the four
//! seasonal quarters and the products (monthly or seasonal, land or urban
//! mask) stored in the archive. Parsing from strings is the single place
//! where tags and season codes are validated.

use crate::error::{CmgError, CmgResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Scatterometer missions covered by the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "SASS")]
    Sass,
    #[serde(rename = "ERS")]
    Ers,
    #[serde(rename = "QuikSCAT", alias = "QSCAT")]
    QuikScat,
    #[serde(rename = "ASCAT")]
    Ascat,
}

impl Platform {
    /// All platforms in chronological order
    pub const ALL: [Platform; 4] = [
        Platform::Sass,
        Platform::Ers,
        Platform::QuikScat,
        Platform::Ascat,
    ];

    /// Name used in the archive's file names
    pub fn file_stem(&self) -> &'static str {
        match self {
            Platform::Sass => "SASS",
            Platform::Ers => "ERS",
            Platform::QuikScat => "QuikSCAT",
            Platform::Ascat => "ASCAT",
        }
    }

    /// Prefix of the data columns in the wide table.
    ///
    /// Seasonal tables use the short `QSCAT` form for QuikSCAT, matching the
    /// Earth Engine exports they are compared against.
    pub fn column_tag(&self, granularity: Granularity) -> &'static str {
        match (self, granularity) {
            (Platform::QuikScat, Granularity::Seasonal(_)) => "QSCAT",
            _ => self.file_stem(),
        }
    }

    /// Parses a platform tag, accepting both QuikSCAT spellings
    pub fn from_tag(tag: &str) -> CmgResult<Self> {
        match tag {
            "SASS" => Ok(Platform::Sass),
            "ERS" => Ok(Platform::Ers),
            "QuikSCAT" | "QSCAT" => Ok(Platform::QuikScat),
            "ASCAT" => Ok(Platform::Ascat),
            other => Err(CmgError::invalid_argument(format!(
                "instrument should be one of 'SASS', 'ERS', 'QuikSCAT' (or 'QSCAT') or 'ASCAT', got '{}'",
                other
            ))),
        }
    }

    /// Historical period used when extracting monthly data
    pub fn default_monthly_window(&self) -> DateWindow {
        let (start, end) = match self {
            Platform::Sass => ((1978, 7, 1), (1978, 10, 1)),
            Platform::Ers => ((1993, 1, 1), (2001, 1, 1)),
            Platform::QuikScat => ((1999, 7, 1), (2009, 12, 1)),
            Platform::Ascat => ((2007, 1, 1), (2020, 12, 31)),
        };
        DateWindow::from_ymd(start, end)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

impl FromStr for Platform {
    type Err = CmgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::from_tag(s)
    }
}

/// Three-month seasons, each represented by its middle month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Season {
    #[serde(rename = "JFM")]
    Jfm,
    #[serde(rename = "AMJ")]
    Amj,
    #[default]
    #[serde(rename = "JAS")]
    Jas,
    #[serde(rename = "OND")]
    Ond,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Jfm, Season::Amj, Season::Jas, Season::Ond];

    pub fn code(&self) -> &'static str {
        match self {
            Season::Jfm => "JFM",
            Season::Amj => "AMJ",
            Season::Jas => "JAS",
            Season::Ond => "OND",
        }
    }

    /// Month whose time step carries the season's value in seasonal files
    pub fn representative_month(&self) -> u32 {
        match self {
            Season::Jfm => 2,
            Season::Amj => 5,
            Season::Jas => 8,
            Season::Ond => 11,
        }
    }

    pub fn from_code(code: &str) -> CmgResult<Self> {
        match code {
            "JFM" => Ok(Season::Jfm),
            "AMJ" => Ok(Season::Amj),
            "JAS" => Ok(Season::Jas),
            "OND" => Ok(Season::Ond),
            other => Err(CmgError::invalid_argument(format!(
                "season should be one of 'JFM', 'AMJ', 'JAS' or 'OND', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Season {
    type Err = CmgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Season::from_code(s)
    }
}

/// Time resolution of a product and of the columns derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Monthly,
    Seasonal(Season),
}

impl Granularity {
    /// Validates a season code into a seasonal granularity
    pub fn seasonal_from_code(code: &str) -> CmgResult<Self> {
        Ok(Granularity::Seasonal(Season::from_code(code)?))
    }

    /// Period part of a column name: two-digit month or season code
    pub fn period_label(&self, month: u32) -> String {
        match self {
            Granularity::Monthly => format!("{:02}", month),
            Granularity::Seasonal(season) => season.code().to_string(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Granularity::Monthly => "monthly".to_string(),
            Granularity::Seasonal(season) => season.code().to_string(),
        }
    }
}

/// Spatial mask applied when the seasonal archives were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskKind {
    #[default]
    Land,
    Urban,
}

impl MaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            MaskKind::Land => "land",
            MaskKind::Urban => "urban",
        }
    }
}

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> CmgResult<Self> {
        if start > end {
            return Err(CmgError::invalid_argument(format!(
                "date window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    fn from_ymd(start: (i32, u32, u32), end: (i32, u32, u32)) -> Self {
        // Built-in windows are valid calendar dates
        let date =
            |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        Self {
            start: date(start),
            end: date(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// The pair of files (mean and standard deviation) making up one product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFiles {
    pub mean: PathBuf,
    pub stddev: PathBuf,
}

impl ProductFiles {
    /// `<PLATFORM>_monthly_land_sig0_{mean,StdDev}.nc`
    pub fn monthly(datadir: &Path, platform: Platform) -> Self {
        Self::with_product(datadir, platform, "monthly", MaskKind::Land)
    }

    /// `<PLATFORM>_seasonal_<mask>_sig0_{mean,StdDev}.nc`
    pub fn seasonal(datadir: &Path, platform: Platform, mask: MaskKind) -> Self {
        Self::with_product(datadir, platform, "seasonal", mask)
    }

    fn with_product(datadir: &Path, platform: Platform, product: &str, mask: MaskKind) -> Self {
        let stem = format!("{}_{}_{}_sig0", platform.file_stem(), product, mask.name());
        Self {
            mean: datadir.join(format!("{}_mean.nc", stem)),
            stddev: datadir.join(format!("{}_StdDev.nc", stem)),
        }
    }

    pub fn exist(&self) -> bool {
        self.mean.is_file() && self.stddev.is_file()
    }
}
