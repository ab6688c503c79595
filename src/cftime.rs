//! # CF Time Decoding
//!
//! Decodes numeric time coordinates written with CF-convention units such as
//! `days since 1970-01-01 00:00:00` into calendar timestamps. Only the
//! standard (proleptic) Gregorian calendar is supported.

use crate::error::{CmgError, CmgResult};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Unit of a CF time offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Milliseconds,
}

impl TimeUnit {
    /// Convert the time unit to a multiplier for seconds
    pub fn to_seconds_multiplier(&self) -> f64 {
        match self {
            TimeUnit::Milliseconds => 1e-3,
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Days => 86400.0,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "milliseconds" | "millisecond" | "ms" => Some(TimeUnit::Milliseconds),
            "seconds" | "second" | "secs" | "sec" | "s" => Some(TimeUnit::Seconds),
            "minutes" | "minute" | "mins" | "min" => Some(TimeUnit::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(TimeUnit::Hours),
            "days" | "day" | "d" => Some(TimeUnit::Days),
            _ => None,
        }
    }
}

/// Parsed `<unit> since <reference>` time encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfTimeUnits {
    pub unit: TimeUnit,
    pub reference: NaiveDateTime,
}

const REFERENCE_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H",
];

impl CfTimeUnits {
    /// Parses a CF `units` attribute, e.g. `hours since 1900-01-01T00:00:00Z`
    pub fn parse(units: &str) -> CmgResult<Self> {
        let lowered = units.trim();
        let (unit_str, reference_str) = lowered
            .split_once(" since ")
            .ok_or_else(|| {
                CmgError::TimeUnits(format!("expected '<unit> since <date>', got '{}'", units))
            })?;

        let unit = TimeUnit::parse(unit_str.trim())
            .ok_or_else(|| CmgError::TimeUnits(format!("unsupported time unit '{}'", unit_str)))?;
        let reference = parse_reference(reference_str).ok_or_else(|| {
            CmgError::TimeUnits(format!("unparseable reference date '{}'", reference_str))
        })?;

        Ok(Self { unit, reference })
    }

    /// Converts one numeric offset into a timestamp
    pub fn decode(&self, value: f64) -> CmgResult<NaiveDateTime> {
        if !value.is_finite() {
            return Err(CmgError::TimeUnits(format!("non-finite time value {}", value)));
        }
        let millis = (value * self.unit.to_seconds_multiplier() * 1000.0).round() as i64;
        let delta = TimeDelta::try_milliseconds(millis)
            .ok_or_else(|| CmgError::TimeUnits(format!("time offset {} out of range", value)))?;
        self.reference
            .checked_add_signed(delta)
            .ok_or_else(|| CmgError::TimeUnits(format!("time offset {} out of range", value)))
    }

    pub fn decode_all(&self, values: &[f64]) -> CmgResult<Vec<NaiveDateTime>> {
        values.iter().map(|&v| self.decode(v)).collect()
    }
}

fn parse_reference(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    let s = s
        .strip_suffix(" UTC")
        .or_else(|| s.strip_suffix('Z'))
        .or_else(|| s.strip_suffix(" +00:00"))
        .unwrap_or(s)
        .trim();

    for fmt in REFERENCE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Rejects calendars other than the Gregorian family
pub fn check_calendar(calendar: Option<&str>) -> CmgResult<()> {
    match calendar.map(|c| c.trim().to_lowercase()) {
        None => Ok(()),
        Some(c) if matches!(c.as_str(), "standard" | "gregorian" | "proleptic_gregorian" | "") => {
            Ok(())
        }
        Some(c) => Err(CmgError::TimeUnits(format!("unsupported calendar '{}'", c))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_days_since() {
        let units = CfTimeUnits::parse("days since 1970-01-01").unwrap();
        assert_eq!(units.unit, TimeUnit::Days);
        assert_eq!(
            units.reference,
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );

        let dt = units.decode(31.0).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (1970, 2, 1));
    }

    #[test]
    fn test_parse_reference_variants() {
        for units in [
            "hours since 1900-01-01T00:00:00Z",
            "hours since 1900-01-01 00:00:00",
            "hours since 1900-01-01 00:00:00.0",
            "hours since 1900-01-01 00:00",
            "Hours since 1900-01-01 UTC",
        ] {
            let parsed = CfTimeUnits::parse(units).unwrap();
            assert_eq!(parsed.unit, TimeUnit::Hours, "{units}");
            assert_eq!(parsed.reference.year(), 1900, "{units}");
        }
    }

    #[test]
    fn test_fractional_offsets() {
        let units = CfTimeUnits::parse("days since 2000-01-01").unwrap();
        let dt = units.decode(0.5).unwrap();
        assert_eq!(dt.hour(), 12);

        let seconds = CfTimeUnits::parse("seconds since 2000-01-01 00:00:00").unwrap();
        assert_eq!(seconds.decode(86400.0).unwrap().day(), 2);
    }

    #[test]
    fn test_invalid_units() {
        assert!(CfTimeUnits::parse("days").is_err());
        assert!(CfTimeUnits::parse("fortnights since 2000-01-01").is_err());
        assert!(CfTimeUnits::parse("days since yesterday").is_err());
        let units = CfTimeUnits::parse("days since 2000-01-01").unwrap();
        assert!(units.decode(f64::NAN).is_err());
    }

    #[test]
    fn test_calendars() {
        assert!(check_calendar(None).is_ok());
        assert!(check_calendar(Some("proleptic_gregorian")).is_ok());
        assert!(check_calendar(Some("Standard")).is_ok());
        assert!(check_calendar(Some("noleap")).is_err());
    }
}
