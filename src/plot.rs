//! # Time-Series Chart
//!
//! Renders regional power-ratio time series as an SVG line chart: one line
//! with markers per platform and a semi-transparent band between the
//! `pr_low` and `pr_high` edges. Paths ending in `.png` are rasterized with
//! `resvg`.

use crate::error::{CmgError, CmgResult};
use crate::platform::Season;
use crate::timeseries::{PlatformTimeSeries, TimeSeriesPoint};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use log::{debug, warn};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const PALETTE: [&str; 4] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728"];

const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;

/// `<locname> (lat:<lat> lon:<lon>)` with four decimals
pub fn chart_title(locname: &str, lat: f64, lon: f64) -> String {
    format!("{} (lat:{:.4} lon:{:.4})", locname, lat, lon)
}

pub fn power_ratio_label(season: Season) -> String {
    format!("Mean {} Backscatter Power Ratio (PR)", season)
}

/// Default chart file name for a location and season
pub fn default_plot_name(locname: &str, season: Season) -> String {
    format!("{}_{}_timeseries_plot.svg", locname, season)
}

/// Decimal year of a timestamp, e.g. 2000-07-02 is about 2000.5
pub fn decimal_year(time: &NaiveDateTime) -> f64 {
    let year = time.year();
    let days_in_year = NaiveDate::from_ymd_opt(year, 12, 31)
        .map(|d| d.ordinal() as f64)
        .unwrap_or(365.0);
    let seconds = time.num_seconds_from_midnight() as f64 / 86400.0;
    year as f64 + (time.ordinal0() as f64 + seconds) / days_in_year
}

/// Evenly spaced tick values on a 1-2-5 step covering [min, max]
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite()) || max <= min || target == 0 {
        return vec![min];
    }
    let raw = (max - min) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn tick_step(ticks: &[f64]) -> f64 {
    ticks
        .get(1)
        .zip(ticks.first())
        .map(|(b, a)| b - a)
        .unwrap_or(1.0)
}

fn coord(x: f64, y: f64) -> String {
    format!("{:.2},{:.2}", x, y)
}

fn format_tick(value: f64, step: f64) -> String {
    let decimals = if step >= 1.0 { 0 } else { (-step.log10().floor()) as usize };
    format!("{:.*}", decimals, value)
}

/// Linear map from data space to pixel space
#[derive(Debug, Clone, Copy)]
struct Scale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl Scale {
    fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        let domain = if domain.1 > domain.0 {
            domain
        } else {
            (domain.0 - 0.5, domain.0 + 0.5)
        };
        Self { domain, range }
    }

    fn map(&self, value: f64) -> f64 {
        let t = (value - self.domain.0) / (self.domain.1 - self.domain.0);
        self.range.0 + t * (self.range.1 - self.range.0)
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeriesChart {
    pub title: String,
    pub y_label: String,
    pub x_label: String,
    pub width: u32,
    pub height: u32,
    series: Vec<PlatformTimeSeries>,
}

impl TimeSeriesChart {
    pub fn new(title: String, y_label: String) -> Self {
        Self {
            title,
            y_label,
            x_label: "Year".to_string(),
            width: 1000,
            height: 600,
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: PlatformTimeSeries) {
        self.series.push(series);
    }

    pub fn series(&self) -> &[PlatformTimeSeries] {
        &self.series
    }

    fn points(&self) -> impl Iterator<Item = &TimeSeriesPoint> {
        self.series.iter().flat_map(|s| s.plottable())
    }

    fn x_domain(&self) -> (f64, f64) {
        let years: Vec<f64> = self.points().map(|p| decimal_year(&p.time)).collect();
        let min = years.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = years.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if years.is_empty() {
            (0.0, 1.0)
        } else {
            (min.floor(), max.floor() + 1.0)
        }
    }

    fn y_domain(&self) -> (f64, f64) {
        let values: Vec<f64> = self
            .points()
            .flat_map(|p| [p.pr, p.pr_low, p.pr_high])
            .flatten()
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            return (0.0, 1.0);
        }
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let pad = ((max - min) * 0.05).max(1e-6);
        (min - pad, max + pad)
    }

    /// Renders the chart as a standalone SVG document
    pub fn to_svg(&self) -> String {
        let (w, h) = (self.width as f64, self.height as f64);
        let plot_left = MARGIN_LEFT;
        let plot_right = w - MARGIN_RIGHT;
        let plot_top = MARGIN_TOP;
        let plot_bottom = h - MARGIN_BOTTOM;

        let x_domain = self.x_domain();
        let y_domain = self.y_domain();
        let xs = Scale::new(x_domain, (plot_left, plot_right));
        let ys = Scale::new(y_domain, (plot_bottom, plot_top));

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" "#,
                r#"viewBox="0 0 {w} {h}" font-family="sans-serif">"#
            ),
            w = w,
            h = h
        );
        let _ = writeln!(svg, r#"<rect width="{w}" height="{h}" fill="white"/>"#);

        // axes and ticks
        let _ = writeln!(
            svg,
            concat!(
                r#"<rect x="{plot_left}" y="{plot_top}" width="{}" height="{}" "#,
                r#"fill="none" stroke="black"/>"#
            ),
            plot_right - plot_left,
            plot_bottom - plot_top,
            plot_left = plot_left,
            plot_top = plot_top
        );
        let x_ticks = nice_ticks(x_domain.0, x_domain.1, 10);
        let x_step = tick_step(&x_ticks).max(1.0);
        for tick in x_ticks.iter().filter(|t| (t.fract()).abs() < 1e-9) {
            let x = xs.map(*tick);
            let _ = writeln!(
                svg,
                r#"<line x1="{x:.2}" y1="{plot_bottom}" x2="{x:.2}" y2="{}" stroke="black"/>"#,
                plot_bottom + 5.0
            );
            let _ = writeln!(
                svg,
                r#"<text x="{x:.2}" y="{}" font-size="12" text-anchor="middle">{}</text>"#,
                plot_bottom + 20.0,
                format_tick(*tick, x_step)
            );
        }
        let y_ticks = nice_ticks(y_domain.0, y_domain.1, 6);
        let y_step = tick_step(&y_ticks);
        for tick in &y_ticks {
            let y = ys.map(*tick);
            let _ = writeln!(
                svg,
                r#"<line x1="{}" y1="{y:.2}" x2="{plot_left}" y2="{y:.2}" stroke="black"/>"#,
                plot_left - 5.0
            );
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{:.2}" font-size="12" text-anchor="end">{}</text>"#,
                plot_left - 8.0,
                y + 4.0,
                format_tick(*tick, y_step)
            );
        }

        for (idx, ts) in self.series.iter().enumerate() {
            let color = PALETTE[idx % PALETTE.len()];
            let mut points: Vec<&TimeSeriesPoint> = ts.plottable().collect();
            points.sort_by_key(|p| p.time);

            let band: Vec<(f64, f64, f64)> = points
                .iter()
                .filter_map(|p| Some((decimal_year(&p.time), p.pr_low?, p.pr_high?)))
                .collect();
            if !band.is_empty() {
                let upper = band.iter().map(|(x, _, hi)| coord(xs.map(*x), ys.map(*hi)));
                let lower = band.iter().rev().map(|(x, lo, _)| coord(xs.map(*x), ys.map(*lo)));
                let outline: Vec<String> = upper.chain(lower).collect();
                let _ = writeln!(
                    svg,
                    r#"<polygon points="{}" fill="{color}" fill-opacity="0.5" stroke="none"/>"#,
                    outline.join(" ")
                );
            }

            let line: Vec<(f64, f64)> = points
                .iter()
                .filter_map(|p| Some((xs.map(decimal_year(&p.time)), ys.map(p.pr?))))
                .collect();
            let coords: Vec<String> = line.iter().map(|(x, y)| coord(*x, *y)).collect();
            let _ = writeln!(
                svg,
                r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="1.5"/>"#,
                coords.join(" ")
            );
            for (x, y) in &line {
                let _ = writeln!(svg, r#"<circle cx="{x:.2}" cy="{y:.2}" r="4" fill="{color}"/>"#);
            }

            // legend entry
            let ly = plot_top + 20.0 + idx as f64 * 20.0;
            let lx = plot_right - 130.0;
            let _ = writeln!(
                svg,
                concat!(
                    r#"<line x1="{lx}" y1="{ly}" x2="{}" y2="{ly}" "#,
                    r#"stroke="{color}" stroke-width="2"/>"#
                ),
                lx + 30.0,
                lx = lx,
                ly = ly,
                color = color
            );
            let _ = writeln!(
                svg,
                r#"<circle cx="{}" cy="{ly}" r="4" fill="{color}"/>"#,
                lx + 15.0
            );
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{}" font-size="12">{}</text>"#,
                lx + 38.0,
                ly + 4.0,
                escape_xml(ts.platform.file_stem())
            );
        }

        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="16" text-anchor="middle">{}</text>"#,
            w / 2.0,
            MARGIN_TOP / 2.0 + 6.0,
            escape_xml(&self.title)
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="14" text-anchor="middle">{}</text>"#,
            (plot_left + plot_right) / 2.0,
            h - 15.0,
            escape_xml(&self.x_label)
        );
        let cy = (plot_top + plot_bottom) / 2.0;
        let _ = writeln!(
            svg,
            concat!(
                r#"<text x="20" y="{cy}" font-size="14" text-anchor="middle" "#,
                r#"transform="rotate(-90 20 {cy})">{}</text>"#
            ),
            escape_xml(&self.y_label),
            cy = cy
        );
        svg.push_str("</svg>\n");
        svg
    }

    /// Writes the chart, rasterizing to PNG when the path ends in `.png`
    pub fn write(&self, path: &Path) -> CmgResult<()> {
        if self.points().next().is_none() {
            warn!("No data points to plot; writing an empty chart");
        }
        let svg = self.to_svg();
        let is_png = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("png"))
            .unwrap_or(false);

        if is_png {
            render_png(&svg, path)?;
        } else {
            fs::write(path, svg)?;
        }
        debug!("Wrote chart to {}", path.display());
        Ok(())
    }
}

fn render_png(svg: &str, path: &Path) -> CmgResult<()> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| CmgError::invalid_argument(format!("cannot parse chart SVG: {}", e)))?;

    let size = tree.size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width().ceil() as u32, size.height().ceil() as u32)
        .ok_or_else(|| CmgError::invalid_argument("chart has zero size"))?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
    pixmap
        .save_png(path)
        .map_err(|e| std::io::Error::other(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use chrono::NaiveDate;

    fn point(year: i32, pr: f64) -> TimeSeriesPoint {
        TimeSeriesPoint {
            time: NaiveDate::from_ymd_opt(year, 8, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            sig0: None,
            sig0std: None,
            pr: Some(pr),
            pr_low: Some(pr * 0.8),
            pr_high: Some(pr * 1.2),
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(chart_title("Denver", 39.7392, -104.99), "Denver (lat:39.7392 lon:-104.9900)");
        assert_eq!(power_ratio_label(Season::Jas), "Mean JAS Backscatter Power Ratio (PR)");
        assert_eq!(default_plot_name("Denver", Season::Jfm), "Denver_JFM_timeseries_plot.svg");
    }

    #[test]
    fn test_decimal_year() {
        let t = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(decimal_year(&t), 2001.0);
        let mid = NaiveDate::from_ymd_opt(2001, 7, 2).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert!((decimal_year(&mid) - 2001.5).abs() < 1e-9);
    }

    #[test]
    fn test_nice_ticks() {
        assert_eq!(
            nice_ticks(1992.0, 2021.0, 10),
            vec![1995.0, 2000.0, 2005.0, 2010.0, 2015.0, 2020.0]
        );
        let ticks = nice_ticks(0.0, 1.0, 5);
        assert_eq!(ticks.len(), 6);
        assert_eq!(nice_ticks(3.0, 3.0, 5), vec![3.0]);
    }

    #[test]
    fn test_svg_contains_series_and_labels() {
        let mut chart =
            TimeSeriesChart::new(chart_title("A&B", 1.0, 2.0), power_ratio_label(Season::Jas));
        chart.add_series(PlatformTimeSeries {
            platform: Platform::Ers,
            points: vec![point(1993, 0.1), point(1994, 0.12)],
        });
        chart.add_series(PlatformTimeSeries {
            platform: Platform::Ascat,
            points: vec![point(2008, 0.2)],
        });
        let svg = chart.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("A&amp;B (lat:1.0000 lon:2.0000)"));
        assert!(svg.contains(">ERS<"));
        assert!(svg.contains(">ASCAT<"));
        assert_eq!(svg.matches("<polygon").count(), 2);
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains(">Year<"));
    }

    #[test]
    fn test_write_svg_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        let chart = TimeSeriesChart::new("empty".into(), "PR".into());
        chart.write(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(">empty<"));
    }
}
