//! Date range and mosaic window handling.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ImageryError, ImageryResult};

/// Format used for season dates in configuration files.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a date or datetime string with a strftime-style format.
///
/// Date-only formats resolve to midnight UTC.
pub fn parse_date(s: &str, format: &str) -> ImageryResult<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    NaiveDate::parse_from_str(s, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .ok_or_else(|| ImageryError::InvalidDate {
            value: s.to_string(),
            format: format.to_string(),
        })
}

/// Compact timestamp used in exported file names, e.g. `20220115T1342`.
pub fn format_compact(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M").to_string()
}

/// A closed time range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> ImageryResult<Self> {
        if start > end {
            return Err(ImageryError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Range between two calendar days (midnight UTC at both ends).
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> ImageryResult<Self> {
        let midnight = |d: NaiveDate| {
            d.and_hms_opt(0, 0, 0)
                .map(|ndt| Utc.from_utc_datetime(&ndt))
                .ok_or_else(|| ImageryError::InvalidDate {
                    value: d.to_string(),
                    format: DEFAULT_DATE_FORMAT.to_string(),
                })
        };
        Self::new(midnight(start)?, midnight(end)?)
    }

    /// Parse both ends with the same format.
    pub fn parse(start: &str, end: &str, format: &str) -> ImageryResult<Self> {
        Self::new(parse_date(start, format)?, parse_date(end, format)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Intersection of two ranges, `None` when `max(starts) > min(ends)`.
    ///
    /// Ranges that only touch at one instant overlap on that instant.
    pub fn overlap(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start > end {
            return None;
        }
        Some(DateRange { start, end })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Temporal window used to composite images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MosaicWindow {
    Hour,
    Day,
    Week,
    Month,
}

impl MosaicWindow {
    /// Advance `dt` by one window. `None` only on calendar overflow.
    pub fn advance(&self, dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.nth_start(dt, 1)
    }

    /// Start of the `k`-th window laid out from `origin`. Month windows are
    /// counted in calendar months from `origin`, so they do not drift at
    /// month ends. `None` only on calendar overflow.
    pub fn nth_start(&self, origin: DateTime<Utc>, k: u32) -> Option<DateTime<Utc>> {
        match self {
            MosaicWindow::Hour => origin.checked_add_signed(Duration::hours(i64::from(k))),
            MosaicWindow::Day => origin.checked_add_signed(Duration::days(i64::from(k))),
            MosaicWindow::Week => origin.checked_add_signed(Duration::weeks(i64::from(k))),
            MosaicWindow::Month => origin.checked_add_months(Months::new(k)),
        }
    }

    /// Start instants of every window covering `range`.
    ///
    /// Windows are anchored at `range.start()` and continue while the window
    /// start is not after `range.end()`, so a partial trailing window is
    /// included.
    pub fn window_starts(&self, range: &DateRange) -> Vec<DateTime<Utc>> {
        (0..)
            .map_while(|k| self.nth_start(range.start(), k))
            .take_while(|t| *t <= range.end())
            .collect()
    }
}

impl FromStr for MosaicWindow {
    type Err = ImageryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hour" => Ok(MosaicWindow::Hour),
            "day" => Ok(MosaicWindow::Day),
            "week" => Ok(MosaicWindow::Week),
            "month" => Ok(MosaicWindow::Month),
            _ => Err(ImageryError::InvalidMosaicWindow(s.to_string())),
        }
    }
}

impl fmt::Display for MosaicWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MosaicWindow::Hour => "hour",
            MosaicWindow::Day => "day",
            MosaicWindow::Week => "week",
            MosaicWindow::Month => "month",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn ymd(s: &str) -> DateTime<Utc> {
        parse_date(s, DEFAULT_DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_parse_date_only_is_midnight() {
        let dt = parse_date("2022-03-15", DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2022, 3, 15));
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_parse_date_compact_format() {
        let dt = parse_date("20211201", "%Y%m%d").unwrap();
        assert_eq!(dt, ymd("2021-12-01"));
    }

    #[test]
    fn test_parse_datetime_format() {
        let dt = parse_date("2022-03-15 06:30", "%Y-%m-%d %H:%M").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (6, 30));
    }

    #[test]
    fn test_parse_date_rejects_mismatched_format() {
        let err = parse_date("2022/03/15", DEFAULT_DATE_FORMAT).unwrap_err();
        assert!(matches!(err, ImageryError::InvalidDate { .. }));
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        assert!(DateRange::new(ymd("2022-02-01"), ymd("2022-01-01")).is_err());
        assert!(DateRange::new(ymd("2022-01-01"), ymd("2022-01-01")).is_ok());
    }

    #[test]
    fn test_overlap_clips_to_intersection() {
        let season = DateRange::new(ymd("2022-01-01"), ymd("2022-02-28")).unwrap();
        let query = DateRange::new(ymd("2021-12-01"), ymd("2022-02-15")).unwrap();
        let overlap = query.overlap(&season).unwrap();
        assert_eq!(overlap.start(), ymd("2022-01-01"));
        assert_eq!(overlap.end(), ymd("2022-02-15"));
    }

    #[test]
    fn test_overlap_disjoint() {
        let a = DateRange::new(ymd("2022-01-01"), ymd("2022-01-31")).unwrap();
        let b = DateRange::new(ymd("2022-02-01"), ymd("2022-02-28")).unwrap();
        assert!(a.overlap(&b).is_none());
    }

    #[test]
    fn test_overlap_touching_ranges_share_one_instant() {
        let a = DateRange::new(ymd("2022-01-01"), ymd("2022-02-01")).unwrap();
        let b = DateRange::new(ymd("2022-02-01"), ymd("2022-02-28")).unwrap();
        let overlap = a.overlap(&b).unwrap();
        assert_eq!(overlap.start(), overlap.end());
    }

    #[test]
    fn test_mosaic_window_parse() {
        assert_eq!("Day".parse::<MosaicWindow>().unwrap(), MosaicWindow::Day);
        assert_eq!("month".parse::<MosaicWindow>().unwrap(), MosaicWindow::Month);
        assert!("fortnight".parse::<MosaicWindow>().is_err());
    }

    #[test]
    fn test_window_starts_include_partial_trailing_window() {
        let start = ymd("2022-01-01");
        let range = DateRange::new(start, start + Duration::minutes(150)).unwrap();
        let starts = MosaicWindow::Hour.window_starts(&range);
        assert_eq!(
            starts,
            vec![start, start + Duration::hours(1), start + Duration::hours(2)]
        );
    }

    #[test]
    fn test_window_starts_month_steps_by_calendar() {
        let range = DateRange::new(ymd("2022-01-31"), ymd("2022-03-31")).unwrap();
        let starts = MosaicWindow::Month.window_starts(&range);
        assert_eq!(starts.len(), 3);
        assert_eq!(starts[1], ymd("2022-02-28"));
    }

    #[test]
    fn test_month_windows_stay_anchored_to_range_start() {
        let range = DateRange::new(ymd("2022-01-31"), ymd("2022-05-31")).unwrap();
        let starts = MosaicWindow::Month.window_starts(&range);
        assert_eq!(
            starts,
            vec![
                ymd("2022-01-31"),
                ymd("2022-02-28"),
                ymd("2022-03-31"),
                ymd("2022-04-30"),
                ymd("2022-05-31"),
            ]
        );
        assert_eq!(
            MosaicWindow::Month.nth_start(range.start(), 2),
            Some(ymd("2022-03-31"))
        );
    }
}
