//! Shared calendar utilities.
//!
//! All planning happens on ISO weeks within a single calendar year; the
//! helpers here keep the week arithmetic in one place.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// ISO 8601 calendar coordinates of a date.
///
/// `weekday` is 1-based with Monday = 1.
pub fn iso_week(d: NaiveDate) -> (i32, u32, u32) {
    let iso = d.iso_week();
    (iso.year(), iso.week(), d.weekday().number_from_monday())
}

/// Monday of the given ISO week, or `None` when the year has no such week.
pub fn week_monday(year: i32, week: u32) -> Option<NaiveDate> {
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
}

/// Monday..Friday bounds of the given ISO work week.
pub fn work_week_bounds(year: i32, week: u32) -> Option<(NaiveDate, NaiveDate)> {
    let monday = week_monday(year, week)?;
    Some((monday, monday + Duration::days(4)))
}

/// Exclusive overlap between two date ranges, in days.
///
/// This is the measure used by the composition solver: two windows that
/// merely touch on a single date overlap by zero days.
pub fn overlap_days(start1: NaiveDate, end1: NaiveDate, start2: NaiveDate, end2: NaiveDate) -> i64 {
    let overlap_start = start1.max(start2);
    let overlap_end = end1.min(end2);
    (overlap_end - overlap_start).num_days().max(0)
}

/// Inclusive overlap between two date ranges, in days.
///
/// This is the measure used by the seasonal planner: a visit window that
/// covers a single weekday of a work week overlaps it by one day.
pub fn overlap_days_inclusive(
    start1: NaiveDate,
    end1: NaiveDate,
    start2: NaiveDate,
    end2: NaiveDate,
) -> i64 {
    let overlap_start = start1.max(start2);
    let overlap_end = end1.min(end2);
    ((overlap_end - overlap_start).num_days() + 1).max(0)
}

/// Convert a protocol minimum-period value to whole days.
///
/// Units come from the catalogue in both Dutch and English spellings.
/// Weeks count 7 days, months 30; anything else is taken as days.
pub fn days_from_min_period(value: Option<i32>, unit: Option<&str>) -> i64 {
    let Some(value) = value else { return 0 };
    if value <= 0 {
        return 0;
    }
    let value = i64::from(value);
    let Some(unit) = unit else { return value };
    let u = unit.trim().to_lowercase();
    if u.contains("week") || u == "weeken" || u == "weken" {
        value * 7
    } else if u.contains("month") || u.contains("maand") {
        value * 30
    } else {
        value
    }
}

/// Whole weeks (rounded up) needed to cover a day gap.
pub fn gap_weeks(gap_days: i64) -> i64 {
    if gap_days <= 0 {
        0
    } else {
        (gap_days + 6) / 7
    }
}

/// Rewrite a stored year-2000 pattern date to the given year.
///
/// Feb 29 collapses to Feb 28 when the target year is not a leap year.
pub fn to_year(d: NaiveDate, year: i32) -> NaiveDate {
    match d.with_year(year) {
        Some(res) => res,
        None => {
            debug_assert!(d.month() == 2 && d.day() == 29);
            NaiveDate::from_ymd_opt(year, 2, 28).unwrap_or(d)
        }
    }
}

/// ISO week of a deadline clamped into the given year.
///
/// Deadlines spilling into the next ISO year clamp to week 53, earlier
/// years to week 1.
pub fn clamped_week(d: NaiveDate, year: i32) -> u32 {
    let iso = d.iso_week();
    if iso.year() > year {
        53
    } else if iso.year() < year {
        1
    } else {
        iso.week()
    }
}

/// Demand weight for a visit active in a week with the given overlap.
///
/// Short-window visits concentrate their demand: `ceil(5 / overlap_days)`.
pub fn window_weight(overlap_days: i64) -> i64 {
    debug_assert!(overlap_days >= 1);
    (5 + overlap_days - 1) / overlap_days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_iso_week_midyear() {
        let (year, week, weekday) = iso_week(d(2025, 6, 16));
        assert_eq!(year, 2025);
        assert_eq!(week, 25);
        assert_eq!(weekday, 1);
    }

    #[test]
    fn test_iso_week_year_boundary() {
        // Dec 29 2025 belongs to ISO week 1 of 2026
        let (year, week, _) = iso_week(d(2025, 12, 29));
        assert_eq!(year, 2026);
        assert_eq!(week, 1);
    }

    #[test]
    fn test_week_monday_roundtrip() {
        let monday = week_monday(2025, 25).unwrap();
        assert_eq!(monday, d(2025, 6, 16));
        let (year, week, weekday) = iso_week(monday);
        assert_eq!((year, week, weekday), (2025, 25, 1));
    }

    #[test]
    fn test_work_week_bounds() {
        let (monday, friday) = work_week_bounds(2025, 25).unwrap();
        assert_eq!(monday, d(2025, 6, 16));
        assert_eq!(friday, d(2025, 6, 20));
    }

    #[test]
    fn test_missing_week_53() {
        // 2025 has 52 ISO weeks
        assert!(week_monday(2025, 53).is_none());
        assert!(week_monday(2026, 53).is_some());
    }

    #[test]
    fn test_overlap_days_exclusive() {
        assert_eq!(overlap_days(d(2025, 6, 1), d(2025, 7, 1), d(2025, 6, 15), d(2025, 8, 1)), 16);
        assert_eq!(overlap_days(d(2025, 6, 1), d(2025, 6, 10), d(2025, 6, 10), d(2025, 7, 1)), 0);
        assert_eq!(overlap_days(d(2025, 6, 1), d(2025, 6, 10), d(2025, 7, 1), d(2025, 8, 1)), 0);
    }

    #[test]
    fn test_overlap_days_inclusive() {
        assert_eq!(
            overlap_days_inclusive(d(2025, 6, 16), d(2025, 6, 16), d(2025, 6, 16), d(2025, 6, 20)),
            1
        );
        assert_eq!(
            overlap_days_inclusive(d(2025, 6, 1), d(2025, 12, 31), d(2025, 6, 16), d(2025, 6, 20)),
            5
        );
    }

    #[test]
    fn test_days_from_min_period_units() {
        assert_eq!(days_from_min_period(Some(3), None), 3);
        assert_eq!(days_from_min_period(Some(3), Some("days")), 3);
        assert_eq!(days_from_min_period(Some(3), Some("dagen")), 3);
        assert_eq!(days_from_min_period(Some(2), Some("weeks")), 14);
        assert_eq!(days_from_min_period(Some(2), Some("weken")), 14);
        assert_eq!(days_from_min_period(Some(1), Some("months")), 30);
        assert_eq!(days_from_min_period(Some(1), Some("maanden")), 30);
        assert_eq!(days_from_min_period(None, Some("weeks")), 0);
        assert_eq!(days_from_min_period(Some(0), Some("weeks")), 0);
    }

    #[test]
    fn test_gap_weeks_rounds_up() {
        assert_eq!(gap_weeks(0), 0);
        assert_eq!(gap_weeks(7), 1);
        assert_eq!(gap_weeks(8), 2);
        assert_eq!(gap_weeks(21), 3);
    }

    #[test]
    fn test_to_year_handles_leap_day() {
        assert_eq!(to_year(d(2000, 2, 29), 2025), d(2025, 2, 28));
        assert_eq!(to_year(d(2000, 2, 29), 2024), d(2024, 2, 29));
        assert_eq!(to_year(d(2000, 6, 1), 2025), d(2025, 6, 1));
    }

    #[test]
    fn test_clamped_week() {
        assert_eq!(clamped_week(d(2025, 6, 20), 2025), 25);
        assert_eq!(clamped_week(d(2025, 12, 29), 2025), 53);
        assert_eq!(clamped_week(d(2024, 12, 20), 2025), 1);
    }

    #[test]
    fn test_window_weight_inverse_overlap() {
        assert_eq!(window_weight(5), 1);
        assert_eq!(window_weight(3), 2);
        assert_eq!(window_weight(1), 5);
    }
}
