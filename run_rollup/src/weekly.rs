use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::RunInterval;

/// Total mileage for one Monday-anchored calendar week.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeeklyBucket {
    pub week_start: NaiveDate,
    pub total_mi: f64,
}

/// Monday (ISO week) on or before the timestamp's date.
pub fn week_start(ts: NaiveDateTime) -> NaiveDate {
    let date = ts.date();
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Bucket resolved intervals by the week of their start time and sum
/// distances. Bucketing looks at `start` only; a run spanning midnight
/// into a new week still counts toward the week it began in. Weeks with
/// no runs are omitted rather than zero-filled; output is ascending by
/// week start.
pub fn aggregate_weekly(intervals: &[RunInterval]) -> Vec<WeeklyBucket> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for interval in intervals {
        *totals.entry(week_start(interval.start)).or_insert(0.0) += interval.distance_mi;
    }
    totals
        .into_iter()
        .map(|(week_start, total_mi)| WeeklyBucket {
            week_start,
            total_mi,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(start: &str, distance_mi: f64) -> RunInterval {
        let start = NaiveDateTime::parse_from_str(start, "%Y-%m-%dT%H:%M:%S").unwrap();
        RunInterval {
            start,
            end: start + chrono::Duration::minutes(30),
            distance_mi,
        }
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2024-01-07 is a Sunday in the week of Monday 2024-01-01.
        let sunday = NaiveDateTime::parse_from_str("2024-01-07T09:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        assert_eq!(
            week_start(sunday),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        let monday = NaiveDateTime::parse_from_str("2024-01-08T09:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        assert_eq!(
            week_start(monday),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }

    #[test]
    fn test_sunday_and_monday_land_in_different_buckets() {
        let weekly = aggregate_weekly(&[
            run("2024-01-07T09:00:00", 4.0),
            run("2024-01-08T09:00:00", 6.0),
        ]);
        assert_eq!(weekly.len(), 2);
        assert_eq!(
            weekly[0].week_start,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert!((weekly[0].total_mi - 4.0).abs() < 1e-9);
        assert_eq!(
            weekly[1].week_start,
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
        assert!((weekly[1].total_mi - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_distances_sum_within_a_week() {
        let weekly = aggregate_weekly(&[
            run("2024-01-01T06:00:00", 3.1),
            run("2024-01-03T07:00:00", 5.0),
            run("2024-01-06T08:00:00", 2.4),
        ]);
        assert_eq!(weekly.len(), 1);
        assert!((weekly[0].total_mi - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_output_sorted_ascending_even_for_unsorted_input() {
        let weekly = aggregate_weekly(&[
            run("2024-02-12T06:00:00", 2.0),
            run("2024-01-01T06:00:00", 3.0),
            run("2024-01-22T06:00:00", 4.0),
        ]);
        let weeks: Vec<NaiveDate> = weekly.iter().map(|b| b.week_start).collect();
        let mut sorted = weeks.clone();
        sorted.sort();
        assert_eq!(weeks, sorted);
        assert_eq!(weekly.len(), 3);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(aggregate_weekly(&[]).is_empty());
    }
}
