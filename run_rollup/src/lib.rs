//! Core weekly running mileage rollup library.
//!
//! Pipeline: extract running intervals from a health export, resolve
//! overlapping recordings of the same run, bucket the survivors into
//! Monday-anchored calendar weeks.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod extract;
pub mod resolve;
pub mod weekly;

pub use extract::{extract_runs, extract_runs_from_path, ExtractStats};
pub use resolve::{GreedyFirstMatch, ResolutionStrategy};
pub use weekly::{aggregate_weekly, week_start, WeeklyBucket};

#[derive(Error, Debug)]
pub enum RollupError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed export XML: {0}")]
    XmlParse(String),
}

/// One recorded running activity. Created by the extractor and never
/// mutated afterwards; the resolver discards or passes records through
/// whole (replacement is by substitution, not in-place edit).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub distance_mi: f64,
}

impl RunInterval {
    /// Strict interval overlap: `[s1,e1)` and `[s2,e2)` overlap iff
    /// `s1 < e2 && e1 > s2`. Touching endpoints do not overlap; a
    /// zero-duration interval fails the strict inequalities at its own
    /// position and at endpoints, but still overlaps a span it falls
    /// strictly inside.
    pub fn overlaps(&self, other: &RunInterval) -> bool {
        self.start < other.end && self.end > other.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{GreedyFirstMatch, ResolutionStrategy};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn run(start: &str, end: &str, distance_mi: f64) -> RunInterval {
        RunInterval {
            start: ts(start),
            end: ts(end),
            distance_mi,
        }
    }

    #[test]
    fn test_overlap_is_strict() {
        let a = run("2024-01-01T10:00:00", "2024-01-01T10:30:00", 3.0);
        let b = run("2024-01-01T10:30:00", "2024-01-01T11:00:00", 3.0);
        let c = run("2024-01-01T10:29:00", "2024-01-01T10:45:00", 2.0);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_zero_duration_overlap_is_positional() {
        let span = run("2024-01-01T10:00:00", "2024-01-01T10:30:00", 3.0);
        // Strictly inside the span: the strict inequalities hold.
        let inside = run("2024-01-01T10:15:00", "2024-01-01T10:15:00", 0.0);
        assert!(inside.overlaps(&span));
        assert!(span.overlaps(&inside));
        // At an endpoint or against itself they fail.
        let at_end = run("2024-01-01T10:30:00", "2024-01-01T10:30:00", 0.0);
        assert!(!at_end.overlaps(&span));
        assert!(!span.overlaps(&at_end));
        assert!(!inside.overlaps(&inside));
    }

    #[test]
    fn test_pipeline_end_to_end() {
        // Two overlapping Monday recordings and one Wednesday run: one
        // Monday record survives, everything lands in a single week.
        let input = vec![
            run("2024-01-01T06:00:00", "2024-01-01T06:30:00", 3.1),
            run("2024-01-01T06:05:00", "2024-01-01T06:20:00", 2.0),
            run("2024-01-03T07:00:00", "2024-01-03T07:45:00", 5.0),
        ];
        let resolved = GreedyFirstMatch.resolve(input);
        assert_eq!(resolved.len(), 2);
        let weekly = aggregate_weekly(&resolved);
        assert_eq!(weekly.len(), 1);
        assert_eq!(
            weekly[0].week_start,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert!((weekly[0].total_mi - 8.1).abs() < 1e-9);
    }
}
