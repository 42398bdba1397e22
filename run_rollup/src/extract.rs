//! Health-export extraction: streams `Workout` elements out of an Apple
//! Health `export.xml`, keeps running workouts, and normalizes their
//! distance statistic to miles. Every per-record problem is a skip, not
//! a failure; only document-level XML damage or I/O errors surface.

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{RollupError, RunInterval};

const RUNNING_ACTIVITY_TYPE: &str = "HKWorkoutActivityTypeRunning";
const DISTANCE_STATISTIC_TYPE: &str = "HKQuantityTypeIdentifierDistanceWalkingRunning";

/// Miles per kilometer.
pub const KM_TO_MI: f64 = 0.621371;

/// Counters for records the extractor dropped while scanning the
/// export. One counter fires per excluded running workout.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractStats {
    pub workouts_seen: usize,
    pub running_workouts: usize,
    pub skipped_bad_timestamp: usize,
    pub skipped_bad_unit: usize,
    pub skipped_bad_value: usize,
    pub skipped_no_distance: usize,
}

impl ExtractStats {
    pub fn skipped_total(&self) -> usize {
        self.skipped_bad_timestamp
            + self.skipped_bad_unit
            + self.skipped_bad_value
            + self.skipped_no_distance
    }
}

struct PendingWorkout {
    start: NaiveDateTime,
    end: NaiveDateTime,
    distance_mi: Option<f64>,
    stat_seen: bool,
    distance_error: bool,
}

/// Read an export file and extract the running intervals it contains.
pub fn extract_runs_from_path(
    path: &Path,
) -> Result<(Vec<RunInterval>, ExtractStats), RollupError> {
    let xml = fs::read_to_string(path).map_err(|source| RollupError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    extract_runs(&xml)
}

/// Extract running intervals from export XML text.
pub fn extract_runs(xml: &str) -> Result<(Vec<RunInterval>, ExtractStats), RollupError> {
    let mut reader = Reader::from_str(xml);
    let mut stats = ExtractStats::default();
    let mut runs = Vec::new();
    let mut pending: Option<PendingWorkout> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Workout" => {
                pending = open_workout(&e, &mut stats);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Workout" => {
                // Self-closing workouts carry no statistics children.
                let opened = open_workout(&e, &mut stats);
                close_workout(opened, &mut runs, &mut stats);
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.name().as_ref() == b"WorkoutStatistics" =>
            {
                if let Some(p) = pending.as_mut() {
                    record_statistic(&e, p, &mut stats);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"Workout" => {
                close_workout(pending.take(), &mut runs, &mut stats);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(RollupError::XmlParse(err.to_string())),
        }
    }

    Ok((runs, stats))
}

fn open_workout(e: &BytesStart, stats: &mut ExtractStats) -> Option<PendingWorkout> {
    stats.workouts_seen += 1;
    if attr(e, b"workoutActivityType").as_deref() != Some(RUNNING_ACTIVITY_TYPE) {
        return None;
    }
    stats.running_workouts += 1;

    let raw_start = attr(e, b"startDate");
    let raw_end = attr(e, b"endDate");
    let start = raw_start.as_deref().and_then(parse_timestamp);
    let end = raw_end.as_deref().and_then(parse_timestamp);
    match (start, end) {
        (Some(start), Some(end)) => Some(PendingWorkout {
            start,
            end,
            distance_mi: None,
            stat_seen: false,
            distance_error: false,
        }),
        _ => {
            warn!(
                "skipping workout with malformed date: {:?} or {:?}",
                raw_start, raw_end
            );
            stats.skipped_bad_timestamp += 1;
            None
        }
    }
}

fn record_statistic(e: &BytesStart, pending: &mut PendingWorkout, stats: &mut ExtractStats) {
    if pending.stat_seen {
        return;
    }
    if attr(e, b"type").as_deref() != Some(DISTANCE_STATISTIC_TYPE) {
        return;
    }
    // Only the first matching statistic is consulted.
    pending.stat_seen = true;

    let (Some(sum), Some(unit)) = (attr(e, b"sum"), attr(e, b"unit")) else {
        return;
    };
    match sum.parse::<f64>() {
        Ok(value) => match unit.as_str() {
            "mi" => pending.distance_mi = Some(value),
            "km" => pending.distance_mi = Some(value * KM_TO_MI),
            other => {
                warn!("unknown distance unit {:?} skipped", other);
                pending.distance_error = true;
                stats.skipped_bad_unit += 1;
            }
        },
        Err(_) => {
            warn!("malformed distance value {:?}", sum);
            pending.distance_error = true;
            stats.skipped_bad_value += 1;
        }
    }
}

fn close_workout(
    pending: Option<PendingWorkout>,
    runs: &mut Vec<RunInterval>,
    stats: &mut ExtractStats,
) {
    let Some(p) = pending else { return };
    match p.distance_mi {
        Some(distance_mi) => runs.push(RunInterval {
            start: p.start,
            end: p.end,
            distance_mi,
        }),
        None => {
            if !p.distance_error {
                warn!("running workout at {} has no usable distance", p.start);
                stats.skipped_no_distance += 1;
            }
        }
    }
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parse an export timestamp, reducing zoned forms to naive local time.
/// Apple exports use `2024-01-01 06:00:00 -0500`; RFC 3339 and bare
/// naive forms are accepted as well.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    None
}
