use crate::RunInterval;

/// Overlap-resolution policy. Overlapping intervals are taken to be the
/// same physical run double-recorded by multiple sources (phone plus
/// wearable); a policy decides which record survives per cluster.
pub trait ResolutionStrategy {
    fn resolve(&self, intervals: Vec<RunInterval>) -> Vec<RunInterval>;
}

/// Greedy single-pass resolution: process intervals in start order and
/// compare each against the kept list until the first conflict.
///
/// On conflict the greater distance wins (the longer record is assumed
/// the more accurate one); ties keep the earlier-processed record. The
/// scan stops at the first conflicting entry, so chains of three-way
/// overlaps are not merged transitively. That is a deliberate policy,
/// not an oversight: a stronger transitive-closure merge would change
/// observable output for pathological inputs.
pub struct GreedyFirstMatch;

impl ResolutionStrategy for GreedyFirstMatch {
    fn resolve(&self, mut intervals: Vec<RunInterval>) -> Vec<RunInterval> {
        // Stable sort keeps input order among identical start times.
        intervals.sort_by(|a, b| a.start.cmp(&b.start));

        let mut kept: Vec<RunInterval> = Vec::with_capacity(intervals.len());
        for current in intervals {
            match kept.iter().position(|existing| current.overlaps(existing)) {
                Some(idx) => {
                    if current.distance_mi > kept[idx].distance_mi {
                        kept[idx] = current;
                    }
                }
                None => kept.push(current),
            }
        }
        kept
    }
}
