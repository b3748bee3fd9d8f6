//! Raw travel-time samples and their reduction to a clean table.
//!
//! `RawSampleSet` holds every accepted sample keyed by direction, command
//! value and segment. `aggregate` reduces it to one median time per
//! (segment, command value, direction) and drops segments whose coverage is
//! worse than the best-covered segment: a segment's time is measured via the
//! *next* detector, so a broken or excluded neighbor corrupts every sample
//! the segment produces, and such segments show up with thin coverage.

use std::collections::BTreeMap;

use speedmatch_config::SampleRow;
use speedmatch_traits::{Direction, SegmentId};

use crate::error::{CalibrationError, Result};

/// Samples for one command value: segment -> ordered travel times (seconds).
pub type CommandSamples = BTreeMap<SegmentId, Vec<f64>>;
/// Samples for one direction: command value -> per-segment sample lists.
pub type DirectionSamples = BTreeMap<u8, CommandSamples>;

/// All raw samples of a calibration run, appended to by acquisition only.
#[derive(Debug, Clone, Default)]
pub struct RawSampleSet {
    forward: DirectionSamples,
    reverse: DirectionSamples,
}

impl RawSampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(&self, direction: Direction) -> &DirectionSamples {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }

    /// Append one travel-time sample.
    pub fn record(&mut self, direction: Direction, command: u8, segment: SegmentId, secs: f64) {
        let per_dir = match direction {
            Direction::Forward => &mut self.forward,
            Direction::Reverse => &mut self.reverse,
        };
        per_dir
            .entry(command)
            .or_default()
            .entry(segment)
            .or_default()
            .push(secs);
    }

    /// Number of samples already recorded for (direction, command, segment).
    pub fn count(&self, direction: Direction, command: u8, segment: &SegmentId) -> usize {
        self.direction(direction)
            .get(&command)
            .and_then(|per_seg| per_seg.get(segment))
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }

    /// Rebuild a sample set from persisted CSV rows. The loaded set has the
    /// same key shapes as a freshly-acquired one.
    pub fn from_rows(rows: &[SampleRow]) -> Result<Self> {
        let mut set = Self::new();
        for row in rows {
            let direction = match row.direction.as_str() {
                "fwd" => Direction::Forward,
                "rev" => Direction::Reverse,
                other => {
                    return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
                        format!("unknown direction '{other}' in persisted samples"),
                    )));
                }
            };
            if row.command == 0 || !(row.seconds > 0.0) || !row.seconds.is_finite() {
                return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
                    format!(
                        "persisted sample out of range: command {}, seconds {}",
                        row.command, row.seconds
                    ),
                )));
            }
            set.record(
                direction,
                row.command,
                SegmentId::new(row.segment.clone()),
                row.seconds,
            );
        }
        Ok(set)
    }

    /// Flatten to CSV rows for persistence.
    pub fn to_rows(&self) -> Vec<SampleRow> {
        let mut rows = Vec::new();
        for (direction, name) in [(Direction::Forward, "fwd"), (Direction::Reverse, "rev")] {
            for (&command, per_seg) in self.direction(direction) {
                for (segment, times) in per_seg {
                    for &seconds in times {
                        rows.push(SampleRow {
                            direction: name.to_owned(),
                            command,
                            segment: segment.as_str().to_owned(),
                            seconds,
                        });
                    }
                }
            }
        }
        rows
    }
}

/// Median-aggregated travel times per surviving segment and direction.
/// Derived, immutable snapshot; never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct FilteredTable {
    forward: BTreeMap<SegmentId, BTreeMap<u8, f64>>,
    reverse: BTreeMap<SegmentId, BTreeMap<u8, f64>>,
}

impl FilteredTable {
    pub fn direction(&self, direction: Direction) -> &BTreeMap<SegmentId, BTreeMap<u8, f64>> {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }

    /// Segments that survived filtering (identical for both directions).
    pub fn segments(&self) -> impl Iterator<Item = &SegmentId> {
        self.forward.keys()
    }

    pub fn contains(&self, segment: &SegmentId) -> bool {
        self.forward.contains_key(segment)
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Median of a non-empty slice; mean of the middle pair for even lengths.
pub(crate) fn median(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Reduce raw samples to per-direction median tables and keep only segments
/// whose coverage count (command values with data in *both* directions)
/// equals the maximum coverage count observed across all segments.
pub fn aggregate(samples: &RawSampleSet) -> Result<FilteredTable> {
    let forward = samples.direction(Direction::Forward);
    let reverse = samples.direction(Direction::Reverse);

    // Coverage: command values where a segment has samples in both directions.
    let mut coverage: BTreeMap<SegmentId, usize> = BTreeMap::new();
    for (command, fwd_segs) in forward {
        let Some(rev_segs) = reverse.get(command) else {
            continue;
        };
        for segment in fwd_segs.keys() {
            if rev_segs.contains_key(segment) {
                *coverage.entry(segment.clone()).or_insert(0) += 1;
            }
        }
    }

    let Some(&max_coverage) = coverage.values().max() else {
        tracing::warn!("no segment has samples in both directions");
        return Ok(FilteredTable::default());
    };

    let mut table = FilteredTable::default();
    for (segment, &count) in &coverage {
        if count != max_coverage {
            tracing::debug!(%segment, count, max_coverage, "dropping under-covered segment");
            continue;
        }
        let mut fwd_times = BTreeMap::new();
        let mut rev_times = BTreeMap::new();
        for (&command, fwd_segs) in forward {
            let (Some(fwd), Some(rev)) = (
                fwd_segs.get(segment),
                reverse.get(&command).and_then(|m| m.get(segment)),
            ) else {
                continue;
            };
            if fwd.is_empty() || rev.is_empty() {
                continue;
            }
            fwd_times.insert(command, median(fwd));
            rev_times.insert(command, median(rev));
        }
        table.forward.insert(segment.clone(), fwd_times);
        table.reverse.insert(segment.clone(), rev_times);
    }

    tracing::info!(
        segments = table.forward.len(),
        max_coverage,
        "aggregated raw samples"
    );
    Ok(table)
}
