//! Control-curve synthesis: inverting segment curves into an N-step table.
//!
//! Per segment and direction, each step s (1-indexed, s = N fastest) gets the
//! desired time T * N / s and the scan picks the command value whose
//! interpolated time lands closest. The low-speed prefix produced by the
//! below-range sentinel is replaced with a linear ramp from the configured
//! floor. Forward and reverse tables are merged by unweighted averaging, as
//! are the per-segment tables; a joint least-squares solve of one table plus
//! per-direction trims is deliberately not attempted here, so merging stays
//! behind `synthesize` where a future solver could replace it.

use speedmatch_traits::{Direction, SegmentId};

use crate::error::{CalibrationError, Result};
use crate::interpolate::SegmentCurve;
use crate::samples::FilteredTable;
use crate::targets::CalibrationTarget;

/// Synthesis parameters.
#[derive(Debug, Clone)]
pub struct SynthCfg {
    /// Number of discrete control steps (N).
    pub steps: usize,
    /// Low-speed floor value the ramp starts from ("vStart").
    pub floor: u8,
    /// Largest assignable command value; the scan saturates here.
    pub max_command: u8,
}

impl Default for SynthCfg {
    fn default() -> Self {
        Self {
            steps: 28,
            floor: 1,
            max_command: 255,
        }
    }
}

/// The final N-entry mapping from control step to command value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCurve {
    steps: Vec<u8>,
}

impl ControlCurve {
    pub fn steps(&self) -> &[u8] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Command value at 1-indexed step `s`.
    pub fn at_step(&self, s: usize) -> Option<u8> {
        if s == 0 {
            return None;
        }
        self.steps.get(s - 1).copied()
    }
}

/// Build one direction's table for one segment by inverting its curve.
pub(crate) fn build_direction(curve: &SegmentCurve, target_secs: f64, cfg: &SynthCfg) -> Result<Vec<u8>> {
    let n = cfg.steps;
    let mut table: Vec<u8> = Vec::with_capacity(n);

    for step in 1..=n {
        let desired = target_secs * n as f64 / step as f64;
        for command in 1..=cfg.max_command {
            let time = curve.time_at(command);
            if time <= desired {
                // Bracketing pair: prefer the predecessor only when it is
                // strictly closer to the desired time.
                let prev_time = curve.time_at(command - 1);
                if (prev_time - desired).abs() < (time - desired).abs() {
                    table.push(command - 1);
                } else {
                    table.push(command);
                }
                break;
            }
            if command == cfg.max_command {
                // Saturate: even full throttle is slower than desired here.
                table.push(cfg.max_command);
            }
        }
    }

    ramp_low_steps(&mut table, cfg.floor);

    if table.len() != n {
        return Err(eyre::Report::new(CalibrationError::IncompleteSpeedTable {
            got: table.len(),
            expected: n,
        }));
    }
    Ok(table)
}

/// Replace the constant low-speed prefix (the artifact of the below-range
/// sentinel) with a strictly increasing ramp from `floor` up to the first
/// non-constant entry.
pub(crate) fn ramp_low_steps(table: &mut [u8], floor: u8) {
    let Some(&first) = table.first() else {
        return;
    };
    let Some(prefix_len) = table.iter().position(|&v| v != first) else {
        // Entire table is one value; nothing to anchor a ramp to.
        return;
    };
    // A lone first entry is not a constant prefix.
    if prefix_len < 2 {
        return;
    }
    let anchor = f64::from(table[prefix_len]);
    let base = f64::from(floor);
    let span = (prefix_len + 1) as f64;
    for (i, slot) in table.iter_mut().take(prefix_len).enumerate() {
        let v = base + (anchor - base) * (i + 1) as f64 / span;
        *slot = v.round() as u8;
    }
}

/// Average per-step across a set of tables, rounding to the nearest integer.
fn average_tables(tables: &[Vec<f64>], steps: usize, max_command: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(steps);
    let count = tables.len() as f64;
    for step in 0..steps {
        let sum: f64 = tables.iter().map(|t| t[step]).sum();
        let avg = (sum / count).round();
        out.push(avg.clamp(1.0, f64::from(max_command)) as u8);
    }
    out
}

/// Invert and merge: per surviving measured segment, build forward and
/// reverse tables, average them per step, then average across segments.
pub fn synthesize(
    table: &FilteredTable,
    targets: &CalibrationTarget,
    cfg: &SynthCfg,
) -> Result<ControlCurve> {
    if cfg.steps == 0 {
        return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
            "step count must be >= 1".to_owned(),
        )));
    }
    if cfg.floor == 0 {
        return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
            "floor value must be >= 1".to_owned(),
        )));
    }

    // Measured segments may have been dropped by filtering.
    let usable: Vec<(&SegmentId, f64)> = targets
        .iter()
        .filter(|(segment, _)| table.contains(segment))
        .map(|(segment, &target)| (segment, target))
        .collect();
    if usable.is_empty() {
        return Err(eyre::Report::new(CalibrationError::NoUsableSegments));
    }

    let mut per_segment: Vec<Vec<f64>> = Vec::with_capacity(usable.len());
    for (segment, target_secs) in usable {
        let mut per_direction: Vec<Vec<f64>> = Vec::with_capacity(2);
        for direction in [Direction::Forward, Direction::Reverse] {
            let Some(measured) = table.direction(direction).get(segment) else {
                // contains() guarantees both directions; defensive skip would
                // silently bias the merge, so fail loudly instead.
                return Err(eyre::Report::new(CalibrationError::NoUsableSegments));
            };
            let curve = SegmentCurve::from_table(segment.as_str(), measured)?;
            let built = build_direction(&curve, target_secs, cfg)?;
            per_direction.push(built.iter().map(|&v| f64::from(v)).collect());
        }
        // Merge directions by unweighted average, discarding trim information.
        let merged: Vec<f64> = (0..cfg.steps)
            .map(|i| (per_direction[0][i] + per_direction[1][i]) / 2.0)
            .collect();
        tracing::debug!(%segment, "segment table synthesized");
        per_segment.push(merged);
    }

    let steps = average_tables(&per_segment, cfg.steps, cfg.max_command);
    if steps.len() != cfg.steps {
        return Err(eyre::Report::new(CalibrationError::IncompleteSpeedTable {
            got: steps.len(),
            expected: cfg.steps,
        }));
    }

    tracing::info!(?steps, "control curve synthesized");
    Ok(ControlCurve { steps })
}
