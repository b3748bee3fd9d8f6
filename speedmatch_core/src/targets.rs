//! Per-segment calibration targets.
//!
//! A measured segment's target is the travel time the vehicle would need at
//! the desired top speed, derived from the segment's physical length and the
//! model scale. Lower times are faster; acquisition stops probing higher
//! command values once a measured segment gets under its target.

use std::collections::BTreeMap;

use speedmatch_traits::SegmentId;

use crate::error::{CalibrationError, Result};

/// smph to inches/second at 1:1 scale: 5280 ft/mi * 12 in/ft / 3600 s/h.
pub const SMPH_TO_INCHES_PER_SEC: f64 = 5280.0 * 12.0 / 3600.0;

/// A segment with known physical length.
#[derive(Debug, Clone)]
pub struct MeasuredSegment {
    pub id: SegmentId,
    pub length_in: f64,
}

/// Target travel time in seconds per measured segment. Built once before
/// acquisition, read-only thereafter.
pub type CalibrationTarget = BTreeMap<SegmentId, f64>;

/// Compute the target travel time for each measured segment.
///
/// in/s = top_smph * (1/scale) * 5280 * 12 / 3600; target = length / (in/s).
pub fn compute_targets(
    segments: &[MeasuredSegment],
    top_smph: f64,
    scale: f64,
) -> Result<CalibrationTarget> {
    if !(top_smph > 0.0) || !top_smph.is_finite() {
        return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
            format!("desired top speed must be > 0 smph, got {top_smph}"),
        )));
    }
    if !(scale > 0.0) || !scale.is_finite() {
        return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
            format!("scale factor must be > 0, got {scale}"),
        )));
    }

    let inches_per_sec = top_smph / scale * SMPH_TO_INCHES_PER_SEC;

    let mut targets = CalibrationTarget::new();
    for seg in segments {
        if !(seg.length_in > 0.0) || !seg.length_in.is_finite() {
            return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
                format!("segment {} length must be > 0 inches, got {}", seg.id, seg.length_in),
            )));
        }
        targets.insert(seg.id.clone(), seg.length_in / inches_per_sec);
    }

    tracing::info!(?targets, top_smph, scale, "computed per-segment target times");
    Ok(targets)
}
