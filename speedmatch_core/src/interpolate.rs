//! Log-space travel-time interpolation for one segment and direction.
//!
//! Travel time is inversely proportional to speed, so interpolation between
//! measured command values is linear in log(time), not in time. Below the
//! lowest measured command value the raw extrapolation produces implausibly
//! small command values downstream, so `time_at` returns an "unreachably
//! slow" sentinel instead; the synthesizer ramps those entries afterwards.

use std::collections::BTreeMap;

use crate::error::{CalibrationError, Result};

/// Sentinel travel time returned below the measured range. Any real desired
/// time is smaller, so commands at or below the lowest measurement are never
/// selected by the inversion scan.
pub const UNREACHABLY_SLOW_SECS: f64 = 1.0e16;

/// Sorted (command value, median travel time) pairs for one segment in one
/// direction, with interpolated lookup at arbitrary command values.
#[derive(Debug, Clone)]
pub struct SegmentCurve {
    points: Vec<(u8, f64)>,
}

impl SegmentCurve {
    /// Build from an aggregated table. Needs at least two measured command
    /// values to establish a slope, and strictly positive times.
    pub fn from_table(label: &str, table: &BTreeMap<u8, f64>) -> Result<Self> {
        if table.len() < 2 {
            return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
                format!(
                    "segment {label} has {} measured command value(s), need at least 2 to interpolate",
                    table.len()
                ),
            )));
        }
        for (&command, &secs) in table {
            if !(secs > 0.0) || !secs.is_finite() {
                return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
                    format!("segment {label} has non-positive time {secs} at command {command}"),
                )));
            }
        }
        Ok(Self {
            points: table.iter().map(|(&c, &t)| (c, t)).collect(),
        })
    }

    /// Estimated travel time at an arbitrary command value.
    pub fn time_at(&self, command: u8) -> f64 {
        let (c_lo, _) = self.points[0];
        if command <= c_lo {
            return UNREACHABLY_SLOW_SECS;
        }

        let n = self.points.len();
        let (c_hi, t_hi) = self.points[n - 1];
        if command > c_hi {
            // Extrapolate forward on the log-slope of the top two measurements.
            let (c_prev, t_prev) = self.points[n - 2];
            let slope = (t_hi.ln() - t_prev.ln()) / f64::from(c_hi - c_prev);
            let run = f64::from(command - c_hi);
            return (slope * run + t_hi.ln()).exp();
        }

        for pair in self.points.windows(2) {
            let (c0, t0) = pair[0];
            let (c1, t1) = pair[1];
            if command > c0 && command <= c1 {
                let slope = (t1.ln() - t0.ln()) / f64::from(c1 - c0);
                let run = f64::from(command - c0);
                return (slope * run + t0.ln()).exp();
            }
        }

        // Unreachable: command is within [c_lo, c_hi] so a bracket matched.
        UNREACHABLY_SLOW_SECS
    }
}
