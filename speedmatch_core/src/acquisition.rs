//! Timing acquisition: drive the vehicle over the sweep in both directions
//! and turn detector activations into per-segment travel-time samples.
//!
//! A sample is the elapsed time between two consecutive activations,
//! attributed to the segment that activated first (front of vehicle enters A
//! until front of vehicle enters B). The underlying wait primitive fires on
//! both activations and deactivations, so each wakeup diffs the previous and
//! current occupancy snapshots and keeps waiting until exactly one detector
//! has flipped inactive-to-active. Two or more simultaneous activations mean
//! overlapping or malfunctioning detectors and abort the run.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use speedmatch_traits::{Clock, DetectorBus, Direction, SegmentId, Throttle, WaitOutcome};

use crate::error::{CalibrationError, Result};
use crate::samples::RawSampleSet;
use crate::targets::CalibrationTarget;

/// Acquisition parameters.
#[derive(Debug, Clone)]
pub struct AcquisitionCfg {
    /// Command values to measure, strictly ascending.
    pub sweep: Vec<u8>,
    /// Samples to collect per segment per command value.
    pub min_samples: usize,
    /// Settling delay after each throttle change (momentum decay).
    pub settle_ms: u64,
    /// Max wait for a detector change in ms; 0 blocks indefinitely,
    /// preserving the original behavior of trusting the detector network.
    pub wait_timeout_ms: u64,
    /// Command value above which a measured segment must already meet its
    /// target, else the run fails with `UnreachableTopSpeed`.
    pub full_throttle_threshold: u8,
}

impl Default for AcquisitionCfg {
    fn default() -> Self {
        Self {
            sweep: vec![16, 32, 56, 80, 112, 144, 176, 208, 240, 255],
            min_samples: 2,
            settle_ms: 3000,
            wait_timeout_ms: 0,
            full_throttle_threshold: 252,
        }
    }
}

/// Detectors that flipped inactive-to-active between two snapshots.
pub(crate) fn newly_active(
    prev: &BTreeSet<SegmentId>,
    next: &BTreeSet<SegmentId>,
) -> Vec<SegmentId> {
    next.difference(prev).cloned().collect()
}

/// The acquisition state machine. Owns the `RawSampleSet` while it runs and
/// returns it once both directions are complete.
pub struct Acquisition<T: Throttle, D: DetectorBus> {
    throttle: T,
    detectors: D,
    clock: Arc<dyn Clock + Send + Sync>,
    targets: CalibrationTarget,
    cfg: AcquisitionCfg,
}

impl<T: Throttle, D: DetectorBus> Acquisition<T, D> {
    pub fn new(
        throttle: T,
        detectors: D,
        clock: Arc<dyn Clock + Send + Sync>,
        targets: CalibrationTarget,
        cfg: AcquisitionCfg,
    ) -> Result<Self> {
        if cfg.sweep.is_empty() {
            return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
                "command value sweep must not be empty".to_owned(),
            )));
        }
        for pair in cfg.sweep.windows(2) {
            if pair[1] <= pair[0] {
                return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
                    "command value sweep must be strictly ascending".to_owned(),
                )));
            }
        }
        if cfg.min_samples == 0 {
            return Err(eyre::Report::new(CalibrationError::InvalidConfiguration(
                "min_samples must be >= 1".to_owned(),
            )));
        }
        Ok(Self {
            throttle,
            detectors,
            clock,
            targets,
            cfg,
        })
    }

    /// Run the full sweep in both directions, stop the vehicle, and hand the
    /// collected samples to the synthesis pipeline.
    pub fn run(mut self) -> Result<RawSampleSet> {
        let mut samples = RawSampleSet::new();
        let result = self.sweep_both_directions(&mut samples);

        // Always try to bring the vehicle to a stop, even on a fatal error.
        if let Err(e) = self.throttle.stop() {
            tracing::warn!(error = %e, "throttle stop failed after acquisition");
        }
        result?;
        Ok(samples)
    }

    fn sweep_both_directions(&mut self, samples: &mut RawSampleSet) -> Result<()> {
        for direction in [Direction::Forward, Direction::Reverse] {
            let sweep = self.cfg.sweep.clone();
            for command in sweep {
                let reached_target = self.measure_command(direction, command, samples)?;
                if reached_target {
                    tracing::info!(
                        %direction,
                        command,
                        "target speed reached; skipping faster command values"
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    /// Collect samples for one (direction, command value). Returns true once
    /// a measured segment was traversed faster than its calibration target.
    fn measure_command(
        &mut self,
        direction: Direction,
        command: u8,
        samples: &mut RawSampleSet,
    ) -> Result<bool> {
        self.throttle
            .drive(command, direction)
            .map_err(|e| eyre::Report::new(CalibrationError::Throttle(e.to_string())))?;
        self.clock.sleep(Duration::from_millis(self.cfg.settle_ms));

        let mut snapshot = self
            .detectors
            .active_set()
            .map_err(|e| eyre::Report::new(CalibrationError::Detectors(e.to_string())))?;

        let mut reached_target = false;
        let mut last_entered: Option<(SegmentId, Instant)> = None;

        loop {
            let (segment, next_snapshot) = self.wait_for_activation(snapshot)?;
            let now = self.clock.now();
            snapshot = next_snapshot;

            if let Some((entered, entered_at)) = last_entered.take() {
                let secs = now.saturating_duration_since(entered_at).as_secs_f64();

                // Enough samples for this segment at this command value:
                // move on without recording the extra one.
                if samples.count(direction, command, &entered) + 1 > self.cfg.min_samples {
                    break;
                }

                samples.record(direction, command, entered.clone(), secs);
                tracing::debug!(
                    %direction,
                    command,
                    segment = %entered,
                    secs,
                    samples = samples.count(direction, command, &entered),
                    "sample recorded"
                );

                if let Some(&target_secs) = self.targets.get(&entered) {
                    if target_secs > secs {
                        // Already faster than the calibration target here.
                        reached_target = true;
                    }
                    if command > self.cfg.full_throttle_threshold && target_secs < secs {
                        return Err(eyre::Report::new(CalibrationError::UnreachableTopSpeed {
                            segment: entered,
                            command,
                            observed_secs: secs,
                            target_secs,
                        }));
                    }
                }
            }

            last_entered = Some((segment, now));
        }

        Ok(reached_target)
    }

    /// Suspend until exactly one detector flips inactive-to-active. Each
    /// wakeup recomputes the diff against the snapshot taken before the wait;
    /// deactivation-only wakeups update the snapshot and keep waiting.
    fn wait_for_activation(
        &mut self,
        mut prev: BTreeSet<SegmentId>,
    ) -> Result<(SegmentId, BTreeSet<SegmentId>)> {
        let timeout = if self.cfg.wait_timeout_ms > 0 {
            Some(Duration::from_millis(self.cfg.wait_timeout_ms))
        } else {
            None
        };

        loop {
            let outcome = self
                .detectors
                .wait_for_change(timeout)
                .map_err(|e| eyre::Report::new(CalibrationError::Detectors(e.to_string())))?;
            if outcome == WaitOutcome::TimedOut {
                return Err(eyre::Report::new(CalibrationError::DetectorTimeout(
                    self.cfg.wait_timeout_ms,
                )));
            }

            let next = self
                .detectors
                .active_set()
                .map_err(|e| eyre::Report::new(CalibrationError::Detectors(e.to_string())))?;

            let mut activated = newly_active(&prev, &next);
            match activated.len() {
                0 => {
                    // Deactivation only; keep waiting from the new snapshot.
                    prev = next;
                }
                1 => {
                    if let Some(segment) = activated.pop() {
                        return Ok((segment, next));
                    }
                }
                _ => {
                    return Err(eyre::Report::new(
                        CalibrationError::AmbiguousSensorTransition(activated),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<SegmentId> {
        names.iter().map(|n| SegmentId::from(*n)).collect()
    }

    #[test]
    fn diff_finds_single_activation() {
        let prev = set(&["LS1"]);
        let next = set(&["LS2"]);
        assert_eq!(newly_active(&prev, &next), vec![SegmentId::from("LS2")]);
    }

    #[test]
    fn diff_ignores_deactivations() {
        let prev = set(&["LS1", "LS2"]);
        let next = set(&["LS2"]);
        assert!(newly_active(&prev, &next).is_empty());
    }

    #[test]
    fn diff_reports_all_simultaneous_activations() {
        let prev = set(&["LS1"]);
        let next = set(&["LS1", "LS2", "LS3"]);
        assert_eq!(
            newly_active(&prev, &next),
            vec![SegmentId::from("LS2"), SegmentId::from("LS3")]
        );
    }

    #[test]
    fn config_rejects_unsorted_sweep() {
        use crate::mocks::{ScriptedDetectors, ScriptedThrottle};
        use speedmatch_traits::clock::ManualClock;

        let cfg = AcquisitionCfg {
            sweep: vec![32, 16],
            ..AcquisitionCfg::default()
        };
        let clock = Arc::new(ManualClock::new());
        let res = Acquisition::new(
            ScriptedThrottle::default(),
            ScriptedDetectors::new(vec![]),
            clock,
            CalibrationTarget::new(),
            cfg,
        );
        assert!(res.is_err());
    }
}
