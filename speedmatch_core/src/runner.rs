//! Pipeline sequencing: targets -> acquisition -> aggregation -> synthesis.
//!
//! Callers that already hold a persisted `RawSampleSet` can skip live
//! acquisition with `synthesize_from_samples`; the loaded set only has to be
//! structurally identical to a freshly-acquired one.

use std::sync::Arc;

use speedmatch_traits::{Clock, DetectorBus, Throttle};

use crate::acquisition::{Acquisition, AcquisitionCfg};
use crate::error::Result;
use crate::samples::{FilteredTable, RawSampleSet, aggregate};
use crate::synth::{ControlCurve, SynthCfg, synthesize};
use crate::targets::{CalibrationTarget, MeasuredSegment, compute_targets};

/// Everything the pipeline needs beyond hardware handles.
#[derive(Debug, Clone)]
pub struct RunCfg {
    pub top_smph: f64,
    pub scale: f64,
    pub acquisition: AcquisitionCfg,
    pub synth: SynthCfg,
}

impl Default for RunCfg {
    fn default() -> Self {
        Self {
            top_smph: 35.0,
            scale: 87.1,
            acquisition: AcquisitionCfg::default(),
            synth: SynthCfg::default(),
        }
    }
}

impl RunCfg {
    pub fn from_config(cfg: &speedmatch_config::Config) -> Self {
        Self {
            top_smph: cfg.calibration.top_smph,
            scale: cfg.calibration.scale,
            acquisition: AcquisitionCfg {
                sweep: cfg.calibration.sweep.clone(),
                min_samples: cfg.calibration.min_samples,
                settle_ms: cfg.throttle.settle_ms,
                wait_timeout_ms: cfg.detectors.wait_timeout_ms,
                full_throttle_threshold: cfg.calibration.full_throttle_threshold,
            },
            synth: SynthCfg {
                steps: cfg.calibration.steps,
                floor: cfg.calibration.floor,
                max_command: 255,
            },
        }
    }
}

/// Measured segments from a parsed configuration.
pub fn measured_segments(cfg: &speedmatch_config::Config) -> Vec<MeasuredSegment> {
    cfg.segments
        .measured
        .iter()
        .map(|seg| MeasuredSegment {
            id: speedmatch_traits::SegmentId::new(seg.id.clone()),
            length_in: seg.length_in,
        })
        .collect()
}

/// Result of a full calibration run.
#[derive(Debug)]
pub struct CalibrationOutcome {
    pub curve: ControlCurve,
    pub table: FilteredTable,
    pub samples: RawSampleSet,
}

/// Drive the vehicle, collect samples, and synthesize the control curve.
pub fn run<T, D>(
    throttle: T,
    detectors: D,
    clock: Arc<dyn Clock + Send + Sync>,
    segments: &[MeasuredSegment],
    cfg: &RunCfg,
) -> Result<CalibrationOutcome>
where
    T: Throttle,
    D: DetectorBus,
{
    let targets = compute_targets(segments, cfg.top_smph, cfg.scale)?;
    tracing::info!(
        segments = segments.len(),
        sweep = ?cfg.acquisition.sweep,
        "starting timing acquisition"
    );
    let acquisition = Acquisition::new(
        throttle,
        detectors,
        clock,
        targets.clone(),
        cfg.acquisition.clone(),
    )?;
    let samples = acquisition.run()?;
    finish(samples, targets, cfg)
}

/// Synthesize from a previously persisted sample set, skipping acquisition.
pub fn synthesize_from_samples(
    samples: RawSampleSet,
    segments: &[MeasuredSegment],
    cfg: &RunCfg,
) -> Result<CalibrationOutcome> {
    let targets = compute_targets(segments, cfg.top_smph, cfg.scale)?;
    finish(samples, targets, cfg)
}

fn finish(
    samples: RawSampleSet,
    targets: CalibrationTarget,
    cfg: &RunCfg,
) -> Result<CalibrationOutcome> {
    let table = aggregate(&samples)?;
    let curve = synthesize(&table, &targets, &cfg.synth)?;
    Ok(CalibrationOutcome {
        curve,
        table,
        samples,
    })
}
