#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core speed-match logic (hardware-agnostic).
//!
//! Calibrates a vehicle's speed-control curve against a track loop
//! instrumented with occupancy detectors. All hardware interactions go
//! through `speedmatch_traits::Throttle` and `speedmatch_traits::DetectorBus`.
//!
//! ## Pipeline
//!
//! - **Targets**: per-segment travel time at the desired top speed
//!   (`targets` module)
//! - **Acquisition**: sweep command values in both directions, turning
//!   detector activations into travel-time samples (`acquisition` module)
//! - **Aggregation**: median per (segment, command value, direction) plus
//!   coverage filtering (`samples` module)
//! - **Interpolation**: log-space time lookup at arbitrary command values
//!   (`interpolate` module)
//! - **Synthesis**: invert the curves into an N-step control table and merge
//!   directions and segments (`synth` module)
//!
//! The `runner` module sequences the stages; `mocks` hosts scripted hardware
//! for tests.

pub mod acquisition;
pub mod error;
pub mod interpolate;
pub mod mocks;
pub mod runner;
pub mod samples;
pub mod synth;
pub mod targets;

pub use acquisition::{Acquisition, AcquisitionCfg};
pub use error::{CalibrationError, Result};
pub use interpolate::{SegmentCurve, UNREACHABLY_SLOW_SECS};
pub use runner::{CalibrationOutcome, RunCfg, measured_segments, run, synthesize_from_samples};
pub use samples::{FilteredTable, RawSampleSet, aggregate};
pub use synth::{ControlCurve, SynthCfg, synthesize};
pub use targets::{CalibrationTarget, MeasuredSegment, SMPH_TO_INCHES_PER_SEC, compute_targets};
