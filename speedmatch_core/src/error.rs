use speedmatch_traits::SegmentId;
use thiserror::Error;

fn join_ids(ids: &[SegmentId]) -> String {
    ids.iter()
        .map(SegmentId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Terminal failures of a calibration run. None are retried automatically;
/// each carries enough context for the operator to act.
#[derive(Debug, Error, Clone)]
pub enum CalibrationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error(
        "more than one detector activated at once ({}); exclude overlapping or faulty detectors and rerun",
        join_ids(.0)
    )]
    AmbiguousSensorTransition(Vec<SegmentId>),
    #[error(
        "segment {segment} still takes {observed_secs:.2}s at command value {command} \
         (target {target_secs:.2}s); try a lower calibration speed"
    )]
    UnreachableTopSpeed {
        segment: SegmentId,
        command: u8,
        observed_secs: f64,
        target_secs: f64,
    },
    #[error("speed table has {got} entries, expected {expected}")]
    IncompleteSpeedTable { got: usize, expected: usize },
    #[error("no measured segment survived sample filtering; review detector placement and exclusions")]
    NoUsableSegments,
    #[error("no detector change within {0} ms")]
    DetectorTimeout(u64),
    #[error("throttle error: {0}")]
    Throttle(String),
    #[error("detector bus error: {0}")]
    Detectors(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
