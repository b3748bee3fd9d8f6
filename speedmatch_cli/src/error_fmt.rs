//! Human-readable error descriptions and stable exit codes.

use speedmatch_core::CalibrationError;

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<CalibrationError>() {
        return match ce {
            CalibrationError::InvalidConfiguration(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            CalibrationError::AmbiguousSensorTransition(_) => format!(
                "What happened: {ce}.\nLikely causes: Overlapping detection zones or a chattering detector.\nHow to fix: Add the offending detectors to detectors.ignored (unless they bound a measured segment) and rerun."
            ),
            CalibrationError::UnreachableTopSpeed { .. } => format!(
                "What happened: {ce}.\nLikely causes: The calibration speed exceeds what the vehicle can do at full voltage.\nHow to fix: Lower calibration.top_smph and rerun."
            ),
            CalibrationError::IncompleteSpeedTable { .. } => format!(
                "What happened: {ce}.\nThis is an internal invariant violation, not an operator problem; please report it with the log output."
            ),
            CalibrationError::NoUsableSegments => format!(
                "What happened: {ce}.\nLikely causes: Every measured segment lost coverage, usually because a neighboring detector is broken or ignored.\nHow to fix: Review detector placement and the detectors.ignored list."
            ),
            CalibrationError::DetectorTimeout(_) => format!(
                "What happened: {ce}.\nLikely causes: A stalled vehicle, a dead detector, or detectors.wait_timeout_ms set too low.\nHow to fix: Check the vehicle and detector wiring, or raise detectors.wait_timeout_ms."
            ),
            CalibrationError::Throttle(_) | CalibrationError::Detectors(_) => format!(
                "What happened: {ce}.\nLikely causes: Hardware connection problem.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {err}"
    )
}

/// Map typed calibration failures to stable exit codes; other errors get 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(ce) = err.downcast_ref::<CalibrationError>() {
        return match ce {
            CalibrationError::InvalidConfiguration(_) => 2,
            CalibrationError::AmbiguousSensorTransition(_) => 3,
            CalibrationError::UnreachableTopSpeed { .. } => 4,
            CalibrationError::DetectorTimeout(_) => 5,
            CalibrationError::NoUsableSegments => 6,
            CalibrationError::IncompleteSpeedTable { .. } => 7,
            CalibrationError::Throttle(_) | CalibrationError::Detectors(_) => 8,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    let reason = err
        .downcast_ref::<CalibrationError>()
        .map_or("Error", |ce| match ce {
            CalibrationError::InvalidConfiguration(_) => "InvalidConfiguration",
            CalibrationError::AmbiguousSensorTransition(_) => "AmbiguousSensorTransition",
            CalibrationError::UnreachableTopSpeed { .. } => "UnreachableTopSpeed",
            CalibrationError::IncompleteSpeedTable { .. } => "IncompleteSpeedTable",
            CalibrationError::NoUsableSegments => "NoUsableSegments",
            CalibrationError::DetectorTimeout(_) => "DetectorTimeout",
            CalibrationError::Throttle(_) => "Throttle",
            CalibrationError::Detectors(_) => "Detectors",
        });
    serde_json::json!({ "reason": reason, "message": humanize(err) }).to_string()
}
