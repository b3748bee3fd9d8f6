#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and raw-sample persistence for the speed-match system.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Raw travel-time samples are persisted as CSV with enforced headers so a
//!   measurement run can be re-synthesized offline without re-driving the
//!   vehicle.
use serde::{Deserialize, Serialize};

/// Raw-sample CSV schema.
///
/// Expected headers:
/// direction,command,segment,seconds
///
/// Example:
/// direction,command,segment,seconds
/// fwd,80,LS235,2.31
/// rev,80,LS235,2.47
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SampleRow {
    /// "fwd" or "rev"
    pub direction: String,
    pub command: u8,
    pub segment: String,
    pub seconds: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ThrottleCfg {
    /// Decoder address the run is calibrating.
    pub address: u16,
    /// Settling delay after each throttle change, to let momentum decay
    /// before timing starts.
    pub settle_ms: u64,
}

impl Default for ThrottleCfg {
    fn default() -> Self {
        Self {
            address: 3,
            settle_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Desired top speed in scale miles per hour.
    pub top_smph: f64,
    /// Model scale divisor (e.g. 87.1 for HO).
    pub scale: f64,
    /// Number of discrete control steps in the final table.
    pub steps: usize,
    /// Low-speed floor value used by the low-end ramp ("vStart").
    pub floor: u8,
    /// Samples to collect per segment per command value.
    pub min_samples: usize,
    /// Command values to measure, ascending.
    pub sweep: Vec<u8>,
    /// Command value above which the target must already be met, else the
    /// vehicle is declared unable to reach the calibration speed.
    pub full_throttle_threshold: u8,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            top_smph: 35.0,
            scale: 87.1,
            steps: 28,
            floor: 1,
            min_samples: 2,
            sweep: vec![16, 32, 56, 80, 112, 144, 176, 208, 240, 255],
            full_throttle_threshold: 252,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MeasuredSegmentCfg {
    /// Detector name bounding the segment, e.g. "LS235".
    pub id: String,
    /// Physical segment length in inches.
    pub length_in: f64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SegmentsCfg {
    /// Segments with known physical length; these anchor the speed targets.
    pub measured: Vec<MeasuredSegmentCfg>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DetectorsCfg {
    /// Detectors to watch. Empty means "whatever the bus exposes".
    pub monitored: Vec<String>,
    /// Faulty detectors the operator has excluded from monitoring.
    pub ignored: Vec<String>,
    /// Max wait for a detector change in ms; 0 blocks indefinitely.
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub throttle: ThrottleCfg,
    pub calibration: CalibrationCfg,
    pub segments: SegmentsCfg,
    pub detectors: DetectorsCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Calibration
        if !(self.calibration.top_smph > 0.0) {
            eyre::bail!("calibration.top_smph must be > 0");
        }
        if !(self.calibration.scale > 0.0) {
            eyre::bail!("calibration.scale must be > 0");
        }
        if self.calibration.steps == 0 {
            eyre::bail!("calibration.steps must be >= 1");
        }
        if self.calibration.floor == 0 {
            eyre::bail!("calibration.floor must be >= 1");
        }
        if self.calibration.min_samples == 0 {
            eyre::bail!("calibration.min_samples must be >= 1");
        }
        if self.calibration.sweep.is_empty() {
            eyre::bail!("calibration.sweep must not be empty");
        }
        for pair in self.calibration.sweep.windows(2) {
            if pair[1] <= pair[0] {
                eyre::bail!("calibration.sweep must be strictly ascending");
            }
        }
        if self.calibration.sweep.iter().any(|&c| c == 0) {
            eyre::bail!("calibration.sweep values must be in 1..=255");
        }
        if self.calibration.full_throttle_threshold == 0 {
            eyre::bail!("calibration.full_throttle_threshold must be >= 1");
        }

        // Segments
        if self.segments.measured.is_empty() {
            eyre::bail!("segments.measured must list at least one segment");
        }
        for seg in &self.segments.measured {
            if seg.id.is_empty() {
                eyre::bail!("segments.measured entries must have a non-empty id");
            }
            if !(seg.length_in > 0.0) || !seg.length_in.is_finite() {
                eyre::bail!("segment {} length_in must be > 0", seg.id);
            }
        }

        // Detectors: a measured segment must not be excluded from monitoring
        for seg in &self.segments.measured {
            if self.detectors.ignored.iter().any(|s| s == &seg.id) {
                eyre::bail!("measured segment {} is listed in detectors.ignored", seg.id);
            }
        }

        // Timing needs consecutive activations, so a loop of fewer than two
        // detectors can never produce a sample.
        if !self.detectors.monitored.is_empty() {
            let effective = self
                .detectors
                .monitored
                .iter()
                .filter(|id| !self.detectors.ignored.contains(id))
                .count();
            if effective < 2 {
                eyre::bail!(
                    "detectors.monitored must leave at least two detectors after detectors.ignored exclusions, got {effective}"
                );
            }
        }

        // Throttle
        if self.throttle.settle_ms > 5 * 60 * 1000 {
            eyre::bail!("throttle.settle_ms is unreasonably large (>5min)");
        }

        Ok(())
    }
}

/// Load raw samples from CSV, enforcing the exact header row.
pub fn load_samples_csv(path: &std::path::Path) -> eyre::Result<Vec<SampleRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open samples CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["direction", "command", "segment", "seconds"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "samples CSV must have headers 'direction,command,segment,seconds', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<SampleRow>().enumerate() {
        match rec {
            Ok(row) => {
                if row.direction != "fwd" && row.direction != "rev" {
                    eyre::bail!(
                        "invalid CSV row {}: direction must be 'fwd' or 'rev', got '{}'",
                        idx + 2,
                        row.direction
                    );
                }
                if row.command == 0 {
                    eyre::bail!("invalid CSV row {}: command must be in 1..=255", idx + 2);
                }
                if !(row.seconds > 0.0) || !row.seconds.is_finite() {
                    eyre::bail!("invalid CSV row {}: seconds must be > 0", idx + 2);
                }
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    Ok(rows)
}

/// Write raw samples to CSV in the same schema `load_samples_csv` expects.
pub fn save_samples_csv(path: &std::path::Path, rows: &[SampleRow]) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create samples CSV {:?}: {}", path, e))?;
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| eyre::eyre!("write samples CSV row: {}", e))?;
    }
    wtr.flush()
        .map_err(|e| eyre::eyre!("flush samples CSV {:?}: {}", path, e))?;
    Ok(())
}
